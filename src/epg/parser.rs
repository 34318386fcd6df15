//! XMLTV schedule parser and per-channel program index
//!
//! Streaming parser over `quick-xml`; a full provider schedule is read in
//! one pass and indexed by channel. Individual records with broken
//! timestamps are dropped, only structurally malformed markup fails the
//! whole ingestion.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use tracing::debug;

use super::OffsetPolicy;
use crate::error::Error;

/// A single scheduled program on one channel.
///
/// Invariant: `start <= stop`. Ingestion drops records that violate it,
/// so every slot handed out by [`Schedule`] satisfies it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramSlot {
    /// Channel this slot belongs to (matches `epg_channel_id` on live
    /// catalog entries).
    pub channel_id: String,
    /// Program title; empty when the record carried none.
    pub title: String,
    /// Start time, Unix timestamp.
    pub start: i64,
    /// End time, Unix timestamp.
    pub stop: i64,
}

/// Per-channel program lists, each sorted ascending by start time.
/// Built once per EPG ingestion and replaced wholesale on the next.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    programs: HashMap<String, Vec<ProgramSlot>>,
    dropped: usize,
}

/// Record being assembled while the parser walks a `<programme>` element.
struct PendingSlot {
    channel_id: String,
    title: String,
    start: Option<i64>,
    stop: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    Root,
    Programme,
    Title,
}

impl Schedule {
    /// Parse raw XMLTV text into a schedule.
    ///
    /// Fails with [`Error::Parse`] when the text is not well-formed
    /// markup; the caller treats that as "no EPG available". Records
    /// whose timestamps cannot be parsed, or whose interval is inverted
    /// (`start > stop`), are dropped without failing the ingestion.
    pub fn ingest(xml: &str, policy: OffsetPolicy) -> Result<Schedule, Error> {
        let mut reader = Reader::from_reader(xml.as_bytes());
        reader.config_mut().trim_text(true);

        let mut schedule = Schedule::default();
        let mut buf = Vec::with_capacity(8192);
        let mut state = ParserState::Root;
        let mut current: Option<PendingSlot> = None;
        let mut text_buf = String::new();
        let mut saw_element = false;

        loop {
            let position = reader.buffer_position();
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    saw_element = true;
                    match e.name().as_ref() {
                        b"programme" => {
                            state = ParserState::Programme;
                            current = Some(begin_programme(e, policy));
                        }
                        b"title" if state == ParserState::Programme => {
                            state = ParserState::Title;
                            text_buf.clear();
                        }
                        _ => {}
                    }
                }
                Ok(Event::Empty(ref e)) => {
                    saw_element = true;
                    // A self-closing <programme/> has no title but is
                    // still a complete record.
                    if e.name().as_ref() == b"programme" {
                        schedule.finish(begin_programme(e, policy));
                    }
                }
                Ok(Event::Text(e)) => {
                    if state == ParserState::Title {
                        let raw = String::from_utf8_lossy(e.as_ref());
                        text_buf.push_str(&decode_xml_entities(&raw));
                    }
                }
                Ok(Event::End(ref e)) => match e.name().as_ref() {
                    b"programme" => {
                        if let Some(pending) = current.take() {
                            schedule.finish(pending);
                        }
                        state = ParserState::Root;
                    }
                    b"title" if state == ParserState::Title => {
                        if let Some(ref mut pending) = current {
                            pending.title = text_buf.trim().to_string();
                        }
                        state = ParserState::Programme;
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Parse(format!(
                        "malformed schedule markup at byte {}: {}",
                        position, e
                    )));
                }
                _ => {}
            }
            buf.clear();
        }

        // A document with no markup at all (an HTML-free error body, a
        // JSON blob) is not a schedule.
        if !saw_element {
            return Err(Error::Parse("no schedule markup found".to_string()));
        }

        for slots in schedule.programs.values_mut() {
            slots.sort_by_key(|p| p.start);
        }

        debug!(
            "EPG ingested: {} programs on {} channels, {} records dropped",
            schedule.program_count(),
            schedule.programs.len(),
            schedule.dropped
        );
        Ok(schedule)
    }

    /// Close out a pending record: keep it only when both timestamps
    /// parsed and the interval is not inverted.
    fn finish(&mut self, pending: PendingSlot) {
        match (pending.start, pending.stop) {
            (Some(start), Some(stop)) if start <= stop && !pending.channel_id.is_empty() => {
                self.programs
                    .entry(pending.channel_id.clone())
                    .or_default()
                    .push(ProgramSlot {
                        channel_id: pending.channel_id,
                        title: pending.title,
                        start,
                        stop,
                    });
            }
            _ => {
                self.dropped += 1;
                debug!(
                    "dropping programme on {:?}: bad or inverted interval",
                    pending.channel_id
                );
            }
        }
    }

    /// The program whose interval contains `now` (`start <= now <= stop`),
    /// or `None`. Slots are treated as non-overlapping; the first match
    /// in start order wins. Unknown channels yield `None`.
    pub fn current_program(&self, channel_id: &str, now: i64) -> Option<&ProgramSlot> {
        self.programs
            .get(channel_id)?
            .iter()
            .find(|p| p.start <= now && now <= p.stop)
    }

    /// All slots starting after `now - lookback`, ascending by start.
    /// A short lookback keeps the just-finished programs visible without
    /// dragging in the full history. Unknown channels yield an empty
    /// slice.
    pub fn upcoming(&self, channel_id: &str, now: i64, lookback: i64) -> &[ProgramSlot] {
        match self.programs.get(channel_id) {
            Some(slots) => {
                let cutoff = now - lookback;
                let idx = slots.partition_point(|p| p.start <= cutoff);
                &slots[idx..]
            }
            None => &[],
        }
    }

    /// Full sorted program list for one channel.
    pub fn channel(&self, channel_id: &str) -> &[ProgramSlot] {
        self.programs
            .get(channel_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn channel_count(&self) -> usize {
        self.programs.len()
    }

    /// Total number of programs across all channels.
    pub fn program_count(&self) -> usize {
        self.programs.values().map(|v| v.len()).sum()
    }

    /// Records discarded during ingestion for bad timestamps or
    /// inverted intervals.
    pub fn dropped_count(&self) -> usize {
        self.dropped
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

fn begin_programme(e: &BytesStart, policy: OffsetPolicy) -> PendingSlot {
    PendingSlot {
        channel_id: get_attribute(e, b"channel").unwrap_or_default(),
        title: String::new(),
        start: get_attribute(e, b"start").and_then(|s| parse_xmltv_time(&s, policy)),
        stop: get_attribute(e, b"stop").and_then(|s| parse_xmltv_time(&s, policy)),
    }
}

/// Get attribute value from XML element
fn get_attribute(e: &BytesStart, name: &[u8]) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name {
            let raw = String::from_utf8_lossy(attr.value.as_ref()).to_string();
            return Some(decode_xml_entities(&raw));
        }
    }
    None
}

/// Parse a compact XMLTV timestamp into a Unix timestamp.
///
/// Input format: `YYYYMMDDHHMM` or `YYYYMMDDHHMMSS`, optionally followed
/// by a timezone offset such as `" +0100"`. Returns `None` when the
/// leading digits do not form a valid date-time. The offset suffix is
/// applied or disregarded according to `policy`.
pub fn parse_xmltv_time(raw: &str, policy: OffsetPolicy) -> Option<i64> {
    let raw = raw.trim();
    let digits_len = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let take = match digits_len.min(14) {
        14 => 14,
        12 | 13 => 12,
        _ => return None,
    };
    let (digits, suffix) = raw.split_at(take);

    let format = if take == 14 { "%Y%m%d%H%M%S" } else { "%Y%m%d%H%M" };
    let naive = NaiveDateTime::parse_from_str(digits, format).ok()?;
    let mut ts = naive.and_utc().timestamp();
    if policy == OffsetPolicy::Apply {
        ts -= parse_tz_offset(suffix);
    }
    Some(ts)
}

/// Parse a timezone offset like "+0100" or "-0530" to seconds.
fn parse_tz_offset(suffix: &str) -> i64 {
    let tz = suffix.trim();
    if tz.is_empty() {
        return 0;
    }

    let sign = if tz.starts_with('-') { -1 } else { 1 };
    let tz = tz.trim_start_matches(['+', '-']);

    let hours: i64 = tz
        .get(0..2)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let minutes: i64 = tz
        .get(2..4)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    sign * (hours * 3600 + minutes * 60)
}

/// Decode the XML entities that show up in provider feeds.
fn decode_xml_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let decoded = rest.find(';').filter(|end| *end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            c.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Shorthand: parse a digits-only timestamp as UTC.
    fn ts(s: &str) -> i64 {
        parse_xmltv_time(s, OffsetPolicy::Ignore).unwrap()
    }

    const TWO_CHANNEL_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tv>
  <programme channel="ch1" start="202401010800" stop="202401010830">
    <title>News</title>
  </programme>
  <programme channel="ch1" start="202401010830" stop="202401010900">
    <title>Weather</title>
  </programme>
  <programme channel="ch2" start="202401010800" stop="202401010830">
    <title>Morning Show</title>
  </programme>
  <programme channel="ch2" start="202401010830" stop="202401010900">
    <title>Cartoons</title>
  </programme>
</tv>"#;

    #[test]
    fn parse_time_forms() {
        assert_eq!(ts("202401010800"), ts("20240101080000"));
        assert_eq!(ts("20240101080000") + 30 * 60, ts("202401010830"));
        assert!(parse_xmltv_time("2024", OffsetPolicy::Apply).is_none());
        assert!(parse_xmltv_time("not a time", OffsetPolicy::Apply).is_none());
        assert!(parse_xmltv_time("20241399250000", OffsetPolicy::Apply).is_none());
    }

    #[test]
    fn offset_policy_apply_vs_ignore() {
        let utc = parse_xmltv_time("20240115120000 +0000", OffsetPolicy::Apply).unwrap();
        let cet = parse_xmltv_time("20240115120000 +0100", OffsetPolicy::Apply).unwrap();
        assert_eq!(utc - cet, 3600);

        // Ignore reads the digits verbatim regardless of the suffix
        let a = parse_xmltv_time("20240115120000 +0100", OffsetPolicy::Ignore).unwrap();
        let b = parse_xmltv_time("20240115120000 -0530", OffsetPolicy::Ignore).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, utc);

        // offset glued to the digits, no space
        let glued = parse_xmltv_time("20240115120000+0100", OffsetPolicy::Apply).unwrap();
        assert_eq!(glued, cet);
    }

    #[test]
    fn current_program_scenario() {
        let schedule = Schedule::ingest(TWO_CHANNEL_XML, OffsetPolicy::Ignore).unwrap();

        let at_0815 = schedule.current_program("ch1", ts("202401010815")).unwrap();
        assert_eq!(at_0815.title, "News");

        let at_0845 = schedule.current_program("ch1", ts("202401010845")).unwrap();
        assert_eq!(at_0845.title, "Weather");

        assert!(schedule.current_program("ch1", ts("202401010930")).is_none());

        let ch2 = schedule.current_program("ch2", ts("202401010845")).unwrap();
        assert_eq!(ch2.title, "Cartoons");
    }

    #[test]
    fn current_program_prefers_earlier_slot_on_shared_boundary() {
        // 08:30 is both the stop of News and the start of Weather; the
        // first slot in start order wins.
        let schedule = Schedule::ingest(TWO_CHANNEL_XML, OffsetPolicy::Ignore).unwrap();
        let at_boundary = schedule.current_program("ch1", ts("202401010830")).unwrap();
        assert_eq!(at_boundary.title, "News");
    }

    #[test]
    fn unknown_channel_is_empty_not_error() {
        let schedule = Schedule::ingest(TWO_CHANNEL_XML, OffsetPolicy::Ignore).unwrap();
        assert!(schedule.current_program("nope", ts("202401010815")).is_none());
        assert!(schedule.upcoming("nope", ts("202401010815"), 3600).is_empty());
        assert!(schedule.channel("nope").is_empty());
    }

    #[test]
    fn schedule_is_sorted_even_when_input_is_not() {
        let xml = r#"<tv>
  <programme channel="ch1" start="202401011000" stop="202401011100"><title>C</title></programme>
  <programme channel="ch1" start="202401010800" stop="202401010900"><title>A</title></programme>
  <programme channel="ch1" start="202401010900" stop="202401011000"><title>B</title></programme>
</tv>"#;
        let schedule = Schedule::ingest(xml, OffsetPolicy::Ignore).unwrap();
        let slots = schedule.channel("ch1");
        assert_eq!(slots.len(), 3);
        assert!(slots.windows(2).all(|w| w[0].start <= w[1].start));
        assert_eq!(slots[0].title, "A");
        assert_eq!(slots[2].title, "C");
    }

    #[test]
    fn upcoming_respects_lookback() {
        let schedule = Schedule::ingest(TWO_CHANNEL_XML, OffsetPolicy::Ignore).unwrap();

        // at 08:45 with a 30 minute lookback, the 08:00 slot is gone but
        // the 08:30 one is still listed
        let listing = schedule.upcoming("ch1", ts("202401010845"), 30 * 60);
        let titles: Vec<&str> = listing.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Weather"]);

        // a larger lookback keeps the finished slot
        let listing = schedule.upcoming("ch1", ts("202401010845"), 3600);
        let titles: Vec<&str> = listing.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["News", "Weather"]);
    }

    #[test]
    fn records_with_unparsable_timestamps_are_dropped() {
        let xml = r#"<tv>
  <programme channel="ch1" start="garbage" stop="202401010900"><title>Bad</title></programme>
  <programme channel="ch1" start="202401010900" stop="202401011000"><title>Good</title></programme>
  <programme channel="ch1" start="202401011000"><title>No Stop</title></programme>
</tv>"#;
        let schedule = Schedule::ingest(xml, OffsetPolicy::Ignore).unwrap();
        let slots = schedule.channel("ch1");
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].title, "Good");
        assert_eq!(schedule.dropped_count(), 2);
    }

    #[test]
    fn inverted_intervals_are_dropped() {
        let xml = r#"<tv>
  <programme channel="ch1" start="202401011000" stop="202401010900"><title>Backwards</title></programme>
  <programme channel="ch1" start="202401011000" stop="202401011000"><title>Instant</title></programme>
</tv>"#;
        let schedule = Schedule::ingest(xml, OffsetPolicy::Ignore).unwrap();
        let slots = schedule.channel("ch1");
        // zero-length slots are allowed, inverted ones are not
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].title, "Instant");
        assert_eq!(schedule.dropped_count(), 1);
        assert!(slots.iter().all(|p| p.start <= p.stop));
    }

    #[test]
    fn missing_title_is_empty_string() {
        let xml = r#"<tv>
  <programme channel="ch1" start="202401010800" stop="202401010900"/>
</tv>"#;
        let schedule = Schedule::ingest(xml, OffsetPolicy::Ignore).unwrap();
        let slots = schedule.channel("ch1");
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].title, "");
    }

    #[test]
    fn titles_decode_entities() {
        let xml = r#"<tv>
  <programme channel="ch1" start="202401010800" stop="202401010900">
    <title>News &amp; Weather &#8212; Morning</title>
  </programme>
</tv>"#;
        let schedule = Schedule::ingest(xml, OffsetPolicy::Ignore).unwrap();
        assert_eq!(schedule.channel("ch1")[0].title, "News & Weather \u{2014} Morning");
    }

    #[test]
    fn malformed_markup_is_parse_error() {
        assert!(matches!(
            Schedule::ingest("not markup at all", OffsetPolicy::Apply),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            Schedule::ingest(r#"{"error": "json body"}"#, OffsetPolicy::Apply),
            Err(Error::Parse(_))
        ));
        assert!(matches!(
            Schedule::ingest("<tv><programme channel=\"c\"></tv>", OffsetPolicy::Apply),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn program_count_spans_channels() {
        let schedule = Schedule::ingest(TWO_CHANNEL_XML, OffsetPolicy::Ignore).unwrap();
        assert_eq!(schedule.program_count(), 4);
        assert_eq!(schedule.channel_count(), 2);
        assert!(!schedule.is_empty());
    }
}
