//! Xtream Codes provider client
//!
//! Fetches the catalog payload (`player_api.php`) and the XMLTV schedule
//! (`xmltv.php`). Gzip-compressed EPG bodies are decompressed
//! transparently.

use std::io::Read;
use std::time::Duration;

use flate2::read::GzDecoder;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Error;

/// Account block of the provider payload. Anything other than
/// `status == "Active"` is treated as a failed login.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub status: String,
}

/// One live or movie stream as the provider sends it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderStream {
    #[serde(default)]
    pub stream_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub stream_icon: Option<String>,
    #[serde(default)]
    pub epg_channel_id: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
}

/// One series as the provider sends it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSeries {
    #[serde(default)]
    pub series_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cover: Option<String>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
}

/// Full catalog payload. Every list defaults to empty so a payload with
/// missing sections still deserializes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderPayload {
    #[serde(default)]
    pub user_info: Option<UserInfo>,
    #[serde(default)]
    pub live_streams: Vec<ProviderStream>,
    #[serde(default)]
    pub movie_streams: Vec<ProviderStream>,
    #[serde(default)]
    pub series: Vec<ProviderSeries>,
}

/// Lenient payload parse: a body that is not the expected shape yields
/// the all-default payload (empty lists, no account block) instead of an
/// error.
pub fn parse_payload(raw: &str) -> ProviderPayload {
    match serde_json::from_str(raw) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("catalog payload not in expected shape: {}", e);
            ProviderPayload::default()
        }
    }
}

pub struct ProviderClient {
    server: String,
    username: String,
    password: String,
    user_agent: String,
    agent: ureq::Agent,
}

impl ProviderClient {
    pub fn new(server: &str, username: &str, password: &str) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(120)))
            .timeout_connect(Some(Duration::from_secs(30)))
            .build()
            .new_agent();

        Self {
            server: server.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            agent,
        }
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    fn action_url(&self, action: &str) -> String {
        format!(
            "{}/{}.php?username={}&password={}",
            self.server, action, self.username, self.password
        )
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, Error> {
        let response = self
            .agent
            .get(url)
            .header("User-Agent", &self.user_agent)
            .call()
            .map_err(|e| Error::Network(format!("request failed: {}", e)))?;

        let status = response.status();
        if status != 200 {
            return Err(Error::Network(format!("HTTP error: {}", status)));
        }

        let mut body = Vec::new();
        response
            .into_body()
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| Error::Network(format!("read failed: {}", e)))?;
        Ok(body)
    }

    /// Fetch and leniently parse the full catalog payload.
    pub fn fetch_catalog(&self) -> Result<ProviderPayload, Error> {
        let url = self.action_url("player_api");
        debug!("fetching catalog from {}", self.server);
        let body = self.get_bytes(&url)?;
        Ok(parse_payload(&String::from_utf8_lossy(&body)))
    }

    /// Fetch the raw XMLTV schedule text from the provider's own
    /// `xmltv.php` endpoint.
    pub fn fetch_epg(&self) -> Result<String, Error> {
        self.fetch_epg_from(&self.action_url("xmltv"))
    }

    /// Fetch raw XMLTV schedule text from an arbitrary URL. Bodies
    /// starting with the gzip magic bytes are decompressed before being
    /// returned.
    pub fn fetch_epg_from(&self, url: &str) -> Result<String, Error> {
        debug!("fetching EPG from {}", url);
        let body = self.get_bytes(url)?;

        if body.starts_with(&[0x1f, 0x8b]) {
            let mut text = String::new();
            GzDecoder::new(&body[..])
                .read_to_string(&mut text)
                .map_err(|e| Error::Network(format!("gzip decode failed: {}", e)))?;
            Ok(text)
        } else {
            Ok(String::from_utf8_lossy(&body).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_payload_full_shape() {
        let raw = r#"{
            "user_info": { "username": "john", "status": "Active" },
            "live_streams": [
                { "stream_id": 814363, "name": "PL - TVP 1 FHD",
                  "stream_icon": "http://logo.example/tvp1.png",
                  "epg_channel_id": "TVP1.pl", "category_id": "1336" }
            ],
            "movie_streams": [ { "stream_id": 5, "name": "Some Movie" } ],
            "series": [ { "series_id": 9, "name": "Some Show" } ]
        }"#;

        let payload = parse_payload(raw);
        assert_eq!(payload.user_info.unwrap().status, "Active");
        assert_eq!(payload.live_streams.len(), 1);
        assert_eq!(payload.live_streams[0].stream_id, 814363);
        assert_eq!(
            payload.live_streams[0].epg_channel_id.as_deref(),
            Some("TVP1.pl")
        );
        assert_eq!(payload.movie_streams.len(), 1);
        assert_eq!(payload.series.len(), 1);
    }

    #[test]
    fn parse_payload_missing_lists_default_empty() {
        let payload = parse_payload(r#"{ "user_info": { "status": "Active" } }"#);
        assert!(payload.live_streams.is_empty());
        assert!(payload.movie_streams.is_empty());
        assert!(payload.series.is_empty());
    }

    #[test]
    fn parse_payload_malformed_yields_default() {
        let payload = parse_payload("this is not json");
        assert!(payload.user_info.is_none());
        assert!(payload.live_streams.is_empty());

        let payload = parse_payload(r#"{ "live_streams": "not a list" }"#);
        assert!(payload.live_streams.is_empty());
    }
}
