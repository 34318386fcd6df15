//! Streamview - IPTV catalog, EPG and playback core
//! Logs into an Xtream Codes provider, ingests the catalog and broadcast
//! schedule, and plays a selected entry through an external media engine.

mod api;
mod catalog;
mod config;
mod epg;
mod error;
mod models;
mod player;
mod session;

use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use api::ProviderClient;
use catalog::CatalogStore;
use config::AppConfig;
use epg::{format_datetime, format_time, OffsetPolicy, Schedule};
use error::Error;
use models::{CatalogEntry, StreamContext, StreamKind};
use player::{ExternalPlayer, MediaEngine, NullEngine};
use session::SessionController;

/// How far back the upcoming listing reaches.
const UPCOMING_LOOKBACK_SECS: i64 = 3600;
const UPCOMING_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Live,
    Movie,
    Series,
}

impl From<KindArg> for StreamKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Live => StreamKind::Live,
            KindArg::Movie => StreamKind::Movie,
            KindArg::Series => StreamKind::Series,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "streamview", version, about = "IPTV catalog, EPG and playback core")]
struct Args {
    /// Provider server URL, e.g. http://tv.example.com
    #[arg(long)]
    server: Option<String>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    password: Option<String>,
    /// Category group to list ("All" spans every category)
    #[arg(long, default_value = catalog::ALL_GROUP)]
    group: String,
    /// Case-insensitive name filter
    #[arg(long, default_value = "")]
    search: String,
    /// Which catalog list to show and play from
    #[arg(long, value_enum, default_value_t = KindArg::Live)]
    kind: KindArg,
    /// Entry id to play
    #[arg(long)]
    play: Option<i64>,
    /// Resolve the stream address without launching a player
    #[arg(long)]
    dry_run: bool,
    /// Separate EPG source URL (defaults to the provider's xmltv.php)
    #[arg(long)]
    epg_url: Option<String>,
    /// Read EPG timestamps verbatim, discarding their timezone offsets
    #[arg(long)]
    ignore_epg_offset: bool,
    /// Write the effective settings back to the config file
    #[arg(long)]
    save_config: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = AppConfig::load();
    apply_args(&mut config, &args);

    if config.server.is_empty() || config.username.is_empty() || config.password.is_empty() {
        error!("server, username and password are required (flags or config file)");
        return ExitCode::FAILURE;
    }

    if args.save_config {
        config.save();
        info!("config saved");
    }

    match run(&args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn apply_args(config: &mut AppConfig, args: &Args) {
    if let Some(server) = &args.server {
        config.server = server.trim_end_matches('/').to_string();
    }
    if let Some(username) = &args.username {
        config.username = username.clone();
    }
    if let Some(password) = &args.password {
        config.password = password.clone();
    }
    if let Some(epg_url) = &args.epg_url {
        config.epg_url = epg_url.clone();
    }
    if args.ignore_epg_offset {
        config.apply_epg_offset = false;
    }
}

fn run(args: &Args, config: &AppConfig) -> Result<(), Error> {
    let client = ProviderClient::new(&config.server, &config.username, &config.password)
        .with_user_agent(&config.user_agent);

    // Catalog ingestion. Network and auth failures abort the run and
    // leave the catalog unpopulated.
    let payload = client.fetch_catalog()?;
    catalog::verify_account(&payload)?;
    let store = CatalogStore::ingest(&payload);

    // EPG ingestion is independent; any failure leaves the schedule
    // empty and the rest of the run intact.
    let schedule = load_schedule(&client, config);

    let now = Utc::now().timestamp();
    let kind = StreamKind::from(args.kind);
    print_listing(&store, &schedule, kind, &args.group, &args.search, now);

    if let Some(id) = args.play {
        let entry = store
            .find(kind, id)
            .ok_or_else(|| Error::Playback(format!("no {} entry with id {}", kind, id)))?;
        let ctx = StreamContext {
            server_url: config.server.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        };

        if args.dry_run {
            play(SessionController::new(NullEngine), entry, &ctx, &schedule, now)?;
        } else {
            let engine = ExternalPlayer::new(&config.external_player, &config.user_agent);
            play(SessionController::new(engine), entry, &ctx, &schedule, now)?;
        }
    }

    Ok(())
}

fn load_schedule(client: &ProviderClient, config: &AppConfig) -> Schedule {
    let text = if config.epg_url.is_empty() {
        client.fetch_epg()
    } else {
        client.fetch_epg_from(&config.epg_url)
    };
    let policy = if config.apply_epg_offset {
        OffsetPolicy::Apply
    } else {
        OffsetPolicy::Ignore
    };

    match text.and_then(|t| Schedule::ingest(&t, policy)) {
        Ok(schedule) => {
            info!(
                "EPG loaded: {} programs on {} channels",
                schedule.program_count(),
                schedule.channel_count()
            );
            schedule
        }
        Err(e) => {
            warn!("no EPG available: {}", e);
            Schedule::default()
        }
    }
}

fn print_listing(
    store: &CatalogStore,
    schedule: &Schedule,
    kind: StreamKind,
    group: &str,
    search: &str,
    now: i64,
) {
    let entries = catalog::filter(store.entries(kind), group, search);
    println!(
        "{} {} entries (group: {}, search: {:?})",
        entries.len(),
        kind,
        group,
        search
    );
    for entry in &entries {
        let on_now = entry
            .epg_channel_id
            .as_deref()
            .and_then(|id| schedule.current_program(id, now));
        match on_now {
            Some(slot) => println!(
                "  {:>8}  {}  [{}-{}  {}]",
                entry.id,
                entry.name,
                format_time(slot.start),
                format_time(slot.stop),
                slot.title
            ),
            None => println!("  {:>8}  {}", entry.id, entry.name),
        }
    }
}

fn play<E: MediaEngine>(
    mut controller: SessionController<E>,
    entry: &CatalogEntry,
    ctx: &StreamContext,
    schedule: &Schedule,
    now: i64,
) -> Result<(), Error> {
    let session = controller.select_entry(entry, ctx)?;

    println!("Now playing: {}", entry.name);
    if let Some(address) = &session.stream_address {
        println!("Stream URL: {}", address);
    }
    if let Some(channel_id) = entry.epg_channel_id.as_deref() {
        println!("EPG ID: {}", channel_id);
        if let Some(slot) = schedule.current_program(channel_id, now) {
            println!(
                "On now: {} ({}-{})",
                slot.title,
                format_time(slot.start),
                format_time(slot.stop)
            );
        }
        let listing = schedule.upcoming(channel_id, now, UPCOMING_LOOKBACK_SECS);
        for slot in listing.iter().take(UPCOMING_LIMIT) {
            println!("  {}  {}", format_datetime(slot.start), slot.title);
        }
    }

    Ok(())
}
