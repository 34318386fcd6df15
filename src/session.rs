//! Playback session controller
//!
//! Owns the single active playback attempt. A selection is resolved to a
//! stream address and attached to the media engine; any previously
//! attached source is fully released first, so at most one source is
//! ever attached.

use tracing::info;

use crate::error::Error;
use crate::models::{CatalogEntry, StreamContext};
use crate::player::MediaEngine;

/// Session lifecycle. `Error` is reachable from `Resolving` or
/// `Playing`; `Error` and `Playing` both re-enter `Resolving` on a new
/// selection. There is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Resolving,
    Playing,
    Error,
}

/// Read view of the active playback attempt. Created once per run and
/// mutated in place by selection and reset events, never destroyed.
#[derive(Debug, Clone, Default)]
pub struct PlaybackSession {
    pub state: SessionState,
    pub active_entry: Option<CatalogEntry>,
    pub stream_address: Option<String>,
    pub last_error: Option<String>,
}

/// Build the stream address for a catalog entry:
/// `{server}/{live|movie|series}/{username}/{password}/{id}.m3u8`.
pub fn stream_address(ctx: &StreamContext, entry: &CatalogEntry) -> String {
    format!(
        "{}/{}/{}/{}/{}.m3u8",
        ctx.server_url.trim_end_matches('/'),
        entry.kind.segment(),
        ctx.username,
        ctx.password,
        entry.id
    )
}

pub struct SessionController<E: MediaEngine> {
    engine: E,
    session: PlaybackSession,
    attached: bool,
}

impl<E: MediaEngine> SessionController<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            session: PlaybackSession::default(),
            attached: false,
        }
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Resolve `entry` to a stream address and attach it to the engine.
    ///
    /// Release-before-attach: an existing attachment is fully released
    /// before the new source is created, and a new selection supersedes
    /// whatever the prior one was doing. On engine acceptance the
    /// session transitions to `Playing` and the now-playing pair
    /// (address, entry) is available through [`Self::session`]; on
    /// rejection it transitions to `Error` with the engine's message.
    pub fn select_entry(
        &mut self,
        entry: &CatalogEntry,
        ctx: &StreamContext,
    ) -> Result<&PlaybackSession, Error> {
        if self.attached {
            self.engine.detach();
            self.attached = false;
        }

        self.session.state = SessionState::Resolving;
        self.session.active_entry = Some(entry.clone());
        self.session.last_error = None;
        let address = stream_address(ctx, entry);
        self.session.stream_address = Some(address.clone());

        match self.engine.attach(&entry.name, &address) {
            Ok(()) => {
                self.attached = true;
                self.session.state = SessionState::Playing;
                info!("now playing: {} ({})", entry.name, address);
                Ok(&self.session)
            }
            Err(message) => {
                self.session.state = SessionState::Error;
                self.session.last_error = Some(message.clone());
                Err(Error::Playback(message))
            }
        }
    }

    /// Release any attached source and return to `Idle`. Valid from any
    /// state.
    pub fn reset(&mut self) {
        if self.attached {
            self.engine.detach();
            self.attached = false;
        }
        self.session = PlaybackSession::default();
    }
}
