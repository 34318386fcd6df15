//! Media engine seam
//!
//! The session controller drives playback through the [`MediaEngine`]
//! trait. The shipped implementation hands the stream address to an
//! external player process (mpv, vlc, or anything that accepts a URL
//! argument); tests substitute their own recording engines.

use std::process::{Child, Command, Stdio};

use tracing::{info, warn};

/// The adaptive-streaming playback component. `attach` hands over a
/// stream address; `detach` must fully release the source. An engine
/// holds at most one attached source at a time.
pub trait MediaEngine {
    fn attach(&mut self, name: &str, address: &str) -> Result<(), String>;
    fn detach(&mut self);
}

/// Plays streams by spawning an external player binary. `detach` kills
/// the child, so there is never more than one player process alive.
pub struct ExternalPlayer {
    command: String,
    user_agent: String,
    child: Option<Child>,
}

impl ExternalPlayer {
    pub fn new(command: &str, user_agent: &str) -> Self {
        Self {
            command: command.to_string(),
            user_agent: user_agent.to_string(),
            child: None,
        }
    }

    fn build_command(&self, name: &str, address: &str) -> Command {
        let mut cmd = Command::new(&self.command);
        let player_lower = self.command.to_lowercase();

        if player_lower.contains("mpv") {
            cmd.arg(address);
            cmd.arg(format!("--force-media-title={}", name));
            cmd.arg(format!("--user-agent={}", self.user_agent));
            cmd.arg("--stream-lavf-o=reconnect=1");
        } else if player_lower.contains("vlc") {
            cmd.arg(address);
            cmd.arg(format!("--meta-title={}", name));
            cmd.arg(format!("--http-user-agent={}", self.user_agent));
            cmd.arg("--http-reconnect");
        } else {
            // Generic player - just pass URL
            cmd.arg(address);
        }

        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
        cmd
    }
}

impl MediaEngine for ExternalPlayer {
    fn attach(&mut self, name: &str, address: &str) -> Result<(), String> {
        let child = self
            .build_command(name, address)
            .spawn()
            .map_err(|e| format!("failed to launch player '{}': {}", self.command, e))?;
        info!("player launched (PID: {})", child.id());
        self.child = Some(child);
        Ok(())
    }

    fn detach(&mut self) {
        if let Some(mut child) = self.child.take() {
            info!("stopping player (PID: {})", child.id());
            if let Err(e) = child.kill() {
                warn!("failed to kill player: {}", e);
            }
            let _ = child.wait();
        }
    }
}

/// Engine that accepts every source and does nothing. Used for dry runs
/// where only the session bookkeeping matters.
#[derive(Debug, Default)]
pub struct NullEngine;

impl MediaEngine for NullEngine {
    fn attach(&mut self, name: &str, address: &str) -> Result<(), String> {
        info!("dry run: would attach {} ({})", name, address);
        Ok(())
    }

    fn detach(&mut self) {}
}
