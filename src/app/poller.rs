//! Remote command channel poller.
//!
//! ```text
//!   link up? ─no─▶ Skipped
//!      │yes
//!   cadence due? ─no─▶ Skipped
//!      │yes
//!   last = offsets.last(nvs)
//!   poll_one(last) ──err──▶ Failed(e)
//!      │ None ──▶ Empty
//!      │ Some(msg)
//!   offsets.save(msg.sequence)   ◀── before anything executes
//!      │
//!   Received { command: parse(text) }
//! ```
//!
//! Persisting the sequence first gives at-most-once delivery: a command
//! that crashes or hangs the device is skipped after the reboot instead of
//! being replayed forever.

use log::{debug, info, warn};

use crate::app::ports::{MessagingError, Network, StoragePort};
use crate::config::FirmwareConfig;
use crate::scheduler::Cadence;
use crate::storage::CommandOffsetStore;

use super::commands::Command;

/// What one poll attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Not due yet, or the link is down.
    Skipped,
    /// Nothing pending.
    Empty,
    /// The request failed; offset untouched.
    Failed(MessagingError),
    /// An update was consumed and its sequence persisted.
    /// `command` is `None` for updates without text.
    Received {
        sequence: u64,
        command: Option<Command>,
        sender: Option<String>,
    },
    /// An update arrived but its sequence could not be persisted, so it
    /// is not dispatched.
    NotPersisted { sequence: u64 },
}

/// Rate-limited, at-most-once command fetcher.
pub struct CommandPoller {
    cadence: Cadence,
    offsets: CommandOffsetStore,
}

impl CommandPoller {
    pub fn new(config: &FirmwareConfig) -> Self {
        Self {
            cadence: Cadence::new(config.poll_interval_ms),
            offsets: CommandOffsetStore::new(),
        }
    }

    /// Take at most one pending command from the channel.
    pub fn poll(
        &mut self,
        now_ms: u64,
        net: &mut impl Network,
        nvs: &mut impl StoragePort,
    ) -> PollOutcome {
        if !net.is_connected() || !self.cadence.fire(now_ms) {
            return PollOutcome::Skipped;
        }

        let last = self.offsets.last(nvs);
        let msg = match net.poll_one(last) {
            Ok(Some(msg)) => msg,
            Ok(None) => return PollOutcome::Empty,
            Err(e) => {
                debug!("CommandPoller: poll after {} failed: {}", last, e);
                return PollOutcome::Failed(e);
            }
        };

        if msg.sequence <= last {
            warn!(
                "CommandPoller: stale update {} (offset {}), skipping",
                msg.sequence, last
            );
            return PollOutcome::Empty;
        }

        if !self.offsets.save(nvs, msg.sequence) {
            return PollOutcome::NotPersisted {
                sequence: msg.sequence,
            };
        }

        let command = msg.text.as_deref().and_then(Command::parse);
        match &command {
            Some(c) => info!("CommandPoller: #{} → {}", msg.sequence, c.name()),
            None => info!("CommandPoller: #{} carried no command", msg.sequence),
        }

        PollOutcome::Received {
            sequence: msg.sequence,
            command,
            sender: msg.sender,
        }
    }
}
