//! The command dispatcher turns every [`Command`] into one message on the
//! broadcast channel, retrying when the transport refuses it.
//!
//! The retries sleep on the caller's thread. When that is the thread driving
//! the panel, the panel stalls for up to `retries * delay`.

use crate::{
    broadcast::BroadcastChannel, config::HubConfig, error::HubError, message::Command,
    transport::Publisher,
};
use log::{debug, error, info, warn};
use std::{thread, time::Duration};

/// How many times to try a command, and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per command; 0 is treated as 1.
    pub retries: u32,
    /// Wait between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// The config's send retry settings.
    pub fn from_config(config: &HubConfig) -> Self {
        Self {
            retries: config.send_retries,
            delay: config.send_retry_delay(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            delay: Duration::from_secs(1),
        }
    }
}

/// Sends commands on the broadcast channel with retry and rebind.
pub struct CommandDispatcher<P: Publisher> {
    channel: BroadcastChannel<P>,
    policy: RetryPolicy,
}

impl<P: Publisher> CommandDispatcher<P> {
    /// Wraps an open channel.
    pub fn new(channel: BroadcastChannel<P>, policy: RetryPolicy) -> Self {
        Self { channel, policy }
    }

    /// Sends one command through [`CommandDispatcher::send_with_retry`].
    pub fn dispatch(&mut self, command: &Command) -> bool {
        self.send_with_retry(&command.to_string())
    }

    /// Tries `message` up to `retries` times (at least once), sleeping
    /// `delay` between tries. If every try fails the channel is closed and
    /// rebound once so later commands have a chance, and this message is
    /// reported as lost.
    pub fn send_with_retry(&mut self, message: &str) -> bool {
        let attempts = self.policy.retries.max(1);
        for attempt in 1..=attempts {
            match self.channel.send(message) {
                Ok(()) => {
                    debug!("sent {:?}", message);
                    return true;
                }
                Err(e) => {
                    warn!(
                        "sending {:?} failed (attempt {}/{}): {}",
                        message, attempt, attempts, e
                    );
                    if attempt < attempts {
                        thread::sleep(self.policy.delay);
                    }
                }
            }
        }

        error!(
            "giving up on {:?}, rebinding {}",
            message,
            self.channel.endpoint()
        );
        match self.channel.rebind() {
            Ok(()) => info!("rebound {}", self.channel.endpoint()),
            Err(e) => error!("rebinding {} failed: {}", self.channel.endpoint(), e),
        }
        false
    }

    /// Closes the broadcast endpoint.
    pub fn close(&mut self) {
        self.channel.close();
    }

    /// A single send with no retry and no rebind, for traffic where losing
    /// one message is fine.
    pub fn send_best_effort(&mut self, message: &str) -> Result<(), HubError> {
        self.channel.send(message)
    }
}
