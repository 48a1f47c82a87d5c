//! The broadcast channel: a [`Publisher`] bound once at startup, with a
//! blocking bind-retry policy for when another process is still holding the
//! port.

use crate::{config::HubConfig, error::HubError, transport::Publisher};
use log::{info, warn};
use std::{thread, time::Duration};

/// How hard to try binding the broadcast endpoint at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindPolicy {
    /// Wait between failed attempts.
    pub delay: Duration,
    /// Give up after this many attempts; `None` never gives up.
    pub max_attempts: Option<u32>,
}

impl BindPolicy {
    /// The config's bind retry settings.
    pub fn from_config(config: &HubConfig) -> Self {
        Self {
            delay: config.bind_retry_delay(),
            max_attempts: config.bind_max_attempts,
        }
    }
}

/// The one-to-many side of the hub. Nothing sent here is acknowledged.
pub struct BroadcastChannel<P: Publisher> {
    publisher: P,
}

impl<P: Publisher> BroadcastChannel<P> {
    /// Binds `publisher`, blocking and retrying per `policy` until it works.
    pub fn open(mut publisher: P, policy: &BindPolicy) -> Result<Self, HubError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match publisher.bind() {
                Ok(()) => {
                    info!(
                        "broadcast channel bound to {} after {} attempt(s)",
                        publisher.endpoint(),
                        attempts
                    );
                    return Ok(Self { publisher });
                }
                Err(error) => {
                    if policy.max_attempts.is_some_and(|max| attempts >= max) {
                        return Err(HubError::BindExhausted {
                            endpoint: publisher.endpoint().to_owned(),
                            attempts,
                        });
                    }
                    warn!(
                        "could not bind {} ({}), retrying in {:?}",
                        publisher.endpoint(),
                        error,
                        policy.delay
                    );
                    thread::sleep(policy.delay);
                }
            }
        }
    }

    /// Publishes one message to whoever is subscribed right now.
    pub fn send(&mut self, message: &str) -> Result<(), HubError> {
        self.publisher.send(message)
    }

    /// Closes the socket and makes a single attempt to bind it again.
    pub fn rebind(&mut self) -> Result<(), HubError> {
        self.publisher.close();
        self.publisher.bind()
    }

    /// Releases the endpoint for good.
    pub fn close(&mut self) {
        self.publisher.close();
    }

    /// The endpoint the publisher binds.
    pub fn endpoint(&self) -> &str {
        self.publisher.endpoint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockPublisher;

    fn policy(max_attempts: Option<u32>) -> BindPolicy {
        BindPolicy {
            delay: Duration::ZERO,
            max_attempts,
        }
    }

    #[test]
    fn binds_first_time() {
        let publisher = MockPublisher::default();
        BroadcastChannel::open(publisher.clone(), &policy(None)).unwrap();
        assert_eq!(publisher.calls.lock().unwrap().binds, 1);
    }

    #[test]
    fn keeps_retrying_while_port_is_busy() {
        let publisher = MockPublisher::failing_binds(4);
        BroadcastChannel::open(publisher.clone(), &policy(None)).unwrap();
        assert_eq!(publisher.calls.lock().unwrap().binds, 5);
    }

    #[test]
    fn bounded_retry_gives_up() {
        let publisher = MockPublisher::failing_binds(10);
        let res = BroadcastChannel::open(publisher.clone(), &policy(Some(3)));
        assert!(matches!(
            res,
            Err(HubError::BindExhausted { attempts: 3, .. })
        ));
        assert_eq!(publisher.calls.lock().unwrap().binds, 3);
    }

    #[test]
    fn rebind_closes_first() {
        let publisher = MockPublisher::default();
        let mut channel = BroadcastChannel::open(publisher.clone(), &policy(None)).unwrap();
        channel.rebind().unwrap();

        let calls = publisher.calls.lock().unwrap();
        assert_eq!(calls.closes, 1);
        assert_eq!(calls.binds, 2);
    }

    #[test]
    fn sends_reach_the_publisher() {
        let publisher = MockPublisher::default();
        let mut channel = BroadcastChannel::open(publisher.clone(), &policy(None)).unwrap();
        channel.send("CursorSize: 0.5").unwrap();
        assert_eq!(publisher.sent(), vec!["CursorSize: 0.5"]);
    }
}
