//! The listener owns the ingest endpoint on a thread of its own. It polls
//! with a bounded wait, folds every message into the [`SharedState`], and
//! checks its stop flag each time a poll times out, so stopping takes at
//! most about one poll timeout.

use crate::{
    error::HubError,
    message::Inbound,
    reconciler::BuildCheck,
    state::SharedState,
    transport::{Ingest, ZmqIngest},
};
use log::{debug, info, trace, warn};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

/// Handle to the listener thread. Dropping it stops the thread.
pub struct Listener {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Listener {
    /// Binds the ingest endpoint and starts listening on it. A bind failure
    /// is returned straight away; it is not retried.
    pub fn start(
        endpoint: &str,
        state: SharedState,
        poll_timeout: Duration,
    ) -> Result<Self, HubError> {
        let ingest = ZmqIngest::bind(endpoint)?;
        info!("listening for clients on {}", endpoint);
        Self::spawn(ingest, state, poll_timeout)
    }

    /// Moves an already bound `ingest` onto a new listener thread. The
    /// thread is its only owner from here on and drops it on the way out.
    pub fn spawn<I: Ingest + 'static>(
        mut ingest: I,
        state: SharedState,
        poll_timeout: Duration,
    ) -> Result<Self, HubError> {
        let running = Arc::new(AtomicBool::new(true));
        let th_running = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("hub-listener".to_owned())
            .spawn(move || {
                while th_running.load(Ordering::SeqCst) {
                    match ingest.recv_timeout(poll_timeout) {
                        Ok(Some(parts)) => process(&state, parts),
                        Ok(None) => {}
                        Err(e) => {
                            warn!("ingest poll failed: {}", e);
                            thread::sleep(poll_timeout);
                        }
                    }
                }
                drop(ingest);
                info!("listener thread is exiting");
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Whether the thread is still alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Asks the thread to stop and waits for it, so the ingest endpoint is
    /// released by the time this returns.
    pub fn stop(&mut self) -> Result<(), HubError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| HubError::ListenerPanicked)?;
        }
        Ok(())
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("{}", e);
        }
    }
}

fn process(state: &SharedState, parts: Vec<Vec<u8>>) {
    match Inbound::from_parts(parts) {
        Ok((client, inbound)) => {
            trace!("{} sent {:?}", client, inbound);
            let check = state.lock().apply(client, inbound);
            if let Some(BuildCheck::Matched) = check {
                debug!("handshake matches the session build");
            }
        }
        Err(e) => warn!("skipping ingest message: {}", e),
    }
}
