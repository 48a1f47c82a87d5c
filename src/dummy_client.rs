//! A stand-in for a headset, for bringing the hub up without hardware. It
//! connects to the ingest port with a fixed identity, introduces itself with
//! a build handshake, then reports a random gaze position on every period
//! until it is stopped.

use crate::error::HubError;
use log::{debug, warn};
use rand::prelude::*;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

enum Signal {
    Build(u64),
    Stop,
}

/// A running simulated headset. Dropping it stops the thread.
pub struct DummyClient {
    handle: Option<thread::JoinHandle<()>>,
    tx: mpsc::Sender<Signal>,
    identity: String,
}

/// Settings for a [`DummyClient`], see [`DummyClient::builder`].
pub struct DummyClientBuilder {
    endpoint: String,
    identity: String,
    build: u64,
    period: Duration,
}

impl DummyClientBuilder {
    /// The identity the hub will see. Defaults to `dummy`.
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// The build number sent in the handshake. Defaults to 1.
    pub fn build_number(mut self, build: u64) -> Self {
        self.build = build;
        self
    }

    /// How often to report gaze. Defaults to 100ms.
    pub fn period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Connects and starts reporting.
    pub fn spawn(self) -> Result<DummyClient, HubError> {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::DEALER)?;
        socket.set_identity(self.identity.as_bytes())?;
        socket.set_linger(0)?;
        socket.connect(&self.endpoint)?;

        let (tx, rx) = mpsc::channel::<Signal>();
        let identity = self.identity.clone();
        let (build, period) = (self.build, self.period);

        let handle = thread::spawn(move || {
            let mut rng = thread_rng();
            let mut running = send(&socket, &format!("BUILD: {}", build));

            while running {
                match rx.try_recv() {
                    Ok(Signal::Build(new_build)) => {
                        running = send(&socket, &format!("BUILD: {}", new_build));
                    }
                    Ok(Signal::Stop) | Err(mpsc::TryRecvError::Disconnected) => break,
                    Err(mpsc::TryRecvError::Empty) => {}
                }

                let gaze = format!(
                    "{:.3},{:.3},{:.3}",
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(0.2..2.0)
                );
                running = running && send(&socket, &gaze);
                thread::sleep(period);
            }
            drop(socket);
            drop(context);
            debug!("dummy client {} stopped", identity);
        });

        Ok(DummyClient {
            handle: Some(handle),
            tx,
            identity: self.identity,
        })
    }
}

fn send(socket: &zmq::Socket, msg: &str) -> bool {
    match socket.send(msg, 0) {
        Ok(()) => true,
        Err(e) => {
            warn!("dummy client could not send {:?}: {}", msg, e);
            false
        }
    }
}

impl DummyClient {
    /// Starts configuring a client that will connect to `endpoint`.
    pub fn builder(endpoint: impl Into<String>) -> DummyClientBuilder {
        DummyClientBuilder {
            endpoint: endpoint.into(),
            identity: "dummy".to_owned(),
            build: 1,
            period: Duration::from_millis(100),
        }
    }

    /// The identity the hub sees for this client.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Sends another handshake, as if the client had been redeployed.
    pub fn send_build(&self, build: u64) {
        // The thread is only gone if it already stopped, nothing to tell it
        let _ = self.tx.send(Signal::Build(build));
    }

    /// Stops reporting and waits for the thread to finish.
    pub fn stop(&mut self) {
        let _ = self.tx.send(Signal::Stop);
        if let Some(thread) = self.handle.take() {
            if thread.join().is_err() {
                warn!("dummy client {} panicked", self.identity);
            }
        }
    }
}

impl Drop for DummyClient {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{listener::Listener, state::SharedState, transport::mock::free_port};
    use std::time::Instant;

    fn eventually(f: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(2) {
            if f() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn reports_to_a_listener() {
        let endpoint = format!("tcp://127.0.0.1:{}", free_port());
        let state = SharedState::new();
        let mut listener =
            Listener::start(&endpoint, state.clone(), Duration::from_millis(20)).unwrap();

        let mut client = DummyClient::builder(endpoint)
            .identity("hmd-1")
            .build_number(9)
            .period(Duration::from_millis(10))
            .spawn()
            .unwrap();
        assert_eq!(client.identity(), "hmd-1");

        assert!(eventually(|| state.lock().gaze(&"hmd-1".into()).is_some()));
        assert_eq!(state.lock().build(), Some(9));
        let gaze = state.lock().gaze(&"hmd-1".into()).unwrap().to_owned();
        assert_eq!(gaze.split(',').count(), 3);

        client.send_build(10);
        assert!(eventually(|| state.lock().mismatches() == 1));

        client.stop();
        listener.stop().unwrap();
    }
}
