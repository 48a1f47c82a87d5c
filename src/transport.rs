//! The two sockets the hub talks through, behind small traits so the
//! channels above them can be driven by mocks in tests.
//!
//! - A [`Publisher`] is the broadcast side: one-to-many, fire-and-forget. It
//!   never learns who (if anyone) is listening.
//! - An [`Ingest`] is the receive side: many-to-one, with every message
//!   tagged by the identity of the peer that sent it.

use crate::error::HubError;
use log::debug;
use std::time::Duration;

/// A one-to-many endpoint that can be closed and bound again.
pub trait Publisher {
    /// Binds the endpoint. Binding an already bound publisher rebinds it.
    fn bind(&mut self) -> Result<(), HubError>;

    /// Releases the endpoint. Sends fail until the next [`Publisher::bind`].
    fn close(&mut self);

    /// Hands `message` to the transport without waiting for any subscriber.
    fn send(&mut self, message: &str) -> Result<(), HubError>;

    /// Where this publisher binds, for diagnostics.
    fn endpoint(&self) -> &str;
}

/// A many-to-one endpoint whose messages carry their sender's identity.
pub trait Ingest: Send {
    /// Waits at most `timeout` for a message and returns all of its parts,
    /// or `None` if nothing arrived.
    fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Vec<Vec<u8>>>, HubError>;
}

/// A live socket together with the context that owns it. Fields drop in
/// order, so the socket is closed before the context is terminated, and
/// terminating the context waits until the port is actually released.
struct Bound {
    socket: zmq::Socket,
    _context: zmq::Context,
}

/// A ZeroMQ `PUB` socket with a context of its own, so that closing it
/// frees the port before a rebind is attempted.
pub struct ZmqPublisher {
    endpoint: String,
    bound: Option<Bound>,
}

impl ZmqPublisher {
    /// Creates an unbound publisher; call [`Publisher::bind`] before sending.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            bound: None,
        }
    }
}

impl Publisher for ZmqPublisher {
    fn bind(&mut self) -> Result<(), HubError> {
        self.close();
        let context = zmq::Context::new();
        let socket = context.socket(zmq::PUB)?;
        socket.set_linger(1)?;
        socket.bind(&self.endpoint)?;
        debug!("publisher bound to {}", self.endpoint);
        self.bound = Some(Bound {
            socket,
            _context: context,
        });
        Ok(())
    }

    fn close(&mut self) {
        if self.bound.take().is_some() {
            debug!("publisher on {} closed", self.endpoint);
        }
    }

    fn send(&mut self, message: &str) -> Result<(), HubError> {
        let bound = self.bound.as_ref().ok_or(HubError::NotBound)?;
        bound.socket.send(message, zmq::DONTWAIT)?;
        Ok(())
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// A ZeroMQ `ROUTER` socket. Binding happens exactly once, in
/// [`ZmqIngest::bind`]. Dropping it closes the socket and terminates its
/// private context, which returns only once the port is released.
pub struct ZmqIngest {
    bound: Bound,
    endpoint: String,
}

impl ZmqIngest {
    /// Binds the ingest endpoint. Failure is reported as
    /// [`HubError::IngestBind`] and is not retried.
    pub fn bind(endpoint: impl Into<String>) -> Result<Self, HubError> {
        let endpoint = endpoint.into();
        let context = zmq::Context::new();
        let bind = || -> Result<zmq::Socket, zmq::Error> {
            let socket = context.socket(zmq::ROUTER)?;
            socket.set_linger(0)?;
            socket.bind(&endpoint)?;
            Ok(socket)
        };

        match bind() {
            Ok(socket) => {
                debug!("ingest bound to {}", endpoint);
                Ok(Self {
                    bound: Bound {
                        socket,
                        _context: context,
                    },
                    endpoint,
                })
            }
            Err(source) => Err(HubError::IngestBind { endpoint, source }),
        }
    }

    /// The endpoint the socket is bound to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Ingest for ZmqIngest {
    fn recv_timeout(&mut self, timeout: Duration) -> Result<Option<Vec<Vec<u8>>>, HubError> {
        let socket = &self.bound.socket;
        let ready = socket.poll(zmq::POLLIN, timeout.as_millis() as i64)?;
        if ready == 0 {
            return Ok(None);
        }
        Ok(Some(socket.recv_multipart(0)?))
    }
}

impl Drop for ZmqIngest {
    fn drop(&mut self) {
        debug!("ingest on {} released", self.endpoint);
    }
}

/// Stand-ins for the real sockets, shared by the unit tests of every layer.
#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    /// What a [`MockPublisher`] has been asked to do.
    #[derive(Debug, Default)]
    pub struct Calls {
        pub binds: usize,
        pub closes: usize,
        pub sends: usize,
        pub sent: Vec<String>,
    }

    /// A publisher whose binds and sends fail on demand and which records
    /// every call. Clones share their record, so a test can keep one clone
    /// after handing the other to a channel.
    #[derive(Debug, Clone, Default)]
    pub struct MockPublisher {
        pub calls: Arc<Mutex<Calls>>,
        pub failing_binds: Arc<Mutex<usize>>,
        pub send_fails: Arc<Mutex<bool>>,
    }

    impl MockPublisher {
        pub fn failing_sends() -> Self {
            let publisher = Self::default();
            *publisher.send_fails.lock().unwrap() = true;
            publisher
        }

        pub fn failing_binds(count: usize) -> Self {
            let publisher = Self::default();
            *publisher.failing_binds.lock().unwrap() = count;
            publisher
        }

        pub fn sent(&self) -> Vec<String> {
            self.calls.lock().unwrap().sent.clone()
        }
    }

    impl Publisher for MockPublisher {
        fn bind(&mut self) -> Result<(), HubError> {
            self.calls.lock().unwrap().binds += 1;
            let mut failing = self.failing_binds.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(HubError::Zmq(zmq::Error::EADDRINUSE));
            }
            Ok(())
        }

        fn close(&mut self) {
            self.calls.lock().unwrap().closes += 1;
        }

        fn send(&mut self, message: &str) -> Result<(), HubError> {
            let mut calls = self.calls.lock().unwrap();
            calls.sends += 1;
            if *self.send_fails.lock().unwrap() {
                return Err(HubError::Zmq(zmq::Error::EAGAIN));
            }
            calls.sent.push(message.to_owned());
            Ok(())
        }

        fn endpoint(&self) -> &str {
            "mock://broadcast"
        }
    }

    /// An ingest that replays a fixed script and then idles.
    #[derive(Debug, Default)]
    pub struct ScriptedIngest {
        pub script: VecDeque<Vec<Vec<u8>>>,
    }

    impl ScriptedIngest {
        pub fn new(messages: Vec<Vec<&str>>) -> Self {
            Self {
                script: messages
                    .into_iter()
                    .map(|parts| parts.into_iter().map(|p| p.as_bytes().to_vec()).collect())
                    .collect(),
            }
        }
    }

    impl Ingest for ScriptedIngest {
        fn recv_timeout(
            &mut self,
            timeout: Duration,
        ) -> Result<Option<Vec<Vec<u8>>>, HubError> {
            match self.script.pop_front() {
                Some(parts) => Ok(Some(parts)),
                None => {
                    std::thread::sleep(timeout);
                    Ok(None)
                }
            }
        }
    }

    /// A loopback port nobody is bound to right now.
    pub fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }
}
