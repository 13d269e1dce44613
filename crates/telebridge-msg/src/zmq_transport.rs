//! ---
//! tb_section: "02-messaging-ipc-data-model"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "ZeroMQ pub/sub transports."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
use std::time::Duration;

use tracing::{debug, info};

use crate::logging::{log_message, MessageDirection};
use crate::transport::{Publisher, Transport};
use crate::{MessagingError, RawMessage, Result};

fn classify(err: zmq::Error) -> MessagingError {
    match err {
        zmq::Error::ETERM | zmq::Error::ENOTSOCK => MessagingError::Disconnected(err.to_string()),
        other => MessagingError::Zmq(other),
    }
}

/// SUB socket connected to one or more publishers.
///
/// Every message must arrive as exactly two frames: `[topic, payload]`.
pub struct ZmqSubscriber {
    // Keep the context alive for as long as the socket.
    _context: zmq::Context,
    socket: zmq::Socket,
}

impl ZmqSubscriber {
    /// Connect to every endpoint and subscribe to each topic.
    pub fn connect<E, T>(endpoints: &[E], topics: &[T]) -> Result<Self>
    where
        E: AsRef<str>,
        T: AsRef<str>,
    {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::SUB)?;
        socket.set_linger(0)?;
        for endpoint in endpoints {
            socket.connect(endpoint.as_ref())?;
            info!(endpoint = endpoint.as_ref(), "subscriber connected");
        }
        for topic in topics {
            socket.set_subscribe(topic.as_ref().as_bytes())?;
            debug!(topic = topic.as_ref(), "subscribed");
        }
        Ok(Self {
            _context: context,
            socket,
        })
    }
}

impl Transport for ZmqSubscriber {
    fn recv(&mut self, timeout: Duration) -> Result<Option<RawMessage>> {
        let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        match self.socket.poll(zmq::POLLIN, timeout_ms) {
            Ok(0) => return Ok(None),
            Ok(_) => {}
            Err(zmq::Error::EINTR) => return Ok(None),
            Err(err) => return Err(classify(err)),
        }

        let mut frames = match self.socket.recv_multipart(0) {
            Ok(frames) => frames,
            Err(zmq::Error::EINTR) => return Ok(None),
            Err(err) => return Err(classify(err)),
        };
        if frames.len() != 2 {
            return Err(MessagingError::Framing(format!(
                "expected 2 frames, got {}",
                frames.len()
            )));
        }
        let payload = frames.pop().unwrap_or_default();
        let topic = frames.pop().unwrap_or_default();
        let topic = String::from_utf8(topic)
            .map_err(|_| MessagingError::Framing("topic frame is not valid UTF-8".into()))?;

        let message = RawMessage { topic, payload };
        log_message(MessageDirection::Inbound, &message);
        Ok(Some(message))
    }

    fn name(&self) -> &'static str {
        "zmq_sub"
    }
}

/// How long a closing publisher keeps flushing queued frames, in milliseconds.
pub const PUBLISHER_LINGER_MS: i32 = 1_000;

/// PUB socket bound to a local endpoint.
///
/// Dropping the publisher waits up to [`PUBLISHER_LINGER_MS`] for queued
/// messages to reach connected subscribers.
pub struct ZmqPublisher {
    _context: zmq::Context,
    socket: zmq::Socket,
}

impl ZmqPublisher {
    /// Bind a PUB socket to `endpoint` (e.g. `tcp://*:5557`).
    pub fn bind(endpoint: &str) -> Result<Self> {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::PUB)?;
        socket.set_linger(PUBLISHER_LINGER_MS)?;
        socket.bind(endpoint)?;
        info!(endpoint, "publisher bound");
        Ok(Self {
            _context: context,
            socket,
        })
    }
}

impl Publisher for ZmqPublisher {
    fn send(&mut self, message: &RawMessage) -> Result<()> {
        self.socket
            .send_multipart([message.topic.as_bytes(), message.payload.as_slice()], 0)
            .map_err(classify)
    }

    fn name(&self) -> &'static str {
        "zmq_pub"
    }
}
