//! ---
//! tb_section: "02-messaging-ipc-data-model"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Envelope schema helpers and protocol codecs."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::{MessagingError, RawMessage, Result};

/// Subscriber side of a pub/sub transport.
pub trait Transport: Send {
    /// Block for up to `timeout` waiting for the next message.
    ///
    /// `Ok(None)` means nothing arrived in time. Errors for which
    /// [`MessagingError::is_recoverable`] is false mean the connection is gone.
    fn recv(&mut self, timeout: Duration) -> Result<Option<RawMessage>>;
    /// Human-readable transport name for logging/metrics.
    fn name(&self) -> &'static str;
}

/// Publisher side of a pub/sub transport.
pub trait Publisher: Send {
    /// Publish a message under its topic.
    fn send(&mut self, message: &RawMessage) -> Result<()>;
    /// Human-readable transport name for logging/metrics.
    fn name(&self) -> &'static str;
}

#[derive(Default)]
struct Channel {
    queue: VecDeque<RawMessage>,
    closed: bool,
}

#[derive(Default)]
struct Shared {
    channel: Mutex<Channel>,
    ready: Condvar,
}

/// In-process transport backed by a condvar-guarded queue.
///
/// Clones share the same queue, so one clone can publish while another is
/// owned by a subscriber. Once [`close`](Self::close) is called, the
/// subscriber drains what is queued and then observes a disconnect.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    shared: Arc<Shared>,
}

impl InMemoryTransport {
    /// Create a new in-memory transport channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a message without going through the [`Publisher`] trait.
    pub fn push(&self, topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Result<()> {
        self.enqueue(RawMessage::new(topic, payload))
    }

    /// Mark the channel closed and wake any waiting subscriber.
    pub fn close(&self) {
        self.shared.channel.lock().closed = true;
        self.shared.ready.notify_all();
    }

    /// Number of messages waiting to be received.
    pub fn pending(&self) -> usize {
        self.shared.channel.lock().queue.len()
    }

    fn enqueue(&self, message: RawMessage) -> Result<()> {
        let mut channel = self.shared.channel.lock();
        if channel.closed {
            return Err(MessagingError::Disconnected(
                "in-memory transport closed".into(),
            ));
        }
        channel.queue.push_back(message);
        drop(channel);
        self.shared.ready.notify_one();
        Ok(())
    }
}

impl Transport for InMemoryTransport {
    fn recv(&mut self, timeout: Duration) -> Result<Option<RawMessage>> {
        let mut channel = self.shared.channel.lock();
        self.shared.ready.wait_while_for(
            &mut channel,
            |channel| channel.queue.is_empty() && !channel.closed,
            timeout,
        );
        match channel.queue.pop_front() {
            Some(message) => Ok(Some(message)),
            None if channel.closed => Err(MessagingError::Disconnected(
                "in-memory transport closed".into(),
            )),
            None => Ok(None),
        }
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

impl Publisher for InMemoryTransport {
    fn send(&mut self, message: &RawMessage) -> Result<()> {
        self.enqueue(message.clone())
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn in_memory_transport_send_and_recv() {
        let mut publisher = InMemoryTransport::new();
        let mut subscriber = publisher.clone();

        publisher
            .send(&RawMessage::new("tts", "hello"))
            .expect("send succeeds");
        let received = subscriber
            .recv(Duration::from_millis(10))
            .expect("recv succeeds")
            .expect("message available");
        assert_eq!(received.topic, "tts");
        assert_eq!(received.payload, b"hello");
    }

    #[test]
    fn recv_times_out_when_idle() {
        let mut subscriber = InMemoryTransport::new();
        let started = Instant::now();
        let received = subscriber.recv(Duration::from_millis(20)).unwrap();
        assert!(received.is_none());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn close_drains_then_disconnects() {
        let transport = InMemoryTransport::new();
        transport.push("tts", "last words").unwrap();
        transport.close();

        let mut subscriber = transport.clone();
        assert!(subscriber.recv(Duration::from_millis(5)).unwrap().is_some());
        let err = subscriber.recv(Duration::from_millis(5)).unwrap_err();
        assert!(!err.is_recoverable());
        assert!(transport.push("tts", "too late").is_err());
    }

    #[test]
    fn recv_wakes_on_publish_from_another_thread() {
        let transport = InMemoryTransport::new();
        let publisher = transport.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            publisher.push("sensor_data", "{}").unwrap();
        });

        let mut subscriber = transport;
        let received = subscriber.recv(Duration::from_secs(5)).unwrap();
        assert!(received.is_some());
        handle.join().unwrap();
    }
}
