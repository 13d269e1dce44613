//! ---
//! tb_section: "02-messaging-ipc-data-model"
//! tb_subsection: "module"
//! tb_type: "source"
//! tb_scope: "code"
//! tb_description: "Envelope schema helpers and protocol codecs."
//! tb_version: "v0.0.0-prealpha"
//! tb_owner: "tbd"
//! ---
use std::collections::HashMap;

use telebridge_common::config::{ChannelConfig, ChannelKind};

use crate::codec;
use crate::types::Envelope;
use crate::EnvelopeError;

/// Handler family a topic dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    /// Pose plus optional camera frame.
    Sensor,
    /// Pose only.
    Pose,
    /// Raw text advisory.
    Advisory,
}

impl From<ChannelKind> for TopicKind {
    fn from(kind: ChannelKind) -> Self {
        match kind {
            ChannelKind::Sensor => TopicKind::Sensor,
            ChannelKind::Pose => TopicKind::Pose,
            ChannelKind::Advisory => TopicKind::Advisory,
        }
    }
}

/// Problems detected while building the dispatch table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteTableError {
    /// A route was declared with an empty topic label.
    #[error("topic labels must not be empty")]
    EmptyTopic,
    /// The same topic was registered twice.
    #[error("topic '{0}' is registered more than once")]
    DuplicateTopic(String),
}

/// Dispatch table keyed by topic label. Built once, never mutated.
///
/// Subscription filtering normally happens in the transport, but ZeroMQ
/// filters by prefix (`sensor_data` also admits `sensor_data_raw`), so
/// exact-match validation still happens here.
#[derive(Debug, Clone)]
pub struct TopicRouter {
    routes: HashMap<String, TopicKind>,
}

impl TopicRouter {
    /// Build a router from `(topic, kind)` pairs.
    pub fn new<I, S>(routes: I) -> Result<Self, RouteTableError>
    where
        I: IntoIterator<Item = (S, TopicKind)>,
        S: Into<String>,
    {
        let mut table = HashMap::new();
        for (topic, kind) in routes {
            let topic = topic.into();
            if topic.is_empty() {
                return Err(RouteTableError::EmptyTopic);
            }
            if table.contains_key(&topic) {
                return Err(RouteTableError::DuplicateTopic(topic));
            }
            table.insert(topic, kind);
        }
        Ok(Self { routes: table })
    }

    /// Build a router from configured subscription channels.
    pub fn from_channels(channels: &[ChannelConfig]) -> Result<Self, RouteTableError> {
        Self::new(
            channels
                .iter()
                .map(|channel| (channel.topic.clone(), TopicKind::from(channel.kind))),
        )
    }

    /// Registered topic labels, sorted for stable output.
    pub fn topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        topics.sort_unstable();
        topics
    }

    /// Handler kind for `topic`, if registered.
    pub fn kind_of(&self, topic: &str) -> Option<TopicKind> {
        self.routes.get(topic).copied()
    }

    /// Dispatch a raw payload to the decoder registered for `topic`.
    pub fn route(&self, topic: &str, payload: &[u8]) -> Result<Envelope, EnvelopeError> {
        let kind = self
            .kind_of(topic)
            .ok_or_else(|| EnvelopeError::UnexpectedTopic(topic.to_owned()))?;
        codec::decode(kind, payload)
    }
}
