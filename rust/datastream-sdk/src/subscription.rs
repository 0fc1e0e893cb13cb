use crate::datapoint::Datapoint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const DOWNLINK_SUFFIX: &str = "/downlink";

pub type SubscriptionCallback = Arc<dyn Fn(&PushUpdate) + Send + Sync>;

/// Push channel for a stream: the stream itself, or its downlink.
pub fn channel_name(stream: &str, downlink: bool) -> String {
    if downlink {
        format!("{}{}", stream, DOWNLINK_SUFFIX)
    } else {
        stream.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
pub enum ClientMessage {
    Subscribe { arg: String },
    Unsubscribe { arg: String },
    Insert { arg: String, d: Vec<Datapoint> },
}

/// Datapoints the server pushed on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushUpdate {
    pub stream: String,
    #[serde(default)]
    pub data: Vec<Datapoint>,
}

impl PushUpdate {
    pub fn is_downlink(&self) -> bool {
        self.stream.ends_with(DOWNLINK_SUFFIX)
    }
}

pub fn parse_update(bytes: &[u8]) -> Result<PushUpdate, serde_json::Error> {
    serde_json::from_slice(bytes)
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: HashMap<String, SubscriptionCallback>,
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("channels", &self.subscriptions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for `channel`, replacing any previous one.
    pub fn add(&mut self, channel: String, callback: SubscriptionCallback) {
        self.subscriptions.insert(channel, callback);
    }

    pub fn remove(&mut self, channel: &str) -> bool {
        self.subscriptions.remove(channel).is_some()
    }

    pub fn get(&self, channel: &str) -> Option<SubscriptionCallback> {
        self.subscriptions.get(channel).cloned()
    }

    pub fn channels(&self) -> Vec<String> {
        self.subscriptions.keys().cloned().collect()
    }
}
