//! Data channel registry: tracks SCTP-stream-backed data channels by their
//! stream id and exposes lifecycle state derived from the SCTP association.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataChannelState {
    #[serde(rename = "unspecified")]
    #[default]
    Unspecified = 0,
    #[serde(rename = "connecting")]
    Connecting,
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "closing")]
    Closing,
    #[serde(rename = "closed")]
    Closed,
}

impl From<u8> for DataChannelState {
    fn from(v: u8) -> Self {
        match v {
            1 => DataChannelState::Connecting,
            2 => DataChannelState::Open,
            3 => DataChannelState::Closing,
            4 => DataChannelState::Closed,
            _ => DataChannelState::Unspecified,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DataChannelParameters {
    pub label: String,
    pub ordered: bool,
    pub max_packet_life_time: Option<u16>,
    pub max_retransmits: Option<u16>,
    pub protocol: String,
    pub negotiated: Option<u16>,
}

pub struct DataChannel {
    pub stream_id: u16,
    pub params: DataChannelParameters,
    pub state: DataChannelState,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl DataChannel {
    pub fn new(stream_id: u16, params: DataChannelParameters) -> Self {
        Self {
            stream_id,
            params,
            state: DataChannelState::Connecting,
            messages_sent: 0,
            messages_received: 0,
            bytes_sent: 0,
            bytes_received: 0,
        }
    }
}

/// Keeps every data channel open on a peer connection, keyed by its SCTP
/// stream id, so inbound SCTP data and DCEP control messages can be routed.
#[derive(Default)]
pub struct DataChannelRegistry {
    channels: HashMap<u16, DataChannel>,
}

impl DataChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, channel: DataChannel) {
        self.channels.insert(channel.stream_id, channel);
    }

    pub fn get(&self, stream_id: u16) -> Option<&DataChannel> {
        self.channels.get(&stream_id)
    }

    pub fn get_mut(&mut self, stream_id: u16) -> Option<&mut DataChannel> {
        self.channels.get_mut(&stream_id)
    }

    pub fn remove(&mut self, stream_id: u16) -> Option<DataChannel> {
        self.channels.remove(&stream_id)
    }

    pub fn set_state(&mut self, stream_id: u16, state: DataChannelState) {
        if let Some(channel) = self.channels.get_mut(&stream_id) {
            channel.state = state;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataChannel> {
        self.channels.values()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_insert_and_lookup_by_stream_id() {
        let mut registry = DataChannelRegistry::new();
        registry.insert(DataChannel::new(
            1,
            DataChannelParameters {
                label: "chat".to_owned(),
                ordered: true,
                ..Default::default()
            },
        ));

        assert_eq!(registry.get(1).unwrap().params.label, "chat");
        assert!(registry.get(2).is_none());
    }

    #[test]
    fn test_set_state_transitions_existing_channel() {
        let mut registry = DataChannelRegistry::new();
        registry.insert(DataChannel::new(1, DataChannelParameters::default()));
        registry.set_state(1, DataChannelState::Open);

        assert_eq!(registry.get(1).unwrap().state, DataChannelState::Open);
    }

    #[test]
    fn test_remove_drops_channel() {
        let mut registry = DataChannelRegistry::new();
        registry.insert(DataChannel::new(1, DataChannelParameters::default()));
        assert!(registry.remove(1).is_some());
        assert!(registry.is_empty());
    }
}
