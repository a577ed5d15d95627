//! The signaling client's connection state machine:
//!
//! ```text
//! new -> get-credentials -> describe -> (if 404) create -> get-endpoint -> get-ice-config -> ready
//! ready -> connect -> connected
//! connected -> disconnected (on WS close) -> connect
//! connected -> get-ice-config (on server "reconnect-ice" or TTL expiry) -> connected
//! any -> delete -> deleted
//! ```
//!
//! Non-auth errors retry with exponential backoff up to `DEFAULT_RETRY_COUNT`.

use std::fmt;

pub const DEFAULT_RETRY_COUNT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    New,
    GetCredentials,
    Describe,
    Create,
    GetEndpoint,
    GetIceConfig,
    Ready,
    Connect,
    Connected,
    Disconnected,
    Deleted,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::GetCredentials => "get-credentials",
            Self::Describe => "describe",
            Self::Create => "create",
            Self::GetEndpoint => "get-endpoint",
            Self::GetIceConfig => "get-ice-config",
            Self::Ready => "ready",
            Self::Connect => "connect",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Deleted => "deleted",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    CredentialsObtained,
    DescribeSucceeded,
    DescribeNotFound,
    ChannelCreated,
    EndpointObtained,
    IceConfigObtained,
    ConnectRequested,
    WsHandshakeComplete,
    WsClosed,
    ServerReconnectIce,
    IceConfigTtlExpired,
    DeleteRequested,
    ChannelDeleted,
}

/// Drives one transition. Returns `None` for an event that isn't valid from
/// the current state (the caller should treat that as a bug, not retry it —
/// retry policy lives one layer up, around the I/O call that produces these
/// events).
pub fn transition(state: State, event: Event) -> Option<State> {
    use Event::*;
    use State::*;

    if event == DeleteRequested {
        return Some(Deleted);
    }
    if event == ChannelDeleted && state == Deleted {
        return Some(Deleted);
    }

    match (state, event) {
        (New, CredentialsObtained) => Some(GetCredentials),
        (GetCredentials, DescribeSucceeded) => Some(Describe),
        (GetCredentials, DescribeNotFound) => Some(Create),
        (Describe, EndpointObtained) => Some(GetEndpoint),
        (Create, ChannelCreated) => Some(GetEndpoint),
        (GetEndpoint, IceConfigObtained) => Some(GetIceConfig),
        (GetIceConfig, IceConfigObtained) => Some(Ready),
        (Ready, ConnectRequested) => Some(Connect),
        (Connect, WsHandshakeComplete) => Some(Connected),
        (Connected, WsClosed) => Some(Disconnected),
        (Disconnected, ConnectRequested) => Some(Connect),
        (Connected, ServerReconnectIce) => Some(GetIceConfig),
        (Connected, IceConfigTtlExpired) => Some(GetIceConfig),
        (GetIceConfig, WsHandshakeComplete) => Some(Connected),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_happy_path_to_connected() {
        let mut state = State::New;
        for event in [
            Event::CredentialsObtained,
            Event::DescribeSucceeded,
            Event::EndpointObtained,
            Event::IceConfigObtained,
            Event::ConnectRequested,
            Event::WsHandshakeComplete,
        ] {
            state = transition(state, event).unwrap();
        }
        assert_eq!(state, State::Connected);
    }

    #[test]
    fn test_describe_404_routes_through_create() {
        let state = transition(State::GetCredentials, Event::DescribeNotFound).unwrap();
        assert_eq!(state, State::Create);
        let state = transition(state, Event::ChannelCreated).unwrap();
        assert_eq!(state, State::GetEndpoint);
    }

    #[test]
    fn test_disconnect_then_reconnect() {
        let state = transition(State::Connected, Event::WsClosed).unwrap();
        assert_eq!(state, State::Disconnected);
        let state = transition(state, Event::ConnectRequested).unwrap();
        assert_eq!(state, State::Connect);
    }

    #[test]
    fn test_reconnect_ice_from_connected_returns_to_connected() {
        let state = transition(State::Connected, Event::ServerReconnectIce).unwrap();
        assert_eq!(state, State::GetIceConfig);
        let state = transition(state, Event::WsHandshakeComplete).unwrap();
        assert_eq!(state, State::Connected);
    }

    #[test]
    fn test_delete_reachable_from_any_state() {
        assert_eq!(
            transition(State::Connected, Event::DeleteRequested),
            Some(State::Deleted)
        );
        assert_eq!(
            transition(State::New, Event::DeleteRequested),
            Some(State::Deleted)
        );
    }

    #[test]
    fn test_invalid_transition_returns_none() {
        assert_eq!(transition(State::New, Event::WsClosed), None);
    }
}
