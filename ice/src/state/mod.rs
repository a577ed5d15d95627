#[cfg(test)]
mod state_test;

use std::fmt;

/// State of an ICE agent, per the check-connection/nominating/ready pipeline:
/// `new -> check-connection -> connected -> nominating -> ready`, with
/// `disconnected` reachable from `ready` on keep-alive timeout and `failed`
/// reachable from any state on exhaustion.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Unspecified,

    /// Agent created, `start()` not yet called.
    New,

    /// `start()` called; gathering and connectivity checks are running.
    CheckConnection,

    /// At least one candidate pair has succeeded; nomination has not begun.
    Connected,

    /// The controlling role has begun nominating a pair with USE-CANDIDATE.
    Nominating,

    /// A nominated pair is confirmed and data is flowing on it.
    Ready,

    /// No bytes received on the selected pair for 2x the keep-alive interval.
    Disconnected,

    /// Gathering yielded no usable pairs, or the check phase timed out.
    Failed,

    /// Agent has finished and is no longer handling requests.
    Closed,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Unspecified
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Self::Unspecified => "Unspecified",
            Self::New => "New",
            Self::CheckConnection => "CheckConnection",
            Self::Connected => "Connected",
            Self::Nominating => "Nominating",
            Self::Ready => "Ready",
            Self::Failed => "Failed",
            Self::Disconnected => "Disconnected",
            Self::Closed => "Closed",
        };
        write!(f, "{s}")
    }
}

impl From<u8> for ConnectionState {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::New,
            2 => Self::CheckConnection,
            3 => Self::Connected,
            4 => Self::Nominating,
            5 => Self::Ready,
            6 => Self::Disconnected,
            7 => Self::Failed,
            8 => Self::Closed,
            _ => Self::Unspecified,
        }
    }
}

impl ConnectionState {
    /// True while the agent is usable for application data, mirroring the
    /// peer connection's "ICE agent is connected" check in SPEC_FULL.md 4.7.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected | Self::Nominating | Self::Ready)
    }
}

/// Describes the state of the candidate gathering process.
#[derive(PartialEq, Eq, Copy, Clone)]
pub enum GatheringState {
    Unspecified,

    /// Indicates candidate gathering is not yet started.
    New,

    /// Indicates candidate gathering is ongoing.
    Gathering,

    /// Indicates candidate gathering has been completed.
    Complete,
}

impl From<u8> for GatheringState {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::New,
            2 => Self::Gathering,
            3 => Self::Complete,
            _ => Self::Unspecified,
        }
    }
}

impl Default for GatheringState {
    fn default() -> Self {
        Self::Unspecified
    }
}

impl fmt::Display for GatheringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            Self::New => "new",
            Self::Gathering => "gathering",
            Self::Complete => "complete",
            Self::Unspecified => "unspecified",
        };
        write!(f, "{s}")
    }
}
