#![warn(rust_2018_idioms)]

pub mod cache;
pub mod client;
pub mod control_plane;
pub mod error;
pub mod fsm;
pub mod message;
pub mod signaling_client;

pub use error::Error;
pub use signaling_client::{SignalingClient, SignalingClientConfig};
