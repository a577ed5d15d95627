#![warn(rust_2018_idioms)]
#![allow(dead_code)]

#[macro_use]
extern crate lazy_static;

pub mod buffer;
pub mod conn;
pub mod endpoint;
pub mod error;
pub mod ifaces;
pub mod marshal;
pub mod sync;
pub mod transaction_id;
pub mod vnet;

pub use crate::buffer::Buffer;
pub use crate::conn::Conn;
pub use crate::error::Error;
pub use crate::marshal::{Marshal, MarshalSize, Unmarshal};
pub use crate::transaction_id::{TransactionId, TransactionIdStore};
