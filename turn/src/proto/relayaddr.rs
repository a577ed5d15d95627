use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use stun::attributes::ATTR_XOR_RELAYED_ADDRESS;
use stun::error::*;
use stun::message::*;
use stun::xoraddr::XorMappedAddress;

/// RelayedAddress is a XOR-RELAYED-ADDRESS attribute, returned by the TURN
/// server in an Allocate success response to report the relayed transport
/// address.
///
/// RFC 8656 Section 14.5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayedAddress {
    pub ip: IpAddr,
    pub port: u16,
}

impl Default for RelayedAddress {
    fn default() -> Self {
        RelayedAddress {
            ip: IpAddr::V4(Ipv4Addr::from(0)),
            port: 0,
        }
    }
}

impl fmt::Display for RelayedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl Setter for RelayedAddress {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let addr = XorMappedAddress {
            ip: self.ip,
            port: self.port,
        };
        addr.add_to_as(m, ATTR_XOR_RELAYED_ADDRESS)
    }
}

impl Getter for RelayedAddress {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let mut addr = XorMappedAddress::default();
        addr.get_from_as(m, ATTR_XOR_RELAYED_ADDRESS)?;
        self.ip = addr.ip;
        self.port = addr.port;
        Ok(())
    }
}
