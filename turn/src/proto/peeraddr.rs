use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use stun::attributes::ATTR_XOR_PEER_ADDRESS;
use stun::error::*;
use stun::message::*;
use stun::xoraddr::XorMappedAddress;

/// PeerAddress is a XOR-PEER-ADDRESS attribute, used by CreatePermission and
/// ChannelBind requests to identify the peer being permitted or bound.
///
/// RFC 8656 Section 14.3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAddress {
    pub ip: IpAddr,
    pub port: u16,
}

impl Default for PeerAddress {
    fn default() -> Self {
        PeerAddress {
            ip: IpAddr::V4(Ipv4Addr::from(0)),
            port: 0,
        }
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl Setter for PeerAddress {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let addr = XorMappedAddress {
            ip: self.ip,
            port: self.port,
        };
        addr.add_to_as(m, ATTR_XOR_PEER_ADDRESS)
    }
}

impl Getter for PeerAddress {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let mut addr = XorMappedAddress::default();
        addr.get_from_as(m, ATTR_XOR_PEER_ADDRESS)?;
        self.ip = addr.ip;
        self.port = addr.port;
        Ok(())
    }
}
