//! Local network interface enumeration (ported from the `ifaces` crate), used by
//! the vnet simulation to seed its loopback/eth0 interface list.

mod ffi;

use std::io;
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Packet,
    Link,
    Ipv4,
    Ipv6,
    Unknow(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextHop {
    Broadcast(SocketAddr),
    Destination(SocketAddr),
}

#[derive(Debug, Clone)]
pub struct Interface {
    pub name: String,
    pub kind: Kind,
    pub addr: Option<SocketAddr>,
    pub mask: Option<SocketAddr>,
    pub hop: Option<NextHop>,
}

impl Interface {
    pub fn get_all() -> io::Result<Vec<Interface>> {
        ffi::ifaces()
    }
}
