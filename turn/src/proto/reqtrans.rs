use stun::attributes::ATTR_REQUESTED_TRANSPORT;
use stun::error::*;
use stun::message::*;

use super::Protocol;

const REQUESTED_TRANSPORT_SIZE: usize = 4;

/// RequestedTransport represents the REQUESTED-TRANSPORT attribute, sent in
/// an Allocate request to tell the server which transport protocol the
/// relayed transport address should use.
///
/// RFC 8656 Section 14.7.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedTransport {
    pub protocol: Protocol,
}

impl Setter for RequestedTransport {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let mut v = vec![0; REQUESTED_TRANSPORT_SIZE];
        v[0] = self.protocol.0;
        // v[1..4] are reserved and must be zero.
        m.add(ATTR_REQUESTED_TRANSPORT, &v);
        Ok(())
    }
}

impl Getter for RequestedTransport {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let v = m.get(ATTR_REQUESTED_TRANSPORT)?;
        if v.len() != REQUESTED_TRANSPORT_SIZE {
            return Err(Error::ErrAttributeSizeInvalid);
        }
        self.protocol = Protocol(v[0]);
        Ok(())
    }
}
