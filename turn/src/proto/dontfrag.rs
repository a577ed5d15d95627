use stun::attributes::ATTR_DONT_FRAGMENT;
use stun::error::*;
use stun::message::*;

/// DontFragment represents the DONT-FRAGMENT attribute, a zero-length flag
/// requesting the server set the don't-fragment bit on the relayed UDP
/// datagram.
///
/// RFC 8656 Section 14.8.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DontFragment;

impl Setter for DontFragment {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        m.add(ATTR_DONT_FRAGMENT, &[]);
        Ok(())
    }
}

impl Getter for DontFragment {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        m.get(ATTR_DONT_FRAGMENT)?;
        Ok(())
    }
}
