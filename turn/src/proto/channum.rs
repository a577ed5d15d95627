use stun::attributes::ATTR_CHANNEL_NUMBER;
use stun::error::*;
use stun::message::*;

const CHANNEL_NUMBER_SIZE: usize = 4;

/// ChannelNumber represents CHANNEL-NUMBER attribute.
///
/// RFC 8656 Section 14.1.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelNumber(pub u16);

impl Setter for ChannelNumber {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let mut v = vec![0; CHANNEL_NUMBER_SIZE];
        v[0..2].copy_from_slice(&self.0.to_be_bytes());
        // last 2 bytes are RFFU (reserved for future use) and are zero.
        m.add(ATTR_CHANNEL_NUMBER, &v);
        Ok(())
    }
}

impl Getter for ChannelNumber {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let v = m.get(ATTR_CHANNEL_NUMBER)?;
        if v.len() != CHANNEL_NUMBER_SIZE {
            return Err(Error::ErrAttributeSizeInvalid);
        }
        self.0 = u16::from_be_bytes([v[0], v[1]]);
        Ok(())
    }
}
