use stun::attributes::ATTR_DATA;
use stun::error::*;
use stun::message::*;

/// Data represents the DATA attribute, carrying the application payload of a
/// Send/Data indication.
///
/// RFC 8656 Section 14.4.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Data(pub Vec<u8>);

impl Setter for Data {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        m.add(ATTR_DATA, &self.0);
        Ok(())
    }
}

impl Getter for Data {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        self.0 = m.get(ATTR_DATA)?;
        Ok(())
    }
}
