use std::time::Duration;

use stun::attributes::ATTR_LIFETIME;
use stun::error::*;
use stun::message::*;

const LIFETIME_SIZE: usize = 4;

/// Lifetime represents the LIFETIME attribute, the allocation lifetime in
/// seconds.
///
/// RFC 8656 Section 14.2.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifetime(pub Duration);

impl Setter for Lifetime {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        let secs = self.0.as_secs() as u32;
        m.add(ATTR_LIFETIME, &secs.to_be_bytes());
        Ok(())
    }
}

impl Getter for Lifetime {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let v = m.get(ATTR_LIFETIME)?;
        if v.len() != LIFETIME_SIZE {
            return Err(Error::ErrAttributeSizeInvalid);
        }
        let secs = u32::from_be_bytes([v[0], v[1], v[2], v[3]]);
        self.0 = Duration::from_secs(secs as u64);
        Ok(())
    }
}
