use crate::error::Error;
use std::{fmt, str::FromStr};

/// Size of every CSS key in bytes.
pub const KEY_SIZE: usize = 5;

/// A 40-bit CSS key (player, bus, disc or title key).
///
/// Keys are displayed and parsed in the `xx:xx:xx:xx:xx` notation used by
/// the on-disk key cache. Plain 10 character hex strings are accepted too.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(pub [u8; KEY_SIZE]);

impl Key {
    /// The all-zero key, used for titles which are not scrambled.
    pub const ZERO: Self = Self([0; KEY_SIZE]);

    pub const fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; KEY_SIZE]
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Unmask a value transferred over the drive bus.
    pub(crate) fn unmask(&mut self, bus_key: &Key) {
        for (i, byte) in self.0.iter_mut().enumerate() {
            *byte ^= bus_key.0[4 - (i % KEY_SIZE)];
        }
    }
}

impl From<[u8; KEY_SIZE]> for Key {
    fn from(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [k0, k1, k2, k3, k4] = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", k0, k1, k2, k3, k4)
    }
}

impl FromStr for Key {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact = s.trim().replace(':', "");
        let bytes = hex::decode(&compact)
            .map_err(|e| Error::InvalidArgument(format!("invalid key '{}': {}", s, e)))?;

        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|x: Vec<u8>| {
            Error::InvalidArgument(format!(
                "invalid key '{}': expected {} bytes, got {} bytes",
                s,
                KEY_SIZE,
                x.len()
            ))
        })?;

        Ok(Self(bytes))
    }
}
