//! Drive authentication and disc key acquisition.
//!
//! With a [`Drive`] the disc key block is read over an authenticated bus and
//! decrypted with the built-in player keys. Without one (or when that fails)
//! the disc key hash is brute forced, and as a last resort title keys are
//! guessed from the scrambled sectors themselves.

use crate::{
    BLOCK_SIZE, Error, Result,
    config::{Config, CrackingMode, Verbosity},
    crack::crack_disc_key,
    css::{KEY_SIZE, Key, PLAYER_KEYS, decrypt_key, decrypt_title_key},
};
use std::fmt;

/// Number of 5-byte slots in the disc key block, slot 0 holds the hash.
pub const DISC_KEY_SLOTS: usize = 409;

/// Authentication requests of a DVD drive, usually implemented on top of the
/// operating system's ioctl interface.
pub trait Drive: Send {
    /// Allocate an authentication grant id.
    fn report_agid(&mut self) -> Result<u32>;

    /// Run the challenge/response exchange and return the bus key.
    fn negotiate_bus_key(&mut self, agid: u32) -> Result<Key>;

    /// Read the disc key block, masked with the bus key.
    fn read_disc_key(&mut self, agid: u32, block: &mut [u8; BLOCK_SIZE]) -> Result<()>;

    /// Read the encrypted title key of the title at `block`, masked with the
    /// bus key.
    fn read_title_key(&mut self, agid: u32, block: u32) -> Result<Key>;

    /// Authentication success flag.
    fn report_asf(&mut self) -> Result<bool>;

    fn invalidate_agid(&mut self, agid: u32) -> Result<()>;

    /// Whether the disc is CSS protected.
    fn read_copyright(&mut self) -> Result<bool>;
}

/// Key acquisition progress of a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    DiscKeyKnown,
    Cracking,
    TitleKeyGuessing,
    TitleKeyKnown,
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unauthenticated => "unauthenticated",
            Self::DiscKeyKnown => "disc key known",
            Self::Cracking => "cracking",
            Self::TitleKeyGuessing => "title key guessing",
            Self::TitleKeyKnown => "title key known",
        })
    }
}

/// Unmask a disc key block received over the bus.
pub fn unmask_disc_key_block(block: &mut [u8; BLOCK_SIZE], bus_key: &Key) {
    for (i, byte) in block.iter_mut().enumerate() {
        *byte ^= bus_key.0[4 - (i % KEY_SIZE)];
    }
}

/// The disc key encrypted with itself, stored in the first slot.
pub fn disc_key_hash(block: &[u8; BLOCK_SIZE]) -> Key {
    let mut hash = [0; KEY_SIZE];
    hash.copy_from_slice(&block[..KEY_SIZE]);
    Key(hash)
}

/// Decrypt the disc key from an unmasked disc key block with the built-in
/// player keys.
pub fn decrypt_disc_key(block: &[u8; BLOCK_SIZE]) -> Option<Key> {
    let hash = disc_key_hash(block);

    for player_key in &PLAYER_KEYS {
        for slot in block[..DISC_KEY_SLOTS * KEY_SIZE]
            .chunks_exact(KEY_SIZE)
            .skip(1)
        {
            let mut crypted = [0; KEY_SIZE];
            crypted.copy_from_slice(slot);

            let disc_key = decrypt_key(0, player_key, &Key(crypted));

            if decrypt_key(0, &disc_key, &hash) == disc_key {
                return Some(disc_key);
            }
        }
    }

    None
}

/// Run `f` under a fresh grant id and bus key, releasing the grant when
/// `f` fails.
fn with_bus_key<T>(
    drive: &mut dyn Drive,
    f: impl FnOnce(&mut dyn Drive, u32, &Key) -> Result<T>,
) -> Result<T> {
    let agid = drive.report_agid()?;
    let result = drive
        .negotiate_bus_key(agid)
        .and_then(|bus_key| f(drive, agid, &bus_key));

    if result.is_err() {
        let _ = drive.invalidate_agid(agid);
    }

    result
}

/// Read and unmask the disc key block.
pub fn read_disc_key_block(drive: &mut dyn Drive) -> Result<Box<[u8; BLOCK_SIZE]>> {
    with_bus_key(drive, |drive, agid, bus_key| {
        let mut block = Box::new([0; BLOCK_SIZE]);
        drive.read_disc_key(agid, &mut block)?;
        unmask_disc_key_block(&mut block, bus_key);
        Ok(block)
    })
}

/// Read the title key at `block` from the drive and decrypt it with the
/// disc key. A zero key marks an unscrambled title.
///
/// A cleared authentication success flag means either a title without a key
/// or a region mismatch, the key is still unmasked. Only a failure to read
/// the flag is fatal.
pub fn read_title_key(
    drive: &mut dyn Drive,
    disc_key: &Key,
    block: u32,
    verbosity: Verbosity,
) -> Result<Key> {
    with_bus_key(drive, |drive, agid, bus_key| {
        let mut key = drive.read_title_key(agid, block)?;

        match drive.report_asf() {
            Ok(true) => (),
            Ok(false) => {
                print_debug!(verbosity, "lost ASF requesting title key");
            }
            Err(e) => {
                return Err(Error::AuthenticationUnavailable(format!(
                    "cannot read the authentication success flag: {}",
                    e
                )));
            }
        }

        key.unmask(bus_key);

        if key.is_zero() {
            return Ok(Key::ZERO);
        }

        Ok(decrypt_title_key(disc_key, &key))
    })
}

/// Acquire the disc key following the fallback order of the cracking mode.
///
/// Only a cancellation requested through the configuration is returned as
/// an error, every other failure moves on to title key guessing.
pub(crate) fn acquire_disc_key(
    drive: Option<&mut dyn Drive>,
    config: &Config,
) -> Result<(AuthState, Option<Key>)> {
    if config.method == CrackingMode::Title {
        return Ok((AuthState::TitleKeyGuessing, None));
    }

    let Some(drive) = drive else {
        print_debug!(
            config.verbosity,
            "drive authentication unavailable, title keys will be guessed"
        );
        return Ok((AuthState::TitleKeyGuessing, None));
    };

    let block = match read_disc_key_block(drive) {
        Ok(x) => x,
        Err(e) => {
            print_debug!(config.verbosity, "cannot read disc key block: {}", e);
            return Ok((AuthState::TitleKeyGuessing, None));
        }
    };

    if config.method == CrackingMode::Key {
        if let Some(disc_key) = decrypt_disc_key(&block) {
            print_debug!(config.verbosity, "disc key {} found with player keys", disc_key);
            return Ok((AuthState::DiscKeyKnown, Some(disc_key)));
        }

        print_debug!(config.verbosity, "no player key decrypts the disc key");
    }

    print_debug!(config.verbosity, "cracking disc key, state {}", AuthState::Cracking);

    match crack_disc_key(&disc_key_hash(&block), &config.cancel, config.crack_timeout) {
        Ok(Some(disc_key)) => {
            print_debug!(config.verbosity, "disc key {} cracked", disc_key);
            Ok((AuthState::DiscKeyKnown, Some(disc_key)))
        }
        Ok(None) => {
            print_debug!(config.verbosity, "disc key hash could not be reversed");
            Ok((AuthState::TitleKeyGuessing, None))
        }
        Err(e @ Error::Cancelled(_)) if config.cancel.is_cancelled() => Err(e),
        Err(e) => {
            print_debug!(config.verbosity, "disc key cracking failed: {}", e);
            Ok((AuthState::TitleKeyGuessing, None))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::encrypt_key;

    fn disc_key_block(disc_key: &Key, player: usize, slot: usize) -> Box<[u8; BLOCK_SIZE]> {
        let mut block = Box::new([0xa5; BLOCK_SIZE]);
        block[..KEY_SIZE].copy_from_slice(&encrypt_key(0, disc_key, disc_key).0);
        block[slot * KEY_SIZE..(slot + 1) * KEY_SIZE]
            .copy_from_slice(&encrypt_key(0, &PLAYER_KEYS[player], disc_key).0);
        block
    }

    #[test]
    fn player_keys_decrypt_disc_key() {
        let disc_key = Key([0x01, 0x23, 0x45, 0x67, 0x89]);
        let block = disc_key_block(&disc_key, 7, 200);
        assert_eq!(decrypt_disc_key(&block), Some(disc_key));
    }

    #[test]
    fn unknown_player_key() {
        let block = Box::new([0xa5; BLOCK_SIZE]);
        assert_eq!(decrypt_disc_key(&block), None);
    }

    #[test]
    fn bus_mask_round_trip() {
        let disc_key = Key([0x01, 0x23, 0x45, 0x67, 0x89]);
        let bus_key = Key([0x10, 0x32, 0x54, 0x76, 0x98]);
        let mut block = disc_key_block(&disc_key, 0, 1);

        unmask_disc_key_block(&mut block, &bus_key);
        assert_eq!(decrypt_disc_key(&block), None);
        unmask_disc_key_block(&mut block, &bus_key);
        assert_eq!(decrypt_disc_key(&block), Some(disc_key));
    }
}
