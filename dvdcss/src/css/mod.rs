//! The CSS cipher: keys, keystream generation and key mangling.
//!
//! Everything in this module is a pure function of its inputs and shares
//! nothing but the read-only substitution tables.

mod cipher;
mod key;
mod tables;

pub(crate) use cipher::{Lfsr17, lfsr25_expand, lfsr25_feedback};
pub(crate) use tables::{TAB1, TAB4, TAB5};

pub use cipher::{
    Keystream, SCRAMBLED_OFFSET, SCRAMBLING_CONTROL_OFFSET, SEED_OFFSET, decrypt_key,
    decrypt_title_key, descramble_sector, encrypt_key, is_scrambled, scramble, seed, unscramble,
};
pub use key::{KEY_SIZE, Key};
pub use tables::PLAYER_KEYS;
