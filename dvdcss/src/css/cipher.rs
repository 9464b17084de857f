use super::{
    key::{KEY_SIZE, Key},
    tables::{TAB1, TAB1_INV, TAB2, TAB3, TAB4, TAB5},
};
use crate::BLOCK_SIZE;

/// Offset of the five seed bytes mixed into the title key of a sector.
pub const SEED_OFFSET: usize = 0x54;

/// Offset of the first scrambled byte, everything before it stays clear.
pub const SCRAMBLED_OFFSET: usize = 0x80;

/// Offset of the PES header byte holding the scrambling control bits.
pub const SCRAMBLING_CONTROL_OFFSET: usize = 0x14;

/// The 17-bit LFSR, stepped one byte at a time.
#[derive(Clone, Copy)]
pub(crate) struct Lfsr17 {
    lo: u32,
    hi: u32,
}

impl Lfsr17 {
    /// The ninth bit is forced so the register is never zero.
    pub(crate) fn new(b0: u8, b1: u8) -> Self {
        Self {
            lo: u32::from(b0) | 0x100,
            hi: u32::from(b1),
        }
    }

    pub(crate) fn next_byte(&mut self) -> u8 {
        let out = TAB2[self.hi as usize] ^ TAB3[self.lo as usize];
        self.hi = self.lo >> 1;
        self.lo = ((self.lo & 1) << 8) ^ u32::from(out);
        out
    }
}

/// Expand 24 key bits into the initial state of the 25-bit LFSR.
pub(crate) fn lfsr25_expand(bits: u32) -> u32 {
    (bits << 1) + 8 - (bits & 7)
}

/// Next output byte of the 25-bit LFSR held in `state`.
pub(crate) fn lfsr25_feedback(state: u32) -> u8 {
    ((((((((state >> 3) ^ state) >> 1) ^ state) >> 8) ^ state) >> 5) & 0xff) as u8
}

/// The CSS keystream used to scramble sector payloads.
///
/// Two LFSRs are seeded from `key ^ seed`, their outputs are combined by an
/// addition with carry. The iterator never ends.
#[derive(Clone)]
pub struct Keystream {
    lfsr17: Lfsr17,
    lfsr25: u32,
    carry: u32,
}

impl Keystream {
    pub fn new(key: &Key, seed: &[u8; KEY_SIZE]) -> Self {
        let k = key.0;
        let bits = (u32::from(k[2] ^ seed[2]))
            | (u32::from(k[3] ^ seed[3]) << 8)
            | (u32::from(k[4] ^ seed[4]) << 16);

        Self {
            lfsr17: Lfsr17::new(k[0] ^ seed[0], k[1] ^ seed[1]),
            lfsr25: lfsr25_expand(bits),
            carry: 0,
        }
    }

    /// Keystream of a sector, seeded from its header.
    pub fn for_sector(key: &Key, sector: &[u8; BLOCK_SIZE]) -> Self {
        Self::new(key, &seed(sector))
    }
}

impl Iterator for Keystream {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let o17 = TAB5[self.lfsr17.next_byte() as usize];
        let o25 = lfsr25_feedback(self.lfsr25);
        self.lfsr25 = (self.lfsr25 << 8) | u32::from(o25);

        self.carry += u32::from(TAB4[o25 as usize]) + u32::from(o17);
        let byte = self.carry as u8;
        self.carry >>= 8;
        Some(byte)
    }
}

/// The five seed bytes of a sector.
pub fn seed(sector: &[u8; BLOCK_SIZE]) -> [u8; KEY_SIZE] {
    let mut seed = [0; KEY_SIZE];
    seed.copy_from_slice(&sector[SEED_OFFSET..SEED_OFFSET + KEY_SIZE]);
    seed
}

/// Whether the PES scrambling control bits of a sector are set.
pub fn is_scrambled(sector: &[u8]) -> bool {
    sector
        .get(SCRAMBLING_CONTROL_OFFSET)
        .is_some_and(|x| x & 0x30 != 0)
}

/// Descramble the payload of a sector in place.
///
/// The transform is applied unconditionally, see [`descramble_sector`] for
/// the flag-aware variant used while reading.
pub fn unscramble(sector: &mut [u8; BLOCK_SIZE], key: &Key) {
    let keystream = Keystream::for_sector(key, sector);

    for (byte, k) in sector[SCRAMBLED_OFFSET..].iter_mut().zip(keystream) {
        *byte = TAB1[*byte as usize] ^ k;
    }
}

/// Scramble the payload of a sector in place. Inverse of [`unscramble`].
pub fn scramble(sector: &mut [u8; BLOCK_SIZE], key: &Key) {
    let keystream = Keystream::for_sector(key, sector);

    for (byte, k) in sector[SCRAMBLED_OFFSET..].iter_mut().zip(keystream) {
        *byte = TAB1_INV[(*byte ^ k) as usize];
    }
}

/// Descramble a sector read from disc if it is flagged as scrambled, and
/// clear its scrambling control bits. Returns whether it was scrambled.
pub fn descramble_sector(sector: &mut [u8; BLOCK_SIZE], key: &Key) -> bool {
    if !is_scrambled(sector) {
        return false;
    }

    unscramble(sector, key);
    sector[SCRAMBLING_CONTROL_OFFSET] &= 0x8f;
    true
}

/// The five mangling bytes produced by `key` for key decryption.
fn mangling_bytes(invert: u8, key: &Key) -> [u8; KEY_SIZE] {
    let k = key.0;
    let mut lfsr17 = Lfsr17::new(k[0], k[1]);

    // The 25-bit register runs bit reversed here.
    let state = ((u32::from(k[4]) << 17) | (u32::from(k[3]) << 9) | (u32::from(k[2]) << 1)) + 8
        - u32::from(k[2] & 7);
    let mut lfsr25 = (u32::from(TAB4[(state & 0xff) as usize]) << 24)
        | (u32::from(TAB4[((state >> 8) & 0xff) as usize]) << 16)
        | (u32::from(TAB4[((state >> 16) & 0xff) as usize]) << 8)
        | u32::from(TAB4[((state >> 24) & 0xff) as usize]);

    let mut combined = 0u32;
    let mut out = [0; KEY_SIZE];

    for byte in &mut out {
        let o17 = TAB4[lfsr17.next_byte() as usize];
        let o25 =
            ((((((((lfsr25 >> 8) ^ lfsr25) >> 1) ^ lfsr25) >> 3) ^ lfsr25) >> 7) & 0xff) as u8;
        lfsr25 = (lfsr25 >> 8) | (u32::from(o25) << 24);

        combined += u32::from(o25 ^ invert) + u32::from(o17);
        *byte = combined as u8;
        combined >>= 8;
    }

    out
}

/// Decrypt a 5-byte key with another key.
///
/// `invert` is `0x00` for disc keys and `0xff` for title keys.
pub fn decrypt_key(invert: u8, key: &Key, crypted: &Key) -> Key {
    let k = mangling_bytes(invert, key);
    let c = crypted.0;
    let mut r = [0u8; KEY_SIZE];

    r[4] = k[4] ^ TAB1[c[4] as usize] ^ c[3];
    r[3] = k[3] ^ TAB1[c[3] as usize] ^ c[2];
    r[2] = k[2] ^ TAB1[c[2] as usize] ^ c[1];
    r[1] = k[1] ^ TAB1[c[1] as usize] ^ c[0];
    r[0] = k[0] ^ TAB1[c[0] as usize] ^ r[4];

    r[4] = k[4] ^ TAB1[r[4] as usize] ^ r[3];
    r[3] = k[3] ^ TAB1[r[3] as usize] ^ r[2];
    r[2] = k[2] ^ TAB1[r[2] as usize] ^ r[1];
    r[1] = k[1] ^ TAB1[r[1] as usize] ^ r[0];
    r[0] = k[0] ^ TAB1[r[0] as usize];

    Key(r)
}

/// Encrypt a 5-byte key with another key. Inverse of [`decrypt_key`].
pub fn encrypt_key(invert: u8, key: &Key, plain: &Key) -> Key {
    let k = mangling_bytes(invert, key);
    let p = plain.0;
    let mut b = [0u8; KEY_SIZE];
    let mut c = [0u8; KEY_SIZE];

    b[0] = TAB1_INV[(p[0] ^ k[0]) as usize];
    b[1] = TAB1_INV[(p[1] ^ k[1] ^ b[0]) as usize];
    b[2] = TAB1_INV[(p[2] ^ k[2] ^ b[1]) as usize];
    b[3] = TAB1_INV[(p[3] ^ k[3] ^ b[2]) as usize];
    b[4] = TAB1_INV[(p[4] ^ k[4] ^ b[3]) as usize];

    c[0] = TAB1_INV[(b[0] ^ k[0] ^ b[4]) as usize];
    c[1] = TAB1_INV[(b[1] ^ k[1] ^ c[0]) as usize];
    c[2] = TAB1_INV[(b[2] ^ k[2] ^ c[1]) as usize];
    c[3] = TAB1_INV[(b[3] ^ k[3] ^ c[2]) as usize];
    c[4] = TAB1_INV[(b[4] ^ k[4] ^ c[3]) as usize];

    Key(c)
}

/// Decrypt a title key with the disc key.
pub fn decrypt_title_key(disc_key: &Key, crypted: &Key) -> Key {
    decrypt_key(0xff, disc_key, crypted)
}
