use crate::{
    BLOCK_SIZE, Error, Result, Verbosity,
    css::{
        KEY_SIZE, Key, Lfsr17, SCRAMBLED_OFFSET, TAB1, TAB4, TAB5, is_scrambled,
        lfsr25_feedback, seed,
    },
    device::SectorSource,
};

/// Stop guessing after this many blocks when none of them was scrambled.
pub const UNSCRAMBLED_LIMIT: u32 = 2000;

/// Maximum number of blocks scanned for one title (9 GB).
pub const READ_LIMIT: u32 = 4_718_592;

const PACK_START: [u8; 3] = [0x00, 0x00, 0x01];
const STREAM_ID_OFFSET: usize = 0x11;

/// Recover the title key from ten known plaintext bytes of a scrambled
/// sector, `seed` being the five seed bytes of that sector.
///
/// Returns `None` when no LFSR1 start state matches the keystream.
pub fn recover_title_key(
    crypted: &[u8; 10],
    plain: &[u8; 10],
    seed: &[u8; KEY_SIZE],
) -> Option<Key> {
    let mut keystream = [0u8; 10];

    for (i, byte) in keystream.iter_mut().enumerate() {
        *byte = TAB1[crypted[i] as usize] ^ plain[i];
    }

    let mut found = None;

    for i_try in 0..=u16::MAX {
        let [a, b] = i_try.to_be_bytes();
        let mut lfsr17 = Lfsr17::new(a, b);
        let mut lfsr25 = 0u32;
        let mut carry = 0u32;

        // The first four bytes reveal the LFSR2 output.
        for &byte in &keystream[..4] {
            let o17 = u32::from(TAB5[lfsr17.next_byte() as usize]);
            let mut o25 = u32::from(byte);

            if carry != 0 {
                o25 = (o25 + 0xff) & 0xff;
            }

            if o25 < o17 {
                o25 += 0x100;
            }

            o25 -= o17;
            carry += o25 + o17;
            lfsr25 = (lfsr25 << 8) | u32::from(TAB4[o25 as usize]);
            carry >>= 8;
        }

        let candidate = lfsr25;

        // The remaining six validate it.
        let valid = keystream[4..].iter().all(|&byte| {
            let o17 = u32::from(TAB5[lfsr17.next_byte() as usize]);
            let o25 = lfsr25_feedback(lfsr25);
            lfsr25 = (lfsr25 << 8) | u32::from(o25);
            carry += u32::from(TAB4[o25 as usize]) + o17;

            let ok = carry & 0xff == u32::from(byte);
            carry >>= 8;
            ok
        });

        if !valid {
            continue;
        }

        if let Some(bits) = lfsr25_initial_bits(candidate) {
            let [k2, k3, k4, _] = bits.to_le_bytes();
            found = Some([a, b, k2, k3, k4]);
        }
    }

    found.map(|mut key| {
        for (k, s) in key.iter_mut().zip(seed) {
            *k ^= s;
        }

        Key(key)
    })
}

/// Step the 25-bit LFSR four bytes back from `state` and find the 24 key
/// bits which expand into the result.
fn lfsr25_initial_bits(mut state: u32) -> Option<u32> {
    for _ in 0..4 {
        let out = (state & 0xff) as u8;
        state >>= 8;

        for j in 0..256u32 {
            state = (state & 0x1ffff) | (j << 17);

            if lfsr25_feedback(state) == out {
                break;
            }
        }
    }

    let base = (state >> 1).wrapping_sub(4);
    let mut bits = None;

    for offset in 0..8 {
        let x = base.wrapping_add(offset);

        if x.wrapping_mul(2).wrapping_add(8).wrapping_sub(x & 7) == state {
            bits = Some(x);
        }
    }

    bits
}

/// Guess the title key of a sector whose plaintext before the scrambled
/// region repeats with a short period.
///
/// The repetition is assumed to continue into the first ten scrambled
/// bytes.
pub fn attack_pattern(sector: &[u8; BLOCK_SIZE]) -> Option<Key> {
    let mut best_len = 0;
    let mut best_period = 0;

    for period in 2..0x30 {
        let mut len = period + 1;

        while len < 0x80 && sector[0x7f - (len % period)] == sector[0x7f - len] {
            if len > best_len {
                best_len = len;
                best_period = period;
            }
            len += 1;
        }
    }

    if best_len <= 3 || best_len / best_period < 2 {
        return None;
    }

    let plain_offset = SCRAMBLED_OFFSET - (best_len / best_period) * best_period;
    let mut crypted = [0u8; 10];
    let mut plain = [0u8; 10];
    crypted.copy_from_slice(&sector[SCRAMBLED_OFFSET..SCRAMBLED_OFFSET + 10]);
    plain.copy_from_slice(&sector[plain_offset..plain_offset + 10]);

    recover_title_key(&crypted, &plain, &seed(sector))
}

/// Guess the title key of the title starting at `start` by scanning its
/// sectors with [`attack_pattern`].
///
/// Returns [`Key::ZERO`] when the first [`UNSCRAMBLED_LIMIT`] blocks (or the
/// whole title) hold no scrambled sector. The first read error reopens the
/// source and retries the same block once.
pub fn crack_title_key(
    source: &mut dyn SectorSource,
    start: u32,
    verbosity: Verbosity,
) -> Result<Key> {
    print_debug!(verbosity, "cracking title key at block {}", start);

    let mut sector = [0u8; BLOCK_SIZE];
    let mut position = start;
    let mut reads = 0u32;
    let mut scrambled = 0u32;
    let mut read_error = false;
    let mut found = None;

    while reads < READ_LIMIT {
        let read = source.seek(position).and_then(|_| source.read(&mut sector));

        match read {
            Ok(1) => (),
            Ok(_) => {
                print_debug!(
                    verbosity,
                    "read returned no data at block {} (end of device?)",
                    position
                );
                break;
            }
            Err(e) if !read_error => {
                print_debug!(
                    verbosity,
                    "read error at block {}, reopening the target: {}",
                    position,
                    e
                );
                read_error = true;

                if let Err(e) = source.reopen() {
                    print_debug!(verbosity, "reopening failed: {}", e);
                }

                continue;
            }
            Err(e) if reads == 0 => return Err(e),
            Err(e) => {
                print_debug!(verbosity, "read error at block {}: {}", position, e);
                break;
            }
        }

        if sector[..3] != PACK_START {
            print_debug!(
                verbosity,
                "non MPEG block found at block {} (end of title)",
                position
            );
            break;
        }

        // No scrambling control in system headers, padding and private stream 2.
        if is_scrambled(&sector) && !matches!(sector[STREAM_ID_OFFSET], 0xbb | 0xbe | 0xbf) {
            scrambled += 1;

            if let Some(key) = attack_pattern(&sector) {
                found = Some(key);
            }
        }

        position += 1;
        reads += 1;

        if found.is_some() {
            break;
        }

        if reads & 0xfff == 0 {
            print_debug!(verbosity, "at block {}, still cracking...", position);
        }

        if reads >= UNSCRAMBLED_LIMIT && scrambled == 0 {
            break;
        }
    }

    print_debug!(verbosity, "scrambled blocks {}/{}", scrambled, reads);

    if let Some(key) = found {
        print_debug!(verbosity, "title key found at block {}: {}", start, key);
        return Ok(key);
    }

    if scrambled == 0 && reads > 0 {
        print_debug!(verbosity, "no scrambled sectors found at block {}", start);
        return Ok(Key::ZERO);
    }

    Err(Error::InsufficientData(start))
}
