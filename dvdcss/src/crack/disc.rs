/*
    REFERENCES
    ----------

    1. Frank A. Stevenson, "Cryptanalysis of Contents Scrambling System" (1999)

*/

use super::{Budget, CancelToken};
use crate::{
    Result,
    css::{Key, Lfsr17, TAB1, TAB4, decrypt_key, lfsr25_expand, lfsr25_feedback},
};
use rayon::prelude::*;
use std::time::Duration;

/// Maximum number of k[1] candidates kept per (B[0], C[1]) pair, plus one
/// slot for the count.
const K1_TABLE_WIDTH: usize = 10;

/// Possible values of k[1] for every (B[0], C[1]) pair.
struct K1Table(Vec<u8>);

impl K1Table {
    fn new(hash: &[u8; 5]) -> Self {
        let mut table = vec![0u8; 65536 * K1_TABLE_WIDTH];
        let tmp = hash[0] ^ TAB1[hash[1] as usize];

        for k1 in 0..=255u8 {
            let b1 = TAB1[(tmp ^ k1) as usize];

            for b0 in 0..=255u8 {
                let c1 = b0 ^ b1 ^ k1;
                let slot = K1_TABLE_WIDTH * (256 * b0 as usize + c1 as usize);
                let count = table[slot] as usize + 1;

                if count < K1_TABLE_WIDTH {
                    table[slot + count] = k1;
                    table[slot] = count as u8;
                }
            }
        }

        Self(table)
    }

    fn candidates(&self, b0: u8, c1: u8) -> &[u8] {
        let slot = K1_TABLE_WIDTH * (256 * b0 as usize + c1 as usize);
        let count = self.0[slot] as usize;
        &self.0[slot + 1..slot + 1 + count]
    }
}

/// Start state of the 25-bit LFSR indexed by its 1st, 2nd and 5th output
/// bytes.
struct Lfsr25Table(Vec<u32>);

impl Lfsr25Table {
    fn new() -> Self {
        let mut table = vec![0u32; 1 << 24];

        for i in 0..(1u32 << 24) {
            let mut state = lfsr25_expand(i);
            let mut out = [0u8; 5];

            for byte in &mut out {
                let o = lfsr25_feedback(state);
                state = (state << 8) | u32::from(o);
                *byte = TAB4[o as usize];
            }

            table[index(out[0], out[1], out[4])] = i;
        }

        Self(table)
    }

    fn get(&self, o0: u8, o1: u8, o4: u8) -> u32 {
        self.0[index(o0, o1, o4)]
    }
}

fn index(o0: u8, o1: u8, o4: u8) -> usize {
    ((o0 as usize) << 16) | ((o1 as usize) << 8) | o4 as usize
}

/// Recover the disc key from its hash (the disc key encrypted with itself).
///
/// Every LFSR1 start state is tried in parallel, the first match in state
/// order is returned so the result does not depend on scheduling. Returns
/// `Ok(None)` when the search space is exhausted and [`Error::Cancelled`]
/// once `cancel` fires or `timeout` elapses.
///
/// [`Error::Cancelled`]: crate::Error::Cancelled
pub fn crack_disc_key(
    hash: &Key,
    cancel: &CancelToken,
    timeout: Option<Duration>,
) -> Result<Option<Key>> {
    let budget = Budget::new(cancel.clone(), timeout);
    let hash = hash.0;

    budget.check()?;
    let k1_table = K1Table::new(&hash);
    let lfsr25_table = Lfsr25Table::new();
    budget.check()?;

    let found = (0..=u16::MAX).into_par_iter().find_map_first(|step_a| {
        if let Err(e) = budget.check() {
            return Some(Err(e));
        }

        search_lfsr1_state(step_a, &hash, &k1_table, &lfsr25_table).map(Ok)
    });

    found.transpose()
}

fn search_lfsr1_state(
    step_a: u16,
    hash: &[u8; 5],
    k1_table: &K1Table,
    lfsr25_table: &Lfsr25Table,
) -> Option<Key> {
    let [a_hi, a_lo] = step_a.to_be_bytes();
    let mut lfsr17 = Lfsr17::new(a_hi, a_lo);
    let mut out1 = [0u8; 5];

    for byte in &mut out1 {
        *byte = TAB4[lfsr17.next_byte() as usize];
    }

    let mut c = [a_hi, a_lo, 0, 0, 0];
    let tmp = hash[3] ^ TAB1[hash[4] as usize];
    let tmp2 = TAB1[hash[0] as usize];
    let tmp5 = hash[0] ^ TAB1[hash[1] as usize];

    for b0 in 0..=255u8 {
        let mut b = [b0, 0, 0, 0, 0];
        let mut k = [0u8; 5];

        k[0] = TAB1[b[0] as usize] ^ c[0];
        b[4] = b[0] ^ k[0] ^ tmp2;
        k[4] = b[4] ^ tmp;

        for &k1 in k1_table.candidates(b[0], c[1]) {
            k[1] = k1;
            b[1] = tmp5 ^ k1;

            // Reconstruct the output of LFSR2.
            let t = 0x100 + u32::from(k[0]) - u32::from(out1[0]);
            let o0 = t as u8;
            let t = if t & 0x100 != 0 { 0x100 } else { 0xff };
            let t = t + u32::from(k[1]) - u32::from(out1[1]);
            let o1 = t as u8;
            let t = 0x100 + u32::from(k[4]) - u32::from(out1[4]);
            let o4 = t as u8;

            // The carry into the fifth byte is unknown, so it can be one off.
            for o4 in [o4, o4.wrapping_sub(1)] {
                let state = lfsr25_table.get(o0, o1, o4);
                c[2] = state as u8;
                c[3] = (state >> 8) as u8;
                c[4] = (state >> 16) as u8;

                b[3] = TAB1[b[4] as usize] ^ k[4] ^ c[4];
                k[3] = hash[2] ^ TAB1[hash[3] as usize] ^ b[3];
                b[2] = TAB1[b[3] as usize] ^ k[3] ^ c[3];
                k[2] = hash[1] ^ TAB1[hash[2] as usize] ^ b[2];

                if b[1] ^ TAB1[b[2] as usize] ^ k[2] == c[2] {
                    let candidate = Key(c);

                    if decrypt_key(0, &candidate, &Key(*hash)) == candidate {
                        return Some(candidate);
                    }
                }
            }
        }
    }

    None
}
