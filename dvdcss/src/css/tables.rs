//! Constant tables of the CSS cipher.
//!
//! Only the ciphertext substitution table is stored literally, the LFSR
//! stepping tables and the bit reversal tables are generated at compile time.

use super::Key;

/// Ciphertext substitution applied to every scrambled byte. A permutation.
pub(crate) const TAB1: [u8; 256] = [
    0x33, 0x73, 0x3b, 0x26, 0x63, 0x23, 0x6b, 0x76,
    0x3e, 0x7e, 0x36, 0x2b, 0x6e, 0x2e, 0x66, 0x7b,
    0xd3, 0x93, 0xdb, 0x06, 0x43, 0x03, 0x4b, 0x96,
    0xde, 0x9e, 0xd6, 0x0b, 0x4e, 0x0e, 0x46, 0x9b,
    0x57, 0x17, 0x5f, 0x82, 0xc7, 0x87, 0xcf, 0x12,
    0x5a, 0x1a, 0x52, 0x8f, 0xca, 0x8a, 0xc2, 0x1f,
    0xd9, 0x99, 0xd1, 0x00, 0x49, 0x09, 0x41, 0x90,
    0xd8, 0x98, 0xd0, 0x01, 0x48, 0x08, 0x40, 0x91,
    0x3d, 0x7d, 0x35, 0x24, 0x6d, 0x2d, 0x65, 0x74,
    0x3c, 0x7c, 0x34, 0x25, 0x6c, 0x2c, 0x64, 0x75,
    0xdd, 0x9d, 0xd5, 0x04, 0x4d, 0x0d, 0x45, 0x94,
    0xdc, 0x9c, 0xd4, 0x05, 0x4c, 0x0c, 0x44, 0x95,
    0x59, 0x19, 0x51, 0x80, 0xc9, 0x89, 0xc1, 0x10,
    0x58, 0x18, 0x50, 0x81, 0xc8, 0x88, 0xc0, 0x11,
    0xd7, 0x97, 0xdf, 0x02, 0x47, 0x07, 0x4f, 0x92,
    0xda, 0x9a, 0xd2, 0x0f, 0x4a, 0x0a, 0x42, 0x9f,
    0x53, 0x13, 0x5b, 0x86, 0xc3, 0x83, 0xcb, 0x16,
    0x5e, 0x1e, 0x56, 0x8b, 0xce, 0x8e, 0xc6, 0x1b,
    0xb3, 0xf3, 0xbb, 0xa6, 0xe3, 0xa3, 0xeb, 0xf6,
    0xbe, 0xfe, 0xb6, 0xab, 0xee, 0xae, 0xe6, 0xfb,
    0x37, 0x77, 0x3f, 0x22, 0x67, 0x27, 0x6f, 0x72,
    0x3a, 0x7a, 0x32, 0x2f, 0x6a, 0x2a, 0x62, 0x7f,
    0xb9, 0xf9, 0xb1, 0xa0, 0xe9, 0xa9, 0xe1, 0xf0,
    0xb8, 0xf8, 0xb0, 0xa1, 0xe8, 0xa8, 0xe0, 0xf1,
    0x5d, 0x1d, 0x55, 0x84, 0xcd, 0x8d, 0xc5, 0x14,
    0x5c, 0x1c, 0x54, 0x85, 0xcc, 0x8c, 0xc4, 0x15,
    0xbd, 0xfd, 0xb5, 0xa4, 0xed, 0xad, 0xe5, 0xf4,
    0xbc, 0xfc, 0xb4, 0xa5, 0xec, 0xac, 0xe4, 0xf5,
    0x39, 0x79, 0x31, 0x20, 0x69, 0x29, 0x61, 0x70,
    0x38, 0x78, 0x30, 0x21, 0x68, 0x28, 0x60, 0x71,
    0xb7, 0xf7, 0xbf, 0xa2, 0xe7, 0xa7, 0xef, 0xf2,
    0xba, 0xfa, 0xb2, 0xaf, 0xea, 0xaa, 0xe2, 0xff,];

/// Inverse of [`TAB1`], used when scrambling.
pub(crate) const TAB1_INV: [u8; 256] = invert(&TAB1);

/// Byte step of the 17-bit LFSR, indexed by its high byte.
pub(crate) const TAB2: [u8; 256] = {
    let mut table = [0; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = (i ^ (i >> 3) ^ (i >> 6)) as u8;
        i += 1;
    }
    table
};

/// Byte step of the 17-bit LFSR, indexed by its 9-bit low part.
pub(crate) const TAB3: [u8; 512] = {
    let mut table = [0; 512];
    let mut i = 0;
    while i < 512 {
        let mut value = 0u8;
        let mut bit = 0;
        while bit < 3 {
            if (i >> bit) & 1 != 0 {
                value ^= 0x92u8 << bit;
            }
            bit += 1;
        }
        table[i] = value;
        i += 1;
    }
    table
};

/// Bit reversal.
pub(crate) const TAB4: [u8; 256] = {
    let mut table = [0; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = (i as u8).reverse_bits();
        i += 1;
    }
    table
};

/// Bit reversal of the complement.
pub(crate) const TAB5: [u8; 256] = {
    let mut table = [0; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = !(i as u8).reverse_bits();
        i += 1;
    }
    table
};

/// Player keys known to be accepted by licensed drives.
pub const PLAYER_KEYS: [Key; 31] = [
    Key([0x01, 0xaf, 0xe3, 0x12, 0x80]),
    Key([0x12, 0x11, 0xca, 0x04, 0x3b]),
    Key([0x14, 0x0c, 0x9e, 0xd0, 0x09]),
    Key([0x14, 0x71, 0x35, 0xba, 0xe2]),
    Key([0x1a, 0xa4, 0x33, 0x21, 0xa6]),
    Key([0x26, 0xec, 0xc4, 0xa7, 0x4e]),
    Key([0x2c, 0xb2, 0xc1, 0x09, 0xee]),
    Key([0x2f, 0x25, 0x9e, 0x96, 0xdd]),
    Key([0x33, 0x2f, 0x49, 0x6c, 0xe0]),
    Key([0x35, 0x5b, 0xc1, 0x31, 0x0f]),
    Key([0x36, 0x67, 0xb2, 0xe3, 0x85]),
    Key([0x39, 0x3d, 0xf1, 0xf1, 0xbd]),
    Key([0x3b, 0x31, 0x34, 0x0d, 0x91]),
    Key([0x45, 0xed, 0x28, 0xeb, 0xd3]),
    Key([0x48, 0xb7, 0x6c, 0xce, 0x69]),
    Key([0x4b, 0x65, 0x0d, 0xc1, 0xee]),
    Key([0x4c, 0xbb, 0xf5, 0x5b, 0x23]),
    Key([0x51, 0x67, 0x67, 0xc5, 0xe0]),
    Key([0x53, 0x94, 0xe1, 0x75, 0xbf]),
    Key([0x57, 0x2c, 0x8b, 0x31, 0xae]),
    Key([0x63, 0xdb, 0x4c, 0x5b, 0x4a]),
    Key([0x7b, 0x1e, 0x5e, 0x2b, 0x57]),
    Key([0x85, 0xf3, 0x85, 0xa0, 0xe0]),
    Key([0xab, 0x1e, 0xe7, 0x7b, 0x72]),
    Key([0xab, 0x36, 0xe3, 0xeb, 0x76]),
    Key([0xb1, 0xb8, 0xf9, 0x38, 0x03]),
    Key([0xb8, 0x5d, 0xd8, 0x53, 0xbd]),
    Key([0xbf, 0x92, 0xc3, 0xb0, 0xe2]),
    Key([0xcf, 0x1a, 0xb2, 0xf8, 0x0a]),
    Key([0xec, 0xa0, 0xcf, 0xb3, 0xff]),
    Key([0xfc, 0x95, 0xa9, 0x87, 0x35]),
];

const fn invert(table: &[u8; 256]) -> [u8; 256] {
    let mut inverse = [0; 256];
    let mut i = 0;
    while i < 256 {
        inverse[table[i] as usize] = i as u8;
        i += 1;
    }
    inverse
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitution_is_a_permutation() {
        let mut seen = [false; 256];
        for value in TAB1 {
            assert!(!seen[value as usize]);
            seen[value as usize] = true;
        }

        for i in 0..=255u8 {
            assert_eq!(TAB1_INV[TAB1[i as usize] as usize], i);
        }
    }

    #[test]
    fn generated_tables() {
        assert_eq!(&TAB2[..16], &[0, 1, 2, 3, 4, 5, 6, 7, 9, 8, 11, 10, 13, 12, 15, 14]);
        assert_eq!(TAB2[0x40], 0x49);
        assert_eq!(&TAB3[..8], &[0x00, 0x92, 0x24, 0xb6, 0x48, 0xda, 0x6c, 0xfe]);
        assert_eq!(&TAB3[8..16], &TAB3[..8]);
        assert_eq!(&TAB4[..4], &[0x00, 0x80, 0x40, 0xc0]);
        assert_eq!(&TAB5[..4], &[0xff, 0x7f, 0xbf, 0x3f]);
    }
}
