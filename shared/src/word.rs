/*!
Capture word helpers.

The core shifts serial bits into its FIFOs in an order that does not match the
wire. [`normalize`] undoes that permutation so that bit 15 of a word is the
first bit clocked on the bus.
*/

use crate::protocol::WORD_BITS;

/// Restore transmit order of a captured word.
///
/// Byte swap, nibble swap inside each byte, then a bit reversal inside each
/// nibble. The three steps compose into a full 16-bit reversal, so the
/// transform is its own inverse.
pub fn normalize(value: u16) -> u16 {
    let swapped = value.rotate_left(8);

    let nibbles = ((swapped << 4) & 0xF0F0) | ((swapped >> 4) & 0x0F0F);

    // pairs, then bits
    let pairs = ((nibbles << 2) & 0xCCCC) | ((nibbles >> 2) & 0x3333);
    ((pairs << 1) & 0xAAAA) | ((pairs >> 1) & 0x5555)
}

/// Number of FIFO words holding `bit_count` bits
pub fn word_count(bit_count: u16) -> usize {
    (bit_count as usize).div_ceil(WORD_BITS)
}

/// Valid bits in the last word of a frame of `bit_count` bits.
///
/// Zero only for a void frame.
pub fn last_word_bits(bit_count: u16) -> usize {
    match (bit_count as usize) % WORD_BITS {
        0 if bit_count == 0 => 0,
        0 => WORD_BITS,
        rem => rem,
    }
}

/// Render the first `len` bits of a normalized word, MSB first
pub fn bit_vector(value: u16, len: usize) -> String {
    let len = len.min(WORD_BITS);
    (0..len)
        .map(|i| if value & (0x8000 >> i) != 0 { '1' } else { '0' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_golden_vector() {
        // 0x1234 -> byte swap 0x3412 -> nibble swap 0x4321 -> nibble reverse 0x2C48
        assert_eq!(normalize(0x1234), 0x2C48);
        assert_eq!(normalize(0x0001), 0x8000);
        assert_eq!(normalize(0x00F0), 0x0F00);
    }

    #[test]
    fn test_normalize_is_self_inverse() {
        for x in 0..=u16::MAX {
            assert_eq!(normalize(normalize(x)), x);
        }
    }

    #[test]
    fn test_normalize_matches_bit_reversal() {
        for x in 0..=u16::MAX {
            assert_eq!(normalize(x), x.reverse_bits());
        }
    }

    #[test]
    fn test_word_geometry() {
        for bits in 1..=2047u16 {
            let words = word_count(bits);
            assert_eq!(words, (bits as usize + 15) / 16);
            let last = last_word_bits(bits);
            let expected = if bits % 16 == 0 { 16 } else { (bits % 16) as usize };
            assert_eq!(last, expected);
            assert_eq!((words - 1) * 16 + last, bits as usize);
        }
        assert_eq!(word_count(0), 0);
        assert_eq!(last_word_bits(0), 0);
    }

    #[test]
    fn test_bit_vector() {
        assert_eq!(bit_vector(0xA000, 4), "1010");
        assert_eq!(bit_vector(0xFFFF, 16), "1111111111111111");
        assert_eq!(bit_vector(0x0001, 16), "0000000000000001");
        assert_eq!(bit_vector(0xFFFF, 0), "");
    }
}
