//! Leading-bits difficulty mask.
//!
//! A difficulty of `d` bits means the first `d` bits of a valid digest must
//! all be zero, expressed as a byte-prefix ceiling: the mask is the value
//! `2^(8 - (d mod 8))` rendered into `d/8 + 1` big-endian bytes, and a
//! digest passes iff its prefix compares `<=` the mask. This matches the
//! prefix-string comparison miners perform on their side.

use crate::WorkError;

/// Precomputed difficulty threshold for digest checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DifficultyMask {
    difficulty: u32,
    mask: Vec<u8>,
}

impl DifficultyMask {
    /// Build the mask for a difficulty of `difficulty` leading bits.
    pub fn new(difficulty: u32) -> Result<Self, WorkError> {
        if difficulty == 0 || difficulty > 64 {
            return Err(WorkError::DifficultyOutOfRange(difficulty));
        }

        let byte_count = (difficulty / 8 + 1) as usize;
        let bit_count = difficulty % 8;
        let ceiling: u32 = 1 << (8 - bit_count);

        let mut mask = vec![0u8; byte_count];
        if ceiling == 256 {
            // difficulty is a whole number of bytes; the ceiling needs the
            // carry byte (e.g. d=8 -> 0x0100)
            mask[byte_count - 2] = 1;
        } else {
            mask[byte_count - 1] = ceiling as u8;
        }

        Ok(Self { difficulty, mask })
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    /// Number of digest bytes inspected by [`Self::matches`].
    pub fn prefix_len(&self) -> usize {
        self.mask.len()
    }

    /// Whether a digest satisfies this difficulty.
    pub fn matches(&self, digest: &[u8]) -> bool {
        if digest.len() < self.mask.len() {
            return false;
        }
        digest[..self.mask.len()] <= self.mask[..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range() {
        assert!(matches!(
            DifficultyMask::new(0),
            Err(WorkError::DifficultyOutOfRange(0))
        ));
        assert!(DifficultyMask::new(65).is_err());
        assert!(DifficultyMask::new(64).is_ok());
    }

    #[test]
    fn mask_bytes_for_sub_byte_difficulty() {
        // d=11: 2 bytes, 3 bits in the second byte -> ceiling 0x20
        let mask = DifficultyMask::new(11).unwrap();
        assert_eq!(mask.prefix_len(), 2);
        assert!(mask.matches(&[0x00, 0x1f, 0xff]));
        assert!(mask.matches(&[0x00, 0x20, 0x00]));
        assert!(!mask.matches(&[0x00, 0x21, 0x00]));
        assert!(!mask.matches(&[0x01, 0x00, 0x00]));
    }

    #[test]
    fn mask_bytes_for_whole_byte_difficulty() {
        // d=8: ceiling is 0x0100 over two bytes
        let mask = DifficultyMask::new(8).unwrap();
        assert_eq!(mask.prefix_len(), 2);
        assert!(mask.matches(&[0x00, 0xff]));
        assert!(mask.matches(&[0x01, 0x00]));
        assert!(!mask.matches(&[0x01, 0x01]));
        assert!(!mask.matches(&[0x02, 0x00]));
    }

    #[test]
    fn short_digest_never_matches() {
        let mask = DifficultyMask::new(16).unwrap();
        assert!(!mask.matches(&[0x00]));
    }

    #[test]
    fn higher_difficulty_is_strictly_harder() {
        let easy = DifficultyMask::new(8).unwrap();
        let hard = DifficultyMask::new(12).unwrap();
        let digest = [0x00, 0x80, 0x00];
        assert!(easy.matches(&digest));
        assert!(!hard.matches(&digest));
    }
}
