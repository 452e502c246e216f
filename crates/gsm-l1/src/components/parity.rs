//! Systematic block coders for the GSM 05.03 parity fields.
//!
//! A coder is defined by its generator polynomial and the split of the
//! codeword into data and parity. Parity is transmitted inverted, so
//! `write_parity_word` inverts the remainder and receivers re-invert the
//! parity field before the syndrome check.

/// XCCH/SACCH/FACCH block code: 40 parity bits over 184 data bits
/// (GSM 05.03 4.1.2).
pub const XCCH_GENERATOR: u64 = 0x10004820009;
pub const XCCH_PARITY_BITS: usize = 40;
pub const XCCH_CODEWORD_BITS: usize = 224;

/// RACH block code: 6 parity bits over 8 data bits (GSM 05.03 4.6).
pub const RACH_GENERATOR: u64 = 0x6f;
pub const RACH_PARITY_BITS: usize = 6;
pub const RACH_CODEWORD_BITS: usize = 14;

/// SCH block code: 10 parity bits over 25 data bits (GSM 05.03 4.7).
pub const SCH_GENERATOR: u64 = 0x575;
pub const SCH_PARITY_BITS: usize = 10;
pub const SCH_CODEWORD_BITS: usize = 35;

/// TCH class-1A block code: 3 parity bits over 50 data bits
/// (GSM 05.03 3.1.2.1).
pub const TCH_GENERATOR: u64 = 0xb;
pub const TCH_PARITY_BITS: usize = 3;
pub const TCH_CODEWORD_BITS: usize = 53;

pub struct ParityBlockCoder {
    generator: u64,
    parity_bits: usize,
    data_bits: usize,
}

impl ParityBlockCoder {
    /// `generator` must have degree `parity_bits` (top bit set at that
    /// position) and a nonzero constant term.
    pub fn new(generator: u64, parity_bits: usize, codeword_bits: usize) -> ParityBlockCoder {
        assert!(parity_bits < 64 && parity_bits < codeword_bits);
        assert!(generator >> parity_bits == 1, "generator {:#x} does not have degree {}", generator, parity_bits);
        assert!(generator & 1 == 1, "generator {:#x} has a zero constant term", generator);
        ParityBlockCoder { generator, parity_bits, data_bits: codeword_bits - parity_bits }
    }

    pub fn parity_bits(&self) -> usize {
        self.parity_bits
    }

    /// Polynomial remainder of the bit sequence times x^parity_bits,
    /// i.e. the raw (uninverted) parity over `bits`.
    fn remainder(&self, bits: &[u8]) -> u64 {
        let r = self.parity_bits;
        let mask = (1u64 << r) - 1;
        let mut rem = 0u64;
        for &b in bits {
            debug_assert!(b <= 1);
            let feedback = ((rem >> (r - 1)) & 1) ^ (b as u64);
            rem = (rem << 1) & mask;
            if feedback == 1 {
                rem ^= self.generator & mask;
            }
        }
        rem
    }

    /// Compute the parity over `data` and write it, inverted, as a bit array.
    pub fn write_parity_word(&self, data: &[u8], parity: &mut [u8]) {
        assert_eq!(data.len(), self.data_bits);
        assert_eq!(parity.len(), self.parity_bits);
        let word = !self.remainder(data);
        for (i, p) in parity.iter_mut().enumerate() {
            *p = ((word >> (self.parity_bits - 1 - i)) & 1) as u8;
        }
    }

    /// Raw parity word over `data` (as `remainder`, not inverted), for codes
    /// where the caller folds in something else, like the RACH BSIC xor.
    pub fn parity(&self, data: &[u8]) -> u64 {
        assert_eq!(data.len(), self.data_bits);
        self.remainder(data)
    }

    /// Syndrome over a full data+parity codeword; zero means valid.
    /// The parity field must already be un-inverted.
    pub fn syndrome(&self, dp: &[u8]) -> u64 {
        assert_eq!(dp.len(), self.data_bits + self.parity_bits);
        self.remainder(dp)
    }
}
