//! Interleavers of GSM 05.03.
//!
//! Control channels spread one 456-bit coded block over 4 bursts
//! (GSM 05.03 4.1.4); traffic channels spread it diagonally over 8 bursts
//! with a block offset alternating between 0 and 4 (GSM 05.03 3.1.3).
//! Both use the same intra-burst bit permutation
//! `j = 2*((49k) mod 57) + (k mod 8)/4`.
//!
//! The deinterleavers consume soft symbols and mark each cell they read as
//! an erasure (0.5), so a missing burst degrades into erased bits the
//! Viterbi decoder can work around instead of stale data.

pub const CODED_BLOCK_BITS: usize = 456;
pub const BURST_PAYLOAD_BITS: usize = 114;

#[inline]
fn intra_burst_index(k: usize) -> usize {
    2 * ((49 * k) % 57) + (k % 8) / 4
}

/// Interleave c[456] into four burst rows, GSM 05.03 4.1.4.
pub fn xcch_interleave(c: &[u8], i: &mut [[u8; BURST_PAYLOAD_BITS]; 4]) {
    assert_eq!(c.len(), CODED_BLOCK_BITS);
    for k in 0..CODED_BLOCK_BITS {
        i[k % 4][intra_burst_index(k)] = c[k];
    }
}

/// Deinterleave four burst rows into c[456], erasure-marking consumed cells.
pub fn xcch_deinterleave(i: &mut [[f32; BURST_PAYLOAD_BITS]; 4], c: &mut [f32]) {
    assert_eq!(c.len(), CODED_BLOCK_BITS);
    for k in 0..CODED_BLOCK_BITS {
        let b = k % 4;
        let j = intra_burst_index(k);
        c[k] = i[b][j];
        i[b][j] = 0.5;
    }
}

/// Interleave c[456] diagonally over 8 burst rows, GSM 05.03 3.1.3.
/// `block_offset` alternates between 0 and 4 on consecutive blocks.
pub fn tch_interleave(c: &[u8], i: &mut [[u8; BURST_PAYLOAD_BITS]; 8], block_offset: usize) {
    assert_eq!(c.len(), CODED_BLOCK_BITS);
    assert!(block_offset == 0 || block_offset == 4);
    for k in 0..CODED_BLOCK_BITS {
        i[(k + block_offset) % 8][intra_burst_index(k)] = c[k];
    }
}

/// Deinterleave one diagonal block out of 8 burst rows, erasure-marking
/// consumed cells.
pub fn tch_deinterleave(i: &mut [[f32; BURST_PAYLOAD_BITS]; 8], c: &mut [f32], block_offset: usize) {
    assert_eq!(c.len(), CODED_BLOCK_BITS);
    assert!(block_offset == 0 || block_offset == 4);
    for k in 0..CODED_BLOCK_BITS {
        let b = (k + block_offset) % 8;
        let j = intra_burst_index(k);
        c[k] = i[b][j];
        i[b][j] = 0.5;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xcch_map_is_bijection() {
        let mut hit = [[false; BURST_PAYLOAD_BITS]; 4];
        for k in 0..CODED_BLOCK_BITS {
            let b = k % 4;
            let j = intra_burst_index(k);
            assert!(!hit[b][j], "cell ({},{}) written twice", b, j);
            hit[b][j] = true;
        }
        assert!(hit.iter().flatten().all(|&h| h));
    }

    #[test]
    fn test_tch_map_is_bijection_per_offset() {
        for offset in [0usize, 4] {
            let mut hit = [[0u8; BURST_PAYLOAD_BITS]; 8];
            for k in 0..CODED_BLOCK_BITS {
                hit[(k + offset) % 8][intra_burst_index(k)] += 1;
            }
            // Each block touches each of the 8 rows in exactly 57 cells
            for row in hit.iter() {
                assert_eq!(row.iter().map(|&h| h as usize).sum::<usize>(), 57);
                assert!(row.iter().all(|&h| h <= 1));
            }
        }
    }

    #[test]
    fn test_xcch_roundtrip() {
        let c: Vec<u8> = (0..CODED_BLOCK_BITS).map(|k| ((k * 29) % 5 < 2) as u8).collect();
        let mut i = [[0u8; BURST_PAYLOAD_BITS]; 4];
        xcch_interleave(&c, &mut i);

        let mut soft = [[0.0f32; BURST_PAYLOAD_BITS]; 4];
        for b in 0..4 {
            for j in 0..BURST_PAYLOAD_BITS {
                soft[b][j] = i[b][j] as f32;
            }
        }
        let mut out = vec![0.0f32; CODED_BLOCK_BITS];
        xcch_deinterleave(&mut soft, &mut out);
        for k in 0..CODED_BLOCK_BITS {
            assert_eq!(out[k], c[k] as f32);
        }
        // All consumed cells are now erasures
        assert!(soft.iter().flatten().all(|&s| s == 0.5));
    }

    #[test]
    fn test_tch_roundtrip_both_offsets() {
        for offset in [0usize, 4] {
            let c: Vec<u8> = (0..CODED_BLOCK_BITS).map(|k| ((k * 13) % 3 == 1) as u8).collect();
            let mut i = [[0u8; BURST_PAYLOAD_BITS]; 8];
            tch_interleave(&c, &mut i, offset);

            let mut soft = [[0.5f32; BURST_PAYLOAD_BITS]; 8];
            for b in 0..8 {
                for j in 0..BURST_PAYLOAD_BITS {
                    soft[b][j] = i[b][j] as f32;
                }
            }
            let mut out = vec![0.0f32; CODED_BLOCK_BITS];
            tch_deinterleave(&mut soft, &mut out, offset);
            for k in 0..CODED_BLOCK_BITS {
                assert_eq!(out[k], c[k] as f32, "offset {} bit {}", offset, k);
            }
        }
    }
}
