/// Type used to represent input bits.
/// "0" is represented as a negative value, "1" as a positive value, and an
/// erased (unknown) bit as 0. Soft decision decoding uses larger magnitudes
/// for more confident symbols. Too high values might cause path metrics to
/// overflow though; `soft_bit` quantizes to a safe range.
pub type SoftBit = i8;

/// Type used to accumulate path metrics.
/// 16 bits is enough for our message lengths without renormalization.
type Metric = i16;

/// Constraint length of the code.
/// This is defined as a constant rather than a const generic parameter since
/// it also affects NUM_STATES and the choice of type for DecisionBitmap.
const K: usize = 5;

const NUM_STATES: usize = num_states(K);

/// Unsigned integer type used to store decisions for each state in the
/// trellis. Each bit represents a decision for a given state, so the number
/// of bits must be at least the number of states.
type DecisionBitmap = u16;

/// Number of states for a given constraint length.
pub const fn num_states(k: usize) -> usize {
    1 << (k - 1)
}

/// Quantize a soft symbol in `[0,1]` (0.5 = erasure) to the decoder's
/// metric domain.
pub fn soft_bit(symbol: f32) -> SoftBit {
    let v = ((symbol - 0.5) * 8.0).round();
    v.clamp(-4.0, 4.0) as SoftBit
}

/// Viterbi decoder for a binary convolutional code of rate 1/N.
///
/// The generator polynomials are given as tap arrays over the current input
/// and the K-1 delayed inputs. Every polynomial must tap both the current
/// input and the oldest delayed input: the decoder exploits that the expected
/// outputs for the two predecessors of a state are then exact inverses.
pub struct ViterbiDecoder<const N: usize> {
    /// Expected encoder outputs for each state for a "0" oldest-input bit.
    expected_0: [[SoftBit; NUM_STATES]; N],
}

impl<const N: usize> ViterbiDecoder<N> {
    pub fn new_with_polynomials(generator_polynomials: &[[bool; K]; N]) -> Self {
        for poly in generator_polynomials {
            assert!(poly[0] && poly[K - 1], "generator must tap the current and oldest input");
        }
        // Generate a look-up table for expected encoder output bits, indexed
        // by the state entered after the newest input was shifted in. The
        // oldest (shifted-out) input is accounted for by metric inversion.
        let expected_0 = std::array::from_fn(|poly_n| {
            let poly = generator_polynomials[poly_n];
            std::array::from_fn(|state| {
                let mut encoder_output: bool = false;
                for bit_i in 0..K - 1 {
                    let input_bit = (state & (1 << (K - 2 - bit_i))) != 0;
                    if input_bit && poly[bit_i] {
                        encoder_output = !encoder_output;
                    }
                }
                if encoder_output { 1 as SoftBit } else { -1 as SoftBit }
            })
        });
        Self { expected_0 }
    }

    pub fn decode(&self, received_bits: &[SoftBit]) -> Vec<u8> {
        let num_output_bits = received_bits.len() / N;
        let mut trellis_decisions: Vec<DecisionBitmap> = Vec::with_capacity(num_output_bits);

        // Accumulated path metrics for each state.
        //
        // The encoder starts from state 0; give that an initial metric of 0
        // and the others a value high enough never to be chosen, but with
        // room left to accumulate on top without overflow.
        let mut metrics: [Metric; NUM_STATES] = [Metric::MAX / 2; NUM_STATES];
        metrics[0] = 0;

        for received in received_bits.chunks_exact(N) {
            // Branch metrics for a "0" oldest-input bit.
            let mut branch_metrics_0: [Metric; NUM_STATES] = [0; NUM_STATES];

            for (received_bit, expected_0) in received.iter().zip(self.expected_0.iter()) {
                for (branch_metric_0, expected_bit_0) in
                    branch_metrics_0.iter_mut().zip(expected_0.iter())
                {
                    *branch_metric_0 -= (received_bit * expected_bit_0) as Metric;
                }
            }

            let mut decisions: DecisionBitmap = 0;

            metrics = std::array::from_fn(|state| {
                // Predecessor state if the shifted-out bit was 0 or 1.
                let predecessor_0 = (state * 2) % NUM_STATES;
                let predecessor_1 = predecessor_0 + 1;
                let metric_0 = metrics[predecessor_0] + branch_metrics_0[state];
                // Expected outputs for a "1" oldest bit are the inverse of
                // those for "0", so the branch metric just flips sign.
                let metric_1 = metrics[predecessor_1] - branch_metrics_0[state];

                if metric_1 < metric_0 {
                    // Each state has only two possible predecessors, so one
                    // decision bit suffices; traceback rebuilds the numbers.
                    decisions |= 1 << state;
                    metric_1
                } else {
                    metric_0
                }
            });
            trellis_decisions.push(decisions);
        }

        // Traceback. Tail bits ensure the final encoder state is 0.
        let mut best_state = 0;

        let mut decoded_bits: Vec<u8> = Vec::with_capacity(num_output_bits);
        for decisions in trellis_decisions.iter().rev() {
            decoded_bits.push(((best_state >> (K - 2)) & 1) as u8);
            best_state = best_state * 2 % NUM_STATES + ((*decisions >> best_state) & 1) as usize;
        }
        decoded_bits.reverse();
        decoded_bits
    }
}

/// Decoder for the GSM 05.03 rate-1/2 code:
/// G0 = 1 + D^3 + D^4, G1 = 1 + D + D^3 + D^4.
pub type GsmViterbiDecoder = ViterbiDecoder<2>;

impl GsmViterbiDecoder {
    pub fn new() -> Self {
        Self::new_with_polynomials(&[
            [true, false, false, true, true],
            [true, true, false, true, true],
        ])
    }
}

impl Default for GsmViterbiDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode soft symbols in `[0,1]` into `out_len` hard bits.
pub fn decode_soft(decoder: &GsmViterbiDecoder, symbols: &[f32], out: &mut [u8]) {
    let soft: Vec<SoftBit> = symbols.iter().map(|&s| soft_bit(s)).collect();
    let decoded = decoder.decode(&soft);
    out.copy_from_slice(&decoded[..out.len()]);
}

#[cfg(test)]
mod tests {
    use super::super::convenc::ConvEncState;
    use super::*;

    fn message(len: usize, salt: u64) -> Vec<u8> {
        // Deterministic pseudorandom payload with 4 zero tail bits
        let mut x = salt.wrapping_mul(0x9e3779b97f4a7c15) | 1;
        (0..len)
            .map(|_| {
                x ^= x << 13;
                x ^= x >> 7;
                x ^= x << 17;
                (x & 1) as u8
            })
            .chain((0..4).map(|_| 0))
            .collect()
    }

    #[test]
    fn test_clean_decode() {
        for salt in 0..4 {
            let msg = message(224, salt);
            let mut encoder = ConvEncState::new();
            let mut encoded = vec![0u8; msg.len() * 2];
            encoder.encode(&msg, &mut encoded);

            let soft: Vec<SoftBit> = encoded.iter().map(|&b| if b != 0 { 4 } else { -4 }).collect();
            let decoded = GsmViterbiDecoder::new().decode(&soft);
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn test_decode_with_erasures_and_errors() {
        let msg = message(224, 7);
        let mut encoder = ConvEncState::new();
        let mut encoded = vec![0u8; msg.len() * 2];
        encoder.encode(&msg, &mut encoded);

        // Erase every 5th symbol and flip every 61st
        let soft: Vec<SoftBit> = encoded
            .iter()
            .enumerate()
            .map(|(i, &b)| {
                if i % 5 == 0 {
                    0
                } else if i % 61 == 0 {
                    if b != 0 { -4 } else { 4 }
                } else if b != 0 {
                    4
                } else {
                    -4
                }
            })
            .collect();
        let decoded = GsmViterbiDecoder::new().decode(&soft);
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_soft_bit_quantization() {
        assert_eq!(soft_bit(0.0), -4);
        assert_eq!(soft_bit(1.0), 4);
        assert_eq!(soft_bit(0.5), 0);
        assert!(soft_bit(0.75) > 0);
        assert!(soft_bit(0.25) < 0);
    }
}
