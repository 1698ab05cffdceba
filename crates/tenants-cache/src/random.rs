//! Random helpers shared by the synthesizer and the lookup paths.

use rand::Rng;
use uuid::Uuid;

/// Rate of the exponential draw used by [`exp_index`]. The mean index sits at `n / EXP_DECAY`.
const EXP_DECAY: f64 = 4.0;

/// Number of trailing characters replaced by [`bound_id`].
const BOUND_SUFFIX_LEN: usize = 12;

/// Distinct suffixes [`bound_id`] can write into its 12 digits.
pub const MAX_BOUND_CARDINALITY: u64 = 1_000_000_000_000;

/// Generate a random UUID v4 using the provided RNG.
pub fn uuid_v4<R: Rng + ?Sized>(rng: &mut R) -> Uuid {
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);

    // Set version (4) and variant (RFC 4122) bits
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    Uuid::from_bytes(bytes)
}

/// Index in `[0, n)` drawn from a truncated exponential distribution.
///
/// Low indices are the most likely, so lists appended oldest-first are read
/// with a bias toward their oldest entries.
pub fn exp_index<R: Rng + ?Sized>(rng: &mut R, n: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    loop {
        let u: f64 = rng.gen();
        let sample = -(1.0 - u).ln() / EXP_DECAY;
        let idx = (sample * n as f64) as usize;
        if idx < n {
            return idx;
        }
    }
}

/// Replace the last 12 characters of `uuid` with `draw`, zero-padded.
///
/// Draws past [`MAX_BOUND_CARDINALITY`] wrap so the result keeps the input length.
pub fn bound_id(uuid: &str, draw: u64) -> String {
    let cut = uuid
        .char_indices()
        .rev()
        .nth(BOUND_SUFFIX_LEN - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    format!("{}{:012}", &uuid[..cut], draw % MAX_BOUND_CARDINALITY)
}
