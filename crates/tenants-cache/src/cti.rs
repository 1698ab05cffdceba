//! Random CTI (classification) entities.

use crate::model::CtiEntity;
use crate::random::uuid_v4;
use rand::Rng;

pub const CTI_PREFIX: &str = "cti.a.p.";
pub const CTI_SUFFIX: &str = ".v1.0";
pub const CTI_MIN_BODY: usize = 8;
pub const CTI_MAX_BODY: usize = 48;

const CTI_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789_.";

/// Classification string: constant prefix, random body, version suffix.
pub fn random_cti<R: Rng + ?Sized>(rng: &mut R) -> String {
    let len = rng.gen_range(CTI_MIN_BODY..=CTI_MAX_BODY);
    let mut cti = String::with_capacity(CTI_PREFIX.len() + len + CTI_SUFFIX.len());
    cti.push_str(CTI_PREFIX);
    cti.extend((0..len).map(|_| CTI_ALPHABET[rng.gen_range(0..CTI_ALPHABET.len())] as char));
    cti.push_str(CTI_SUFFIX);
    cti
}

pub fn random_cti_entity<R: Rng + ?Sized>(rng: &mut R) -> CtiEntity {
    CtiEntity {
        uuid: uuid_v4(rng).to_string(),
        cti: random_cti(rng),
        is_final: rng.gen_bool(0.5),
    }
}
