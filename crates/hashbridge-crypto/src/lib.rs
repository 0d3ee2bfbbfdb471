//! hashbridge-crypto
//!
//! Hashlock / preimage binding.
//!
//! The canonical binding is `hashlock = sha256(preimage)` over the raw
//! 32-byte preimage. Whether any on-chain contract actually wants
//! `keccak256(utf8(secret))` on some path is an open question; until
//! that's confirmed against the live contracts this crate deliberately
//! exposes only the sha256 path so a silent wrong guess can't ship — see
//! `DESIGN.md` for the recorded decision.

use sha2::{Digest, Sha256};

use hashbridge_core::types::{Hashlock, Preimage};

/// `sha256(preimage)` — the canonical hashlock binding.
pub fn hash_preimage(preimage: &Preimage) -> Hashlock {
    let mut hasher = Sha256::new();
    hasher.update(preimage.0);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    Hashlock(out)
}

/// Generate a fresh `(preimage, hashlock)` pair: 32 uniformly random bytes
/// and their sha256.
pub fn generate() -> (Preimage, Hashlock) {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    let preimage = Preimage(bytes);
    let hashlock = hash_preimage(&preimage);
    (preimage, hashlock)
}

/// Constant-time-ish equality check between a freshly-hashed preimage and
/// a recorded hashlock. Constant time is preferred but not required; this
/// compares every byte regardless of early mismatch so timing does not
/// leak the position of the first differing byte.
pub fn verify(preimage: &Preimage, hashlock: &Hashlock) -> bool {
    let computed = hash_preimage(preimage);
    let mut diff = 0u8;
    for (a, b) in computed.0.iter().zip(hashlock.0.iter()) {
        diff |= a ^ b;
    }
    diff == 0
}
