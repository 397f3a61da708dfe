//! Device-identity generation
//!
//! These values substitute for hardware identity, so they come from OS
//! randomness rather than anything time-seeded.

use rand::RngCore;
use serde::Serialize;
use uuid::Uuid;

use crate::constants::identity;

/// One coherent set of device identifiers.
///
/// All four fields are regenerated together; the engine never rewrites one
/// in isolation, and a set is never reused across resets.
#[derive(Debug, Clone, Serialize)]
pub struct IdentitySet {
    /// Hex-encoded "auth0|user_" prefix followed by random hex, decoding
    /// to exactly 32 bytes
    pub machine_id: String,
    /// Lowercase hyphenated v4 UUID
    pub mac_machine_id: String,
    /// Lowercase hyphenated v4 UUID
    pub dev_device_id: String,
    /// Uppercase v4 UUID wrapped in braces
    pub sqm_id: String,
}

impl IdentitySet {
    /// Generate a fresh identity set. Never fails.
    pub fn generate() -> Self {
        let prefix_hex = hex::encode(identity::MACHINE_ID_PREFIX);
        let random_len = identity::MACHINE_ID_BYTES - identity::MACHINE_ID_PREFIX.len();
        let mut random = vec![0u8; random_len];
        rand::rng().fill_bytes(&mut random);
        let machine_id = format!("{prefix_hex}{}", hex::encode(&random));

        IdentitySet {
            machine_id,
            mac_machine_id: Uuid::new_v4().to_string(),
            dev_device_id: Uuid::new_v4().to_string(),
            sqm_id: format!("{{{}}}", Uuid::new_v4().to_string().to_uppercase()),
        }
    }
}
