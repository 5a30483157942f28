//! Pending action tokens
//!
//! Opaque one-shot values for email confirmation and password reset, drawn
//! from the operating system CSPRNG.

use rand::RngCore;
use rand::rngs::OsRng;

/// Number of random bytes behind each token
pub const TOKEN_BYTES: usize = 32;

/// Generate a fresh token: 32 random bytes, hex-encoded (64 characters)
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
