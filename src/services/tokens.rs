//! Random credentials: session tokens, confirmation identifiers, OTP codes

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use rand::{rngs::OsRng, Rng, RngCore};
use uuid::Uuid;

const SESSION_TOKEN_BYTES: usize = 32;
const OTP_DIGITS: u32 = 6;

/// 32 random bytes, URL-safe base64
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE.encode(bytes)
}

/// Identifier embedded in the activation link
pub fn generate_confirmation() -> String {
    Uuid::new_v4().to_string()
}

/// Zero-padded numeric one-time password
pub fn generate_otp() -> String {
    let max = 10u32.pow(OTP_DIGITS);
    let code = OsRng.gen_range(0..max);
    format!("{:0width$}", code, width = OTP_DIGITS as usize)
}

/// Compare two secrets without short-circuiting on the first differing byte
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
