use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Opaque bearer token for sessions and password resets
///
/// 32 random bytes, URL-safe base64 without padding (43 characters).
pub fn generate_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes)
        .map_err(|e| anyhow!("Failed to generate token: {}", e))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}
