//! Request signatures for the two venues whose coin-catalog endpoints
//! require authentication.

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signer, SigningKey};
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// HMAC-SHA256 signature over the query string, hex-encoded (Binance
/// convention).
#[must_use]
pub fn hmac_sha256_hex(message: &str, secret: &str) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Ed25519 signature over the query string, base64-encoded (Backpack
/// convention). The secret is the base64 form of a 64-byte keypair.
///
/// # Errors
/// Returns an error if the secret is not valid base64 or not a 64-byte
/// Ed25519 keypair.
pub fn ed25519_sign_base64(message: &str, secret_base64: &str) -> Result<String> {
    let bytes = BASE64
        .decode(secret_base64)
        .map_err(|e| anyhow!("invalid base64 secret key: {e}"))?;
    let keypair: [u8; 64] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow!("Ed25519 secret key must be 64 bytes, got {}", bytes.len()))?;
    let signing_key = SigningKey::from_keypair_bytes(&keypair)
        .map_err(|e| anyhow!("invalid Ed25519 keypair: {e}"))?;
    let signature = signing_key.sign(message.as_bytes());
    Ok(BASE64.encode(signature.to_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Verifier, VerifyingKey};

    #[test]
    fn test_hmac_sha256_known_vector() {
        // RFC 4231 test case 2.
        let signature = hmac_sha256_hex("what do ya want for nothing?", "Jefe");
        assert_eq!(
            signature,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_hmac_signature_is_hex() {
        let signature = hmac_sha256_hex("timestamp=1700000000000", "secret");
        assert_eq!(signature.len(), 64);
        assert!(signature.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_ed25519_round_trip() {
        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let secret = BASE64.encode(signing_key.to_keypair_bytes());

        let message = "timestamp=1700000000000&window=5000";
        let signature_b64 = ed25519_sign_base64(message, &secret).unwrap();

        let verifying_key = VerifyingKey::from(&signing_key);
        let signature_bytes: [u8; 64] = BASE64
            .decode(signature_b64)
            .unwrap()
            .try_into()
            .unwrap();
        let signature = ed25519_dalek::Signature::from_bytes(&signature_bytes);
        assert!(verifying_key.verify(message.as_bytes(), &signature).is_ok());
    }

    #[test]
    fn test_ed25519_rejects_wrong_length() {
        let secret = BASE64.encode([0u8; 32]);
        assert!(ed25519_sign_base64("msg", &secret).is_err());
    }

    #[test]
    fn test_ed25519_rejects_bad_base64() {
        assert!(ed25519_sign_base64("msg", "not base64 !!!").is_err());
    }
}
