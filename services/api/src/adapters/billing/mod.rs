//! services/api/src/adapters/billing/mod.rs
//!
//! Payment-gateway adapters implementing the `BillingGateway` port, plus the
//! shared HMAC-SHA256 signature helpers the webhook paths rely on.

pub mod crypto;
pub mod stripe;
pub mod yookassa;

pub use crypto::CryptoGateway;
pub use stripe::StripeGateway;
pub use yookassa::YookassaGateway;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of `payload` under `secret`.
pub fn hmac_sha256_hex(secret: &[u8], payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret)
        .expect("HMAC accepts keys of any length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time verification of a hex-encoded HMAC-SHA256 signature.
pub fn verify_hmac_sha256_hex(secret: &[u8], payload: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let mut mac = HmacSha256::new_from_slice(secret)
        .expect("HMAC accepts keys of any length");
    mac.update(payload);
    mac.verify_slice(&signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_signature_verifies() {
        let secret = b"ipn-secret";
        let body = br#"{"order_id":"abc","status":"completed"}"#;
        let signature = hmac_sha256_hex(secret, body);
        assert!(verify_hmac_sha256_hex(secret, body, &signature));
    }

    #[test]
    fn tampered_body_fails_verification() {
        let secret = b"ipn-secret";
        let body = br#"{"order_id":"abc","status":"completed"}"#;
        let signature = hmac_sha256_hex(secret, body);
        let tampered = br#"{"order_id":"abc","status":"refunded"}"#;
        assert!(!verify_hmac_sha256_hex(secret, tampered, &signature));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let body = b"payload";
        let signature = hmac_sha256_hex(b"secret-a", body);
        assert!(!verify_hmac_sha256_hex(b"secret-b", body, &signature));
    }

    #[test]
    fn garbage_signature_fails_verification() {
        assert!(!verify_hmac_sha256_hex(b"secret", b"payload", "not-hex"));
        assert!(!verify_hmac_sha256_hex(b"secret", b"payload", ""));
    }
}
