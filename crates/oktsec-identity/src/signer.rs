use crate::error::IdentityError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};

/// Holds one agent's private key and signs canonical message payloads.
pub struct Signer {
    key: SigningKey,
}

impl Signer {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// Signs `payload` (the canonical `from\nto\ncontent\ntimestamp` bytes),
    /// returning standard Base64 of the 64-byte Ed25519 signature.
    pub fn sign(&self, payload: &[u8]) -> String {
        let sig: Signature = self.key.sign(payload);
        STANDARD.encode(sig.to_bytes())
    }
}

/// Verifies a Base64 signature over `payload` against `public_key`.
pub fn verify(public_key: &VerifyingKey, payload: &[u8], signature_b64: &str) -> Result<(), IdentityError> {
    let raw = STANDARD
        .decode(signature_b64)
        .map_err(|_| IdentityError::InvalidSignatureEncoding)?;
    let sig = Signature::from_slice(&raw).map_err(|_| IdentityError::InvalidSignatureEncoding)?;
    public_key
        .verify(payload, &sig)
        .map_err(|_| IdentityError::SignatureMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn sign_then_verify_round_trips() {
        let key = SigningKey::generate(&mut OsRng);
        let verifying = key.verifying_key();
        let signer = Signer::new(key);
        let payload = b"a\nb\nhello\n2026-01-01T00:00:00Z";
        let sig = signer.sign(payload);
        assert!(verify(&verifying, payload, &sig).is_ok());
    }

    #[test]
    fn verify_fails_on_tampered_payload() {
        let key = SigningKey::generate(&mut OsRng);
        let verifying = key.verifying_key();
        let signer = Signer::new(key);
        let sig = signer.sign(b"a\nb\nhello\n2026-01-01T00:00:00Z");
        assert!(verify(&verifying, b"a\nb\ntampered\n2026-01-01T00:00:00Z", &sig).is_err());
    }

    #[test]
    fn verify_fails_on_wrong_key() {
        let key = SigningKey::generate(&mut OsRng);
        let other = SigningKey::generate(&mut OsRng).verifying_key();
        let signer = Signer::new(key);
        let payload = b"a\nb\nhello\n2026-01-01T00:00:00Z";
        let sig = signer.sign(payload);
        assert!(verify(&other, payload, &sig).is_err());
    }
}
