//! PEM encode/decode for the raw 32-byte Ed25519 key halves.
//!
//! Block types are `OKTSEC ED25519 PUBLIC KEY` / `OKTSEC ED25519 PRIVATE KEY`.
//! Bytes inside are the raw key, not a DER/SPKI wrapper.

use crate::error::IdentityError;

pub const PUBLIC_TAG: &str = "OKTSEC ED25519 PUBLIC KEY";
pub const PRIVATE_TAG: &str = "OKTSEC ED25519 PRIVATE KEY";

pub fn encode(tag: &str, raw: &[u8; 32]) -> String {
    let p = pem::Pem::new(tag.to_string(), raw.to_vec());
    pem::encode(&p)
}

pub fn decode(tag: &str, data: &str) -> Result<[u8; 32], IdentityError> {
    let parsed = pem::parse(data).map_err(|_| IdentityError::MalformedPem(tag.to_string()))?;
    if parsed.tag() != tag {
        return Err(IdentityError::WrongBlockType {
            found: parsed.tag().to_string(),
            expected: tag.to_string(),
        });
    }
    let contents = parsed.contents();
    if contents.len() != 32 {
        return Err(IdentityError::WrongKeyLength(contents.len()));
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(contents);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_public_key() {
        let raw = [7u8; 32];
        let pem = encode(PUBLIC_TAG, &raw);
        assert!(pem.contains("OKTSEC ED25519 PUBLIC KEY"));
        let back = decode(PUBLIC_TAG, &pem).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn rejects_wrong_block_type() {
        let raw = [1u8; 32];
        let pem = encode(PRIVATE_TAG, &raw);
        assert!(decode(PUBLIC_TAG, &pem).is_err());
    }
}
