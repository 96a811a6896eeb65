// Thin adapters around the cryptographic primitives the handshake needs.
// Everything here is synchronous; the state machine never blocks on I/O.

use bytes::Bytes;
use hmac::{Hmac, Mac};
use p256::ecdh::EphemeralSecret;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::{DecodePublicKey, EncodePublicKey};
use p256::PublicKey;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

pub fn secure_random_bytes(buf: &mut [u8]) {
    OsRng.fill_bytes(buf);
}

/// HMAC-SHA256 over a sequence of input slices.
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key size");
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().to_vec()
}

/// Server side ephemeral state for one ECDHE key exchange on secp256r1.
pub struct EcdheContext {
    secret: EphemeralSecret,
    public_point: Bytes,
}

impl EcdheContext {
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random(&mut OsRng);
        let public_point =
            Bytes::copy_from_slice(secret.public_key().to_encoded_point(false).as_bytes());
        Self {
            secret,
            public_point,
        }
    }

    /// The server's ephemeral public key in uncompressed form.
    pub fn public_point(&self) -> &Bytes {
        &self.public_point
    }

    /// Completes the exchange with the client's ephemeral point. The
    /// premaster secret is the X coordinate of the shared point, leading
    /// zeros preserved (32 bytes on this curve).
    pub fn compute_premaster(&self, peer_point: &[u8]) -> Result<Vec<u8>> {
        let peer = PublicKey::from_sec1_bytes(peer_point)
            .map_err(|_| Error::Decode("Invalid EC point"))?;

        let shared = self.secret.diffie_hellman(&peer);
        Ok(shared.raw_secret_bytes().to_vec())
    }
}

/// RFC 4279 2: the premaster secret of a plain PSK exchange is
/// uint16 length, that many zero bytes, uint16 length again, then the key.
pub fn psk_premaster_secret(psk: &[u8]) -> Vec<u8> {
    let len = psk.len() as u16;

    let mut out = vec![];
    out.extend_from_slice(&len.to_be_bytes());
    out.resize(out.len() + psk.len(), 0);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(psk);
    out
}

/// ECDSA over SHA-256 of the message, DER encoded as it appears on the wire.
pub fn sign_sha256_ecdsa(key: &SigningKey, message: &[u8]) -> Vec<u8> {
    let signature: Signature = key.sign(message);
    signature.to_der().as_bytes().to_vec()
}

pub fn verify_sha256_ecdsa(key: &VerifyingKey, message: &[u8], signature_der: &[u8]) -> Result<()> {
    let signature = Signature::from_der(signature_der)
        .map_err(|_| Error::Decode("Malformed ECDSA signature"))?;

    key.verify(message, &signature)
        .map_err(|_| Error::Decode("ECDSA signature mismatch"))
}

/// Decodes a DER SubjectPublicKeyInfo into a P-256 verification key.
pub fn public_key_from_spki(der: &[u8]) -> Result<VerifyingKey> {
    VerifyingKey::from_public_key_der(der)
        .map_err(|_| Error::Decode("Unsupported SubjectPublicKeyInfo"))
}

/// Encodes the public half of a signing key as a DER SubjectPublicKeyInfo,
/// the body of a raw_public_key Certificate message.
pub fn spki_from_signing_key(key: &SigningKey) -> Bytes {
    let doc = key
        .verifying_key()
        .to_public_key_der()
        .expect("P-256 keys always encode");
    Bytes::copy_from_slice(doc.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_sha256_test_vector() {
        // RFC 4231 test case 2.
        let mac = hmac_sha256(b"Jefe", &[b"what do ya want ", b"for nothing?"]);
        assert_eq!(
            mac,
            hex::decode("5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843")
                .unwrap()
        );
    }

    #[test]
    fn ecdhe_shared_secret_agrees() {
        let server = EcdheContext::generate();
        let client = EcdheContext::generate();

        let a = server.compute_premaster(client.public_point()).unwrap();
        let b = client.compute_premaster(server.public_point()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn ecdhe_rejects_garbage_point() {
        let server = EcdheContext::generate();
        assert!(server.compute_premaster(&[0x04, 1, 2, 3]).is_err());
    }

    #[test]
    fn psk_premaster_layout() {
        let premaster = psk_premaster_secret(&[0xAA, 0xBB]);
        assert_eq!(premaster, vec![0, 2, 0, 0, 0, 2, 0xAA, 0xBB]);
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let key = SigningKey::random(&mut OsRng);
        let signature = sign_sha256_ecdsa(&key, b"signed bytes");

        let public = key.verifying_key();
        assert!(verify_sha256_ecdsa(public, b"signed bytes", &signature).is_ok());
        assert!(verify_sha256_ecdsa(public, b"other bytes", &signature).is_err());
    }

    #[test]
    fn spki_round_trip() {
        let key = SigningKey::random(&mut OsRng);
        let spki = spki_from_signing_key(&key);
        let public = public_key_from_spki(&spki).unwrap();
        assert_eq!(&public, key.verifying_key());
    }
}
