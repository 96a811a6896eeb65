use std::collections::HashMap;

use bytes::Bytes;
use p256::ecdsa::{SigningKey, VerifyingKey};

use crate::cipher_suite::CipherSuite;
use crate::crypto::spki_from_signing_key;
use crate::error::Result;
use crate::extensions::NamedCurve;
use crate::handshake::Certificate;

/// Validates a client's Certificate message against the configured trust
/// anchors and extracts the end-entity public key.
///
/// Certificate stores and path building live outside the handshake core;
/// this is the narrow interface it consumes them through.
pub trait ClientCertificateVerifier: Send + Sync {
    fn verify(&self, certificate: &Certificate) -> Result<VerifyingKey>;
}

/// The server's own identity: an X.509 chain (end-entity first) and the
/// matching ECDSA key. The SubjectPublicKeyInfo used in raw_public_key mode
/// is derived from the key.
pub struct CertificateCredentials {
    pub chain: Vec<Bytes>,
    pub raw_public_key: Bytes,
    pub private_key: SigningKey,
}

impl CertificateCredentials {
    pub fn new(private_key: SigningKey, chain: Vec<Bytes>) -> Self {
        let raw_public_key = spki_from_signing_key(&private_key);
        Self {
            chain,
            raw_public_key,
            private_key,
        }
    }
}

/// Configuration for how the server negotiates handshakes. Injected into
/// every `ServerHandshake`; shared and read-only while handshakes run.
pub struct ServerOptions {
    /// When true (and the negotiated key exchange is not PSK), the server
    /// sends a CertificateRequest and refuses to finish the handshake
    /// without a verified client certificate.
    pub client_authentication_required: bool,

    /// Certificate and key used for ECDHE_ECDSA suites. Without them only
    /// the PSK suite is negotiable.
    pub credentials: Option<CertificateCredentials>,

    /// Trust anchors for client certificates.
    pub trust_anchors: Option<Box<dyn ClientCertificateVerifier>>,

    /// DER encoded distinguished names advertised in CertificateRequest.
    pub certificate_authorities: Vec<Bytes>,

    /// Preshared keys by identity.
    pub preshared_keys: HashMap<String, Bytes>,

    pub supported_cipher_suites: Vec<CipherSuite>,
    pub supported_curves: Vec<NamedCurve>,
}

impl ServerOptions {
    pub fn recommended() -> Self {
        Self {
            client_authentication_required: false,
            credentials: None,
            trust_anchors: None,
            certificate_authorities: vec![],
            preshared_keys: HashMap::new(),
            supported_cipher_suites: vec![
                CipherSuite::TLS_PSK_WITH_AES_128_CCM_8,
                CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8,
                // Listed as supported but never selected during negotiation.
                CipherSuite::SSL_NULL_WITH_NULL_NULL,
            ],
            supported_curves: vec![NamedCurve::secp256r1],
        }
    }
}
