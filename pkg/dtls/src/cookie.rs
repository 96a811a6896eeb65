use std::sync::{Arc, RwLock};

use bytes::Bytes;

use crate::crypto::{hmac_sha256, secure_random_bytes};
use crate::handshake::ClientHello;

/// Stateless cookie source for HelloVerifyRequest (RFC 6347 4.2.1).
///
/// cookie = HMAC(secret, peer_address || version || random || session_id
///                       || cipher_suites || compression_methods)
///
/// The secret is process wide and generated at startup. `rotate()` installs
/// a fresh secret while keeping the previous one acceptable, so handshakes
/// that received a cookie just before the rotation still verify.
///
/// Cheap to clone; clones share the same secrets.
#[derive(Clone)]
pub struct CookieGenerator {
    secrets: Arc<RwLock<Secrets>>,
}

struct Secrets {
    current: [u8; 32],
    previous: Option<[u8; 32]>,
}

impl CookieGenerator {
    pub fn new() -> Self {
        let mut current = [0u8; 32];
        secure_random_bytes(&mut current);

        Self {
            secrets: Arc::new(RwLock::new(Secrets {
                current,
                previous: None,
            })),
        }
    }

    /// Replaces the secret. Cookies issued under the old secret stay valid
    /// until the next rotation.
    pub fn rotate(&self) {
        let mut secrets = self.secrets.write().unwrap();
        let old = secrets.current;
        secure_random_bytes(&mut secrets.current);
        secrets.previous = Some(old);
    }

    pub fn generate(&self, peer: &str, hello: &ClientHello) -> Bytes {
        let secrets = self.secrets.read().unwrap();
        Bytes::from(compute_cookie(&secrets.current, peer, hello))
    }

    /// Recomputes the cookie and compares against what the client echoed.
    /// A mismatch is not fatal; the caller answers with a fresh
    /// HelloVerifyRequest.
    pub fn verify(&self, peer: &str, hello: &ClientHello) -> bool {
        if hello.cookie.is_empty() {
            return false;
        }

        let secrets = self.secrets.read().unwrap();
        if compute_cookie(&secrets.current, peer, hello)[..] == hello.cookie[..] {
            return true;
        }

        if let Some(previous) = &secrets.previous {
            return compute_cookie(previous, peer, hello)[..] == hello.cookie[..];
        }

        false
    }
}

fn compute_cookie(secret: &[u8], peer: &str, hello: &ClientHello) -> Vec<u8> {
    let mut suites = vec![];
    for s in hello.cipher_suites.iter() {
        s.serialize(&mut suites);
    }

    hmac_sha256(
        secret,
        &[
            peer.as_bytes(),
            &[hello.client_version.major, hello.client_version.minor],
            &hello.random,
            &hello.session_id,
            &suites,
            &hello.compression_methods,
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher_suite::CipherSuite;
    use crate::handshake::DTLS_1_2;

    fn hello(cookie: Bytes) -> ClientHello {
        ClientHello {
            client_version: DTLS_1_2,
            random: Bytes::from(vec![3u8; 32]),
            session_id: Bytes::new(),
            cookie,
            cipher_suites: vec![CipherSuite::TLS_PSK_WITH_AES_128_CCM_8],
            compression_methods: Bytes::from_static(&[0]),
            extensions: vec![],
        }
    }

    #[test]
    fn deterministic_for_identical_hellos() {
        let cookies = CookieGenerator::new();
        let a = cookies.generate("192.0.2.1:5684", &hello(Bytes::new()));
        let b = cookies.generate("192.0.2.1:5684", &hello(Bytes::new()));
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn bound_to_peer_address() {
        let cookies = CookieGenerator::new();
        let a = cookies.generate("192.0.2.1:5684", &hello(Bytes::new()));
        let b = cookies.generate("192.0.2.2:5684", &hello(Bytes::new()));
        assert_ne!(a, b);
    }

    #[test]
    fn verify_accepts_echoed_cookie() {
        let cookies = CookieGenerator::new();
        let cookie = cookies.generate("peer", &hello(Bytes::new()));
        assert!(cookies.verify("peer", &hello(cookie.clone())));
        assert!(!cookies.verify("other-peer", &hello(cookie)));
        assert!(!cookies.verify("peer", &hello(Bytes::from_static(&[1, 2, 3]))));
        assert!(!cookies.verify("peer", &hello(Bytes::new())));
    }

    #[test]
    fn previous_secret_survives_one_rotation() {
        let cookies = CookieGenerator::new();
        let cookie = cookies.generate("peer", &hello(Bytes::new()));

        cookies.rotate();
        assert!(cookies.verify("peer", &hello(cookie.clone())));

        cookies.rotate();
        assert!(!cookies.verify("peer", &hello(cookie)));
    }
}
