use sha2::{Digest, Sha256};

/// Stores all handshake messages seen as part of the handshake, in wire
/// order and single-fragment form.
///
/// Two views are maintained over the same coverage: a rolling SHA-256 for the
/// Finished computations, and the raw concatenated bytes which the
/// CertificateVerify signature is taken over. `digest()` snapshots the
/// rolling state, so the server can verify the client's Finished against the
/// transcript as it stood before that message and then keep absorbing.
pub struct Transcript {
    digest: Sha256,
    raw: Vec<u8>,
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            digest: Sha256::new(),
            raw: vec![],
        }
    }

    pub fn push(&mut self, message: &[u8]) {
        self.digest.update(message);
        self.raw.extend_from_slice(message);
    }

    /// Hash of all messages pushed so far. Does not disturb the rolling
    /// state.
    pub fn digest(&self) -> [u8; 32] {
        self.digest.clone().finalize().into()
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_matches_raw_bytes() {
        let mut t = Transcript::new();
        t.push(b"first message");
        t.push(b"second message");

        let direct: [u8; 32] = Sha256::digest(t.raw_bytes()).into();
        assert_eq!(t.digest(), direct);
    }

    #[test]
    fn digest_is_a_snapshot() {
        let mut t = Transcript::new();
        t.push(b"before");

        let before = t.digest();
        t.push(b"after");
        let after = t.digest();

        assert_ne!(before, after);

        let direct: [u8; 32] = Sha256::digest(b"before").into();
        assert_eq!(before, direct);
    }
}
