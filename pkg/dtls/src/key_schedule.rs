// Key derivation for the TLS 1.2 PRF as used by DTLS 1.2.

use bytes::Bytes;

use crate::cipher::{CipherEndpointSpec, KeyBlock};
use crate::cipher_suite::CipherSuiteParams;
use crate::crypto::hmac_sha256;

// Valid for all the supported suites.
const VERIFY_DATA_LENGTH: usize = 12;
const MASTER_SECRET_LENGTH: usize = 48;

pub struct KeySchedule {
    params: CipherSuiteParams,
    master_secret: Vec<u8>,
    key_block: KeyBlock,
}

impl KeySchedule {
    pub fn create(
        params: CipherSuiteParams,
        pre_master_secret: &[u8],
        client_random: &[u8],
        server_random: &[u8],
    ) -> Self {
        let master_secret = master_secret(pre_master_secret, client_random, server_random);

        let key_block = key_block(
            &master_secret,
            client_random,
            server_random,
            params.mac_key_length,
            params.enc_key_length,
            params.fixed_iv_length,
        );

        Self {
            params,
            master_secret,
            key_block,
        }
    }

    pub fn master_secret(&self) -> &[u8] {
        &self.master_secret
    }

    pub fn client_cipher_spec(&self) -> CipherEndpointSpec {
        CipherEndpointSpec {
            suite: self.params.suite,
            mac_key: self.key_block.client_write_mac_key.clone(),
            key: self.key_block.client_write_key.clone(),
            iv: self.key_block.client_write_iv.clone(),
        }
    }

    pub fn server_cipher_spec(&self) -> CipherEndpointSpec {
        CipherEndpointSpec {
            suite: self.params.suite,
            mac_key: self.key_block.server_write_mac_key.clone(),
            key: self.key_block.server_write_key.clone(),
            iv: self.key_block.server_write_iv.clone(),
        }
    }

    /// The transcript hash must cover all handshake messages up to and
    /// including the last message before the client's Finished (usually the
    /// ClientKeyExchange or CertificateVerify).
    pub fn verify_data_client(&self, transcript_hash: &[u8]) -> Vec<u8> {
        prf(
            &self.master_secret,
            b"client finished",
            transcript_hash,
            VERIFY_DATA_LENGTH,
        )
    }

    /// The transcript hash must additionally cover the Finished message from
    /// the client.
    pub fn verify_data_server(&self, transcript_hash: &[u8]) -> Vec<u8> {
        prf(
            &self.master_secret,
            b"server finished",
            transcript_hash,
            VERIFY_DATA_LENGTH,
        )
    }
}

/// master_secret = PRF(pre_master_secret, "master secret",
///     ClientHello.random + ServerHello.random)
///     [0..47];
fn master_secret(pre_master_secret: &[u8], client_random: &[u8], server_random: &[u8]) -> Vec<u8> {
    let mut seed = client_random.to_vec();
    seed.extend_from_slice(server_random);
    prf(
        pre_master_secret,
        b"master secret",
        &seed,
        MASTER_SECRET_LENGTH,
    )
}

/// key_block = PRF(SecurityParameters.master_secret,
///     "key expansion",
///     SecurityParameters.server_random +
///     SecurityParameters.client_random);
fn key_block(
    master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
    mac_key_length: usize,
    enc_key_length: usize,
    fixed_iv_length: usize,
) -> KeyBlock {
    let block_size = 2 * (mac_key_length + enc_key_length + fixed_iv_length);

    let mut seed = server_random.to_vec();
    seed.extend_from_slice(client_random);

    let mut block = Bytes::from(prf(master_secret, b"key expansion", &seed, block_size));

    let client_write_mac_key = block.split_to(mac_key_length);
    let server_write_mac_key = block.split_to(mac_key_length);

    let client_write_key = block.split_to(enc_key_length);
    let server_write_key = block.split_to(enc_key_length);

    let client_write_iv = block.split_to(fixed_iv_length);
    let server_write_iv = block.split_to(fixed_iv_length);

    assert_eq!(block.len(), 0);

    KeyBlock {
        client_write_mac_key,
        server_write_mac_key,
        client_write_key,
        server_write_key,
        client_write_iv,
        server_write_iv,
    }
}

/// Standard TLS 1.2 PRF with SHA-256 (none of the supported suites override
/// the PRF hash).
///
/// PRF(secret, label, seed) = P_SHA256(secret, label + seed)
pub(crate) fn prf(secret: &[u8], label: &[u8], seed: &[u8], output_size: usize) -> Vec<u8> {
    let mut data = label.to_vec();
    data.extend_from_slice(seed);

    p_hash(secret, &data, output_size)
}

/// Defined in the TLS 1.2 RFC as:
///
/// P_hash(secret, seed) =
///     HMAC_hash(secret, A(1) + seed) +
///     HMAC_hash(secret, A(2) + seed) +
///     HMAC_hash(secret, A(3) + seed) + ...
///
/// where A(0) = seed and A(i) = HMAC_hash(secret, A(i-1)).
fn p_hash(secret: &[u8], seed: &[u8], output_size: usize) -> Vec<u8> {
    let mut a = seed.to_vec();

    let mut out = vec![];
    while out.len() < output_size {
        a = hmac_sha256(secret, &[&a]);
        out.extend_from_slice(&hmac_sha256(secret, &[&a, seed]));
    }

    out.truncate(output_size);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher_suite::CipherSuite;

    #[test]
    fn prf_sha256_test_vector() {
        // Widely used PRF test vector from the TLS working group.
        let secret = hex::decode("9bbe436ba940f017b17652849a71db35").unwrap();
        let seed = hex::decode("a0ba9f936cda311827a6f796ffd5198c").unwrap();

        let out = prf(&secret, b"test label", &seed, 100);
        assert_eq!(
            out,
            hex::decode(
                "e3f229ba727be17b8d122620557cd453c2aab21d07c3d495329b52d4e61edb5a\
                 6b301791e90d35c9c9a46b4e14baf9af0fa022f7077def17abfd3797c0564bab\
                 4fbc91666e9def9b97fce34f796789baa48082d122ee42c5a72e5a5110fff701\
                 87347b66"
            )
            .unwrap()
        );
    }

    #[test]
    fn master_secret_is_48_bytes() {
        let ms = master_secret(&[1, 2, 3], &[4u8; 32], &[5u8; 32]);
        assert_eq!(ms.len(), 48);
    }

    #[test]
    fn key_block_split_for_ccm8() {
        let params = CipherSuite::TLS_PSK_WITH_AES_128_CCM_8.decode().unwrap();
        let ks = KeySchedule::create(params, &[0u8; 32], &[1u8; 32], &[2u8; 32]);

        let client = ks.client_cipher_spec();
        let server = ks.server_cipher_spec();

        assert_eq!(client.mac_key.len(), 0);
        assert_eq!(client.key.len(), 16);
        assert_eq!(client.iv.len(), 4);
        assert_ne!(client.key, server.key);
        assert_ne!(client.iv, server.iv);
    }

    #[test]
    fn verify_data_directions_differ() {
        let params = CipherSuite::TLS_PSK_WITH_AES_128_CCM_8.decode().unwrap();
        let ks = KeySchedule::create(params, &[0u8; 32], &[1u8; 32], &[2u8; 32]);

        let hash = [7u8; 32];
        let client = ks.verify_data_client(&hash);
        let server = ks.verify_data_server(&hash);

        assert_eq!(client.len(), 12);
        assert_eq!(server.len(), 12);
        assert_ne!(client, server);
    }
}
