use crate::error::{Error, Result};

dtls_enum_u16!(
    /// The suites this server knows how to negotiate. Anything else offered
    /// by a client is carried as 'unknown' and skipped during selection.
    CipherSuite => {
    SSL_NULL_WITH_NULL_NULL = 0x0000,
    TLS_PSK_WITH_AES_128_CCM_8 = 0xC0A8,
    TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8 = 0xC0AE,
    (65535)
});

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyExchangeAlgorithm {
    Null,
    Psk,
    EcDiffieHellman,
}

/// Record protection parameters of one suite. The record layer consumes the
/// sizes when splitting the key block; the handshake core only needs the key
/// exchange algorithm.
#[derive(Clone, Copy, Debug)]
pub struct CipherSuiteParams {
    pub suite: CipherSuite,
    pub key_exchange: KeyExchangeAlgorithm,
    pub mac_key_length: usize,
    pub enc_key_length: usize,
    pub fixed_iv_length: usize,
}

impl CipherSuite {
    pub fn decode(&self) -> Result<CipherSuiteParams> {
        Ok(match self {
            // AEAD suites carry no separate MAC key; AES-128-CCM-8 uses a
            // 16 byte key and a 4 byte implicit nonce part (RFC 6655).
            CipherSuite::TLS_PSK_WITH_AES_128_CCM_8 => CipherSuiteParams {
                suite: *self,
                key_exchange: KeyExchangeAlgorithm::Psk,
                mac_key_length: 0,
                enc_key_length: 16,
                fixed_iv_length: 4,
            },
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8 => CipherSuiteParams {
                suite: *self,
                key_exchange: KeyExchangeAlgorithm::EcDiffieHellman,
                mac_key_length: 0,
                enc_key_length: 16,
                fixed_iv_length: 4,
            },
            CipherSuite::SSL_NULL_WITH_NULL_NULL => CipherSuiteParams {
                suite: *self,
                key_exchange: KeyExchangeAlgorithm::Null,
                mac_key_length: 0,
                enc_key_length: 0,
                fixed_iv_length: 0,
            },
            _ => {
                return Err(Error::Internal("Bad cipher suite"));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suite_codes() {
        assert_eq!(CipherSuite::TLS_PSK_WITH_AES_128_CCM_8.to_u16(), 0xC0A8);
        assert_eq!(
            CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8.to_u16(),
            0xC0AE
        );
        assert_eq!(CipherSuite::from_u16(0x1301), CipherSuite::unknown(0x1301));
    }

    #[test]
    fn ccm8_sizes() {
        let params = CipherSuite::TLS_PSK_WITH_AES_128_CCM_8.decode().unwrap();
        assert_eq!(params.key_exchange, KeyExchangeAlgorithm::Psk);
        assert_eq!(params.enc_key_length, 16);
        assert_eq!(params.fixed_iv_length, 4);
        assert_eq!(params.mac_key_length, 0);
    }
}
