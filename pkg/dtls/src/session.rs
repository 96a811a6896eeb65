use bytes::Bytes;

use crate::cipher_suite::CipherSuite;
use crate::handshake::{ProtocolVersion, DTLS_1_2};

/// Parameters negotiated with one peer.
///
/// Owned by the handshake while it runs; once `active` flips the record
/// layer takes over and the handshake context is gone.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: Bytes,
    pub protocol_version: ProtocolVersion,
    pub cipher_suite: CipherSuite,
    pub compression_method: u8,
    pub master_secret: Bytes,
    pub client_random: Bytes,
    pub server_random: Bytes,
    pub read_epoch: u16,
    pub write_epoch: u16,
    pub send_raw_public_key: bool,
    pub receive_raw_public_key: bool,
    /// False until the server's own Finished has been placed on the wire.
    pub active: bool,
}

impl Session {
    pub fn new() -> Self {
        Self {
            session_id: Bytes::new(),
            protocol_version: DTLS_1_2,
            cipher_suite: CipherSuite::SSL_NULL_WITH_NULL_NULL,
            compression_method: 0,
            master_secret: Bytes::new(),
            client_random: Bytes::new(),
            server_random: Bytes::new(),
            read_epoch: 0,
            write_epoch: 0,
            send_raw_public_key: false,
            receive_raw_public_key: false,
            active: false,
        }
    }
}
