use bytes::Bytes;

use crate::cipher_suite::CipherSuite;

/// Raw key material for both directions as derived from the master secret
/// (RFC 5246 6.3).
#[derive(Debug)]
pub struct KeyBlock {
    pub client_write_mac_key: Bytes,
    pub server_write_mac_key: Bytes,
    pub client_write_key: Bytes,
    pub server_write_key: Bytes,
    pub client_write_iv: Bytes,
    pub server_write_iv: Bytes,
}

/// Key material for one direction of the connection, handed to the record
/// layer when an epoch boundary is crossed.
#[derive(Debug, Clone)]
pub struct CipherEndpointSpec {
    pub suite: CipherSuite,
    pub mac_key: Bytes,
    pub key: Bytes,
    pub iv: Bytes,
}

/// The handshake core's view of the record layer.
///
/// The core never encrypts anything itself. It derives key material and
/// commands the record layer to start using it: the read state right after a
/// valid ChangeCipherSpec from the peer, the write state right before its own
/// ChangeCipherSpec goes out. `epoch` is the epoch the keys apply to.
pub trait RecordProtection: Send {
    fn install_read_state(&mut self, epoch: u16, spec: CipherEndpointSpec);
    fn install_write_state(&mut self, epoch: u16, spec: CipherEndpointSpec);
}
