use bytes::Bytes;

// 'Implementations MUST NOT send zero-length fragments of Handshake,
// Alert, or ChangeCipherSpec content types.'

/*
struct {
    ContentType type;
    ProtocolVersion version;
    uint16 epoch;                // DTLS field
    uint48 sequence_number;      // DTLS field
    uint16 length;
    opaque fragment[DTLSPlaintext.length];
} DTLSPlaintext;
*/

dtls_enum_u8!(ContentType => {
    invalid(0),
    change_cipher_spec(20),
    alert(21),
    handshake(22),
    application_data(23),
    (255)
});

/// One decrypted record as handed over by the record layer.
///
/// Framing, decryption and replay filtering have already happened; the
/// handshake core only sees the plaintext fragment together with the epoch
/// and sequence number it arrived under.
#[derive(Debug, Clone)]
pub struct Record {
    pub typ: ContentType,
    pub epoch: u16,
    pub sequence: u64,
    pub fragment: Bytes,
}

impl Record {
    pub fn new(typ: ContentType, epoch: u16, sequence: u64, fragment: Bytes) -> Self {
        Self {
            typ,
            epoch,
            sequence,
            fragment,
        }
    }
}
