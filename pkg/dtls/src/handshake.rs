use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use crate::cipher_suite::CipherSuite;
use crate::crypto::secure_random_bytes;
use crate::error::{Error, Result};
use crate::extensions::*;
use crate::parsing::*;

// Big-endian network order.

// https://tools.ietf.org/html/rfc6347

pub const DTLS_1_2: ProtocolVersion = ProtocolVersion {
    major: 254,
    minor: 253,
};

pub const DTLS_1_0: ProtocolVersion = ProtocolVersion {
    major: 254,
    minor: 255,
};

/// DTLS versions are the one's complement of the TLS versions they mirror,
/// so a *numerically larger* encoding is an *older* version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl ProtocolVersion {
    pub fn parse(c: &mut Cursor) -> Result<Self> {
        let major = c.next_u8()?;
        let minor = c.next_u8()?;
        Ok(Self { major, minor })
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        out.push(self.major);
        out.push(self.minor);
    }

    pub fn older_than(&self, other: &ProtocolVersion) -> bool {
        (self.major, self.minor) > (other.major, other.minor)
    }
}

/// 32 bytes: a 4 byte unix timestamp followed by 28 random bytes
/// (RFC 5246 7.4.1.2).
pub fn generate_random() -> Bytes {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0);

    let mut buf = vec![0u8; 32];
    buf[0..4].copy_from_slice(&now.to_be_bytes());
    secure_random_bytes(&mut buf[4..]);
    Bytes::from(buf)
}

/*
struct {
    HandshakeType msg_type;
    uint24 length;
    uint16 message_seq;                               // DTLS field
    uint24 fragment_offset;                           // DTLS field
    uint24 fragment_length;                           // DTLS field
    select (HandshakeType) { ... } body;
} Handshake;
*/

dtls_enum_u8!(HandshakeType => {
    HelloRequest(0),
    ClientHello(1),
    ServerHello(2),
    HelloVerifyRequest(3),
    Certificate(11),
    ServerKeyExchange(12),
    CertificateRequest(13),
    ServerHelloDone(14),
    CertificateVerify(15),
    ClientKeyExchange(16),
    Finished(20),
    (255)
});

/// One wire fragment of a handshake message. `body` covers
/// `[fragment_offset, fragment_offset + fragment_length)` of a message of
/// `total_length` bytes.
#[derive(Debug, Clone)]
pub struct HandshakeFragment {
    pub msg_type: HandshakeType,
    pub total_length: u32,
    pub message_seq: u16,
    pub fragment_offset: u32,
    pub body: Bytes,
}

impl HandshakeFragment {
    pub fn parse(c: &mut Cursor) -> Result<Self> {
        let msg_type = HandshakeType::parse(c)?;
        let total_length = c.next_u24()?;
        let message_seq = c.next_u16()?;
        let fragment_offset = c.next_u24()?;
        let fragment_length = c.next_u24()?;
        let body = c.take_exact(fragment_length as usize)?;

        if fragment_offset
            .checked_add(fragment_length)
            .map(|end| end > total_length)
            .unwrap_or(true)
        {
            return Err(Error::Decode("Fragment exceeds message bounds"));
        }

        Ok(Self {
            msg_type,
            total_length,
            message_seq,
            fragment_offset,
            body,
        })
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        self.msg_type.serialize(out);
        serialize_u24(self.total_length, out);
        out.extend_from_slice(&self.message_seq.to_be_bytes());
        serialize_u24(self.fragment_offset, out);
        serialize_u24(self.body.len() as u32, out);
        out.extend_from_slice(&self.body);
    }

    pub fn is_whole(&self) -> bool {
        self.fragment_offset == 0 && self.body.len() == self.total_length as usize
    }
}

/// Serializes a message in single-fragment form (fragment_offset = 0,
/// fragment_length = length). This is also the form the transcript consumes:
/// the Finished MAC is computed as if each message had been sent unfragmented
/// (RFC 6347 4.2.6).
pub fn serialize_single_fragment(msg: &Handshake, message_seq: u16) -> Bytes {
    let mut body = vec![];
    msg.serialize_body(&mut body);

    let mut out = vec![];
    msg.msg_type().serialize(&mut out);
    serialize_u24(body.len() as u32, &mut out);
    out.extend_from_slice(&message_seq.to_be_bytes());
    serialize_u24(0, &mut out);
    serialize_u24(body.len() as u32, &mut out);
    out.extend_from_slice(&body);
    Bytes::from(out)
}

#[derive(Debug, Clone)]
pub enum Handshake {
    ClientHello(ClientHello),
    HelloVerifyRequest(HelloVerifyRequest),
    ServerHello(ServerHello),
    Certificate(Certificate),
    ServerKeyExchange(ServerKeyExchangeEcdhe),
    CertificateRequest(CertificateRequest),
    ServerHelloDone,
    CertificateVerify(CertificateVerify),
    ClientKeyExchange(ClientKeyExchange),
    Finished(Finished),
}

impl Handshake {
    /// Parses a reassembled message body.
    ///
    /// `raw_public_key` selects the body format of a Certificate message;
    /// it reflects the negotiated client_certificate_type.
    pub fn parse(msg_type: HandshakeType, body: Bytes, raw_public_key: bool) -> Result<Self> {
        let mut c = Cursor::new(body);

        let msg = match msg_type {
            HandshakeType::ClientHello => Handshake::ClientHello(ClientHello::parse(&mut c)?),
            HandshakeType::HelloVerifyRequest => {
                Handshake::HelloVerifyRequest(HelloVerifyRequest::parse(&mut c)?)
            }
            HandshakeType::ServerHello => Handshake::ServerHello(ServerHello::parse(&mut c)?),
            HandshakeType::Certificate => {
                Handshake::Certificate(Certificate::parse(&mut c, raw_public_key)?)
            }
            HandshakeType::ServerKeyExchange => {
                Handshake::ServerKeyExchange(ServerKeyExchangeEcdhe::parse(&mut c)?)
            }
            HandshakeType::CertificateRequest => {
                Handshake::CertificateRequest(CertificateRequest::parse(&mut c)?)
            }
            HandshakeType::ServerHelloDone => {
                if !c.is_empty() {
                    return Err(Error::Decode("Expected empty ServerHelloDone"));
                }
                Handshake::ServerHelloDone
            }
            HandshakeType::CertificateVerify => {
                Handshake::CertificateVerify(CertificateVerify::parse(&mut c)?)
            }
            HandshakeType::ClientKeyExchange => Handshake::ClientKeyExchange(ClientKeyExchange {
                data: c.rest(),
            }),
            HandshakeType::Finished => Handshake::Finished(Finished {
                verify_data: c.rest(),
            }),
            _ => {
                return Err(Error::Decode("Unsupported handshake type"));
            }
        };

        c.expect_empty()?;
        Ok(msg)
    }

    pub fn msg_type(&self) -> HandshakeType {
        match self {
            Handshake::ClientHello(_) => HandshakeType::ClientHello,
            Handshake::HelloVerifyRequest(_) => HandshakeType::HelloVerifyRequest,
            Handshake::ServerHello(_) => HandshakeType::ServerHello,
            Handshake::Certificate(_) => HandshakeType::Certificate,
            Handshake::ServerKeyExchange(_) => HandshakeType::ServerKeyExchange,
            Handshake::CertificateRequest(_) => HandshakeType::CertificateRequest,
            Handshake::ServerHelloDone => HandshakeType::ServerHelloDone,
            Handshake::CertificateVerify(_) => HandshakeType::CertificateVerify,
            Handshake::ClientKeyExchange(_) => HandshakeType::ClientKeyExchange,
            Handshake::Finished(_) => HandshakeType::Finished,
        }
    }

    pub fn serialize_body(&self, out: &mut Vec<u8>) {
        match self {
            Handshake::ClientHello(v) => v.serialize(out),
            Handshake::HelloVerifyRequest(v) => v.serialize(out),
            Handshake::ServerHello(v) => v.serialize(out),
            Handshake::Certificate(v) => v.serialize(out),
            Handshake::ServerKeyExchange(v) => v.serialize(out),
            Handshake::CertificateRequest(v) => v.serialize(out),
            Handshake::ServerHelloDone => {}
            Handshake::CertificateVerify(v) => v.serialize(out),
            Handshake::ClientKeyExchange(v) => out.extend_from_slice(&v.data),
            Handshake::Finished(v) => out.extend_from_slice(&v.verify_data),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// https://tools.ietf.org/html/rfc6347#section-4.2.2
////////////////////////////////////////////////////////////////////////////////

/*
struct {
    ProtocolVersion client_version;
    Random random;
    SessionID session_id;
    opaque cookie<0..2^8-1>;                          // DTLS field
    CipherSuite cipher_suites<2..2^16-2>;
    CompressionMethod compression_methods<1..2^8-1>;
    Extension extensions<0..2^16-1>;
} ClientHello;
*/

#[derive(Debug, Clone)]
pub struct ClientHello {
    pub client_version: ProtocolVersion,
    // 32 random bytes
    pub random: Bytes,
    // 0-32 bytes
    pub session_id: Bytes,
    // 0-32 bytes in practice; the wire allows up to 255
    pub cookie: Bytes,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Bytes,
    pub extensions: Vec<Extension>,
}

impl ClientHello {
    pub fn parse(c: &mut Cursor) -> Result<Self> {
        let client_version = ProtocolVersion::parse(c)?;
        let random = c.take_exact(32)?;
        let session_id = c.varlen_vector(0, 32)?;
        let cookie = c.varlen_vector(0, U8_LIMIT)?;

        let cipher_suites = {
            let data = c.varlen_vector(2, exp2(16) - 2)?;
            let mut dc = Cursor::new(data);
            let mut arr = vec![];
            while !dc.is_empty() {
                arr.push(CipherSuite::parse(&mut dc)?);
            }
            arr
        };

        let compression_methods = c.varlen_vector(1, U8_LIMIT)?;
        let extensions = parse_extensions(c, HandshakeType::ClientHello)?;

        Ok(ClientHello {
            client_version,
            random,
            session_id,
            cookie,
            cipher_suites,
            compression_methods,
            extensions,
        })
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        self.client_version.serialize(out);
        assert_eq!(self.random.len(), 32);
        out.extend_from_slice(&self.random);

        serialize_varlen_vector(0, 32, out, |out| {
            out.extend_from_slice(&self.session_id);
        });
        serialize_varlen_vector(0, U8_LIMIT, out, |out| {
            out.extend_from_slice(&self.cookie);
        });
        serialize_varlen_vector(2, exp2(16) - 2, out, |out| {
            for s in self.cipher_suites.iter() {
                s.serialize(out);
            }
        });
        serialize_varlen_vector(1, U8_LIMIT, out, |out| {
            out.extend_from_slice(&self.compression_methods);
        });
        serialize_extensions(&self.extensions, out);
    }
}

////////////////////////////////////////////////////////////////////////////////

/*
struct {
    ProtocolVersion server_version;
    opaque cookie<0..2^8-1>;
} HelloVerifyRequest;
*/

#[derive(Debug, Clone)]
pub struct HelloVerifyRequest {
    pub server_version: ProtocolVersion,
    pub cookie: Bytes,
}

impl HelloVerifyRequest {
    pub fn parse(c: &mut Cursor) -> Result<Self> {
        let server_version = ProtocolVersion::parse(c)?;
        let cookie = c.varlen_vector(0, U8_LIMIT)?;
        Ok(Self {
            server_version,
            cookie,
        })
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        self.server_version.serialize(out);
        serialize_varlen_vector(0, U8_LIMIT, out, |out| {
            out.extend_from_slice(&self.cookie);
        });
    }
}

////////////////////////////////////////////////////////////////////////////////

/*
struct {
    ProtocolVersion server_version;
    Random random;
    SessionID session_id;
    CipherSuite cipher_suite;
    CompressionMethod compression_method;
    Extension extensions<0..2^16-1>;
} ServerHello;
*/

#[derive(Debug, Clone)]
pub struct ServerHello {
    pub server_version: ProtocolVersion,
    pub random: Bytes,
    pub session_id: Bytes,
    pub cipher_suite: CipherSuite,
    pub compression_method: u8,
    pub extensions: Vec<Extension>,
}

impl ServerHello {
    pub fn parse(c: &mut Cursor) -> Result<Self> {
        let server_version = ProtocolVersion::parse(c)?;
        let random = c.take_exact(32)?;
        let session_id = c.varlen_vector(0, 32)?;
        let cipher_suite = CipherSuite::parse(c)?;
        let compression_method = c.next_u8()?;
        let extensions = parse_extensions(c, HandshakeType::ServerHello)?;

        Ok(Self {
            server_version,
            random,
            session_id,
            cipher_suite,
            compression_method,
            extensions,
        })
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        self.server_version.serialize(out);
        out.extend_from_slice(&self.random);
        serialize_varlen_vector(0, 32, out, |out| {
            out.extend_from_slice(&self.session_id);
        });
        self.cipher_suite.serialize(out);
        out.push(self.compression_method);
        serialize_extensions(&self.extensions, out);
    }
}

////////////////////////////////////////////////////////////////////////////////

/*
opaque ASN.1Cert<1..2^24-1>;

struct {
    ASN.1Cert certificate_list<0..2^24-1>;
} Certificate;

When the raw_public_key certificate type was negotiated (RFC 7250):

struct {
    opaque ASN.1_subjectPublicKeyInfo<1..2^24-1>;
} Certificate;
*/

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Certificate {
    /// DER certificates, end-entity first.
    X509(Vec<Bytes>),
    /// A bare DER SubjectPublicKeyInfo.
    RawPublicKey(Bytes),
}

impl Certificate {
    pub fn parse(c: &mut Cursor, raw_public_key: bool) -> Result<Self> {
        if raw_public_key {
            let spki = c.varlen_vector(1, U24_LIMIT - 1)?;
            return Ok(Certificate::RawPublicKey(spki));
        }

        let list = c.varlen_vector(0, U24_LIMIT - 1)?;
        let mut dc = Cursor::new(list);

        let mut certs = vec![];
        while !dc.is_empty() {
            certs.push(dc.varlen_vector(1, U24_LIMIT - 1)?);
        }

        Ok(Certificate::X509(certs))
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        match self {
            Certificate::X509(certs) => {
                serialize_varlen_vector(0, U24_LIMIT - 1, out, |out| {
                    for cert in certs {
                        serialize_varlen_vector(1, U24_LIMIT - 1, out, |out| {
                            out.extend_from_slice(cert);
                        });
                    }
                });
            }
            Certificate::RawPublicKey(spki) => {
                serialize_varlen_vector(1, U24_LIMIT - 1, out, |out| {
                    out.extend_from_slice(spki);
                });
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Certificate::X509(certs) => certs.is_empty(),
            Certificate::RawPublicKey(spki) => spki.is_empty(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// https://tools.ietf.org/html/rfc4492#section-5.4
////////////////////////////////////////////////////////////////////////////////

/*
enum {
    deprecated (1..2),
    named_curve (3),
    reserved(248..255)
} ECCurveType;

struct {
    ECCurveType    curve_type;
    select (curve_type) {
        case named_curve:
            NamedCurve namedcurve;
    };
} ECParameters;

struct {
    opaque point <1..2^8-1>;
} ECPoint;

struct {
    ECParameters    curve_params;
    ECPoint         public;
} ServerECDHParams;

select (KeyExchangeAlgorithm) {
    case ec_diffie_hellman:
        ServerECDHParams    params;
        Signature           signed_params;
} ServerKeyExchange;
*/

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ECPoint {
    pub point: Bytes,
}

impl ECPoint {
    pub fn parse(c: &mut Cursor) -> Result<Self> {
        let point = c.varlen_vector(1, U8_LIMIT)?;
        Ok(Self { point })
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        serialize_varlen_vector(1, U8_LIMIT, out, |out| {
            out.extend_from_slice(&self.point);
        })
    }
}

dtls_enum_u8!(ECCurveType => {
    named_curve(3),
    (255)
});

dtls_struct!(ECParameters => {
    ECCurveType curve_type;
    // Only present when curve_type == named_curve, which is the only type
    // this implementation produces or accepts.
    NamedCurve named_curve;
});

dtls_struct!(ServerEcdhParams => {
    ECParameters curve_params;
    ECPoint public;
});

dtls_struct!(ServerKeyExchangeEcdhe => {
    ServerEcdhParams params;
    CertificateVerify signed_params;
});

////////////////////////////////////////////////////////////////////////////////
// https://tools.ietf.org/html/rfc5246#section-7.4.4
////////////////////////////////////////////////////////////////////////////////

/*
enum {
    rsa_sign(1), dss_sign(2), fixed_dh(3), dss_fixed_dh(4),
    ecdsa_sign(64), rsa_fixed_ecdh(65), ecdsa_fixed_ecdh(66), (255)
} ClientCertificateType;

struct {
    ClientCertificateType certificate_types<1..2^8-1>;
    SignatureAndHashAlgorithm supported_signature_algorithms<2..2^16-2>;
    DistinguishedName certificate_authorities<0..2^16-1>;
} CertificateRequest;
*/

dtls_enum_u8!(ClientCertificateType => {
    rsa_sign(1),
    ecdsa_sign(64),
    (255)
});

#[derive(Debug, Clone)]
pub struct CertificateRequest {
    pub certificate_types: Vec<ClientCertificateType>,
    pub supported_signature_algorithms: SignatureAndHashAlgorithmList,
    pub certificate_authorities: Vec<Bytes>,
}

impl CertificateRequest {
    pub fn parse(c: &mut Cursor) -> Result<Self> {
        let types = c.varlen_vector(1, U8_LIMIT)?;
        let mut tc = Cursor::new(types);
        let mut certificate_types = vec![];
        while !tc.is_empty() {
            certificate_types.push(ClientCertificateType::parse(&mut tc)?);
        }

        let supported_signature_algorithms = SignatureAndHashAlgorithmList::parse(c)?;

        let authorities = c.varlen_vector(0, U16_LIMIT)?;
        let mut ac = Cursor::new(authorities);
        let mut certificate_authorities = vec![];
        while !ac.is_empty() {
            certificate_authorities.push(ac.varlen_vector(1, U16_LIMIT)?);
        }

        Ok(Self {
            certificate_types,
            supported_signature_algorithms,
            certificate_authorities,
        })
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        serialize_varlen_vector(1, U8_LIMIT, out, |out| {
            for t in self.certificate_types.iter() {
                t.serialize(out);
            }
        });
        self.supported_signature_algorithms.serialize(out);
        serialize_varlen_vector(0, U16_LIMIT, out, |out| {
            for name in self.certificate_authorities.iter() {
                serialize_varlen_vector(1, U16_LIMIT, out, |out| {
                    out.extend_from_slice(name);
                });
            }
        });
    }
}

////////////////////////////////////////////////////////////////////////////////

/*
The CertificateVerify message and the DigitallySigned element of the
ServerKeyExchange share one wire shape:

struct {
    SignatureAndHashAlgorithm algorithm;
    opaque signature<0..2^16-1>;
} DigitallySigned;
*/

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateVerify {
    pub algorithm: SignatureAndHashAlgorithm,
    pub signature: Bytes,
}

impl CertificateVerify {
    pub fn parse(c: &mut Cursor) -> Result<Self> {
        let algorithm = SignatureAndHashAlgorithm::parse(c)?;
        let signature = c.varlen_vector(0, U16_LIMIT)?;
        Ok(Self {
            algorithm,
            signature,
        })
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        self.algorithm.serialize(out);
        serialize_varlen_vector(0, U16_LIMIT, out, |out| {
            out.extend_from_slice(&self.signature);
        });
    }
}

////////////////////////////////////////////////////////////////////////////////

/*
struct {
    select (KeyExchangeAlgorithm) {
        case psk:
            opaque psk_identity<0..2^16-1>;
        case ec_diffie_hellman:
            ECPoint public;
    } exchange_keys;
} ClientKeyExchange;
*/

#[derive(Debug, Clone)]
pub struct ClientKeyExchange {
    pub data: Bytes,
}

impl ClientKeyExchange {
    pub fn new_psk(identity: &[u8]) -> Self {
        let mut data = vec![];
        serialize_varlen_vector(0, U16_LIMIT, &mut data, |out| {
            out.extend_from_slice(identity);
        });
        Self {
            data: Bytes::from(data),
        }
    }

    pub fn new_ecdh(point: &[u8]) -> Self {
        let mut data = vec![];
        ECPoint {
            point: Bytes::copy_from_slice(point),
        }
        .serialize(&mut data);
        Self {
            data: Bytes::from(data),
        }
    }

    pub fn psk_identity(&self) -> Result<Bytes> {
        let mut c = Cursor::new(self.data.clone());
        let identity = c.varlen_vector(0, U16_LIMIT)?;
        c.expect_empty()?;
        Ok(identity)
    }

    pub fn ecdh_point(&self) -> Result<Bytes> {
        let mut c = Cursor::new(self.data.clone());
        let point = ECPoint::parse(&mut c)?;
        c.expect_empty()?;
        Ok(point.point)
    }
}

////////////////////////////////////////////////////////////////////////////////

/*
struct {
    opaque verify_data[12];
} Finished;
*/

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finished {
    pub verify_data: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(msg: &Handshake, raw_public_key: bool) -> Handshake {
        let mut body = vec![];
        msg.serialize_body(&mut body);
        Handshake::parse(msg.msg_type(), Bytes::from(body), raw_public_key).unwrap()
    }

    #[test]
    fn client_hello_round_trip() {
        let hello = ClientHello {
            client_version: DTLS_1_2,
            random: Bytes::from(vec![7u8; 32]),
            session_id: Bytes::new(),
            cookie: Bytes::from_static(&[1, 2, 3, 4]),
            cipher_suites: vec![
                CipherSuite::TLS_ECDHE_ECDSA_WITH_AES_128_CCM_8,
                CipherSuite::TLS_PSK_WITH_AES_128_CCM_8,
            ],
            compression_methods: Bytes::from_static(&[0]),
            extensions: vec![Extension::EllipticCurves(NamedCurveList {
                curves: vec![NamedCurve::secp256r1],
            })],
        };

        match round_trip(&Handshake::ClientHello(hello.clone()), false) {
            Handshake::ClientHello(parsed) => {
                assert_eq!(parsed.client_version, hello.client_version);
                assert_eq!(parsed.random, hello.random);
                assert_eq!(parsed.cookie, hello.cookie);
                assert_eq!(parsed.cipher_suites, hello.cipher_suites);
                assert_eq!(parsed.extensions, hello.extensions);
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn client_hello_without_extension_block() {
        // The extensions vector may be omitted entirely.
        let mut body = vec![];
        DTLS_1_2.serialize(&mut body);
        body.extend_from_slice(&[9u8; 32]);
        body.push(0); // session_id
        body.push(0); // cookie
        body.extend_from_slice(&[0, 2, 0xC0, 0xA8]); // cipher_suites
        body.extend_from_slice(&[1, 0]); // compression_methods

        let parsed = Handshake::parse(HandshakeType::ClientHello, Bytes::from(body), false);
        match parsed.unwrap() {
            Handshake::ClientHello(ch) => assert!(ch.extensions.is_empty()),
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn hello_verify_request_round_trip() {
        let hvr = HelloVerifyRequest {
            server_version: DTLS_1_2,
            cookie: Bytes::from(vec![0xAB; 32]),
        };

        match round_trip(&Handshake::HelloVerifyRequest(hvr.clone()), false) {
            Handshake::HelloVerifyRequest(parsed) => {
                assert_eq!(parsed.cookie, hvr.cookie);
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn certificate_both_body_formats() {
        let chain = Certificate::X509(vec![
            Bytes::from_static(b"leaf"),
            Bytes::from_static(b"issuer"),
        ]);
        match round_trip(&Handshake::Certificate(chain.clone()), false) {
            Handshake::Certificate(parsed) => assert_eq!(parsed, chain),
            other => panic!("Wrong message type: {:?}", other),
        }

        let raw = Certificate::RawPublicKey(Bytes::from_static(b"spki-bytes"));
        match round_trip(&Handshake::Certificate(raw.clone()), true) {
            Handshake::Certificate(parsed) => assert_eq!(parsed, raw),
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn server_key_exchange_round_trip() {
        let ske = ServerKeyExchangeEcdhe {
            params: ServerEcdhParams {
                curve_params: ECParameters {
                    curve_type: ECCurveType::named_curve,
                    named_curve: NamedCurve::secp256r1,
                },
                public: ECPoint {
                    point: Bytes::from(vec![4u8; 65]),
                },
            },
            signed_params: CertificateVerify {
                algorithm: SignatureAndHashAlgorithm::sha256_ecdsa(),
                signature: Bytes::from_static(&[0x30, 0x06, 1, 2, 3, 4, 5, 6]),
            },
        };

        match round_trip(&Handshake::ServerKeyExchange(ske.clone()), false) {
            Handshake::ServerKeyExchange(parsed) => assert_eq!(parsed, ske),
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn fragment_header_round_trip() {
        let msg = Handshake::ServerHelloDone;
        let data = serialize_single_fragment(&msg, 5);

        // 12 byte header and an empty body.
        assert_eq!(data.len(), 12);

        let mut c = Cursor::new(data);
        let frag = HandshakeFragment::parse(&mut c).unwrap();
        assert_eq!(frag.msg_type, HandshakeType::ServerHelloDone);
        assert_eq!(frag.message_seq, 5);
        assert_eq!(frag.total_length, 0);
        assert!(frag.is_whole());
    }

    #[test]
    fn fragment_bounds_checked() {
        // fragment_offset + fragment_length > total_length
        let mut raw = vec![];
        HandshakeType::Finished.serialize(&mut raw);
        serialize_u24(12, &mut raw); // total_length
        raw.extend_from_slice(&3u16.to_be_bytes()); // message_seq
        serialize_u24(8, &mut raw); // fragment_offset
        serialize_u24(8, &mut raw); // fragment_length
        raw.extend_from_slice(&[0u8; 8]);

        let mut c = Cursor::new(Bytes::from(raw));
        assert!(HandshakeFragment::parse(&mut c).is_err());
    }

    #[test]
    fn psk_identity_accessor() {
        let cke = ClientKeyExchange::new_psk(b"device-1");
        assert_eq!(&cke.psk_identity().unwrap()[..], b"device-1");
        assert!(cke.ecdh_point().is_err());
    }
}
