use bytes::Bytes;

use crate::error::{Error, Result};
use crate::handshake::HandshakeType;
use crate::parsing::*;

// List of all extensions: https://www.iana.org/assignments/tls-extensiontype-values/tls-extensiontype-values.xml

// TODO: 'There MUST NOT be more than one extension of the same type.'

/*
struct {
    ExtensionType extension_type;
    opaque extension_data<0..2^16-1>;
} Extension;
*/

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    EllipticCurves(NamedCurveList),
    ECPointFormats(ECPointFormatList),
    SignatureAlgorithms(SignatureAndHashAlgorithmList),

    // The certificate type extensions of RFC 7250 carry a list of offered
    // types in the ClientHello but a single selected type in the ServerHello.
    ClientCertificateTypeRequest(CertificateTypeList),
    ClientCertificateTypeSelected(CertificateType),
    ServerCertificateTypeRequest(CertificateTypeList),
    ServerCertificateTypeSelected(CertificateType),

    Unknown {
        typ: u16,
        data: Bytes,
    },
}

dtls_enum_u16!(ExtensionType => {
    elliptic_curves = 10,
    ec_point_formats = 11,
    signature_algorithms = 13,
    client_certificate_type = 19,
    server_certificate_type = 20,
    (65535)
});

impl Extension {
    pub fn parse(c: &mut Cursor, msg_type: HandshakeType) -> Result<Self> {
        let extension_type = ExtensionType::parse(c)?;
        let data = c.varlen_vector(0, U16_LIMIT)?;

        let mut dc = Cursor::new(data.clone());
        let in_server_hello = msg_type == HandshakeType::ServerHello;

        let ext = match extension_type {
            ExtensionType::elliptic_curves => {
                Extension::EllipticCurves(NamedCurveList::parse(&mut dc)?)
            }
            ExtensionType::ec_point_formats => {
                Extension::ECPointFormats(ECPointFormatList::parse(&mut dc)?)
            }
            ExtensionType::signature_algorithms => {
                Extension::SignatureAlgorithms(SignatureAndHashAlgorithmList::parse(&mut dc)?)
            }
            ExtensionType::client_certificate_type => {
                if in_server_hello {
                    Extension::ClientCertificateTypeSelected(CertificateType::parse(&mut dc)?)
                } else {
                    Extension::ClientCertificateTypeRequest(CertificateTypeList::parse(&mut dc)?)
                }
            }
            ExtensionType::server_certificate_type => {
                if in_server_hello {
                    Extension::ServerCertificateTypeSelected(CertificateType::parse(&mut dc)?)
                } else {
                    Extension::ServerCertificateTypeRequest(CertificateTypeList::parse(&mut dc)?)
                }
            }
            ExtensionType::unknown(typ) => {
                return Ok(Extension::Unknown { typ, data });
            }
        };

        dc.expect_empty()?;
        Ok(ext)
    }

    pub fn extension_type(&self) -> ExtensionType {
        match self {
            Extension::EllipticCurves(_) => ExtensionType::elliptic_curves,
            Extension::ECPointFormats(_) => ExtensionType::ec_point_formats,
            Extension::SignatureAlgorithms(_) => ExtensionType::signature_algorithms,
            Extension::ClientCertificateTypeRequest(_)
            | Extension::ClientCertificateTypeSelected(_) => {
                ExtensionType::client_certificate_type
            }
            Extension::ServerCertificateTypeRequest(_)
            | Extension::ServerCertificateTypeSelected(_) => {
                ExtensionType::server_certificate_type
            }
            Extension::Unknown { typ, .. } => ExtensionType::unknown(*typ),
        }
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        self.extension_type().serialize(out);
        serialize_varlen_vector(0, U16_LIMIT, out, |out| match self {
            Extension::EllipticCurves(v) => v.serialize(out),
            Extension::ECPointFormats(v) => v.serialize(out),
            Extension::SignatureAlgorithms(v) => v.serialize(out),
            Extension::ClientCertificateTypeRequest(v) => v.serialize(out),
            Extension::ClientCertificateTypeSelected(v) => v.serialize(out),
            Extension::ServerCertificateTypeRequest(v) => v.serialize(out),
            Extension::ServerCertificateTypeSelected(v) => v.serialize(out),
            Extension::Unknown { data, .. } => out.extend_from_slice(data),
        });
    }
}

/// Parses the 16-bit length prefixed extension block at the tail of a hello
/// message. An absent block (nothing left in the message) yields an empty
/// list.
pub fn parse_extensions(c: &mut Cursor, msg_type: HandshakeType) -> Result<Vec<Extension>> {
    if c.is_empty() {
        return Ok(vec![]);
    }

    let data = c.varlen_vector(0, U16_LIMIT)?;
    let mut dc = Cursor::new(data);

    let mut out = vec![];
    while !dc.is_empty() {
        out.push(Extension::parse(&mut dc, msg_type)?);
    }

    Ok(out)
}

pub fn serialize_extensions(extensions: &[Extension], out: &mut Vec<u8>) {
    if extensions.is_empty() {
        return;
    }

    serialize_varlen_vector(0, U16_LIMIT, out, |out| {
        for e in extensions {
            e.serialize(out);
        }
    });
}

////////////////////////////////////////////////////////////////////////////////
// https://tools.ietf.org/html/rfc4492#section-5.1.1
////////////////////////////////////////////////////////////////////////////////

/*
enum {
    secp256r1(23), secp384r1(24), secp521r1(25),
    (0xFFFF)
} NamedCurve;

struct {
    NamedCurve elliptic_curve_list<1..2^16-1>
} EllipticCurveList;
*/

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedCurveList {
    pub curves: Vec<NamedCurve>,
}

impl NamedCurveList {
    pub fn parse(c: &mut Cursor) -> Result<Self> {
        let data = c.varlen_vector(1, U16_LIMIT)?;
        let mut dc = Cursor::new(data);

        let mut curves = vec![];
        while !dc.is_empty() {
            curves.push(NamedCurve::parse(&mut dc)?);
        }

        Ok(Self { curves })
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        serialize_varlen_vector(1, U16_LIMIT, out, |out| {
            for v in self.curves.iter() {
                v.serialize(out);
            }
        });
    }
}

dtls_enum_u16!(NamedCurve => {
    secp256r1 = 23,
    secp384r1 = 24,
    secp521r1 = 25,
    (65535)
});

////////////////////////////////////////////////////////////////////////////////

/*
enum { uncompressed (0), (255) } ECPointFormat;

struct {
    ECPointFormat ec_point_format_list<1..2^8-1>
} ECPointFormatList;
*/

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ECPointFormatList {
    pub formats: Vec<ECPointFormat>,
}

impl ECPointFormatList {
    pub fn uncompressed_only() -> Self {
        Self {
            formats: vec![ECPointFormat::uncompressed],
        }
    }

    pub fn parse(c: &mut Cursor) -> Result<Self> {
        let data = c.varlen_vector(1, U8_LIMIT)?;
        let mut dc = Cursor::new(data);

        let mut formats = vec![];
        while !dc.is_empty() {
            formats.push(ECPointFormat::parse(&mut dc)?);
        }

        Ok(Self { formats })
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        serialize_varlen_vector(1, U8_LIMIT, out, |out| {
            for v in self.formats.iter() {
                v.serialize(out);
            }
        });
    }
}

dtls_enum_u8!(ECPointFormat => {
    uncompressed(0),
    (255)
});

////////////////////////////////////////////////////////////////////////////////
// https://tools.ietf.org/html/rfc7250#section-4.1
////////////////////////////////////////////////////////////////////////////////

dtls_enum_u8!(CertificateType => {
    X509(0),
    RawPublicKey(2),
    (255)
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateTypeList {
    pub types: Vec<CertificateType>,
}

impl CertificateTypeList {
    pub fn parse(c: &mut Cursor) -> Result<Self> {
        let data = c.varlen_vector(1, U8_LIMIT)?;
        let mut dc = Cursor::new(data);

        let mut types = vec![];
        while !dc.is_empty() {
            types.push(CertificateType::parse(&mut dc)?);
        }

        Ok(Self { types })
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        serialize_varlen_vector(1, U8_LIMIT, out, |out| {
            for v in self.types.iter() {
                v.serialize(out);
            }
        });
    }
}

////////////////////////////////////////////////////////////////////////////////
// https://tools.ietf.org/html/rfc5246#section-7.4.1.4.1
////////////////////////////////////////////////////////////////////////////////

/*
enum {
    none(0), md5(1), sha1(2), sha224(3), sha256(4), sha384(5),
    sha512(6), (255)
} HashAlgorithm;
enum {
    anonymous(0), rsa(1), dsa(2), ecdsa(3), (255)
} SignatureAlgorithm;

struct {
    HashAlgorithm hash;
    SignatureAlgorithm signature;
} SignatureAndHashAlgorithm;
*/

dtls_enum_u8!(HashAlgorithm => {
    none(0), md5(1), sha1(2), sha224(3), sha256(4), sha384(5), sha512(6),
    (255)
});

dtls_enum_u8!(SignatureAlgorithm => {
    anonymous(0), rsa(1), dsa(2), ecdsa(3),
    (255)
});

dtls_struct!(SignatureAndHashAlgorithm => {
    HashAlgorithm hash;
    SignatureAlgorithm signature;
});

impl SignatureAndHashAlgorithm {
    pub fn sha256_ecdsa() -> Self {
        Self {
            hash: HashAlgorithm::sha256,
            signature: SignatureAlgorithm::ecdsa,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureAndHashAlgorithmList {
    pub algorithms: Vec<SignatureAndHashAlgorithm>,
}

impl SignatureAndHashAlgorithmList {
    pub fn parse(c: &mut Cursor) -> Result<Self> {
        let data = c.varlen_vector(2, exp2(16) - 2)?;
        if data.len() % 2 != 0 {
            return Err(Error::Decode("Odd signature algorithm list length"));
        }

        let mut dc = Cursor::new(data);
        let mut algorithms = vec![];
        while !dc.is_empty() {
            algorithms.push(SignatureAndHashAlgorithm::parse(&mut dc)?);
        }

        Ok(Self { algorithms })
    }

    pub fn serialize(&self, out: &mut Vec<u8>) {
        serialize_varlen_vector(2, exp2(16) - 2, out, |out| {
            for a in self.algorithms.iter() {
                a.serialize(out);
            }
        });
    }
}

/// Returns the curves offered in the client's supported_elliptic_curves
/// extension, or None if the extension is absent.
pub fn find_elliptic_curves(extensions: &[Extension]) -> Option<&NamedCurveList> {
    for e in extensions {
        if let Extension::EllipticCurves(list) = e {
            return Some(list);
        }
    }
    None
}

pub fn find_client_certificate_types(extensions: &[Extension]) -> Option<&CertificateTypeList> {
    for e in extensions {
        if let Extension::ClientCertificateTypeRequest(list) = e {
            return Some(list);
        }
    }
    None
}

pub fn find_server_certificate_types(extensions: &[Extension]) -> Option<&CertificateTypeList> {
    for e in extensions {
        if let Extension::ServerCertificateTypeRequest(list) = e {
            return Some(list);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elliptic_curves_round_trip() {
        let ext = Extension::EllipticCurves(NamedCurveList {
            curves: vec![NamedCurve::secp256r1, NamedCurve::secp384r1],
        });

        let mut out = vec![];
        ext.serialize(&mut out);
        assert_eq!(&out, &[0, 10, 0, 6, 0, 4, 0, 23, 0, 24]);

        let mut c = Cursor::new(Bytes::from(out));
        let parsed = Extension::parse(&mut c, HandshakeType::ClientHello).unwrap();
        assert_eq!(parsed, ext);
    }

    #[test]
    fn certificate_type_depends_on_message() {
        // In a ClientHello the payload is a list.
        let data = Bytes::from_static(&[0, 19, 0, 3, 2, 2, 0]);
        let mut c = Cursor::new(data.clone());
        let parsed = Extension::parse(&mut c, HandshakeType::ClientHello).unwrap();
        assert_eq!(
            parsed,
            Extension::ClientCertificateTypeRequest(CertificateTypeList {
                types: vec![CertificateType::RawPublicKey, CertificateType::X509],
            })
        );

        // In a ServerHello it is a single selected type.
        let data = Bytes::from_static(&[0, 19, 0, 1, 2]);
        let mut c = Cursor::new(data);
        let parsed = Extension::parse(&mut c, HandshakeType::ServerHello).unwrap();
        assert_eq!(
            parsed,
            Extension::ClientCertificateTypeSelected(CertificateType::RawPublicKey)
        );
    }

    #[test]
    fn unknown_extension_passthrough() {
        let data = Bytes::from_static(&[0, 42, 0, 3, 1, 2, 3]);
        let mut c = Cursor::new(data.clone());
        let parsed = Extension::parse(&mut c, HandshakeType::ClientHello).unwrap();

        let mut out = vec![];
        parsed.serialize(&mut out);
        assert_eq!(&out[..], &data[..]);
    }
}
