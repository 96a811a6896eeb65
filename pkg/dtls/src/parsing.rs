// DTLS specific helpers for parsing binary packets.

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;

use crate::error::{Error, Result};

pub const U8_LIMIT: usize = u8::max_value() as usize;
pub const U16_LIMIT: usize = u16::max_value() as usize;
pub const U24_LIMIT: usize = 1 << 24;
pub const U32_LIMIT: usize = u32::max_value() as usize;

pub fn exp2(v: usize) -> usize {
    1 << v
}

/// Incremental reader over one wire fragment.
///
/// All multi-byte integers are big-endian (network order).
pub struct Cursor {
    input: Bytes,
}

impl Cursor {
    pub fn new(input: Bytes) -> Self {
        Self { input }
    }

    pub fn remaining(&self) -> usize {
        self.input.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    pub fn next_u8(&mut self) -> Result<u8> {
        let data = self.take_exact(1)?;
        Ok(data[0])
    }

    pub fn next_u16(&mut self) -> Result<u16> {
        let data = self.take_exact(2)?;
        Ok(BigEndian::read_u16(&data))
    }

    pub fn next_u24(&mut self) -> Result<u32> {
        let data = self.take_exact(3)?;
        Ok(BigEndian::read_u24(&data))
    }

    pub fn next_u32(&mut self) -> Result<u32> {
        let data = self.take_exact(4)?;
        Ok(BigEndian::read_u32(&data))
    }

    pub fn take_exact(&mut self, n: usize) -> Result<Bytes> {
        if self.input.len() < n {
            return Err(Error::Decode("Input shorter than expected"));
        }

        Ok(self.input.split_to(n))
    }

    /// Takes everything left in the fragment.
    pub fn rest(&mut self) -> Bytes {
        self.input.split_to(self.input.len())
    }

    /// Fails unless the whole fragment has been consumed.
    pub fn expect_empty(&self) -> Result<()> {
        if !self.input.is_empty() {
            return Err(Error::Decode("Unexpected trailing bytes"));
        }

        Ok(())
    }

    /// Reads a variable length vector of bytes.
    ///
    /// The max_bytes bound determines how large the length prefix is. In TLS,
    /// the minimum number of bytes required to store the max length are used
    /// to encode the length of the vector.
    pub fn varlen_vector(&mut self, min_bytes: usize, max_bytes: usize) -> Result<Bytes> {
        let len = if max_bytes <= U8_LIMIT {
            self.next_u8()? as usize
        } else if max_bytes <= U16_LIMIT {
            self.next_u16()? as usize
        } else if max_bytes <= U24_LIMIT {
            self.next_u24()? as usize
        } else if max_bytes <= U32_LIMIT {
            self.next_u32()? as usize
        } else {
            panic!("Maximum length not supported");
        };

        if len < min_bytes || len > max_bytes {
            return Err(Error::Decode("Length out of allowed range"));
        }

        self.take_exact(len)
    }
}

pub fn serialize_u24(v: u32, out: &mut Vec<u8>) {
    let mut buf = [0u8; 3];
    BigEndian::write_u24(&mut buf, v);
    out.extend_from_slice(&buf);
}

/// Encodes a byte vector using the length prefixed wire format defined by TLS.
pub fn serialize_varlen_vector<F: FnMut(&mut Vec<u8>)>(
    min_bytes: usize,
    max_bytes: usize,
    out: &mut Vec<u8>,
    mut f: F,
) {
    let i = out.len();
    let n = if max_bytes <= U8_LIMIT {
        1
    } else if max_bytes <= U16_LIMIT {
        2
    } else if max_bytes <= U24_LIMIT {
        3
    } else if max_bytes <= U32_LIMIT {
        4
    } else {
        panic!("Maximum length not supported");
    };

    out.resize(i + n, 0);
    let ii = out.len();

    f(out);

    let size = out.len() - ii;
    assert!(size >= min_bytes && size <= max_bytes);

    match n {
        1 => {
            out[i] = size as u8;
        }
        2 => {
            BigEndian::write_u16(&mut out[i..i + 2], size as u16);
        }
        3 => {
            BigEndian::write_u24(&mut out[i..i + 3], size as u32);
        }
        4 => {
            BigEndian::write_u32(&mut out[i..i + 4], size as u32);
        }
        _ => panic!("Should not happen"),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varlen_vector_picks_prefix_size_from_bound() {
        let mut out = vec![];
        serialize_varlen_vector(0, U8_LIMIT, &mut out, |out| {
            out.extend_from_slice(b"ab");
        });
        assert_eq!(&out, &[2, b'a', b'b']);

        let mut out = vec![];
        serialize_varlen_vector(0, U16_LIMIT, &mut out, |out| {
            out.extend_from_slice(b"ab");
        });
        assert_eq!(&out, &[0, 2, b'a', b'b']);

        let mut out = vec![];
        serialize_varlen_vector(0, U24_LIMIT, &mut out, |out| {
            out.extend_from_slice(b"ab");
        });
        assert_eq!(&out, &[0, 0, 2, b'a', b'b']);
    }

    #[test]
    fn varlen_vector_round_trip() {
        let mut out = vec![];
        serialize_varlen_vector(0, 32, &mut out, |out| {
            out.extend_from_slice(&[1, 2, 3]);
        });

        let mut c = Cursor::new(Bytes::from(out));
        let data = c.varlen_vector(0, 32).unwrap();
        assert_eq!(&data[..], &[1, 2, 3]);
        assert!(c.is_empty());
    }

    #[test]
    fn varlen_vector_rejects_out_of_range_length() {
        // Claims 40 bytes in a <=32 byte vector.
        let mut c = Cursor::new(Bytes::from_static(&[40, 0, 0]));
        assert!(c.varlen_vector(0, 32).is_err());
    }

    #[test]
    fn u24_round_trip() {
        let mut out = vec![];
        serialize_u24(0x01_02_03, &mut out);
        assert_eq!(&out, &[1, 2, 3]);

        let mut c = Cursor::new(Bytes::from(out));
        assert_eq!(c.next_u24().unwrap(), 0x01_02_03);
    }

    #[test]
    fn truncated_input() {
        let mut c = Cursor::new(Bytes::from_static(&[0, 0]));
        assert!(c.next_u32().is_err());
    }
}
