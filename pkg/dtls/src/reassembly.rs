use std::collections::BTreeMap;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::handshake::{HandshakeFragment, HandshakeType};

/// Upper bound on a single handshake message. Far above anything this server
/// produces, but keeps a hostile peer from reserving 16MB per message_seq.
const MAX_MESSAGE_LENGTH: u32 = 1 << 16;

/// Reassembles handshake messages from fragments addressed by
/// (message_seq, total_length).
///
/// Overlapping fragments are accepted and overwrite; delivery happens once
/// [0, total_length) is contiguously covered. The state machine pulls
/// completed messages in message_seq order and is responsible for discarding
/// sequences it has already consumed.
pub struct Reassembler {
    buffers: BTreeMap<u16, FragmentBuffer>,
}

pub struct ReassembledMessage {
    pub msg_type: HandshakeType,
    pub message_seq: u16,
    pub body: Bytes,
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            buffers: BTreeMap::new(),
        }
    }

    /// Adds one fragment. Returns the reassembled message once its coverage
    /// is complete, leaving room for later duplicates to be recognized by
    /// the caller's sequence tracking.
    pub fn insert(&mut self, fragment: HandshakeFragment) -> Result<Option<ReassembledMessage>> {
        if fragment.total_length > MAX_MESSAGE_LENGTH {
            return Err(Error::Decode("Handshake message too large"));
        }

        // The common case: a whole message in one fragment and nothing
        // buffered for its sequence yet.
        if fragment.is_whole() && !self.buffers.contains_key(&fragment.message_seq) {
            return Ok(Some(ReassembledMessage {
                msg_type: fragment.msg_type,
                message_seq: fragment.message_seq,
                body: fragment.body,
            }));
        }

        let message_seq = fragment.message_seq;
        let buffer = self
            .buffers
            .entry(message_seq)
            .or_insert_with(|| FragmentBuffer::new(fragment.msg_type, fragment.total_length));

        if buffer.msg_type != fragment.msg_type || buffer.total_length != fragment.total_length {
            return Err(Error::Decode("Fragment does not match buffered message"));
        }

        buffer.fill(fragment.fragment_offset as usize, &fragment.body);

        if !buffer.is_complete() {
            return Ok(None);
        }

        let buffer = self.buffers.remove(&message_seq).unwrap();
        Ok(Some(ReassembledMessage {
            msg_type: buffer.msg_type,
            message_seq,
            body: Bytes::from(buffer.data),
        }))
    }

    /// Drops all partially buffered messages.
    pub fn clear(&mut self) {
        self.buffers.clear();
    }
}

struct FragmentBuffer {
    msg_type: HandshakeType,
    total_length: u32,
    data: Vec<u8>,
    /// Sorted disjoint [start, end) ranges of filled bytes.
    filled: Vec<(usize, usize)>,
}

impl FragmentBuffer {
    fn new(msg_type: HandshakeType, total_length: u32) -> Self {
        Self {
            msg_type,
            total_length,
            data: vec![0; total_length as usize],
            filled: vec![],
        }
    }

    fn fill(&mut self, offset: usize, body: &[u8]) {
        // Bounds were validated when the fragment header was parsed.
        self.data[offset..offset + body.len()].copy_from_slice(body);

        self.filled.push((offset, offset + body.len()));
        self.filled.sort();

        // Merge adjacent/overlapping ranges.
        let mut merged: Vec<(usize, usize)> = vec![];
        for (start, end) in self.filled.drain(..) {
            match merged.last_mut() {
                Some((_, last_end)) if start <= *last_end => {
                    *last_end = (*last_end).max(end);
                }
                _ => merged.push((start, end)),
            }
        }
        self.filled = merged;
    }

    fn is_complete(&self) -> bool {
        self.filled == [(0, self.total_length as usize)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(seq: u16, total: u32, offset: u32, body: &[u8]) -> HandshakeFragment {
        HandshakeFragment {
            msg_type: HandshakeType::ClientKeyExchange,
            total_length: total,
            message_seq: seq,
            fragment_offset: offset,
            body: Bytes::copy_from_slice(body),
        }
    }

    #[test]
    fn whole_message_passes_through() {
        let mut r = Reassembler::new();
        let out = r.insert(fragment(0, 4, 0, &[1, 2, 3, 4])).unwrap().unwrap();
        assert_eq!(&out.body[..], &[1, 2, 3, 4]);
        assert_eq!(out.message_seq, 0);
    }

    #[test]
    fn in_order_fragments() {
        let mut r = Reassembler::new();
        assert!(r.insert(fragment(2, 6, 0, &[1, 2, 3])).unwrap().is_none());
        let out = r.insert(fragment(2, 6, 3, &[4, 5, 6])).unwrap().unwrap();
        assert_eq!(&out.body[..], &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn out_of_order_and_overlapping_fragments() {
        let mut r = Reassembler::new();
        assert!(r.insert(fragment(1, 6, 4, &[50, 60])).unwrap().is_none());
        assert!(r.insert(fragment(1, 6, 0, &[1, 2])).unwrap().is_none());
        // Overlaps both earlier fragments; later bytes win.
        let out = r
            .insert(fragment(1, 6, 1, &[20, 30, 40, 51]))
            .unwrap()
            .unwrap();
        assert_eq!(&out.body[..], &[1, 20, 30, 40, 51, 60]);
    }

    #[test]
    fn gap_prevents_delivery() {
        let mut r = Reassembler::new();
        assert!(r.insert(fragment(0, 6, 0, &[1, 2])).unwrap().is_none());
        assert!(r.insert(fragment(0, 6, 4, &[5, 6])).unwrap().is_none());
    }

    #[test]
    fn interleaved_sequences() {
        let mut r = Reassembler::new();
        assert!(r.insert(fragment(3, 4, 0, &[1, 2])).unwrap().is_none());
        let other = r.insert(fragment(4, 2, 0, &[9, 9])).unwrap().unwrap();
        assert_eq!(other.message_seq, 4);

        let out = r.insert(fragment(3, 4, 2, &[3, 4])).unwrap().unwrap();
        assert_eq!(out.message_seq, 3);
        assert_eq!(&out.body[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn mismatched_total_length_rejected() {
        let mut r = Reassembler::new();
        assert!(r.insert(fragment(0, 8, 0, &[1, 2])).unwrap().is_none());
        assert!(r.insert(fragment(0, 6, 2, &[3, 4])).is_err());
    }

    #[test]
    fn oversized_message_rejected() {
        let mut r = Reassembler::new();
        let frag = HandshakeFragment {
            msg_type: HandshakeType::Certificate,
            total_length: MAX_MESSAGE_LENGTH + 1,
            message_seq: 0,
            fragment_offset: 0,
            body: Bytes::from_static(&[0]),
        };
        assert!(r.insert(frag).is_err());
    }
}
