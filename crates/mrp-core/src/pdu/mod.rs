//! MRPDU codec - wire encode/decode of the attribute event vector format.
//!
//! The codec is independent of any particular attribute class; the
//! per-protocol constants live in a [`PduFormat`] supplied by the
//! application adapter. Decoding is strictly two-phase: the whole frame is
//! parsed and validated into a [`DecodedPdu`] before the caller applies any
//! of it, so a rejected frame cannot leave partial state behind.

use thiserror::Error;

use crate::types::{AttributeIndex, WireEvent};

/// Smallest frame the decoder will look at.
pub const MIN_PDU_LEN: usize = 25;
/// Largest frame the encoder will produce (untagged Ethernet, no FCS).
pub const MAX_PDU_LEN: usize = 1514;

const ENDMARK: u16 = 0;
const VECTOR_HDR_LEN: usize = 4;
const LEAVEALL_BIT: u16 = 0x8000;
const NUM_OF_VALUES_MASK: u16 = 0x7FFF;
/// A VectorAttribute carries at most this many packed event bytes; longer
/// runs are split into consecutive VectorAttributes.
const MAX_VECTOR_BYTES: usize = 255;
const MAX_VALUES_PER_VECTOR: usize = MAX_VECTOR_BYTES * 3;

/// Per-protocol wire constants, fixed by the application adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduFormat {
    /// Protocol-fixed destination multicast address.
    pub destination: [u8; 6],
    /// Ethertype or LLC discriminator bytes following the source address.
    pub discriminator: [u8; 2],
    /// Protocol version; a mismatch drops the frame.
    pub version: u8,
    pub attribute_type: u8,
    pub attribute_length: u8,
    /// Wire value of attribute index 0 (1 for MVRP: value = VID = index + 1).
    pub first_value_base: u16,
}

impl PduFormat {
    /// Whether a received frame is addressed to this protocol. Used for
    /// dispatch only; full validation happens in [`decode`].
    pub fn matches(&self, frame: &[u8]) -> bool {
        frame.len() >= 14 && frame[..6] == self.destination && frame[12..14] == self.discriminator
    }
}

/// Codec violations. Every variant drops the frame and bumps the port's
/// discard counter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PduError {
    #[error("Frame too short: {0} bytes")]
    TooShort(usize),
    #[error("Protocol version mismatch: got {0}")]
    VersionMismatch(u8),
    #[error("Attribute type mismatch: got {0}")]
    AttributeTypeMismatch(u8),
    #[error("Attribute length mismatch: got {0}")]
    AttributeLengthMismatch(u8),
    #[error("Frame truncated")]
    Truncated,
}

/// Fully parsed and validated PDU content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPdu {
    pub source: [u8; 6],
    /// Set when any VectorAttribute carried the LeaveAll flag.
    pub leave_all: bool,
    /// In-range attribute events in wire order.
    pub events: Vec<(AttributeIndex, WireEvent)>,
}

fn read_u16(frame: &[u8], offset: usize) -> Result<u16, PduError> {
    let bytes = frame
        .get(offset..offset + 2)
        .ok_or(PduError::Truncated)?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Decodes one frame. `max_index` bounds the attribute table; values
/// outside it are skipped without failing the frame, as are the unused
/// packed event codes 6 and 7.
pub fn decode(
    format: &PduFormat,
    frame: &[u8],
    max_index: AttributeIndex,
) -> Result<DecodedPdu, PduError> {
    if frame.len() < MIN_PDU_LEN {
        return Err(PduError::TooShort(frame.len()));
    }
    if frame[14] != format.version {
        return Err(PduError::VersionMismatch(frame[14]));
    }
    let mut source = [0u8; 6];
    source.copy_from_slice(&frame[6..12]);

    let mut leave_all = false;
    let mut events = Vec::new();
    let mut offset = 15;

    // Message list, terminated by a two-byte endmark.
    loop {
        if read_u16(frame, offset)? == ENDMARK {
            break;
        }
        let attr_type = frame[offset];
        let attr_len = frame[offset + 1];
        if attr_type != format.attribute_type {
            return Err(PduError::AttributeTypeMismatch(attr_type));
        }
        if attr_len != format.attribute_length {
            return Err(PduError::AttributeLengthMismatch(attr_len));
        }
        offset += 2;

        // VectorAttribute list, terminated by its own endmark.
        loop {
            if read_u16(frame, offset)? == ENDMARK {
                offset += 2;
                break;
            }
            let header = read_u16(frame, offset)?;
            let first_value = read_u16(frame, offset + 2)?;
            let count = header & NUM_OF_VALUES_MASK;
            let vector_bytes = (count as usize + 2) / 3;
            if offset + VECTOR_HDR_LEN + vector_bytes > frame.len() {
                return Err(PduError::Truncated);
            }
            if header & LEAVEALL_BIT != 0 {
                leave_all = true;
            }
            for k in 0..count as usize {
                let byte = frame[offset + VECTOR_HDR_LEN + k / 3];
                let code = match k % 3 {
                    0 => byte / 36,
                    1 => (byte / 6) % 6,
                    _ => byte % 6,
                };
                let event = WireEvent::from_code(code);
                if event == WireEvent::None {
                    continue;
                }
                let value = first_value.wrapping_add(k as u16);
                if value < format.first_value_base {
                    continue;
                }
                let index = value - format.first_value_base;
                if index >= max_index {
                    continue;
                }
                events.push((index, event));
            }
            offset += VECTOR_HDR_LEN + vector_bytes;
        }
    }

    Ok(DecodedPdu {
        source,
        leave_all,
        events,
    })
}

fn pack_triples(out: &mut Vec<u8>, codes: &[u8]) {
    for triple in codes.chunks(3) {
        let e1 = triple[0];
        let e2 = triple.get(1).copied().unwrap_or(0);
        let e3 = triple.get(2).copied().unwrap_or(0);
        out.push((e1 * 6 + e2) * 6 + e3);
    }
}

fn flush_run(
    out: &mut Vec<u8>,
    format: &PduFormat,
    start_index: usize,
    codes: &[u8],
    leave_all: &mut bool,
) {
    let mut consumed = 0usize;
    for chunk in codes.chunks(MAX_VALUES_PER_VECTOR) {
        let mut header = chunk.len() as u16;
        if *leave_all {
            // The LeaveAll flag goes on the first VectorAttribute only.
            header |= LEAVEALL_BIT;
            *leave_all = false;
        }
        let first_value = format.first_value_base + (start_index + consumed) as u16;
        out.extend_from_slice(&header.to_be_bytes());
        out.extend_from_slice(&first_value.to_be_bytes());
        pack_triples(out, chunk);
        consumed += chunk.len();
    }
}

/// Encodes the staged per-attribute events into one PDU. `events` holds one
/// entry per attribute index with [`WireEvent::None`] marking "no event for
/// this index"; maximal contiguous runs become VectorAttributes. With
/// `leave_all` and nothing staged, a single empty VectorAttribute carries
/// the flag.
pub fn encode(
    format: &PduFormat,
    source: [u8; 6],
    events: &[WireEvent],
    leave_all: bool,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(MIN_PDU_LEN + events.len() / 3);
    encode_into(format, source, events, leave_all, &mut out);
    out
}

/// [`encode`] into a caller-provided (transport-allocated) buffer.
pub fn encode_into(
    format: &PduFormat,
    source: [u8; 6],
    events: &[WireEvent],
    leave_all: bool,
    out: &mut Vec<u8>,
) {
    out.extend_from_slice(&format.destination);
    out.extend_from_slice(&source);
    out.extend_from_slice(&format.discriminator);
    out.push(format.version);
    out.push(format.attribute_type);
    out.push(format.attribute_length);

    let mut leave_all = leave_all;
    let mut run_start = 0usize;
    let mut run: Vec<u8> = Vec::new();
    for (index, event) in events.iter().enumerate() {
        match event {
            WireEvent::None => {
                if !run.is_empty() {
                    flush_run(out, format, run_start, &run, &mut leave_all);
                    run.clear();
                }
            }
            e => {
                if run.is_empty() {
                    run_start = index;
                }
                run.push(*e as u8);
            }
        }
    }
    if !run.is_empty() {
        flush_run(out, format, run_start, &run, &mut leave_all);
    }
    if leave_all {
        // LeaveAll with no events to declare: empty vector, flag set.
        out.extend_from_slice(&LEAVEALL_BIT.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
    }
    out.extend_from_slice(&ENDMARK.to_be_bytes());
    out.extend_from_slice(&ENDMARK.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_format() -> PduFormat {
        PduFormat {
            destination: [0x01, 0x80, 0xC2, 0x00, 0x00, 0x21],
            discriminator: [0x88, 0xF5],
            version: 0,
            attribute_type: 1,
            attribute_length: 2,
            first_value_base: 1,
        }
    }

    const SRC: [u8; 6] = [2, 0, 0, 0, 0, 7];

    fn staged(pairs: &[(usize, WireEvent)], len: usize) -> Vec<WireEvent> {
        let mut events = vec![WireEvent::None; len];
        for (index, event) in pairs {
            events[*index] = *event;
        }
        events
    }

    #[test]
    fn test_roundtrip_single_run() {
        let format = test_format();
        let events = staged(
            &[
                (4, WireEvent::JoinIn),
                (5, WireEvent::New),
                (6, WireEvent::Leave),
                (7, WireEvent::Mt),
            ],
            32,
        );
        let frame = encode(&format, SRC, &events, false);
        let decoded = decode(&format, &frame, 32).unwrap();
        assert_eq!(decoded.source, SRC);
        assert!(!decoded.leave_all);
        assert_eq!(
            decoded.events,
            vec![
                (4, WireEvent::JoinIn),
                (5, WireEvent::New),
                (6, WireEvent::Leave),
                (7, WireEvent::Mt),
            ]
        );
    }

    #[test]
    fn test_roundtrip_gap_makes_two_vectors() {
        let format = test_format();
        let events = staged(&[(0, WireEvent::JoinMt), (9, WireEvent::In)], 16);
        let frame = encode(&format, SRC, &events, false);
        // header(17) + 2 vector attrs of (4 hdr + 1 packed) + 2 endmarks
        assert_eq!(frame.len(), 17 + 5 + 5 + 4);
        let decoded = decode(&format, &frame, 16).unwrap();
        assert_eq!(
            decoded.events,
            vec![(0, WireEvent::JoinMt), (9, WireEvent::In)]
        );
    }

    #[test]
    fn test_roundtrip_long_run_splits_vectors() {
        let format = test_format();
        let n = 800usize; // > 3 * 255, forces a VectorAttribute split
        let all: Vec<(usize, WireEvent)> =
            (0..n).map(|i| (i + 3, WireEvent::JoinIn)).collect();
        let events = staged(&all, n + 8);
        let frame = encode(&format, SRC, &events, false);
        let decoded = decode(&format, &frame, (n + 8) as u16).unwrap();
        assert_eq!(decoded.events.len(), n);
        for (k, (index, event)) in decoded.events.iter().enumerate() {
            assert_eq!(*index as usize, k + 3);
            assert_eq!(*event, WireEvent::JoinIn);
        }
    }

    #[test]
    fn test_leaveall_bit_on_first_vector_only() {
        let format = test_format();
        let events = staged(&[(0, WireEvent::JoinIn), (5, WireEvent::JoinIn)], 8);
        let frame = encode(&format, SRC, &events, true);
        // First vector header at offset 17 carries the flag.
        assert_eq!(u16::from_be_bytes([frame[17], frame[18]]), LEAVEALL_BIT | 1);
        // Second vector header (17 + 4 + 1) does not.
        assert_eq!(u16::from_be_bytes([frame[22], frame[23]]), 1);
        let decoded = decode(&format, &frame, 8).unwrap();
        assert!(decoded.leave_all);
        assert_eq!(decoded.events.len(), 2);
    }

    #[test]
    fn test_leaveall_only_pdu() {
        let format = test_format();
        let frame = encode(&format, SRC, &staged(&[], 8), true);
        assert_eq!(frame.len(), MIN_PDU_LEN);
        let decoded = decode(&format, &frame, 8).unwrap();
        assert!(decoded.leave_all);
        assert!(decoded.events.is_empty());
    }

    #[test]
    fn test_too_short_rejected() {
        let format = test_format();
        let frame = encode(&format, SRC, &staged(&[], 8), true);
        assert_eq!(
            decode(&format, &frame[..frame.len() - 1], 8),
            Err(PduError::TooShort(MIN_PDU_LEN - 1))
        );
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let format = test_format();
        let mut frame = encode(&format, SRC, &staged(&[(0, WireEvent::JoinIn)], 8), false);
        frame[14] = 1;
        assert_eq!(decode(&format, &frame, 8), Err(PduError::VersionMismatch(1)));
    }

    #[test]
    fn test_attribute_type_and_length_mismatch_rejected() {
        let format = test_format();
        let events = staged(&[(0, WireEvent::JoinIn)], 8);
        let mut frame = encode(&format, SRC, &events, false);
        frame[15] = 2;
        assert_eq!(
            decode(&format, &frame, 8),
            Err(PduError::AttributeTypeMismatch(2))
        );

        let mut frame = encode(&format, SRC, &events, false);
        frame[16] = 4;
        assert_eq!(
            decode(&format, &frame, 8),
            Err(PduError::AttributeLengthMismatch(4))
        );
    }

    #[test]
    fn test_overrunning_number_of_values_rejected() {
        let format = test_format();
        let mut frame = encode(&format, SRC, &staged(&[(0, WireEvent::JoinIn)], 8), false);
        // Claim 600 values in a vector that holds one packed byte.
        let header = 600u16.to_be_bytes();
        frame[17] = header[0];
        frame[18] = header[1];
        assert_eq!(decode(&format, &frame, 8), Err(PduError::Truncated));
    }

    #[test]
    fn test_unknown_packed_codes_skipped() {
        let format = test_format();
        let mut frame = encode(
            &format,
            SRC,
            &staged(&[(0, WireEvent::New), (1, WireEvent::New), (2, WireEvent::New)], 8),
            false,
        );
        // Overwrite the packed byte with first code 7: 7*36 + 0*6 + 1.
        frame[21] = 253;
        let decoded = decode(&format, &frame, 8).unwrap();
        assert_eq!(
            decoded.events,
            vec![(1, WireEvent::New), (2, WireEvent::JoinIn)]
        );
    }

    #[test]
    fn test_out_of_range_values_skipped() {
        let format = test_format();
        // Encode against a large table, decode against a small one.
        let events = staged(&[(2, WireEvent::JoinIn), (6, WireEvent::JoinIn)], 16);
        let frame = encode(&format, SRC, &events, false);
        let decoded = decode(&format, &frame, 4).unwrap();
        assert_eq!(decoded.events, vec![(2, WireEvent::JoinIn)]);
    }

    #[test]
    fn test_format_matching() {
        let format = test_format();
        let frame = encode(&format, SRC, &staged(&[], 8), true);
        assert!(format.matches(&frame));
        let mut other = format;
        other.discriminator = [0x42, 0x42];
        assert!(!other.matches(&frame));
        assert!(!format.matches(&frame[..10]));
    }
}
