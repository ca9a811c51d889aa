//! Control messages exchanged between the control thread and the audio callback.
//!
//! Every message is a fixed-layout little-endian record whose first byte is
//! the tag. The total size is a function of the tag alone, so a reader peeks
//! one byte, learns the size, and only consumes the record once all of it
//! has arrived. Encoding and decoding use stack buffers only.

use rustfft::num_complex::Complex32;

use super::ring_buffer::{RingConsumer, RingProducer};
use crate::error::{AnalyzerError, Result};
use crate::params::PseudoLevel;

/// Bytes occupied by the tag at the front of every record
pub const TAG_SIZE: usize = 1;

/// Size of the largest record
pub const MAX_MESSAGE_SIZE: usize = size_of(MessageTag::NotifyFrequencyAnalysis);

/// Wire tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageTag {
    RequestAnalyzeFrequency = 1,
    RequestStop = 2,
    NotifyFrequencyAnalysis = 3,
}

impl TryFrom<u8> for MessageTag {
    type Error = AnalyzerError;

    fn try_from(byte: u8) -> Result<Self> {
        match byte {
            1 => Ok(Self::RequestAnalyzeFrequency),
            2 => Ok(Self::RequestStop),
            3 => Ok(Self::NotifyFrequencyAnalysis),
            other => Err(AnalyzerError::Protocol(other)),
        }
    }
}

/// Total record size for a tag, tag byte included
pub const fn size_of(tag: MessageTag) -> usize {
    match tag {
        // tag, frequency f32, level u8
        MessageTag::RequestAnalyzeFrequency => TAG_SIZE + 4 + 1,
        MessageTag::RequestStop => TAG_SIZE,
        // tag, frequency f32, level u8, response re f32, im f32
        MessageTag::NotifyFrequencyAnalysis => TAG_SIZE + 4 + 1 + 4 + 4,
    }
}

/// A control message
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Message {
    /// Start generating and measuring at `frequency` (Hz)
    RequestAnalyzeFrequency { frequency: f32, level: PseudoLevel },

    /// Stop generating; idempotent
    RequestStop,

    /// Measured response at the bin-quantized `frequency` (Hz)
    NotifyFrequencyAnalysis {
        frequency: f32,
        level: PseudoLevel,
        response: Complex32,
    },
}

impl Message {
    pub fn tag(&self) -> MessageTag {
        match self {
            Self::RequestAnalyzeFrequency { .. } => MessageTag::RequestAnalyzeFrequency,
            Self::RequestStop => MessageTag::RequestStop,
            Self::NotifyFrequencyAnalysis { .. } => MessageTag::NotifyFrequencyAnalysis,
        }
    }

    /// True for messages travelling from the control thread to the engine
    pub fn is_request(&self) -> bool {
        !matches!(self, Self::NotifyFrequencyAnalysis { .. })
    }

    /// Encoded size in bytes
    pub fn encoded_len(&self) -> usize {
        size_of(self.tag())
    }

    /// Serialize into `buf`, returning the number of bytes used
    pub fn encode(&self, buf: &mut [u8; MAX_MESSAGE_SIZE]) -> usize {
        buf[0] = self.tag() as u8;
        match *self {
            Self::RequestAnalyzeFrequency { frequency, level } => {
                buf[1..5].copy_from_slice(&frequency.to_le_bytes());
                buf[5] = level as u8;
            }
            Self::RequestStop => {}
            Self::NotifyFrequencyAnalysis {
                frequency,
                level,
                response,
            } => {
                buf[1..5].copy_from_slice(&frequency.to_le_bytes());
                buf[5] = level as u8;
                buf[6..10].copy_from_slice(&response.re.to_le_bytes());
                buf[10..14].copy_from_slice(&response.im.to_le_bytes());
            }
        }
        self.encoded_len()
    }

    /// Parse one record from the front of `bytes`
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let first = *bytes.first().ok_or(AnalyzerError::Truncated {
            expected: TAG_SIZE,
            actual: 0,
        })?;
        let tag = MessageTag::try_from(first)?;
        let expected = size_of(tag);
        if bytes.len() < expected {
            return Err(AnalyzerError::Truncated {
                expected,
                actual: bytes.len(),
            });
        }
        Ok(Self::decode_body(tag, bytes))
    }

    /// `bytes` must hold at least `size_of(tag)` bytes
    fn decode_body(tag: MessageTag, bytes: &[u8]) -> Self {
        match tag {
            MessageTag::RequestAnalyzeFrequency => Self::RequestAnalyzeFrequency {
                frequency: read_f32(bytes, 1),
                level: PseudoLevel::from_byte(bytes[5]),
            },
            MessageTag::RequestStop => Self::RequestStop,
            MessageTag::NotifyFrequencyAnalysis => Self::NotifyFrequencyAnalysis {
                frequency: read_f32(bytes, 1),
                level: PseudoLevel::from_byte(bytes[5]),
                response: Complex32::new(read_f32(bytes, 6), read_f32(bytes, 10)),
            },
        }
    }
}

#[inline]
fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    f32::from_le_bytes(raw)
}

/// Enqueue one message. Returns `false` if it does not fit right now.
pub fn send(tx: &mut RingProducer, msg: &Message) -> bool {
    let mut buf = [0u8; MAX_MESSAGE_SIZE];
    let len = msg.encode(&mut buf);
    tx.put(&buf[..len])
}

/// Dequeue one complete message, if one has fully arrived.
///
/// # Panics
/// Panics on a tag outside the protocol: the stream is corrupt and there is
/// no way to resynchronize.
pub fn receive(rx: &mut RingConsumer) -> Option<Message> {
    let mut head = [0u8; TAG_SIZE];
    if !rx.peek(&mut head) {
        return None;
    }
    let tag = match MessageTag::try_from(head[0]) {
        Ok(tag) => tag,
        Err(err) => panic!("message ring corrupted: {err}"),
    };
    let size = size_of(tag);
    if rx.size_used() < size {
        return None;
    }
    let mut buf = [0u8; MAX_MESSAGE_SIZE];
    if !rx.get(&mut buf[..size]) {
        return None;
    }
    Some(Message::decode_body(tag, &buf[..size]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ring_buffer::ring_buffer;

    #[test]
    fn test_sizes_follow_tag() {
        assert_eq!(size_of(MessageTag::RequestAnalyzeFrequency), 6);
        assert_eq!(size_of(MessageTag::RequestStop), 1);
        assert_eq!(size_of(MessageTag::NotifyFrequencyAnalysis), 14);
        assert_eq!(MAX_MESSAGE_SIZE, 14);
    }

    #[test]
    fn test_mixed_sizes_through_ring() {
        let (mut tx, mut rx) = ring_buffer(64);
        let notify = Message::NotifyFrequencyAnalysis {
            frequency: 1000.5,
            level: PseudoLevel::Hi,
            response: Complex32::new(0.5, -0.25),
        };
        assert!(send(&mut tx, &Message::RequestStop));
        assert!(send(&mut tx, &notify));
        assert!(send(
            &mut tx,
            &Message::RequestAnalyzeFrequency {
                frequency: 20.0,
                level: PseudoLevel::Lo,
            }
        ));

        assert_eq!(receive(&mut rx), Some(Message::RequestStop));
        assert_eq!(receive(&mut rx), Some(notify));
        assert_eq!(
            receive(&mut rx),
            Some(Message::RequestAnalyzeFrequency {
                frequency: 20.0,
                level: PseudoLevel::Lo,
            })
        );
        assert_eq!(receive(&mut rx), None);
    }

    #[test]
    fn test_partial_record_is_left_in_place() {
        let (mut tx, mut rx) = ring_buffer(64);
        // Tag of a 6-byte record followed by only 3 payload bytes
        assert!(tx.put(&[MessageTag::RequestAnalyzeFrequency as u8, 0, 0, 0]));
        assert_eq!(receive(&mut rx), None);
        assert_eq!(rx.size_used(), 4);

        assert!(tx.put(&[0, 1]));
        assert!(matches!(
            receive(&mut rx),
            Some(Message::RequestAnalyzeFrequency {
                level: PseudoLevel::Hi,
                ..
            })
        ));
    }

    #[test]
    fn test_send_fails_when_ring_full() {
        let (mut tx, _rx) = ring_buffer(MAX_MESSAGE_SIZE + 2);
        let notify = Message::NotifyFrequencyAnalysis {
            frequency: 1.0,
            level: PseudoLevel::Lo,
            response: Complex32::new(1.0, 0.0),
        };
        assert!(send(&mut tx, &notify));
        assert!(!send(&mut tx, &notify));
        assert_eq!(tx.size_used(), MAX_MESSAGE_SIZE);
    }

    #[test]
    fn test_decode_rejects_unknown_tag_and_short_input() {
        assert!(matches!(
            Message::decode(&[0x7f]),
            Err(AnalyzerError::Protocol(0x7f))
        ));
        assert!(matches!(
            Message::decode(&[MessageTag::NotifyFrequencyAnalysis as u8, 0, 0]),
            Err(AnalyzerError::Truncated {
                expected: 14,
                actual: 3
            })
        ));
    }

    #[test]
    #[should_panic(expected = "message ring corrupted")]
    fn test_receive_panics_on_corrupt_stream() {
        let (mut tx, mut rx) = ring_buffer(8);
        tx.put(&[0xee]);
        let _ = receive(&mut rx);
    }
}
