//! Property-based tests for the byte ring and message framing
//!
//! Every operation sequence is checked against a `VecDeque` model.

use std::collections::VecDeque;

use proptest::prelude::*;
use response_analyzer::audio::messages::{self, MAX_MESSAGE_SIZE};
use response_analyzer::audio::ring_buffer::ring_buffer;
use response_analyzer::audio::Message;
use response_analyzer::params::PseudoLevel;
use rustfft::num_complex::Complex32;

#[derive(Debug, Clone)]
enum Op {
    Put(Vec<u8>),
    Get(usize),
    Peek(usize),
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..24).prop_map(Op::Put),
        (0usize..24).prop_map(Op::Get),
        (0usize..24).prop_map(Op::Peek),
    ]
}

fn arbitrary_level() -> impl Strategy<Value = PseudoLevel> {
    prop_oneof![Just(PseudoLevel::Lo), Just(PseudoLevel::Hi)]
}

fn arbitrary_message() -> impl Strategy<Value = Message> {
    prop_oneof![
        (1.0f32..24000.0, arbitrary_level())
            .prop_map(|(frequency, level)| Message::RequestAnalyzeFrequency { frequency, level }),
        Just(Message::RequestStop),
        (1.0f32..24000.0, arbitrary_level(), -4.0f32..4.0, -4.0f32..4.0).prop_map(
            |(frequency, level, re, im)| Message::NotifyFrequencyAnalysis {
                frequency,
                level,
                response: Complex32::new(re, im),
            }
        ),
    ]
}

proptest! {
    /// Property: the ring behaves like a bounded FIFO with all-or-nothing transfers
    #[test]
    fn ring_matches_fifo_model(
        capacity in 1usize..64,
        ops in prop::collection::vec(arbitrary_op(), 1..200)
    ) {
        let (mut tx, mut rx) = ring_buffer(capacity);
        let mut model: VecDeque<u8> = VecDeque::new();

        for op in ops {
            match op {
                Op::Put(bytes) => {
                    let fits = model.len() + bytes.len() <= capacity;
                    prop_assert_eq!(tx.put(&bytes), fits);
                    if fits {
                        model.extend(bytes);
                    }
                }
                Op::Get(len) => {
                    let mut out = vec![0u8; len];
                    let available = len <= model.len();
                    prop_assert_eq!(rx.get(&mut out), available);
                    if available {
                        let expected: Vec<u8> = model.drain(..len).collect();
                        prop_assert_eq!(out, expected);
                    }
                }
                Op::Peek(len) => {
                    let mut out = vec![0u8; len];
                    let available = len <= model.len();
                    prop_assert_eq!(rx.peek(&mut out), available);
                    if available {
                        let expected: Vec<u8> = model.iter().take(len).copied().collect();
                        prop_assert_eq!(out, expected);
                    }
                }
            }

            prop_assert_eq!(tx.size_used(), model.len());
            prop_assert_eq!(rx.size_used(), model.len());
            prop_assert_eq!(tx.size_used() + tx.size_free(), capacity);
            prop_assert_eq!(rx.size_used() + rx.size_free(), capacity);
        }
    }

    /// Property: framed messages come out whole and in order across wrap-around
    #[test]
    fn framing_preserves_message_boundaries(
        capacity in MAX_MESSAGE_SIZE..64,
        batches in prop::collection::vec(prop::collection::vec(arbitrary_message(), 1..8), 1..20)
    ) {
        let (mut tx, mut rx) = ring_buffer(capacity);

        for batch in batches {
            let mut sent = Vec::new();
            for msg in batch {
                let free = tx.size_free();
                if messages::send(&mut tx, &msg) {
                    sent.push(msg);
                } else {
                    prop_assert!(free < msg.encoded_len());
                    prop_assert_eq!(tx.size_free(), free);
                }
            }

            let mut received = Vec::new();
            while let Some(msg) = messages::receive(&mut rx) {
                received.push(msg);
            }
            prop_assert_eq!(received, sent);
            prop_assert_eq!(rx.size_used(), 0);
        }
    }
}
