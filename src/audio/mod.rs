//! Real-time measurement engine and its hosts.
//!
//! The engine emits one bin-centered tone at a time, captures the returned
//! signal and reports the complex response at that frequency. It talks to
//! the control thread only through lock-free message rings.

pub mod fft;
pub mod follower;
pub mod loopback;
pub mod messages;
pub mod processor;
pub mod ring_buffer;
pub mod system;

// Re-export public types
pub use loopback::{FirPath, GainDelayPath, LoopbackHost, LoopbackThread, SignalPath, UnityPath};
pub use messages::{Message, MessageTag};
pub use processor::{AudioProcessor, ProcessorHandle};
pub use system::{default_output_sample_rate, AudioSystem};
