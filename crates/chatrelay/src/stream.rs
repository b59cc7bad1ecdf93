//! Reassembly of an incremental completion from raw transport chunks.
//!
//! Bytes go through [`Utf8Decoder`], the text through [`FrameParser`], and
//! [`delta_events`] ties both to a chunk stream.

mod decoder;
mod events;
mod parser;

pub use decoder::Utf8Decoder;
pub use events::{delta_events, DeltaStream};
pub use parser::{parse_frame, FrameError, FrameParser};
