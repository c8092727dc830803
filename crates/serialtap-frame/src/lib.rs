//! Newline-delimited text framing over chunked byte streams.
//!
//! Serial reads arrive in transport-sized chunks that have nothing to do with
//! message boundaries. This layer turns them back into complete, trimmed,
//! non-empty lines and encodes outbound commands as `command + "\n"`.
//!
//! - [`LineFramer`]: the pure reassembly state machine
//! - [`LineReader`] / [`LineWriter`]: blocking adapters over `Read` / `Write`
//! - `LineCodec`: the same rules as a `tokio_util` codec (behind `async`)

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use codec::LineCodec;
pub use codec::{encode_line, trim_line, LineFramer, DELIMITER};
pub use error::{FrameError, Result};
pub use reader::{split, LineReader, ReadOutcome};
pub use writer::LineWriter;
