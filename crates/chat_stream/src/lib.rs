//! chat_stream - Incremental reader for the chat streaming protocol
//!
//! The server answers with newline-delimited `data: <json>` lines. Bytes
//! arrive in arbitrary chunks; [`StreamReader`] turns them into
//! [`StreamEvent`]s regardless of where the chunk boundaries fall, and
//! [`read_stream`] drives it against a [`StreamHandler`].

pub mod decoder;
pub mod error;
pub mod frame;
pub mod handler;
pub mod lines;
pub mod reader;
pub mod response;

pub use decoder::Utf8Decoder;
pub use error::{Result, StreamError};
pub use frame::{parse_line, Line, StreamEvent, StreamFrame, COMMENT_PREFIX, DATA_PREFIX};
pub use handler::StreamHandler;
pub use lines::{LineBuffer, MAX_LINE_BYTES};
pub use reader::{read_stream, ReadStats, StreamReader};
pub use response::{ByteStream, StreamResponse};
