//! The stdio wire protocol shared by the host and the engine stub: framing
//! (C1/C2), audio encoding (C3), command parsing (C4, parsing half), and the
//! scratch buffer arena (C8) they all build on.

pub mod buffer;
pub mod command;
pub mod error;
pub mod hex;
pub mod line;
pub mod types;
pub mod utf8;

pub use command::Request;
pub use error::ProtocolError;
pub use line::LineReader;
pub use types::{Encoding, PunctuationLevel, MAX_LINE_LEN, MAX_TEXT_LEN};
