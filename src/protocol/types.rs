//! Shared small types for the wire protocol.

/// The maximum length of a single protocol line, in bytes, excluding the
/// newline terminator.
pub const MAX_LINE_LEN: usize = 4094;

/// The hard cap on an assembled `speak` text block, in bytes.
pub const MAX_TEXT_LEN: usize = 64 * 1024;

/// The character encoding an engine uses on its stdio pipes.
///
/// This is a static, engine-declared trait rather than something
/// negotiated per connection: an engine is built in one mode or the
/// other, and `get encoding` simply reports which.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Encoding {
    /// UTF-8, validated per [`crate::protocol::utf8`].
    Utf8,
    /// Opaque "ANSI" bytes; anything `>= 0x20` is passed through.
    Ansi,
}

impl Encoding {
    /// The wire representation of this encoding, as returned by
    /// `get encoding`.
    pub fn as_wire_str(self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Ansi => "ANSI",
        }
    }

    /// Parses the wire representation of an encoding.
    pub fn parse_wire_str(s: &str) -> Option<Self> {
        match s {
            "UTF-8" => Some(Encoding::Utf8),
            "ANSI" => Some(Encoding::Ansi),
            _ => None,
        }
    }
}

/// The level of punctuation an engine should speak aloud.
///
/// Ordered `None < Some < Most < All`, as spelled out by the protocol.
#[derive(Debug, Copy, Clone, Eq, PartialEq, PartialOrd, Ord)]
pub enum PunctuationLevel {
    /// Speak no punctuation.
    None,
    /// Speak some punctuation.
    Some,
    /// Speak most punctuation.
    Most,
    /// Speak all punctuation.
    All,
}

impl PunctuationLevel {
    /// Parses a `set punctuation` argument, case-insensitively.
    pub fn parse_wire_str(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("none") {
            Some(PunctuationLevel::None)
        } else if s.eq_ignore_ascii_case("some") {
            Some(PunctuationLevel::Some)
        } else if s.eq_ignore_ascii_case("most") {
            Some(PunctuationLevel::Most)
        } else if s.eq_ignore_ascii_case("all") {
            Some(PunctuationLevel::All)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_order() {
        assert!(PunctuationLevel::None < PunctuationLevel::Some);
        assert!(PunctuationLevel::Some < PunctuationLevel::Most);
        assert!(PunctuationLevel::Most < PunctuationLevel::All);
    }

    #[test]
    fn punctuation_parse_case_insensitive() {
        assert_eq!(
            PunctuationLevel::parse_wire_str("MOST"),
            Some(PunctuationLevel::Most)
        );
        assert_eq!(PunctuationLevel::parse_wire_str("loud"), None);
    }

    #[test]
    fn encoding_wire_round_trip() {
        assert_eq!(Encoding::parse_wire_str(Encoding::Utf8.as_wire_str()), Some(Encoding::Utf8));
        assert_eq!(Encoding::parse_wire_str(Encoding::Ansi.as_wire_str()), Some(Encoding::Ansi));
    }
}
