//! C4 (parsing half): tokenizing a command line into a [`Request`].
//!
//! Dispatch and the speak subprotocol live in [`crate::stub`]; this module
//! only turns a validated line into a typed request, the way the original
//! engine's `main` loop pulls words off the line with `readWord` before
//! branching on them.
//!
//! A recognized setter with a missing or malformed argument is a *different*
//! failure than an unrecognized command: the original engine still calls
//! `writeBool(false)` for the former (it never reaches the backend) but
//! answers `Unrecognized command` only for a verb or field it doesn't know
//! at all. The setter variants below carry `Option<T>` so [`crate::stub`]
//! can tell the two apart.

use super::types::PunctuationLevel;

/// A single parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    GetSampleRate,
    GetVoices,
    GetVariants,
    GetEncoding,
    GetVersion,
    /// `set voice <rest of line>`. Always present, possibly empty; an
    /// empty voice id is well-formed but always refused.
    SetVoice(String),
    /// `set variant <token>`. `None` if no token followed.
    SetVariant(Option<String>),
    /// `set pitch <float>`. `None` if the argument was missing or didn't
    /// parse as a float.
    SetPitch(Option<f32>),
    /// `set speed <float>`. `None` if the argument was missing or didn't
    /// parse as a float.
    SetSpeed(Option<f32>),
    /// `set punctuation <level>`. `None` if the argument was missing or
    /// wasn't one of `none`/`some`/`most`/`all`.
    SetPunctuation(Option<PunctuationLevel>),
    /// `set ssml <bool>`. `None` if the argument was missing or wasn't
    /// `true`/`false`.
    SetSsml(Option<bool>),
    Speak,
    Cancel,
    Help,
    Quit,
    /// A blank line, an unrecognized verb, or a `get`/`set` whose field
    /// name isn't known. Answered with `Unrecognized command`.
    Unknown,
}

/// Parses one already-validated, non-empty protocol line into a [`Request`].
///
/// Matching is case-insensitive on both the command verb and its
/// sub-keyword (`get`/`set` and the field name).
pub fn parse(line: &str) -> Request {
    let mut words = line.split_ascii_whitespace();
    let verb = match words.next() {
        Some(v) => v,
        None => return Request::Unknown,
    };

    if verb.eq_ignore_ascii_case("get") {
        return match words.next() {
            Some(w) if w.eq_ignore_ascii_case("samplerate") => Request::GetSampleRate,
            Some(w) if w.eq_ignore_ascii_case("voices") => Request::GetVoices,
            Some(w) if w.eq_ignore_ascii_case("variants") => Request::GetVariants,
            Some(w) if w.eq_ignore_ascii_case("encoding") => Request::GetEncoding,
            Some(w) if w.eq_ignore_ascii_case("version") => Request::GetVersion,
            _ => Request::Unknown,
        };
    }

    if verb.eq_ignore_ascii_case("set") {
        // `set voice` takes the rest of the line verbatim (after the
        // keyword and its following whitespace), since voice IDs may embed
        // commas. Every other setter takes a single token.
        let rest = line[verb.len()..].trim_start();
        let (field, arg) = match rest.split_once(char::is_whitespace) {
            Some((f, a)) => (f, a.trim_start()),
            None => (rest, ""),
        };
        if field.is_empty() {
            return Request::Unknown;
        }

        if field.eq_ignore_ascii_case("voice") {
            // An empty voice id is well-formed but always refused by the
            // backend, matching the original engine's short-circuit on an
            // empty voice name rather than treating it as malformed.
            return Request::SetVoice(arg.to_string());
        }

        let mut arg_words = arg.split_ascii_whitespace();
        let token = arg_words.next();
        // Trailing garbage after the single expected token makes the
        // argument malformed, same as a token that fails to parse.
        let token = if arg_words.next().is_some() { None } else { token };

        return match () {
            _ if field.eq_ignore_ascii_case("variant") => {
                Request::SetVariant(token.map(str::to_string))
            }
            _ if field.eq_ignore_ascii_case("pitch") => {
                Request::SetPitch(token.and_then(parse_strict_f32))
            }
            _ if field.eq_ignore_ascii_case("speed") => {
                Request::SetSpeed(token.and_then(parse_strict_f32))
            }
            _ if field.eq_ignore_ascii_case("punctuation") => Request::SetPunctuation(
                token.and_then(PunctuationLevel::parse_wire_str),
            ),
            _ if field.eq_ignore_ascii_case("ssml") => {
                Request::SetSsml(token.and_then(parse_strict_bool))
            }
            _ => Request::Unknown,
        };
    }

    if verb.eq_ignore_ascii_case("speak") {
        return Request::Speak;
    }
    if verb.eq_ignore_ascii_case("cancel") {
        return Request::Cancel;
    }
    if verb.eq_ignore_ascii_case("help") {
        return Request::Help;
    }
    if verb.eq_ignore_ascii_case("quit") || verb.eq_ignore_ascii_case("exit") {
        return Request::Quit;
    }

    Request::Unknown
}

/// Parses `true`/`false`, case-insensitively, rejecting anything else.
pub fn parse_strict_bool(s: &str) -> Option<bool> {
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Parses a decimal float, rejecting trailing garbage (`3.14abc` fails).
pub fn parse_strict_f32(s: &str) -> Option<f32> {
    s.parse::<f32>().ok()
}
