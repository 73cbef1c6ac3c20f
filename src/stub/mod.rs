//! The engine-side half of the protocol: C5 (the `Backend` plug-in surface)
//! and C4's dispatch/execution half, built on top of [`crate::protocol`].
//!
//! A backend author links against this module, implements [`Backend`], and
//! calls [`run_engine_main`] from their `main`. Everything here is
//! single-session by construction, mirroring the original engine's
//! process-global, one-connection-per-process design (see Design Notes):
//! an [`EngineStub`] owns its state instead of reaching for statics, but
//! nothing in this crate makes it safe to drive two stubs over the same
//! stdio pair concurrently.

use std::io::{BufRead, Write};

use crate::protocol::command::{self, Request};
use crate::protocol::hex::HexEncoder;
use crate::protocol::types::{Encoding, PunctuationLevel};
use crate::protocol::LineReader;

/// The capability set a TTS backend must implement.
///
/// Every method mirrors one hook in the original engine's backend API.
/// Setters return `bool`: `true` if the change was accepted. The default
/// `speak_char` mirrors the original header's optional `swSpeakChar`, which
/// no wire command ever reaches — a backend only sees it if it calls
/// through to it directly.
pub trait Backend {
    /// Prepares the backend for use, given an optional data directory.
    fn initialize(&mut self, data_dir: Option<&str>) -> bool;

    /// Releases any resources held by the backend.
    fn close(&mut self) -> bool;

    /// The sample rate, in Hz, of audio this backend produces. Frozen for
    /// the lifetime of the process once synthesis has started.
    fn sample_rate(&self) -> u32;

    /// The voice identifiers this backend supports.
    fn voices(&self) -> Vec<String>;

    /// The voice variant identifiers this backend supports, or an empty
    /// list if it has none.
    fn variants(&self) -> Vec<String>;

    fn set_voice(&mut self, id: &str) -> bool;
    fn set_variant(&mut self, id: &str) -> bool;
    fn set_pitch(&mut self, pitch: f32) -> bool;
    fn set_speed(&mut self, speed: f32) -> bool;
    fn set_punctuation(&mut self, level: PunctuationLevel) -> bool;
    fn set_ssml(&mut self, enabled: bool) -> bool;

    /// Synthesizes `text`, invoking `emit` once per PCM frame as audio
    /// becomes available. `emit` returns `false` to request cancellation;
    /// once it has, the backend should stop producing further frames as
    /// soon as it reasonably can, but any frame already in flight when
    /// cancellation is observed is still delivered.
    ///
    /// Returns `true` if synthesis ran to completion (including a
    /// cooperative cancellation), `false` only on outright backend
    /// failure.
    fn speak_text(&mut self, text: &str, emit: &mut dyn FnMut(&[i16]) -> bool) -> bool;

    /// Speaks a single code point in isolation. Optional; the default
    /// implementation declines.
    fn speak_char(&mut self, _code_point: char) -> bool {
        false
    }

    /// Whether the backend wants host-side Sonic pitch post-processing
    /// because it cannot adjust pitch natively.
    fn use_sonic_pitch(&self) -> bool {
        false
    }

    /// Whether the backend wants host-side Sonic speed post-processing
    /// because it cannot adjust speed natively.
    fn use_sonic_speed(&self) -> bool {
        false
    }
}

const HELP_TEXT: &str = "\
cancel         - Interrupt speech while being synthesized
quit/exit      - Close the connection and kill the speech server
get samplerate - Show the sample rate in Hertz
get voices     - List available voices
get variants   - List available variations on voices
get encoding   - Either UTF-8 or ANSI (most use UTF-8)
help           - This command
set voice      - Select a voice by its identifier
set variant    - Select a voice variant by its identifier
set pitch      - Set the pitch
set punctuation [none|some|most|all] - Set punctuation level
set speed      - Set the speed of speech
set ssml [true|false] - Enable or disable ssml support
speak          - Enter text on separate lines, ending with \".\" on a line by
                 itself.  Synthesized samples will be generated in hexadecimal
get version    - Report the speech-switch protocol version, currently 1";

/// Drives one engine session: reads commands from `input`, dispatches them
/// to a [`Backend`], and writes responses to `output`.
pub struct EngineStub<R, W, B> {
    reader: LineReader<R>,
    output: W,
    backend: B,
    encoding: Encoding,
    hex: HexEncoder,
}

impl<R: BufRead, W: Write, B: Backend> EngineStub<R, W, B> {
    /// Builds a stub around `backend`, reading commands from `input` and
    /// writing responses to `output` in the given wire `encoding`.
    pub fn new(input: R, output: W, backend: B, encoding: Encoding) -> Self {
        Self {
            reader: LineReader::new(input, encoding),
            output,
            backend,
            encoding,
            hex: HexEncoder::new(),
        }
    }

    fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        writeln!(self.output, "{line}")?;
        self.output.flush()
    }

    fn write_bool(&mut self, value: bool) -> std::io::Result<()> {
        self.write_line(if value { "true" } else { "false" })
    }

    /// Runs the session's main loop until `quit`/`exit` or end of input.
    ///
    /// Returns `Ok(())` on a clean shutdown. An I/O error writing to the
    /// client is propagated; a malformed line from the client never
    /// reaches this far, since [`LineReader`] only hands back validated,
    /// non-empty lines.
    pub fn run(&mut self) -> std::io::Result<()> {
        loop {
            let line = match self.reader.read_line()? {
                Some(line) => line,
                None => return Ok(()),
            };

            match command::parse(&line) {
                Request::Quit => return Ok(()),
                request => {
                    if !self.dispatch(request)? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Executes one parsed request. Returns `Ok(false)` only for `Quit`,
    /// which [`Self::run`] already intercepts, so callers in practice
    /// always see `Ok(true)` here; kept as a `bool` to mirror the original
    /// dispatcher's "keep looping" return convention.
    fn dispatch(&mut self, request: Request) -> std::io::Result<bool> {
        match request {
            Request::GetSampleRate => self.write_line(&self.backend.sample_rate().to_string())?,
            Request::GetVoices => {
                let voices = self.backend.voices();
                self.write_line(&voices.len().to_string())?;
                for voice in voices {
                    self.write_line(&voice)?;
                }
            }
            Request::GetVariants => {
                let variants = self.backend.variants();
                if variants.is_empty() {
                    self.write_line("0")?;
                } else {
                    self.write_line(&variants.len().to_string())?;
                    for variant in variants {
                        self.write_line(&variant)?;
                    }
                }
            }
            Request::GetEncoding => self.write_line(self.encoding.as_wire_str())?,
            Request::GetVersion => self.write_line("1")?,
            Request::SetVoice(id) => {
                // An empty voice id is refused without ever reaching the
                // backend, matching the original engine's short-circuit.
                let ok = !id.is_empty() && self.backend.set_voice(&id);
                self.write_bool(ok)?;
            }
            Request::SetVariant(id) => {
                let ok = matches!(&id, Some(id) if self.backend.set_variant(id));
                self.write_bool(ok)?;
            }
            Request::SetPitch(v) => {
                let ok = matches!(v, Some(v) if self.backend.set_pitch(v));
                self.write_bool(ok)?;
            }
            Request::SetSpeed(v) => {
                let ok = matches!(v, Some(v) if self.backend.set_speed(v));
                self.write_bool(ok)?;
            }
            Request::SetPunctuation(level) => {
                let ok = matches!(level, Some(level) if self.backend.set_punctuation(level));
                self.write_bool(ok)?;
            }
            Request::SetSsml(v) => {
                let ok = matches!(v, Some(v) if self.backend.set_ssml(v));
                self.write_bool(ok)?;
            }
            Request::Speak => self.exec_speak()?,
            Request::Cancel => {
                // A cancel arriving outside of Speak is a no-op: synthesis
                // has already finished by the time we get back here.
            }
            Request::Help => self.write_line(HELP_TEXT)?,
            Request::Unknown => self.write_line("Unrecognized command")?,
            Request::Quit => unreachable!("Quit is handled by run() before dispatch"),
        }
        Ok(true)
    }

    /// Implements the speak subprotocol (§4.4.1): consume the text block,
    /// report acceptance, stream frames with per-frame acks, and terminate
    /// unconditionally with `done`.
    fn exec_speak(&mut self) -> std::io::Result<()> {
        let text = match self.reader.read_text() {
            Ok(text) => text,
            Err(_) => {
                // Overflow or an unterminated block at EOF: report
                // rejection and, for overflow, stay in Ready; an
                // unterminated block means the stream is gone anyway and
                // the next read_line will report EOF.
                self.write_bool(false)?;
                return Ok(());
            }
        };

        self.write_bool(true)?;

        let mut io_err: Option<std::io::Error> = None;
        let reader = &mut self.reader;
        let output = &mut self.output;
        let hex = &mut self.hex;

        self.backend.speak_text(&text, &mut |samples: &[i16]| {
            if io_err.is_some() {
                return false;
            }
            let encoded = hex.encode(samples).to_string();
            if let Err(e) = writeln!(output, "{encoded}").and_then(|_| output.flush()) {
                io_err = Some(e);
                return false;
            }
            match reader.read_line() {
                Ok(Some(ack)) => ack.eq_ignore_ascii_case("true"),
                Ok(None) => {
                    io_err = Some(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "client closed the connection mid-speak",
                    ));
                    false
                }
                Err(e) => {
                    io_err = Some(e);
                    false
                }
            }
        });

        if let Some(e) = io_err {
            return Err(e);
        }

        self.write_line("done")
    }
}

/// A minimal CLI scaffold for an engine binary: parses the optional
/// `[data_directory]` argument, initializes `backend`, and runs an
/// [`EngineStub`] over real stdio until the session ends.
///
/// Returns the process exit code: `0` on a clean shutdown, `1` if
/// initialization failed or the argument count was wrong, matching the
/// original engine's `main`.
pub fn run_engine_main<B: Backend>(mut backend: B, encoding: Encoding) -> i32 {
    let args: Vec<String> = std::env::args().collect();
    let data_dir = match args.len() {
        1 => None,
        2 => Some(args[1].as_str()),
        _ => {
            eprintln!("Usage: {} [data_directory]", args.first().map(String::as_str).unwrap_or("engine"));
            return 1;
        }
    };

    if !backend.initialize(data_dir) {
        match data_dir {
            Some(dir) => eprintln!("Unable to initialize the TTS engine with data directory {dir}."),
            None => eprintln!("Unable to initialize the TTS engine."),
        }
        return 1;
    }

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut stub = EngineStub::new(stdin.lock(), stdout.lock(), backend, encoding);

    let result = stub.run();
    stub.backend.close();

    match result {
        Ok(()) => 0,
        Err(e) => {
            log::error!("engine session ended with an error: {e}");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct FakeBackend {
        sample_rate: u32,
        voices: Vec<String>,
        variants: Vec<String>,
        last_voice: Option<String>,
        frames: Vec<Vec<i16>>,
        fail_speak: bool,
    }

    impl Default for FakeBackend {
        fn default() -> Self {
            Self {
                sample_rate: 22050,
                voices: vec!["en,english".to_string(), "fr,french".to_string()],
                variants: vec![],
                last_voice: None,
                frames: vec![vec![1, 2, 3], vec![4, 5]],
                fail_speak: false,
            }
        }
    }

    impl Backend for FakeBackend {
        fn initialize(&mut self, _data_dir: Option<&str>) -> bool {
            true
        }
        fn close(&mut self) -> bool {
            true
        }
        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }
        fn voices(&self) -> Vec<String> {
            self.voices.clone()
        }
        fn variants(&self) -> Vec<String> {
            self.variants.clone()
        }
        fn set_voice(&mut self, id: &str) -> bool {
            self.last_voice = Some(id.to_string());
            true
        }
        fn set_variant(&mut self, _id: &str) -> bool {
            true
        }
        fn set_pitch(&mut self, _pitch: f32) -> bool {
            true
        }
        fn set_speed(&mut self, _speed: f32) -> bool {
            true
        }
        fn set_punctuation(&mut self, _level: PunctuationLevel) -> bool {
            true
        }
        fn set_ssml(&mut self, _enabled: bool) -> bool {
            true
        }
        fn speak_text(&mut self, _text: &str, emit: &mut dyn FnMut(&[i16]) -> bool) -> bool {
            if self.fail_speak {
                return false;
            }
            for frame in self.frames.clone() {
                if !emit(&frame) {
                    break;
                }
            }
            true
        }
    }

    fn run_session(input: &str, backend: FakeBackend) -> String {
        let mut output = Vec::new();
        {
            let mut stub = EngineStub::new(
                Cursor::new(input.as_bytes().to_vec()),
                &mut output,
                backend,
                Encoding::Utf8,
            );
            stub.run().unwrap();
        }
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn sample_rate_query() {
        let out = run_session("get samplerate\nquit\n", FakeBackend::default());
        assert_eq!(out, "22050\n");
    }

    #[test]
    fn voice_list() {
        let out = run_session("get voices\nquit\n", FakeBackend::default());
        assert_eq!(out, "2\nen,english\nfr,french\n");
    }

    #[test]
    fn unknown_command() {
        let out = run_session("sing\nquit\n", FakeBackend::default());
        assert_eq!(out, "Unrecognized command\n");
    }

    #[test]
    fn speak_streams_frames_and_terminates_with_done() {
        let input = "speak\nhello\n.\ntrue\ntrue\nquit\n";
        let out = run_session(input, FakeBackend::default());
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("true"));
        assert_eq!(lines.next(), Some("000100020003"));
        assert_eq!(lines.next(), Some("00040005"));
        assert_eq!(lines.next(), Some("done"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn speak_stops_emitting_when_client_cancels() {
        let input = "speak\nhello\n.\ntrue\ncancel\nquit\n";
        let out = run_session(input, FakeBackend::default());
        let mut lines = out.lines();
        assert_eq!(lines.next(), Some("true"));
        assert_eq!(lines.next(), Some("000100020003"));
        assert_eq!(lines.next(), Some("done"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn speak_text_overflow_reports_false_without_synthesizing() {
        let mut body = String::new();
        while body.len() < crate::protocol::MAX_TEXT_LEN + 10 {
            body.push_str("0123456789\n");
        }
        body.push_str(".\nquit\n");
        let input = format!("speak\n{body}");
        let out = run_session(&input, FakeBackend::default());
        assert_eq!(out, "false\n");
    }

    #[test]
    fn help_text_matches_command_table() {
        let out = run_session("help\nquit\n", FakeBackend::default());
        assert!(out.contains("cancel"));
        assert!(out.contains("get samplerate"));
        assert!(out.contains("set ssml"));
    }
}
