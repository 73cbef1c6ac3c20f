//! C6: the host-side engine session.

use std::io::{BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::protocol::command as wire;
use crate::protocol::hex;
use crate::protocol::types::{Encoding, PunctuationLevel};
use crate::protocol::{LineReader, ProtocolError};

/// A failure communicating with or starting an engine subprocess.
#[derive(Error, Debug)]
pub enum SessionError {
    /// An I/O error occurred reading or writing the engine's pipes.
    #[error("IO error communicating with the engine: {0}")]
    Io(#[from] std::io::Error),
    /// A frame the engine sent failed to decode as hex.
    #[error("protocol error from engine: {0}")]
    Protocol(#[from] ProtocolError),
    /// The engine closed its end of the pipe while a reply was expected.
    #[error("engine closed the connection unexpectedly")]
    PeerClosed,
    /// The engine's reply didn't parse as the expected shape (a bad
    /// integer, an unrecognized encoding name, a malformed hex frame).
    #[error("malformed reply from engine: {0}")]
    MalformedReply(String),
    /// The session had already failed and refused to perform further I/O.
    #[error("session has already failed")]
    Failed,
}

/// A cheap, cloneable handle that lets any thread request cancellation of
/// an in-flight `speak` without touching the session's pipes.
///
/// Mirrors the original engine's `swCancel`: setting the flag is the only
/// operation, and it is safe to call at any time, including when no
/// `speak` is in progress (in which case it is simply cleared on the next
/// `speak` without effect).
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Requests cancellation of the current or next `speak` call.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One audio frame delivered to the caller's callback during `speak`,
/// mirroring the audio callback contract's `(samples, cancelRequested)`
/// pair.
pub struct AudioFrame<'a> {
    /// The decoded PCM samples for this frame.
    pub samples: &'a [i16],
    /// Whether cancellation has already been requested for this speak
    /// call, either by the caller's own callback returning `false` on a
    /// prior frame or by a concurrent call to [`CancelHandle::cancel`].
    pub cancel_requested: bool,
}

/// A host-side handle on one running engine subprocess.
///
/// Owns both pipe ends exclusively: nothing outside this type may read
/// from or write to the child's stdin/stdout. Once a session fails (any
/// I/O error, protocol violation, or peer close), every subsequent call
/// returns an error without touching the pipes, mirroring the sticky
/// failed bit in the protocol's error handling design.
pub struct Session {
    child: Child,
    stdin: ChildStdin,
    reader: LineReader<BufReader<ChildStdout>>,
    encoding: Encoding,
    sample_rate: u32,
    voices: Vec<String>,
    variants: Vec<String>,
    sonic_for_pitch: bool,
    sonic_for_speed: bool,
    cancel: CancelHandle,
    failed: bool,
}

impl Session {
    /// Spawns `<lib_dir>/<engine_name>` with `data_dir` as its sole
    /// optional argument, wires up its stdio, and eagerly fetches the
    /// sample rate, encoding, voice and variant lists, and Sonic hints.
    ///
    /// Sonic pitch/speed hints are host-local configuration only: no wire
    /// command reports them, so they start `false` and are set later via
    /// [`Session::enable_sonic_pitch`]/[`Session::enable_sonic_speed`].
    pub fn start(
        lib_dir: impl AsRef<std::path::Path>,
        engine_name: &str,
        data_dir: Option<&str>,
    ) -> Result<Self, SessionError> {
        let path = lib_dir.as_ref().join(engine_name);

        let mut command = Command::new(path);
        if let Some(dir) = data_dir {
            command.arg(dir);
        }
        command.stdin(Stdio::piped()).stdout(Stdio::piped());

        let mut child = command.spawn()?;
        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = child.stdout.take().expect("stdout was piped");

        let mut session = Session {
            child,
            stdin,
            reader: LineReader::new(BufReader::new(stdout), Encoding::Utf8),
            encoding: Encoding::Utf8,
            sample_rate: 0,
            voices: Vec::new(),
            variants: Vec::new(),
            sonic_for_pitch: false,
            sonic_for_speed: false,
            cancel: CancelHandle::new(),
            failed: false,
        };

        session.encoding = session.get_encoding()?;
        session.reader.set_encoding(session.encoding);
        session.sample_rate = session.get_sample_rate()?;
        session.voices = session.get_voices()?;
        session.variants = session.get_variants()?;

        Ok(session)
    }

    /// A cloneable handle that can request cancellation of this session's
    /// current or next `speak` call from any thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Requests cancellation of the current or next `speak` call.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The engine's reported sample rate, frozen at [`Session::start`].
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The wire encoding this engine declared.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// The voice identifiers cached at [`Session::start`].
    pub fn voices(&self) -> &[String] {
        &self.voices
    }

    /// The voice variant identifiers cached at [`Session::start`].
    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// Enables or disables host-side Sonic pitch post-processing for this
    /// session. This is never negotiated over the wire.
    pub fn enable_sonic_pitch(&mut self, enabled: bool) {
        self.sonic_for_pitch = enabled;
    }

    /// Enables or disables host-side Sonic speed post-processing for this
    /// session. This is never negotiated over the wire.
    pub fn enable_sonic_speed(&mut self, enabled: bool) {
        self.sonic_for_speed = enabled;
    }

    /// Whether Sonic pitch post-processing is enabled for this session.
    pub fn sonic_used_for_pitch(&self) -> bool {
        self.sonic_for_pitch
    }

    /// Whether Sonic speed post-processing is enabled for this session.
    pub fn sonic_used_for_speed(&self) -> bool {
        self.sonic_for_speed
    }

    fn get_sample_rate(&mut self) -> Result<u32, SessionError> {
        let line = self.roundtrip("get samplerate")?;
        line.parse().map_err(|_| {
            SessionError::MalformedReply(format!("expected an integer sample rate, got {line:?}"))
        })
    }

    fn get_encoding(&mut self) -> Result<Encoding, SessionError> {
        let line = self.roundtrip("get encoding")?;
        Encoding::parse_wire_str(&line)
            .ok_or_else(|| SessionError::MalformedReply(format!("unrecognized encoding {line:?}")))
    }

    fn get_voices(&mut self) -> Result<Vec<String>, SessionError> {
        self.roundtrip_list("get voices")
    }

    fn get_variants(&mut self) -> Result<Vec<String>, SessionError> {
        self.roundtrip_list("get variants")
    }

    /// Reports the protocol version the engine implements.
    pub fn version(&mut self) -> Result<String, SessionError> {
        self.roundtrip("get version")
    }

    /// Issues `set voice <id>`, returning whether the engine accepted it.
    pub fn set_voice(&mut self, id: &str) -> Result<bool, SessionError> {
        self.roundtrip_bool(&format!("set voice {id}"))
    }

    /// Issues `set variant <id>`, returning whether the engine accepted it.
    pub fn set_variant(&mut self, id: &str) -> Result<bool, SessionError> {
        self.roundtrip_bool(&format!("set variant {id}"))
    }

    /// Issues `set pitch <value>`, returning whether the engine accepted
    /// it.
    pub fn set_pitch(&mut self, value: f32) -> Result<bool, SessionError> {
        self.roundtrip_bool(&format!("set pitch {value}"))
    }

    /// Issues `set speed <value>`, returning whether the engine accepted
    /// it.
    pub fn set_speed(&mut self, value: f32) -> Result<bool, SessionError> {
        self.roundtrip_bool(&format!("set speed {value}"))
    }

    /// Issues `set punctuation <level>`, returning whether the engine
    /// accepted it.
    pub fn set_punctuation(&mut self, level: PunctuationLevel) -> Result<bool, SessionError> {
        let word = match level {
            PunctuationLevel::None => "none",
            PunctuationLevel::Some => "some",
            PunctuationLevel::Most => "most",
            PunctuationLevel::All => "all",
        };
        self.roundtrip_bool(&format!("set punctuation {word}"))
    }

    /// Issues `set ssml <bool>`, returning whether the engine accepted it.
    pub fn set_ssml(&mut self, enabled: bool) -> Result<bool, SessionError> {
        self.roundtrip_bool(&format!("set ssml {enabled}"))
    }

    /// Speaks `text`, invoking `callback` once per decoded audio frame
    /// until the engine reports `done`.
    ///
    /// `callback` receives the samples and whether cancellation has
    /// already been requested; returning `false` requests cancellation of
    /// the remaining frames, same as setting [`CancelHandle::cancel`].
    /// Returns `Ok(true)` if the engine accepted the text and `Ok(false)`
    /// if it rejected it outright (e.g. on overflow) — note the engine
    /// still answers `done` in that case, but with no frames in between.
    /// The cancellation flag is cleared when this call returns, matching
    /// the protocol's scoping of `cancelRequested` to a single `speak`.
    pub fn speak(
        &mut self,
        text: &str,
        mut callback: impl FnMut(AudioFrame<'_>) -> bool,
    ) -> Result<bool, SessionError> {
        if self.failed {
            return Err(SessionError::Failed);
        }

        // A cancel requested before this call (or left over from a call
        // that already completed) must not leak into this speak.
        self.cancel.clear();
        let result = self.speak_inner(text, &mut callback);
        self.cancel.clear();
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn speak_inner(
        &mut self,
        text: &str,
        callback: &mut dyn FnMut(AudioFrame<'_>) -> bool,
    ) -> Result<bool, SessionError> {
        writeln!(self.stdin, "speak")?;
        for line in text.split('\n') {
            if line.starts_with('.') {
                writeln!(self.stdin, ".{line}")?;
            } else {
                writeln!(self.stdin, "{line}")?;
            }
        }
        writeln!(self.stdin, ".")?;
        self.stdin.flush()?;

        let accepted = self.read_bool_reply()?;

        loop {
            let line = self
                .reader
                .read_line()?
                .ok_or(SessionError::PeerClosed)?;

            if line.eq_ignore_ascii_case("done") {
                return Ok(accepted);
            }

            let samples = hex::decode(&line)?;
            let cancel_requested = self.cancel.is_set();
            let keep_going = callback(AudioFrame {
                samples: &samples,
                cancel_requested,
            });

            if !keep_going {
                self.cancel.cancel();
            }

            let ack = if keep_going && !self.cancel.is_set() {
                "true"
            } else {
                "cancel"
            };
            writeln!(self.stdin, "{ack}")?;
            self.stdin.flush()?;
        }
    }

    fn read_bool_reply(&mut self) -> Result<bool, SessionError> {
        let line = self.roundtrip_read()?;
        wire::parse_strict_bool(&line)
            .ok_or_else(|| SessionError::MalformedReply(format!("expected true/false, got {line:?}")))
    }

    fn roundtrip(&mut self, command: &str) -> Result<String, SessionError> {
        if self.failed {
            return Err(SessionError::Failed);
        }
        let result = (|| {
            writeln!(self.stdin, "{command}")?;
            self.stdin.flush()?;
            self.roundtrip_read()
        })();
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn roundtrip_read(&mut self) -> Result<String, SessionError> {
        self.reader.read_line()?.ok_or(SessionError::PeerClosed)
    }

    fn roundtrip_bool(&mut self, command: &str) -> Result<bool, SessionError> {
        let line = self.roundtrip(command)?;
        wire::parse_strict_bool(&line)
            .ok_or_else(|| SessionError::MalformedReply(format!("expected true/false, got {line:?}")))
    }

    fn roundtrip_list(&mut self, command: &str) -> Result<Vec<String>, SessionError> {
        if self.failed {
            return Err(SessionError::Failed);
        }
        let result = (|| {
            writeln!(self.stdin, "{command}")?;
            self.stdin.flush()?;
            let count_line = self.roundtrip_read()?;
            let count: usize = count_line.parse().map_err(|_| {
                SessionError::MalformedReply(format!("expected a line count, got {count_line:?}"))
            })?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(self.roundtrip_read()?);
            }
            Ok(items)
        })();
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    /// Whether this session has hit a fatal error and will refuse further
    /// I/O.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Sends `quit`, closes both pipes, and reaps the child process.
    ///
    /// Idempotent: calling `stop` on an already-stopped or already-failed
    /// session is a no-op that never blocks.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        if self.failed {
            let _ = self.child.kill();
            let _ = self.child.wait();
            return Ok(());
        }

        let _ = writeln!(self.stdin, "quit").and_then(|_| self.stdin.flush());
        self.failed = true;
        let _ = self.child.wait();
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
