//! A minimal engine binary used by the integration tests to drive a real
//! [`sayswitch::host::Session`] against a real subprocess, the way the
//! original engine is always a separate executable rather than an
//! in-process fake.
//!
//! Not part of the public crate surface; this binary exists purely as a
//! test fixture.

use sayswitch::protocol::PunctuationLevel;
use sayswitch::stub::{run_engine_main, Backend};
use sayswitch::protocol::Encoding;

struct TestBackend {
    voices: Vec<String>,
    frame_count: usize,
}

impl Backend for TestBackend {
    fn initialize(&mut self, _data_dir: Option<&str>) -> bool {
        true
    }

    fn close(&mut self) -> bool {
        true
    }

    fn sample_rate(&self) -> u32 {
        22050
    }

    fn voices(&self) -> Vec<String> {
        self.voices.clone()
    }

    fn variants(&self) -> Vec<String> {
        Vec::new()
    }

    fn set_voice(&mut self, id: &str) -> bool {
        !id.is_empty()
    }

    fn set_variant(&mut self, _id: &str) -> bool {
        true
    }

    fn set_pitch(&mut self, pitch: f32) -> bool {
        pitch.is_finite()
    }

    fn set_speed(&mut self, speed: f32) -> bool {
        speed.is_finite()
    }

    fn set_punctuation(&mut self, _level: PunctuationLevel) -> bool {
        true
    }

    fn set_ssml(&mut self, _enabled: bool) -> bool {
        true
    }

    fn speak_text(&mut self, text: &str, emit: &mut dyn FnMut(&[i16]) -> bool) -> bool {
        // One frame of `self.frame_count` samples per word in the text,
        // just enough shape for tests to assert on frame counts.
        for (i, _word) in text.split_whitespace().enumerate() {
            let sample = (i + 1) as i16;
            let frame: Vec<i16> = std::iter::repeat(sample).take(self.frame_count).collect();
            if !emit(&frame) {
                break;
            }
        }
        true
    }
}

fn main() {
    let backend = TestBackend {
        voices: vec!["en,english".to_string(), "fr,french".to_string()],
        frame_count: 4,
    };
    std::process::exit(run_engine_main(backend, Encoding::Utf8));
}
