//! C3: big-endian hex encoding of 16-bit PCM samples.
//!
//! Encoding always emits uppercase `A`-`F`; decoding accepts either case,
//! per the protocol's explicit resolution of an otherwise-unstated point.

use super::buffer::ScratchBuffer;
use super::error::ProtocolError;

/// A reusable, growable output buffer for hex-encoding audio frames.
///
/// Mirrors the original engine's `speechBuffer`/`convertToHex`, but as an
/// owned, non-reentrant-by-construction struct instead of file-scope
/// statics.
#[derive(Debug, Default)]
pub struct HexEncoder {
    scratch: ScratchBuffer,
}

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

impl HexEncoder {
    /// Creates an encoder with an empty scratch buffer.
    pub fn new() -> Self {
        Self {
            scratch: ScratchBuffer::new(),
        }
    }

    /// Encodes `samples` as a big-endian, high-nibble-first hex string.
    ///
    /// The returned slice is valid ASCII and borrows from the encoder's
    /// internal scratch buffer, which is overwritten on the next call.
    pub fn encode(&mut self, samples: &[i16]) -> &str {
        self.scratch.clear();
        let mut out = Vec::with_capacity(samples.len() * 4);

        for &sample in samples {
            let bits = sample as u16;
            out.push(HEX_DIGITS[((bits >> 12) & 0xf) as usize]);
            out.push(HEX_DIGITS[((bits >> 8) & 0xf) as usize]);
            out.push(HEX_DIGITS[((bits >> 4) & 0xf) as usize]);
            out.push(HEX_DIGITS[(bits & 0xf) as usize]);
        }

        // extend() never fails here: the scratch buffer has no hard cap.
        self.scratch.extend(&out).expect("unbounded scratch buffer");
        std::str::from_utf8(self.scratch.as_slice()).expect("hex digits are ASCII")
    }
}

/// Decodes a line of hex ASCII (either case) into 16-bit big-endian samples.
///
/// Fails if the line's length isn't a multiple of 4 or it contains a
/// non-hex-digit byte.
pub fn decode(line: &str) -> Result<Vec<i16>, ProtocolError> {
    let bytes = line.as_bytes();
    if bytes.len() % 4 != 0 {
        return Err(ProtocolError::MalformedHexFrame(format!(
            "frame length {} is not a multiple of 4",
            bytes.len()
        )));
    }

    let mut samples = Vec::with_capacity(bytes.len() / 4);
    for chunk in bytes.chunks_exact(4) {
        let mut value: u16 = 0;
        for &b in chunk {
            let nibble = hex_nibble(b).ok_or_else(|| {
                ProtocolError::MalformedHexFrame(format!("non-hex byte 0x{b:02x} in frame"))
            })?;
            value = (value << 4) | nibble as u16;
        }
        samples.push(value as i16);
    }

    Ok(samples)
}

fn hex_nibble(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_uppercase_big_endian() {
        let mut enc = HexEncoder::new();
        assert_eq!(enc.encode(&[0x1234_i16, -1]), "1234FFFF");
    }

    #[test]
    fn decode_accepts_either_case() {
        assert_eq!(decode("1234ffff").unwrap(), vec![0x1234_i16, -1]);
        assert_eq!(decode("1234FFFF").unwrap(), vec![0x1234_i16, -1]);
    }

    #[test]
    fn decode_rejects_bad_length() {
        assert!(decode("123").is_err());
    }

    #[test]
    fn decode_rejects_non_hex() {
        assert!(decode("123G").is_err());
    }

    #[test]
    fn round_trip_random_samples() {
        use rand::RngCore;
        let mut rng = rand::rng();
        let mut enc = HexEncoder::new();

        for _ in 0..200 {
            let len = (rng.next_u32() % 64) as usize;
            let samples: Vec<i16> = (0..len).map(|_| rng.next_u32() as i16).collect();
            let hex = enc.encode(&samples).to_string();
            assert_eq!(hex.len(), samples.len() * 4);
            assert_eq!(decode(&hex).unwrap(), samples);
        }
    }
}
