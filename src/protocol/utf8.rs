//! C1: a from-scratch UTF-8 classifier, defending against over-long and
//! surrogate encodings the way `iconv -f UTF-8 -t UTF-32//STRICT` would
//! reject them.
//!
//! This deliberately does not use `std::str::from_utf8`: the protocol needs
//! byte-at-a-time classification so the line reader can drop individual
//! invalid characters and keep the rest of the line, rather than rejecting
//! the whole line on the first bad byte.

/// Classifies the UTF-8 (or control) character starting at `bytes[0]`.
///
/// Returns `(length, valid)`: `length` is always the number of bytes this
/// character occupies (so the caller can skip over it even when invalid),
/// and `valid` is `false` if the character should be dropped.
///
/// `bytes` must be non-empty.
pub fn classify(bytes: &[u8]) -> (usize, bool) {
    let c = bytes[0];

    if c & 0x80 == 0 {
        // ASCII. Control characters are stripped.
        return (1, c >= 0x20);
    }

    let expected_len = (c << 1).leading_ones() as usize + 1;
    if !(2..=4).contains(&expected_len) {
        // No unicode scalar value needs more than 4 bytes, and a leading
        // byte of 10xxxxxx (expected_len == 1) is itself a continuation
        // byte, not a valid lead byte.
        return (1, false);
    }

    let mut code_point: u32 = (c as u32) & (0x7f >> expected_len);
    let mut len = 1;
    while len < expected_len {
        match bytes.get(len) {
            Some(&b) if b & 0xc0 == 0x80 => {
                code_point = (code_point << 6) | (b as u32 & 0x3f);
                len += 1;
            }
            _ => return (len, false),
        }
    }

    let over_long = match expected_len {
        2 => code_point < 0x80,
        3 => code_point < 0x800,
        4 => code_point < 0x10000,
        _ => unreachable!(),
    };

    let valid = !over_long
        && code_point <= 0x10ffff
        && !(0xd800..=0xdfff).contains(&code_point);

    (len, valid)
}

/// Strips invalid UTF-8 (per [`classify`]) and bare control characters from
/// `bytes` in place, returning the number of valid bytes kept.
pub fn sanitize_utf8(bytes: &mut [u8]) -> usize {
    let mut read = 0;
    let mut write = 0;

    while read < bytes.len() {
        let (len, valid) = classify(&bytes[read..]);
        let len = len.max(1).min(bytes.len() - read);

        if valid {
            bytes.copy_within(read..read + len, write);
            write += len;
        }

        read += len;
    }

    write
}

/// Strips bare control characters from `bytes` in place for ANSI-mode
/// sessions, where UTF-8 validation is bypassed entirely and every byte
/// `>= 0x20` is kept opaquely.
pub fn sanitize_ansi(bytes: &mut [u8]) -> usize {
    let mut write = 0;
    for read in 0..bytes.len() {
        if bytes[read] >= 0x20 {
            bytes[write] = bytes[read];
            write += 1;
        }
    }
    write
}
