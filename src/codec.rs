//! Base62 short code codec
//!
//! Maps numeric link identifiers to short codes and back. The mapping is
//! bijective but not order-preserving: `"10"` sorts before `"9"` even though
//! 62 > 9.

use thiserror::Error;

/// Digits, then uppercase, then lowercase.
pub const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

const BASE: u64 = 62;

/// Length of `encode(u64::MAX)`
pub const MAX_CODE_LEN: usize = 11;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("short code is empty")]
    Empty,
    #[error("invalid character {0:?} in short code")]
    InvalidCharacter(char),
    #[error("short code exceeds the 64-bit identifier range")]
    Overflow,
}

/// Encode an identifier as a base62 short code (no padding, `0` -> `"0"`).
pub fn encode(mut id: u64) -> String {
    if id == 0 {
        return (ALPHABET[0] as char).to_string();
    }

    let mut buf = Vec::with_capacity(MAX_CODE_LEN);
    while id > 0 {
        buf.push(ALPHABET[(id % BASE) as usize]);
        id /= BASE;
    }
    buf.reverse();

    // Every byte comes from ALPHABET, which is ASCII
    buf.into_iter().map(char::from).collect()
}

/// Decode a short code back into its identifier.
pub fn decode(code: &str) -> Result<u64, CodecError> {
    if code.is_empty() {
        return Err(CodecError::Empty);
    }

    code.chars().try_fold(0u64, |acc, c| {
        let digit = digit_value(c).ok_or(CodecError::InvalidCharacter(c))?;
        acc.checked_mul(BASE)
            .and_then(|v| v.checked_add(digit))
            .ok_or(CodecError::Overflow)
    })
}

fn digit_value(c: char) -> Option<u64> {
    let value = match c {
        '0'..='9' => c as u64 - '0' as u64,
        'A'..='Z' => c as u64 - 'A' as u64 + 10,
        'a'..='z' => c as u64 - 'a' as u64 + 36,
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radix_boundaries() {
        assert_eq!(encode(0), "0");
        assert_eq!(encode(9), "9");
        assert_eq!(encode(10), "A");
        assert_eq!(encode(61), "z");
        assert_eq!(encode(62), "10");
        assert_eq!(encode(62 * 62), "100");
    }

    #[test]
    fn test_round_trip_samples() {
        let samples = [
            0,
            1,
            61,
            62,
            100_000,
            3_521_614_606_207,
            u32::MAX as u64,
            i64::MAX as u64,
            u64::MAX - 1,
            u64::MAX,
        ];
        for id in samples {
            let code = encode(id);
            assert!(code.bytes().all(|b| ALPHABET.contains(&b)), "{code}");
            assert_eq!(decode(&code), Ok(id), "round trip failed for {id}");
        }
    }

    #[test]
    fn test_max_value_is_eleven_chars() {
        let code = encode(u64::MAX);
        assert_eq!(code.len(), MAX_CODE_LEN);
        assert_eq!(code, "LygHa16AHYF");
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert_eq!(decode(""), Err(CodecError::Empty));
        assert_eq!(decode("ab-c"), Err(CodecError::InvalidCharacter('-')));
        assert_eq!(decode("é"), Err(CodecError::InvalidCharacter('é')));
        assert_eq!(decode("zzzzzzzzzzzz"), Err(CodecError::Overflow));
        // one past u64::MAX
        assert_eq!(decode("LygHa16AHYG"), Err(CodecError::Overflow));
    }

    #[test]
    fn test_not_order_preserving() {
        assert!(encode(62) < encode(9));
    }
}
