use thiserror::Error;

/// Error returned when a text literal cannot be read as a number
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumberFormatError {
    #[error("empty input")]
    Empty,
    #[error("no digits after prefix in '{0}'")]
    MissingDigits(String),
    #[error("invalid digit '{digit}' for radix {radix} in '{text}'")]
    InvalidDigit { text: String, digit: char, radix: u32 },
}

/// Get a mask with the lowest `bits` bits set
pub fn mask(bits: u8) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Interpret the lowest `bits` bits of `value` as a two's complement number
pub fn sign_extend(value: u64, bits: u8) -> i64 {
    if bits == 0 {
        return 0;
    }
    if bits >= 64 {
        return value as i64;
    }
    let shift = 64 - bits as u32;
    ((value << shift) as i64) >> shift
}

/// Decode an integer literal.
///
/// The radix is taken from the syntax of the literal:
/// - `0x1F` hex, `0b101` binary, `017` octal, `42` decimal
/// - `'a'` a single character (the closing quote is optional)
/// - a leading `-` negates the result (two's complement)
///
/// Digits accumulate with 64-bit wraparound, so oversized literals do not fail.
pub fn decode(text: &str) -> Result<u64, NumberFormatError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(NumberFormatError::Empty);
    }

    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    if body.is_empty() {
        return Err(NumberFormatError::MissingDigits(text.to_string()));
    }

    let magnitude = if let Some(rest) = body.strip_prefix('\'') {
        let mut chars = rest.chars();
        let c = chars
            .next()
            .ok_or_else(|| NumberFormatError::MissingDigits(text.to_string()))?;
        match chars.as_str() {
            "" | "'" => c as u64,
            other => {
                let digit = other.chars().next().unwrap_or('\'');
                return Err(NumberFormatError::InvalidDigit {
                    text: text.to_string(),
                    digit,
                    radix: 0,
                });
            }
        }
    } else {
        let (radix, digits) = split_radix(body);
        if digits.is_empty() {
            return Err(NumberFormatError::MissingDigits(text.to_string()));
        }
        parse_digits(text, digits, radix)?
    };

    Ok(if negative {
        magnitude.wrapping_neg()
    } else {
        magnitude
    })
}

fn split_radix(body: &str) -> (u32, &str) {
    let bytes = body.as_bytes();
    if bytes.len() > 1 && bytes[0] == b'0' {
        match bytes[1] {
            b'x' | b'X' => (16, &body[2..]),
            b'b' | b'B' => (2, &body[2..]),
            _ => (8, &body[1..]),
        }
    } else {
        (10, body)
    }
}

fn parse_digits(text: &str, digits: &str, radix: u32) -> Result<u64, NumberFormatError> {
    digits.chars().try_fold(0u64, |acc, c| {
        let d = c.to_digit(radix).ok_or_else(|| NumberFormatError::InvalidDigit {
            text: text.to_string(),
            digit: c,
            radix,
        })?;
        Ok(acc.wrapping_mul(radix as u64).wrapping_add(d as u64))
    })
}
