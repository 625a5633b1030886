/*
 * literal.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Literal decoding for template source fragments.
//!
//! The caller (a front end that has already isolated the literal text,
//! without its surrounding quotes) hands each fragment to one of the
//! `parse_*` functions here. Decoding enforces the host-language rules:
//!
//! - String/character escapes `\b \t \n \f \r \' \" \\`, `\uXXXX` with
//!   exactly four hex digits, and octal escapes `\0`..`\377` (one to three
//!   octal digits; a three-digit form only when the first digit is at most
//!   3).
//! - Character literals must decode to exactly one character; the raw text
//!   between quotes is one to six characters long.
//! - Integer literals are decimal, `0x` hexadecimal, or `0b` binary, with
//!   an optional `l`/`L` suffix selecting a 64-bit result. Hexadecimal and
//!   binary forms wrap two's-complement at the result width, so
//!   `0x7fffffff` is `i32::MAX` and `0x80000000` is `i32::MIN`.
//! - Floating-point literals are decimal or hexadecimal-with-binary-
//!   exponent (`p`), with an `f`/`F` or `d`/`D` suffix selecting the
//!   result precision (double when absent).
//! - `_` digit separators are permitted between digits and stripped.
//!
//! All failures carry the literal's source position and are raised at AST
//! construction time, before any execution.

use crate::error::{EngineError, EngineResult};
use crate::position::Position;
use crate::value::Value;

fn malformed(message: impl Into<String>, position: Position) -> EngineError {
    EngineError::MalformedLiteral {
        message: message.into(),
        position,
    }
}

/// Decode the escape sequences in a string literal body (quotes already
/// stripped).
pub fn parse_string(content: &str, position: Position) -> EngineResult<String> {
    decode_escapes(content, position)
}

/// Decode a character literal body (quotes already stripped). The decoded
/// content must be exactly one character.
pub fn parse_character(content: &str, position: Position) -> EngineResult<char> {
    let raw_len = content.chars().count();
    if raw_len == 0 {
        return Err(malformed("empty character literal", position));
    }
    if raw_len > 6 {
        return Err(malformed(
            format!("character literal too long: '{content}'"),
            position,
        ));
    }
    let decoded = decode_escapes(content, position)?;
    let mut chars = decoded.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(malformed(
            format!("character literal must contain exactly one character: '{content}'"),
            position,
        )),
    }
}

fn decode_escapes(content: &str, position: Position) -> EngineResult<String> {
    let mut out = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(&esc) = chars.peek() else {
            return Err(malformed("dangling backslash", position));
        };
        match esc {
            'b' => {
                chars.next();
                out.push('\u{0008}');
            }
            't' => {
                chars.next();
                out.push('\t');
            }
            'n' => {
                chars.next();
                out.push('\n');
            }
            'f' => {
                chars.next();
                out.push('\u{000c}');
            }
            'r' => {
                chars.next();
                out.push('\r');
            }
            '\'' => {
                chars.next();
                out.push('\'');
            }
            '"' => {
                chars.next();
                out.push('"');
            }
            '\\' => {
                chars.next();
                out.push('\\');
            }
            'u' => {
                chars.next();
                let mut digits = String::new();
                for _ in 0..4 {
                    match chars.peek() {
                        Some(d) if d.is_ascii_hexdigit() => {
                            digits.push(*d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                if digits.len() != 4 {
                    return Err(malformed(
                        format!("unicode escape requires exactly four hex digits, found '\\u{digits}'"),
                        position,
                    ));
                }
                let code = u32::from_str_radix(&digits, 16).expect("validated hex digits");
                match char::from_u32(code) {
                    Some(ch) => out.push(ch),
                    None => {
                        return Err(malformed(
                            format!("invalid unicode escape '\\u{digits}'"),
                            position,
                        ));
                    }
                }
            }
            '0'..='7' => {
                // One to three octal digits; a third digit is only consumed
                // when the first digit is at most 3, keeping the value in
                // the \0..\377 range.
                let first = esc;
                chars.next();
                let mut digits = String::from(first);
                if chars.peek().is_some_and(|d| ('0'..='7').contains(d)) {
                    digits.push(chars.next().expect("peeked"));
                    if first <= '3' && chars.peek().is_some_and(|d| ('0'..='7').contains(d)) {
                        digits.push(chars.next().expect("peeked"));
                    }
                }
                let code = u32::from_str_radix(&digits, 8).expect("validated octal digits");
                debug_assert!(code <= 0o377);
                out.push(char::from_u32(code).expect("octal escapes are in the Latin-1 range"));
            }
            other => {
                return Err(malformed(
                    format!("unknown escape sequence '\\{other}'"),
                    position,
                ));
            }
        }
    }
    Ok(out)
}

/// Parse an integer literal. The result is [`Value::Int`] unless an
/// `l`/`L` suffix selects [`Value::Long`].
pub fn parse_integer(text: &str, position: Position) -> EngineResult<Value> {
    let (body, long) = match text.strip_suffix(['l', 'L']) {
        Some(rest) => (rest, true),
        None => (text, false),
    };
    let (digits, radix) = if let Some(rest) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        (rest, 16)
    } else if let Some(rest) = body.strip_prefix("0b").or_else(|| body.strip_prefix("0B")) {
        (rest, 2)
    } else {
        (body, 10)
    };
    let digits = strip_separators(digits, text, position)?;
    if digits.is_empty() {
        return Err(malformed(format!("invalid integer literal '{text}'"), position));
    }
    if radix == 10 {
        if long {
            let value = digits
                .parse::<i64>()
                .map_err(|_| malformed(format!("integer literal out of range: '{text}'"), position))?;
            Ok(Value::Long(value))
        } else {
            let value = digits
                .parse::<i32>()
                .map_err(|_| malformed(format!("integer literal out of range: '{text}'"), position))?;
            Ok(Value::Int(value))
        }
    } else if long {
        // Two's-complement wraparound at 64 bits.
        let value = u64::from_str_radix(&digits, radix)
            .map_err(|_| malformed(format!("invalid integer literal '{text}'"), position))?;
        Ok(Value::Long(value as i64))
    } else {
        // Two's-complement wraparound at 32 bits.
        let value = u32::from_str_radix(&digits, radix)
            .map_err(|_| malformed(format!("invalid integer literal '{text}'"), position))?;
        Ok(Value::Int(value as i32))
    }
}

/// Parse a floating-point literal. The result is [`Value::Double`] unless
/// an `f`/`F` suffix selects [`Value::Float`].
pub fn parse_float(text: &str, position: Position) -> EngineResult<Value> {
    let (signless, negative) = match text.strip_prefix('-') {
        Some(rest) => (rest, true),
        None => (text.strip_prefix('+').unwrap_or(text), false),
    };
    let (body, single) = match signless.strip_suffix(['f', 'F']) {
        Some(rest) => (rest, true),
        None => (signless.strip_suffix(['d', 'D']).unwrap_or(signless), false),
    };
    if body.is_empty() {
        return Err(malformed(format!("invalid floating-point literal '{text}'"), position));
    }
    let magnitude = if body.starts_with("0x") || body.starts_with("0X") {
        parse_hex_float(&body[2..], text, position)?
    } else {
        let digits = strip_separators(body, text, position)?;
        digits
            .parse::<f64>()
            .map_err(|_| malformed(format!("invalid floating-point literal '{text}'"), position))?
    };
    let value = if negative { -magnitude } else { magnitude };
    if single {
        Ok(Value::Float(value as f32))
    } else {
        Ok(Value::Double(value))
    }
}

/// Hexadecimal floating-point form: hex mantissa with optional fraction,
/// mandatory `p` binary exponent (`1.8p3` parses as 1.5 * 2^3).
fn parse_hex_float(body: &str, text: &str, position: Position) -> EngineResult<f64> {
    let bad = || malformed(format!("invalid floating-point literal '{text}'"), position);
    let p = body.find(['p', 'P']).ok_or_else(bad)?;
    let (mantissa_text, exp_text) = (&body[..p], &body[p + 1..]);
    let exponent = exp_text.parse::<i32>().map_err(|_| bad())?;

    let (int_part, frac_part) = match mantissa_text.find('.') {
        Some(dot) => (&mantissa_text[..dot], &mantissa_text[dot + 1..]),
        None => (mantissa_text, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(bad());
    }
    let mut mantissa: u128 = 0;
    let mut scale: i32 = exponent;
    for d in int_part.chars() {
        let digit = d.to_digit(16).ok_or_else(bad)?;
        mantissa = mantissa.checked_mul(16).and_then(|m| m.checked_add(u128::from(digit))).ok_or_else(bad)?;
    }
    for d in frac_part.chars() {
        let digit = d.to_digit(16).ok_or_else(bad)?;
        mantissa = mantissa.checked_mul(16).and_then(|m| m.checked_add(u128::from(digit))).ok_or_else(bad)?;
        scale -= 4;
    }
    Ok(ldexp(mantissa as f64, scale))
}

/// `m * 2^e` computed in chunks so that exponents beyond `powi`'s finite
/// range (including subnormal results) still come out right.
fn ldexp(mut m: f64, mut e: i32) -> f64 {
    while e > 511 {
        m *= 2f64.powi(511);
        e -= 511;
    }
    while e < -511 {
        m *= 2f64.powi(-511);
        e += 511;
    }
    m * 2f64.powi(e)
}

/// Strip `_` digit separators, rejecting separators that are not strictly
/// between digits.
fn strip_separators(digits: &str, text: &str, position: Position) -> EngineResult<String> {
    if !digits.contains('_') {
        return Ok(digits.to_string());
    }
    let bytes = digits.as_bytes();
    if bytes.first() == Some(&b'_') || bytes.last() == Some(&b'_') {
        return Err(malformed(
            format!("misplaced underscore in literal '{text}'"),
            position,
        ));
    }
    Ok(digits.chars().filter(|&c| c != '_').collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pos() -> Position {
        Position::new(1, 1)
    }

    // ===== string escapes =====

    #[test]
    fn test_plain_string_passes_through() {
        assert_eq!(parse_string("abc", pos()).unwrap(), "abc");
    }

    #[test]
    fn test_named_escapes_decode() {
        assert_eq!(
            parse_string("\\n\\b\\t\\f\\r\\'\\\"\\\\", pos()).unwrap(),
            "\n\u{0008}\t\u{000c}\r'\"\\"
        );
    }

    #[test]
    fn test_unicode_escape_decodes() {
        assert_eq!(parse_string("\\u00ab", pos()).unwrap(), "\u{00ab}");
        assert_eq!(parse_string("\\u0041bc", pos()).unwrap(), "Abc");
    }

    #[test]
    fn test_octal_escapes_decode() {
        assert_eq!(parse_string("\\172", pos()).unwrap(), "z");
        assert_eq!(parse_string("\\7", pos()).unwrap(), "\u{0007}");
        assert_eq!(parse_string("\\52", pos()).unwrap(), "*");
        assert_eq!(parse_string("\\377", pos()).unwrap(), "\u{00ff}");
    }

    #[test]
    fn test_octal_escape_above_377_takes_two_digits() {
        // \77 decodes, the trailing 7 is ordinary content.
        assert_eq!(parse_string("\\777", pos()).unwrap(), "?7");
    }

    #[test]
    fn test_unknown_escape_fails() {
        assert!(parse_string("\\q", pos()).is_err());
        assert!(parse_string("\\8", pos()).is_err());
        assert!(parse_string("trailing\\", pos()).is_err());
    }

    #[test]
    fn test_unicode_escape_short_digit_count_fails() {
        assert!(parse_string("\\u123", pos()).is_err());
        assert!(parse_string("\\uzzzz", pos()).is_err());
    }

    #[test]
    fn test_unicode_escape_consumes_exactly_four_digits() {
        // The fifth digit is ordinary content in a string.
        assert_eq!(parse_string("\\u00415", pos()).unwrap(), "A5");
    }

    // ===== character literals =====

    #[test]
    fn test_character_literals_decode() {
        assert_eq!(parse_character("a", pos()).unwrap(), 'a');
        assert_eq!(parse_character("\\n", pos()).unwrap(), '\n');
        assert_eq!(parse_character("\\u00ab", pos()).unwrap(), '\u{00ab}');
        assert_eq!(parse_character("\\52", pos()).unwrap(), '*');
    }

    #[test]
    fn test_character_literal_must_be_single_char() {
        assert!(parse_character("ab", pos()).is_err());
        assert!(parse_character("", pos()).is_err());
        // \77 decodes to '?' and leaves a trailing '7'.
        assert!(parse_character("\\777", pos()).is_err());
        assert!(parse_character("\\888", pos()).is_err());
    }

    #[test]
    fn test_character_literal_unicode_digit_count() {
        assert!(parse_character("\\u123", pos()).is_err());
        assert!(parse_character("\\u12345", pos()).is_err());
    }

    // ===== integer literals =====

    #[test]
    fn test_decimal_integers() {
        assert_eq!(parse_integer("0", pos()).unwrap(), Value::Int(0));
        assert_eq!(parse_integer("2147483647", pos()).unwrap(), Value::Int(i32::MAX));
        assert!(parse_integer("2147483648", pos()).is_err());
    }

    #[test]
    fn test_hex_integers_wrap_twos_complement() {
        assert_eq!(parse_integer("0x7fffffff", pos()).unwrap(), Value::Int(i32::MAX));
        assert_eq!(parse_integer("0x80000000", pos()).unwrap(), Value::Int(i32::MIN));
        assert_eq!(parse_integer("0xffffffff", pos()).unwrap(), Value::Int(-1));
        assert!(parse_integer("0x100000000", pos()).is_err());
    }

    #[test]
    fn test_long_suffix() {
        assert_eq!(parse_integer("42L", pos()).unwrap(), Value::Long(42));
        assert_eq!(
            parse_integer("9223372036854775807L", pos()).unwrap(),
            Value::Long(i64::MAX)
        );
        assert_eq!(
            parse_integer("0xffffffffffffffffL", pos()).unwrap(),
            Value::Long(-1)
        );
        assert_eq!(
            parse_integer("0x8000000000000000l", pos()).unwrap(),
            Value::Long(i64::MIN)
        );
    }

    #[test]
    fn test_binary_integers() {
        assert_eq!(parse_integer("0b101", pos()).unwrap(), Value::Int(5));
        assert_eq!(parse_integer("0b11111111111111111111111111111111", pos()).unwrap(), Value::Int(-1));
    }

    #[test]
    fn test_underscore_separators() {
        assert_eq!(parse_integer("1_000_000", pos()).unwrap(), Value::Int(1_000_000));
        assert_eq!(parse_integer("0xff_ff", pos()).unwrap(), Value::Int(0xffff));
        assert!(parse_integer("_1", pos()).is_err());
        assert!(parse_integer("1_", pos()).is_err());
        assert!(parse_integer("0x_1", pos()).is_err());
    }

    #[test]
    fn test_invalid_integers_fail() {
        assert!(parse_integer("", pos()).is_err());
        assert!(parse_integer("0x", pos()).is_err());
        assert!(parse_integer("12ab", pos()).is_err());
    }

    // ===== floating-point literals =====

    #[test]
    fn test_decimal_floats() {
        assert_eq!(parse_float("2.25", pos()).unwrap(), Value::Double(2.25));
        assert_eq!(parse_float("3f", pos()).unwrap(), Value::Float(3.0));
        assert_eq!(parse_float("2.25d", pos()).unwrap(), Value::Double(2.25));
        assert_eq!(parse_float("-1.5", pos()).unwrap(), Value::Double(-1.5));
        assert_eq!(parse_float("1e10", pos()).unwrap(), Value::Double(1e10));
    }

    #[test]
    fn test_float_boundaries_are_exact() {
        assert_eq!(
            parse_float("3.4028235e38f", pos()).unwrap(),
            Value::Float(f32::MAX)
        );
        assert_eq!(
            parse_float("1.7976931348623157e308", pos()).unwrap(),
            Value::Double(f64::MAX)
        );
        assert_eq!(
            parse_float("4.9e-324", pos()).unwrap(),
            Value::Double(f64::from_bits(1))
        );
    }

    #[test]
    fn test_hex_floats() {
        assert_eq!(parse_float("0x1p0", pos()).unwrap(), Value::Double(1.0));
        assert_eq!(parse_float("0x1.8p3", pos()).unwrap(), Value::Double(12.0));
        assert_eq!(parse_float("0x1p-1", pos()).unwrap(), Value::Double(0.5));
        assert_eq!(
            parse_float("0x1.fffffffffffffp1023", pos()).unwrap(),
            Value::Double(f64::MAX)
        );
        assert_eq!(
            parse_float("0x1p-1074", pos()).unwrap(),
            Value::Double(f64::from_bits(1))
        );
        assert_eq!(parse_float("0x1p1f", pos()).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn test_invalid_floats_fail() {
        assert!(parse_float("", pos()).is_err());
        assert!(parse_float("abc", pos()).is_err());
        assert!(parse_float("0x1.8", pos()).is_err());
        assert!(parse_float("1.2.3", pos()).is_err());
    }
}
