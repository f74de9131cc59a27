//! Text conversions that need no VM: float and string repr, and the format-spec mini language.
use std::fmt::Write;

use crate::errors::messages;

/// `repr(float)`: shortest round-trip digits, scientific outside `[1e-4, 1e16)`.
pub fn float_repr(v: f64) -> String {
    if v.is_nan() {
        return "nan".into();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf".into() } else { "-inf".into() };
    }
    let abs = v.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        // `{:e}` gives the shortest mantissa, e.g. "1e16" or "1.5e-5"
        let s = format!("{v:e}");
        let (mantissa, exp) = s.split_once('e').unwrap_or((&s, "0"));
        let exp: i32 = exp.parse().unwrap_or(0);
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exp.unsigned_abs());
    }
    let mut buf = ryu::Buffer::new();
    buf.format_finite(v).to_string()
}

pub fn int_repr(v: i64) -> String {
    itoa::Buffer::new().format(v).to_string()
}

/// `repr(str)` with the quote choice and escapes the language uses.
pub fn quote_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

pub fn bytes_repr(b: &[u8]) -> String {
    let mut out = String::from("b'");
    for &byte in b {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\'' => out.push_str("\\'"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(byte as char),
            _ => {
                let _ = write!(out, "\\x{byte:02x}");
            }
        }
    }
    out.push('\'');
    out
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
    Center,
}

/// A parsed `[pad][align][width][.precision][type]` spec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatSpec {
    /// One of `f`, `d`, `s`.
    pub ty: Option<char>,
    pub pad: char,
    /// None means "right for numbers, left otherwise".
    pub align: Option<Align>,
    pub width: Option<usize>,
    pub precision: Option<usize>,
}

impl FormatSpec {
    pub fn parse(spec: &str) -> Result<FormatSpec, &'static str> {
        let mut rest = spec;
        let ty = match rest.chars().last() {
            Some(c @ ('f' | 'd' | 's')) => {
                rest = &rest[..rest.len() - 1];
                Some(c)
            }
            _ => None,
        };
        let mut pad = ' ';
        if let Some(c) = rest.chars().next().filter(|c| "0-=*#@!~".contains(*c)) {
            pad = c;
            rest = &rest[1..];
        }
        let align = match rest.chars().next() {
            Some('<') => Some(Align::Left),
            Some('>') => Some(Align::Right),
            Some('^') => Some(Align::Center),
            _ => None,
        };
        if align.is_some() {
            rest = &rest[1..];
        }
        let (width, precision) = match rest.split_once('.') {
            Some((w, p)) => (w, Some(p)),
            None => (rest, None),
        };
        let width = if width.is_empty() {
            None
        } else {
            Some(
                width
                    .parse::<usize>()
                    .map_err(|_| messages::INVALID_FORMAT_SPEC)?,
            )
        };
        let precision = match precision {
            Some(p) => Some(p.parse::<usize>().map_err(|_| messages::INVALID_FORMAT_SPEC)?),
            None => None,
        };
        if precision.is_some() && ty != Some('f') {
            return Err(messages::PRECISION_NOT_ALLOWED);
        }
        Ok(FormatSpec {
            ty,
            pad,
            align,
            width,
            precision,
        })
    }

    /// Pads an already converted value.
    pub fn pad(&self, text: String, numeric: bool) -> String {
        let len = text.chars().count();
        let Some(width) = self.width.filter(|w| *w > len) else {
            return text;
        };
        let fill = width - len;
        let align = self.align.unwrap_or(if numeric { Align::Right } else { Align::Left });
        let repeat = |n: usize| std::iter::repeat_n(self.pad, n).collect::<String>();
        match align {
            Align::Right => repeat(fill) + &text,
            Align::Left => text + &repeat(fill),
            Align::Center => {
                let left = fill / 2;
                repeat(left) + &text + &repeat(fill - left)
            }
        }
    }
}

pub fn format_fixed(v: f64, precision: Option<usize>) -> String {
    format!("{:.*}", precision.unwrap_or(6), v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_repr_switches_to_scientific() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(0.1), "0.1");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(1.5e-5), "1.5e-05");
        assert_eq!(float_repr(123456.789), "123456.789");
        assert_eq!(float_repr(-0.0), "-0.0");
        assert_eq!(float_repr(f64::INFINITY), "inf");
    }

    #[test]
    fn strings_pick_their_quote() {
        assert_eq!(quote_str("abc"), "'abc'");
        assert_eq!(quote_str("it's"), "\"it's\"");
        assert_eq!(quote_str("a\nb"), "'a\\nb'");
        assert_eq!(quote_str("'\""), "'\\'\"'");
        assert_eq!(bytes_repr(b"a\x00"), "b'a\\x00'");
    }

    #[test]
    fn spec_parsing() {
        let s = FormatSpec::parse("*^10").unwrap();
        assert_eq!(s.pad, '*');
        assert_eq!(s.align, Some(Align::Center));
        assert_eq!(s.width, Some(10));
        assert_eq!(s.ty, None);

        let f = FormatSpec::parse("08.3f").unwrap();
        assert_eq!((f.pad, f.width, f.precision, f.ty), ('0', Some(8), Some(3), Some('f')));

        assert_eq!(FormatSpec::parse(".2d"), Err(messages::PRECISION_NOT_ALLOWED));
        assert_eq!(FormatSpec::parse("x5"), Err(messages::INVALID_FORMAT_SPEC));
        assert_eq!(FormatSpec::parse("f").unwrap().width, None);
    }

    #[test]
    fn padding_follows_alignment() {
        let spec = FormatSpec::parse("5").unwrap();
        assert_eq!(spec.pad("42".into(), true), "   42");
        assert_eq!(spec.pad("ab".into(), false), "ab   ");
        let center = FormatSpec::parse("-^7").unwrap();
        assert_eq!(center.pad("abc".into(), false), "--abc--");
        assert_eq!(center.pad("toolongvalue".into(), false), "toolongvalue");
        assert_eq!(format_fixed(3.14159, Some(2)), "3.14");
        assert_eq!(format_fixed(2.0, None), "2.000000");
    }
}
