//! printf-compatible conversion specifiers.
//!
//! Supports the flags `-+ #0`, field width, precision, the length modifiers
//! `h l ll L q j z t` (accepted and ignored: every integer is 64-bit), and the
//! conversions `d i o x X f F e E g G a A c s n %`. `*` for width or precision is
//! accepted and treated as absent, since arguments come from channels, not varargs.
//!
//! Width and precision are capped at [`MAX_FIELD`]; a specifier asking for more is not
//! a specifier and is copied into the output as text.

/// Largest accepted field width or precision.
pub const MAX_FIELD: usize = 4096;

/// Conversion flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    /// `-`: left-justify within the field
    pub left: bool,
    /// `+`: always print a sign
    pub plus: bool,
    /// ` `: space in place of a plus sign
    pub space: bool,
    /// `#`: alternate form
    pub alt: bool,
    /// `0`: pad with zeros after the sign
    pub zero: bool,
}

/// Conversion character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// `d`, `i`
    Signed,
    /// `o`
    Octal,
    /// `x`
    Hex,
    /// `X`
    HexUpper,
    /// `f`, `F`
    Fixed { upper: bool },
    /// `e`, `E`
    Exponent { upper: bool },
    /// `g`, `G`
    General { upper: bool },
    /// `a`, `A`
    HexFloat { upper: bool },
    /// `c`
    Char,
    /// `s`
    Str,
    /// `n`: consumes an argument, prints nothing
    Count,
}

/// What a conversion needs from its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgClass {
    /// Integer argument
    Integer,
    /// Floating point argument
    Float,
    /// Text argument
    Text,
    /// Argument consumed, nothing printed
    Ignored,
}

impl Conversion {
    /// Argument class of this conversion.
    pub const fn arg_class(self) -> ArgClass {
        match self {
            Conversion::Signed | Conversion::Octal | Conversion::Hex | Conversion::HexUpper => {
                ArgClass::Integer
            }
            Conversion::Fixed { .. }
            | Conversion::Exponent { .. }
            | Conversion::General { .. }
            | Conversion::HexFloat { .. } => ArgClass::Float,
            Conversion::Char | Conversion::Str => ArgClass::Text,
            Conversion::Count => ArgClass::Ignored,
        }
    }
}

/// One parsed `%...` specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionSpec {
    /// Flags
    pub flags: Flags,
    /// Minimum field width
    pub width: Option<usize>,
    /// Precision
    pub precision: Option<usize>,
    /// Conversion character
    pub conversion: Conversion,
}

/// Result of parsing the text after a `%`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parsed {
    /// A complete specifier and the bytes it used
    Spec(ConversionSpec, usize),
    /// `%%` (possibly with flags in between) and the bytes it used
    Percent(usize),
    /// Not a specifier; the bytes up to the offending character
    Malformed(usize),
}

fn digits(bytes: &[u8], mut at: usize) -> (Option<usize>, usize) {
    let start = at;
    let mut value = 0usize;
    while let Some(d) = bytes.get(at).filter(|b| b.is_ascii_digit()) {
        value = value.saturating_mul(10).saturating_add(usize::from(d - b'0'));
        at += 1;
    }
    ((at > start).then_some(value), at)
}

/// Parse the specifier that follows a `%`.
pub fn parse_spec(text: &str) -> Parsed {
    let bytes = text.as_bytes();
    let mut at = 0;
    let mut flags = Flags::default();
    while let Some(b) = bytes.get(at) {
        match b {
            b'-' => flags.left = true,
            b'+' => flags.plus = true,
            b' ' => flags.space = true,
            b'#' => flags.alt = true,
            b'0' => flags.zero = true,
            _ => break,
        }
        at += 1;
    }

    let width = if bytes.get(at) == Some(&b'*') {
        at += 1;
        None
    } else {
        let (width, next) = digits(bytes, at);
        at = next;
        width
    };
    if width.is_some_and(|w| w > MAX_FIELD) {
        return Parsed::Malformed(at);
    }

    let mut precision = None;
    if bytes.get(at) == Some(&b'.') {
        at += 1;
        if bytes.get(at) == Some(&b'*') {
            at += 1;
        } else {
            let (value, next) = digits(bytes, at);
            at = next;
            let value = value.unwrap_or(0);
            if value > MAX_FIELD {
                return Parsed::Malformed(at);
            }
            precision = Some(value);
        }
    }

    while matches!(bytes.get(at), Some(b'h' | b'l' | b'L' | b'q' | b'j' | b'z' | b't')) {
        at += 1;
    }

    let Some(&c) = bytes.get(at) else {
        return Parsed::Malformed(at);
    };
    let conversion = match c {
        b'd' | b'i' => Conversion::Signed,
        b'o' => Conversion::Octal,
        b'x' => Conversion::Hex,
        b'X' => Conversion::HexUpper,
        b'f' | b'F' => Conversion::Fixed { upper: c == b'F' },
        b'e' | b'E' => Conversion::Exponent { upper: c == b'E' },
        b'g' | b'G' => Conversion::General { upper: c == b'G' },
        b'a' | b'A' => Conversion::HexFloat { upper: c == b'A' },
        b'c' => Conversion::Char,
        b's' => Conversion::Str,
        b'n' => Conversion::Count,
        b'%' => return Parsed::Percent(at + 1),
        _ => return Parsed::Malformed(at),
    };
    Parsed::Spec(
        ConversionSpec {
            flags,
            width,
            precision,
            conversion,
        },
        at + 1,
    )
}

// =============================================================================
// Padding
// =============================================================================

fn pad(spec: &ConversionSpec, sign: &str, prefix: &str, body: &str, zero_allowed: bool) -> String {
    let len = sign.len() + prefix.len() + body.chars().count();
    let fill = spec.width.unwrap_or(0).saturating_sub(len);
    let mut out = String::with_capacity(len + fill);
    if spec.flags.left {
        out.push_str(sign);
        out.push_str(prefix);
        out.push_str(body);
        out.extend(std::iter::repeat(' ').take(fill));
    } else if spec.flags.zero && zero_allowed {
        out.push_str(sign);
        out.push_str(prefix);
        out.extend(std::iter::repeat('0').take(fill));
        out.push_str(body);
    } else {
        out.extend(std::iter::repeat(' ').take(fill));
        out.push_str(sign);
        out.push_str(prefix);
        out.push_str(body);
    }
    out
}

fn sign_of(spec: &ConversionSpec, negative: bool) -> &'static str {
    if negative {
        "-"
    } else if spec.flags.plus {
        "+"
    } else if spec.flags.space {
        " "
    } else {
        ""
    }
}

// =============================================================================
// Integers
// =============================================================================

fn min_digits(digits: String, precision: Option<usize>, is_zero: bool) -> String {
    match precision {
        Some(0) if is_zero => String::new(),
        Some(p) if digits.len() < p => format!("{}{digits}", "0".repeat(p - digits.len())),
        _ => digits,
    }
}

/// Render an integer conversion (`d i o x X`).
pub fn format_int(spec: &ConversionSpec, value: i64) -> String {
    let zero_allowed = spec.precision.is_none();
    match spec.conversion {
        Conversion::Octal | Conversion::Hex | Conversion::HexUpper => {
            let raw = value as u64;
            let digits = match spec.conversion {
                Conversion::Octal => format!("{raw:o}"),
                Conversion::Hex => format!("{raw:x}"),
                _ => format!("{raw:X}"),
            };
            let mut digits = min_digits(digits, spec.precision, raw == 0);
            let prefix = match spec.conversion {
                Conversion::Octal => {
                    if spec.flags.alt && !digits.starts_with('0') {
                        digits.insert(0, '0');
                    }
                    ""
                }
                Conversion::Hex if spec.flags.alt && raw != 0 => "0x",
                Conversion::HexUpper if spec.flags.alt && raw != 0 => "0X",
                _ => "",
            };
            pad(spec, "", prefix, &digits, zero_allowed)
        }
        _ => {
            let digits = min_digits(value.unsigned_abs().to_string(), spec.precision, value == 0);
            pad(spec, sign_of(spec, value < 0), "", &digits, zero_allowed)
        }
    }
}

// =============================================================================
// Floats
// =============================================================================

fn fixed(value: f64, precision: usize, alt: bool) -> String {
    let mut out = format!("{value:.precision$}");
    if alt && precision == 0 {
        out.push('.');
    }
    out
}

fn split_exponent(rendered: &str) -> (&str, i32) {
    match rendered.split_once('e') {
        Some((mantissa, exp)) => (mantissa, exp.parse().unwrap_or(0)),
        None => (rendered, 0),
    }
}

fn exponent(value: f64, precision: usize, alt: bool, upper: bool) -> String {
    let rendered = format!("{value:.precision$e}");
    let (mantissa, exp) = split_exponent(&rendered);
    let mut out = String::from(mantissa);
    if alt && precision == 0 {
        out.push('.');
    }
    out.push(if upper { 'E' } else { 'e' });
    out.push(if exp < 0 { '-' } else { '+' });
    out.push_str(&format!("{:02}", exp.unsigned_abs()));
    out
}

fn strip_trailing_zeros(rendered: String) -> String {
    let split = rendered.find(|c| c == 'e' || c == 'E').unwrap_or(rendered.len());
    let (mantissa, tail) = rendered.split_at(split);
    if !mantissa.contains('.') {
        return rendered;
    }
    let trimmed = mantissa.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed}{tail}")
}

fn general_body(value: f64, precision: usize, alt: bool, upper: bool) -> String {
    let precision = precision.max(1);
    let exp = if value == 0.0 {
        0
    } else {
        split_exponent(&format!("{value:.*e}", precision - 1)).1
    };
    let p = i32::try_from(precision).unwrap_or(i32::MAX);
    let rendered = if exp >= -4 && exp < p {
        let decimals = usize::try_from(p - 1 - exp).unwrap_or(0);
        fixed(value, decimals, alt)
    } else {
        exponent(value, precision - 1, alt, upper)
    };
    if alt {
        rendered
    } else {
        strip_trailing_zeros(rendered)
    }
}

fn hex_float(value: f64, precision: Option<usize>, alt: bool) -> String {
    const MANTISSA_BITS: u32 = 52;
    const MANTISSA_DIGITS: usize = 13;

    let bits = value.to_bits();
    let raw_exp = i64::try_from((bits >> MANTISSA_BITS) & 0x7ff).unwrap_or(0);
    let mantissa = bits & ((1u64 << MANTISSA_BITS) - 1);
    let (mut lead, exp) = match (raw_exp, mantissa) {
        (0, 0) => (0u64, 0i64),
        (0, _) => (0, -1022),
        _ => (1, raw_exp - 1023),
    };

    let digits = match precision {
        Some(0) => {
            let half = 1u64 << (MANTISSA_BITS - 1);
            if mantissa > half || (mantissa == half && lead & 1 == 1) {
                lead += 1;
            }
            String::new()
        }
        Some(p) if p < MANTISSA_DIGITS => {
            let shift = u32::try_from((MANTISSA_DIGITS - p) * 4).unwrap_or(0);
            let mut kept = mantissa >> shift;
            let rest = mantissa & ((1u64 << shift) - 1);
            let half = 1u64 << (shift - 1);
            if rest > half || (rest == half && kept & 1 == 1) {
                kept += 1;
            }
            let width_bits = u32::try_from(p * 4).unwrap_or(0);
            if kept >> width_bits != 0 {
                lead += 1;
                kept &= (1u64 << width_bits) - 1;
            }
            format!("{kept:0p$x}")
        }
        Some(p) => format!("{mantissa:013x}{}", "0".repeat(p - MANTISSA_DIGITS)),
        None => format!("{mantissa:013x}").trim_end_matches('0').to_string(),
    };

    let mut out = lead.to_string();
    if !digits.is_empty() || alt {
        out.push('.');
        out.push_str(&digits);
    }
    out.push('p');
    out.push(if exp < 0 { '-' } else { '+' });
    out.push_str(&exp.unsigned_abs().to_string());
    out
}

/// Render a floating point conversion (`f F e E g G a A`).
pub fn format_float(spec: &ConversionSpec, value: f64) -> String {
    let negative = value.is_sign_negative() && !value.is_nan();
    let sign = sign_of(spec, negative);
    let magnitude = value.abs();
    let alt = spec.flags.alt;
    let upper = matches!(
        spec.conversion,
        Conversion::Fixed { upper: true }
            | Conversion::Exponent { upper: true }
            | Conversion::General { upper: true }
            | Conversion::HexFloat { upper: true }
    );

    if !magnitude.is_finite() {
        let word = match (magnitude.is_nan(), upper) {
            (true, false) => "nan",
            (true, true) => "NAN",
            (false, false) => "inf",
            (false, true) => "INF",
        };
        return pad(spec, sign, "", word, false);
    }

    let (prefix, body) = match spec.conversion {
        Conversion::Exponent { .. } => ("", exponent(magnitude, spec.precision.unwrap_or(6), alt, upper)),
        Conversion::General { .. } => ("", general_body(magnitude, spec.precision.unwrap_or(6), alt, upper)),
        Conversion::HexFloat { .. } => {
            let body = hex_float(magnitude, spec.precision, alt);
            if upper {
                ("0X", body.to_uppercase())
            } else {
                ("0x", body)
            }
        }
        _ => ("", fixed(magnitude, spec.precision.unwrap_or(6), alt)),
    };
    pad(spec, sign, prefix, &body, true)
}

// =============================================================================
// Text
// =============================================================================

/// Render a text conversion (`s`); precision caps the number of characters.
pub fn format_str(spec: &ConversionSpec, text: &str) -> String {
    let body: String = match spec.precision {
        Some(p) => text.chars().take(p).collect(),
        None => text.to_string(),
    };
    pad(spec, "", "", &body, false)
}

/// Render a character conversion (`c`): the first character of `text`.
pub fn format_char(spec: &ConversionSpec, text: &str) -> String {
    let body: String = text.chars().take(1).collect();
    pad(spec, "", "", &body, false)
}

/// A float rendered like `%g`.
pub fn general(value: f64) -> String {
    let spec = ConversionSpec {
        flags: Flags::default(),
        width: None,
        precision: None,
        conversion: Conversion::General { upper: false },
    };
    format_float(&spec, value)
}
