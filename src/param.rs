//! Parameter marshaling.
//!
//! Every operation carries an ordered parameter list with a single type tag for the whole
//! call. Callees convert each parameter on demand into the form they need through the
//! `param_to_*` accessors, which never fail: a missing parameter yields the caller's
//! default, and text that does not parse converts leniently (leading numeric prefix,
//! otherwise zero).

use crate::channel::ChannelId;
use crate::format::printf;
use crate::runtime::Runtime;
use bytes::Bytes;

/// Type tag shared by all parameters of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    /// Signed integers
    Int,
    /// Double precision floats
    Float,
    /// UTF-8 text
    Text,
    /// Raw bytes
    Bytes,
    /// Channel ids
    Channel,
}

/// One parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Signed integer
    Int(i64),
    /// Double precision float
    Float(f64),
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Bytes(Bytes),
    /// Channel id
    Channel(ChannelId),
}

impl Value {
    /// Type tag of this value.
    pub fn param_type(&self) -> ParamType {
        match self {
            Value::Int(_) => ParamType::Int,
            Value::Float(_) => ParamType::Float,
            Value::Text(_) => ParamType::Text,
            Value::Bytes(_) => ParamType::Bytes,
            Value::Channel(_) => ParamType::Channel,
        }
    }

    /// Integer form. Floats truncate toward zero, text parses its leading integer.
    pub fn as_int(&self) -> i64 {
        match self {
            Value::Int(v) => *v,
            Value::Float(v) => *v as i64,
            Value::Text(s) => parse_int_prefix(s),
            Value::Bytes(b) => parse_int_prefix(&String::from_utf8_lossy(b)),
            Value::Channel(id) => i64::from(id.get()),
        }
    }

    /// Float form. Text parses its leading decimal number.
    pub fn as_float(&self) -> f64 {
        match self {
            Value::Int(v) => *v as f64,
            Value::Float(v) => *v,
            Value::Text(s) => parse_float_prefix(s),
            Value::Bytes(b) => parse_float_prefix(&String::from_utf8_lossy(b)),
            Value::Channel(id) => f64::from(id.get()),
        }
    }

    /// Text form. Floats render like `%g`.
    pub fn to_text(&self) -> String {
        match self {
            Value::Int(v) => v.to_string(),
            Value::Float(v) => printf::general(*v),
            Value::Text(s) => s.clone(),
            Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Value::Channel(id) => id.to_string(),
        }
    }

    /// Byte form. Byte buffers are shared, not copied.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Value::Bytes(b) => b.clone(),
            Value::Text(s) => Bytes::from(s.clone()),
            other => Bytes::from(other.to_text()),
        }
    }
}

/// Ordered parameter list of one call.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    kind: ParamType,
    values: Vec<Value>,
}

impl Default for Params {
    fn default() -> Self {
        Params::empty()
    }
}

impl Params {
    /// Zero parameters: the trigger/flush/reset signal for `write`.
    pub fn empty() -> Self {
        Params {
            kind: ParamType::Int,
            values: Vec::new(),
        }
    }

    /// A single value, tagged with its own type.
    pub fn from_value(value: Value) -> Self {
        Params {
            kind: value.param_type(),
            values: vec![value],
        }
    }

    /// Integer parameters.
    pub fn ints(values: impl IntoIterator<Item = i64>) -> Self {
        Params {
            kind: ParamType::Int,
            values: values.into_iter().map(Value::Int).collect(),
        }
    }

    /// Float parameters.
    pub fn floats(values: impl IntoIterator<Item = f64>) -> Self {
        Params {
            kind: ParamType::Float,
            values: values.into_iter().map(Value::Float).collect(),
        }
    }

    /// Text parameters.
    pub fn texts<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Params {
            kind: ParamType::Text,
            values: values.into_iter().map(|s| Value::Text(s.into())).collect(),
        }
    }

    /// Byte buffer parameters.
    pub fn bytes<B: Into<Bytes>>(values: impl IntoIterator<Item = B>) -> Self {
        Params {
            kind: ParamType::Bytes,
            values: values.into_iter().map(|b| Value::Bytes(b.into())).collect(),
        }
    }

    /// Channel id parameters.
    pub fn channels(values: impl IntoIterator<Item = ChannelId>) -> Self {
        Params {
            kind: ParamType::Channel,
            values: values.into_iter().map(Value::Channel).collect(),
        }
    }

    /// Type tag of the call.
    pub fn kind(&self) -> ParamType {
        self.kind
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parameter at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// All parameters in order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Parameter `index` as an integer.
    pub fn int(&self, index: usize) -> Option<i64> {
        self.get(index).map(Value::as_int)
    }

    /// Parameter `index` as a float.
    pub fn float(&self, index: usize) -> Option<f64> {
        self.get(index).map(Value::as_float)
    }

    /// Parameter `index` as text.
    pub fn text(&self, index: usize) -> Option<String> {
        self.get(index).map(Value::to_text)
    }

    /// Parameter `index` as bytes.
    pub fn buffer(&self, index: usize) -> Option<Bytes> {
        self.get(index).map(Value::to_bytes)
    }

    /// Parameter `index` as a channel reference.
    ///
    /// Channel-typed values are taken as is, integers are ids, text is looked up by name.
    /// Anything that does not resolve is id 0.
    pub fn channel(&self, rt: &Runtime, index: usize) -> Option<ChannelId> {
        self.get(index).map(|value| match value {
            Value::Channel(id) => *id,
            Value::Int(v) => id_from_int(*v),
            Value::Float(v) => id_from_int(*v as i64),
            Value::Text(name) => rt.lookup(name.trim()),
            Value::Bytes(name) => rt.lookup(String::from_utf8_lossy(name).trim()),
        })
    }

    /// Parameter `index` as an explicit channel reference only.
    ///
    /// Unlike [`Params::channel`], plain integers stay literals: only channel-typed values
    /// and text naming a registered channel resolve.
    pub fn reference(&self, rt: &Runtime, index: usize) -> ChannelId {
        match self.get(index) {
            Some(Value::Channel(id)) => *id,
            Some(Value::Text(name)) => rt.lookup(name.trim()),
            Some(Value::Bytes(name)) => rt.lookup(String::from_utf8_lossy(name).trim()),
            _ => ChannelId::NONE,
        }
    }
}

fn id_from_int(value: i64) -> ChannelId {
    u32::try_from(value).map_or(ChannelId::NONE, ChannelId::from_raw)
}

// =============================================================================
// Accessors with defaults
// =============================================================================

/// Parameter `index` as an integer, 0 when missing.
pub fn param_to_int(params: &Params, index: usize) -> i64 {
    params.int(index).unwrap_or(0)
}

/// Parameter `index` as a float, 0.0 when missing.
pub fn param_to_float(params: &Params, index: usize) -> f64 {
    params.float(index).unwrap_or(0.0)
}

/// Parameter `index` as text, truncated to at most `capacity` bytes on a char boundary.
pub fn param_to_string(params: &Params, index: usize, capacity: usize) -> String {
    let mut text = params.text(index).unwrap_or_default();
    if text.len() > capacity {
        let mut end = capacity;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

/// Parameter `index` as bytes, truncated to at most `capacity` bytes.
pub fn param_to_buffer(params: &Params, index: usize, capacity: usize) -> Bytes {
    let mut bytes = params.buffer(index).unwrap_or_default();
    bytes.truncate(capacity);
    bytes
}

/// Parameter `index` as a channel id, 0 when missing or unresolved.
pub fn param_to_channel(rt: &Runtime, params: &Params, index: usize) -> ChannelId {
    params.channel(rt, index).unwrap_or(ChannelId::NONE)
}

// =============================================================================
// Lenient numeric parsing
// =============================================================================

fn parse_int_prefix(text: &str) -> i64 {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let digits_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    if end == digits_start {
        return 0;
    }
    text[..end].parse::<i64>().unwrap_or(if text.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    })
}

fn parse_float_prefix(text: &str) -> f64 {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let negative = bytes.first() == Some(&b'-');

    let word = text[end..].get(..3).map(str::to_ascii_lowercase);
    match word.as_deref() {
        Some("inf") => return if negative { f64::NEG_INFINITY } else { f64::INFINITY },
        Some("nan") => return f64::NAN,
        _ => {}
    }

    let mut digits = 0usize;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
        digits += 1;
    }
    if bytes.get(end) == Some(&b'.') {
        end += 1;
        while bytes.get(end).is_some_and(u8::is_ascii_digit) {
            end += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return 0.0;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    text[..end].parse::<f64>().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_parameters_yield_defaults() {
        let params = Params::empty();
        assert_eq!(param_to_int(&params, 0), 0);
        assert_eq!(param_to_float(&params, 3), 0.0);
        assert_eq!(param_to_string(&params, 0, 16), "");
        assert!(param_to_buffer(&params, 0, 16).is_empty());
        let rt = Runtime::new();
        assert!(param_to_channel(&rt, &params, 0).is_none());
    }

    #[test]
    fn text_converts_leniently() {
        let params = Params::texts(["  42abc", "-3.5e2x", "junk", "+7", ".25"]);
        assert_eq!(param_to_int(&params, 0), 42);
        assert_eq!(param_to_float(&params, 1), -350.0);
        assert_eq!(param_to_int(&params, 2), 0);
        assert_eq!(param_to_float(&params, 2), 0.0);
        assert_eq!(param_to_int(&params, 3), 7);
        assert_eq!(param_to_float(&params, 4), 0.25);
    }

    #[test]
    fn int_text_overflow_saturates() {
        let params = Params::texts(["99999999999999999999", "-99999999999999999999"]);
        assert_eq!(param_to_int(&params, 0), i64::MAX);
        assert_eq!(param_to_int(&params, 1), i64::MIN);
    }

    #[test]
    fn float_to_int_truncates() {
        let params = Params::floats([2.9, -2.9]);
        assert_eq!(param_to_int(&params, 0), 2);
        assert_eq!(param_to_int(&params, 1), -2);
    }

    #[test]
    fn floats_render_like_general_format() {
        let params = Params::floats([0.5, 1e21, 100.0]);
        assert_eq!(param_to_string(&params, 0, 32), "0.5");
        assert_eq!(param_to_string(&params, 1, 32), "1e+21");
        assert_eq!(param_to_string(&params, 2, 32), "100");
    }

    #[test]
    fn string_truncates_on_char_boundary() {
        let params = Params::texts(["héllo"]);
        assert_eq!(param_to_string(&params, 0, 2), "h");
        assert_eq!(param_to_string(&params, 0, 3), "hé");
        assert_eq!(param_to_buffer(&params, 0, 2).as_ref(), b"h\xc3");
    }

    #[test]
    fn channel_references_resolve() {
        let rt = Runtime::with_std_channels();
        let b1 = rt.create("buffer", "b1");
        let params = Params::texts(["b1", "missing"]);
        assert_eq!(param_to_channel(&rt, &params, 0), b1);
        assert!(param_to_channel(&rt, &params, 1).is_none());

        let ids = Params::ints([i64::from(b1.get()), -1]);
        assert_eq!(param_to_channel(&rt, &ids, 0), b1);
        assert!(param_to_channel(&rt, &ids, 1).is_none());
        assert!(ids.reference(&rt, 0).is_none());
    }

    #[test]
    fn single_value_keeps_its_type_tag() {
        let params = Params::from_value(Value::Float(1.5));
        assert_eq!(params.kind(), ParamType::Float);
        assert_eq!(params.len(), 1);
        assert_eq!(Params::empty().kind(), ParamType::Int);
    }
}
