//! printf-style rendering with arguments pulled from channels or literals.
//!
//! A [`Template`] is parsed once into literal text and conversion specifiers. Rendering
//! walks the specifiers left to right and consumes one argument per specifier:
//!
//! - while source slots remain, the next slot is taken; a nonzero slot is read from its
//!   channel (as integer, float or text, whichever the specifier wants), a zero slot means
//!   "take the next literal parameter instead";
//! - once the slots run out, the last slot stays in effect: a trailing channel is read
//!   again for every remaining specifier, a trailing zero slot (or no slots at all) keeps
//!   consuming literal parameters in order;
//! - a missing argument renders as 0 or the empty string.
//!
//! `%%` yields a literal percent and consumes nothing. A specifier that is malformed or
//! cut off by the end of the template is copied into the output verbatim.
//!
//! Output goes into an [`OutputBuffer`] that grows by doubling; the rendered text is
//! never truncated.

pub mod printf;

use crate::channel::ChannelId;
use crate::error::{AppResult, ChannelError};
use crate::param::{Params, Value};
use crate::runtime::Runtime;
use printf::{ArgClass, Conversion, ConversionSpec, Parsed};

/// Starting capacity of an output buffer.
pub const INITIAL_OUTPUT_CAPACITY: usize = 32;

// =============================================================================
// Template
// =============================================================================

/// Piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Text copied as is
    Literal(String),
    /// One conversion, consuming one argument
    Conversion(ConversionSpec),
}

/// A parsed format string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse `text` into segments.
    pub fn parse(text: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = text;
        while let Some(at) = rest.find('%') {
            literal.push_str(&rest[..at]);
            let after = &rest[at + 1..];
            match printf::parse_spec(after) {
                Parsed::Percent(used) => {
                    literal.push('%');
                    rest = &after[used..];
                }
                Parsed::Spec(spec, used) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Conversion(spec));
                    rest = &after[used..];
                }
                Parsed::Malformed(used) => {
                    literal.push('%');
                    literal.push_str(&after[..used]);
                    rest = &after[used..];
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Template { segments }
    }

    /// Parsed segments in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Number of arguments one rendering consumes.
    pub fn arg_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Conversion(_)))
            .count()
    }
}

// =============================================================================
// Output Buffer
// =============================================================================

/// Text output that grows geometrically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputBuffer {
    text: String,
}

impl OutputBuffer {
    /// An empty buffer with at least `capacity` bytes reserved.
    pub fn with_capacity(capacity: usize) -> AppResult<Self> {
        let mut text = String::new();
        text.try_reserve_exact(capacity.max(INITIAL_OUTPUT_CAPACITY))?;
        Ok(OutputBuffer { text })
    }

    /// Append `chunk`, doubling the capacity until it fits.
    pub fn push_str(&mut self, chunk: &str) -> AppResult<()> {
        let needed = self
            .text
            .len()
            .checked_add(chunk.len())
            .ok_or_else(|| ChannelError::BufferGrowth("output length overflows usize".into()))?;
        if needed > self.text.capacity() {
            let mut target = self.text.capacity().max(INITIAL_OUTPUT_CAPACITY);
            while target < needed {
                target = target
                    .checked_mul(2)
                    .ok_or_else(|| ChannelError::BufferGrowth("output capacity overflows usize".into()))?;
            }
            self.text.try_reserve_exact(target - self.text.len())?;
        }
        self.text.push_str(chunk);
        Ok(())
    }

    /// Rendered text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Reserved capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.text.capacity()
    }

    /// Take the rendered text.
    pub fn into_string(self) -> String {
        self.text
    }
}

// =============================================================================
// Rendering
// =============================================================================

enum Arg<'a> {
    Literal(Option<&'a Value>),
    Channel(ChannelId),
}

struct ArgCursor<'a> {
    rt: &'a Runtime,
    sources: &'a [ChannelId],
    literals: &'a Params,
    next_source: usize,
    next_literal: usize,
    current: ChannelId,
}

impl<'a> ArgCursor<'a> {
    fn next_literal(&mut self) -> Arg<'a> {
        let value = self.literals.get(self.next_literal);
        self.next_literal += 1;
        Arg::Literal(value)
    }

    fn next(&mut self) -> Arg<'a> {
        if let Some(&source) = self.sources.get(self.next_source) {
            self.next_source += 1;
            self.current = source;
        }
        if self.current.is_none() {
            self.next_literal()
        } else {
            Arg::Channel(self.current)
        }
    }

    fn int(&self, arg: &Arg<'_>) -> i64 {
        match arg {
            Arg::Literal(value) => value.map_or(0, Value::as_int),
            Arg::Channel(id) => self.rt.read_int(*id),
        }
    }

    fn float(&self, arg: &Arg<'_>) -> f64 {
        match arg {
            Arg::Literal(value) => value.map_or(0.0, Value::as_float),
            Arg::Channel(id) => self.rt.read_float(*id),
        }
    }

    fn text(&self, arg: &Arg<'_>) -> String {
        match arg {
            Arg::Literal(value) => value.map(Value::to_text).unwrap_or_default(),
            Arg::Channel(id) => self.rt.read_string(*id),
        }
    }
}

/// Render `template` into `out`.
///
/// `sources` are the configured source slots (0 meaning "next literal"), `literals` the
/// parameters of the triggering call.
pub fn render(
    rt: &Runtime,
    template: &Template,
    sources: &[ChannelId],
    literals: &Params,
    out: &mut OutputBuffer,
) -> AppResult<()> {
    let mut args = ArgCursor {
        rt,
        sources,
        literals,
        next_source: 0,
        next_literal: 0,
        current: ChannelId::NONE,
    };
    for segment in template.segments() {
        match segment {
            Segment::Literal(text) => out.push_str(text)?,
            Segment::Conversion(spec) => {
                let arg = args.next();
                let chunk = match spec.conversion.arg_class() {
                    ArgClass::Integer => printf::format_int(spec, args.int(&arg)),
                    ArgClass::Float => printf::format_float(spec, args.float(&arg)),
                    ArgClass::Text if spec.conversion == Conversion::Char => {
                        printf::format_char(spec, &args.text(&arg))
                    }
                    ArgClass::Text => printf::format_str(spec, &args.text(&arg)),
                    ArgClass::Ignored => continue,
                };
                out.push_str(&chunk)?;
            }
        }
    }
    Ok(())
}

/// Render `template` against literal parameters only.
pub fn print_params(rt: &Runtime, template: &Template, literals: &Params) -> AppResult<String> {
    let mut out = OutputBuffer::with_capacity(INITIAL_OUTPUT_CAPACITY)?;
    render(rt, template, &[], literals, &mut out)?;
    Ok(out.into_string())
}
