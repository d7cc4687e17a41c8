//! Compare: typed equality of two values, each a literal or a channel reading.

use crate::channel::{Call, ChannelKind, Operation};
use crate::error::{AppResult, ChannelError};
use crate::param::Params;
use crate::runtime::Runtime;
use std::sync::Arc;

const COMPARE_HELP: &str = "compare channel - equality test\n\
    create compare newname\n\
    read newname type value1 value2 : 1 when equal, else 0\n\
    write newname type value1 value2 : same, result also sent to linked channels\n\
    \t type: i (integer) f (float) s (string)\n\
    \t a value naming a channel is read from that channel\n";

/// Comparison type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Int,
    Float,
    Text,
}

impl Kind {
    fn parse(text: &str) -> Option<Self> {
        match text.trim().chars().next()? {
            'i' | 'I' => Some(Kind::Int),
            'f' | 'F' => Some(Kind::Float),
            's' | 'S' => Some(Kind::Text),
            _ => None,
        }
    }
}

fn int_operand(rt: &Runtime, params: &Params, index: usize) -> i64 {
    let reference = params.reference(rt, index);
    if reference.is_none() {
        params.int(index).unwrap_or(0)
    } else {
        rt.read_int(reference)
    }
}

fn float_operand(rt: &Runtime, params: &Params, index: usize) -> f64 {
    let reference = params.reference(rt, index);
    if reference.is_none() {
        params.float(index).unwrap_or(0.0)
    } else {
        rt.read_float(reference)
    }
}

fn text_operand(rt: &Runtime, params: &Params, index: usize) -> String {
    let reference = params.reference(rt, index);
    if reference.is_none() {
        params.text(index).unwrap_or_default()
    } else {
        rt.read_string(reference)
    }
}

/// Compare the operands of `params`; `None` for an unknown comparison type.
fn evaluate(rt: &Runtime, params: &Params) -> AppResult<Option<bool>> {
    if params.len() < 3 {
        return Err(ChannelError::InsufficientParameters {
            needed: 3,
            got: params.len(),
        });
    }
    let Some(kind) = params.text(0).as_deref().and_then(Kind::parse) else {
        return Ok(None);
    };
    let equal = match kind {
        Kind::Int => int_operand(rt, params, 1) == int_operand(rt, params, 2),
        Kind::Float => float_operand(rt, params, 1) == float_operand(rt, params, 2),
        Kind::Text => text_operand(rt, params, 1) == text_operand(rt, params, 2),
    };
    Ok(Some(equal))
}

/// Equality comparator kind. Stateless: any compare channel can evaluate any call.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompareChannel;

impl ChannelKind for CompareChannel {
    type State = ();
    const NAME: &'static str = "compare";

    fn dispatch(&self, _state: Option<&()>, mut call: Call<'_>) {
        let (id, op) = (call.id, call.op);
        let result = match op {
            Operation::Help => {
                call.return_text(COMPARE_HELP);
                Ok(())
            }
            Operation::Create => {
                if !call.params.is_empty() {
                    let id = call
                        .rt
                        .create_channel_param(call.params, 0, CompareChannel, Arc::new(()));
                    call.return_channel(id);
                }
                Ok(())
            }
            Operation::Read => evaluate(call.rt, call.params).map(|equal| {
                if let Some(equal) = equal {
                    call.return_int(i64::from(equal));
                }
            }),
            Operation::Write => evaluate(call.rt, call.params).map(|equal| {
                if let Some(equal) = equal {
                    let result = i64::from(equal);
                    call.rt.write_linked(call.id, &Params::ints([result]));
                    call.return_int(result);
                }
            }),
            Operation::Setup | Operation::Link => Ok(()),
        };
        if let Err(err) = result {
            err.report(id, op.as_str());
        }
    }
}
