//! Format channel: render a printf template when written, keep the result for reading.
//!
//! Setup takes the template and an optional list of source slots. Each write renders the
//! template with the write's parameters as literals, stores the text, and pushes it to
//! every linked channel. Reading returns the last rendering until the next write.

use crate::channel::{Call, ChannelId, ChannelKind, Operation};
use crate::error::AppResult;
use crate::format::{render, OutputBuffer, Template, INITIAL_OUTPUT_CAPACITY};
use crate::guard::ShareRegister;
use crate::param::{param_to_channel, Params};
use std::sync::Arc;

const FORMAT_HELP: &str = "format channel - printf-style rendering from channels and literals\n\
    create format newname\n\
    setup newname format_string | source0 source1 ...\n\
    \t each % conversion takes the next source, the last one repeating once\n\
    \t they run out; a 0 source or no source takes the next write parameter\n\
    setup format format_string sources... : render once, return the text\n\
    \t a source naming a channel is read, anything else is used as is\n\
    write newname params... : render, store, send to linked channels\n\
    read newname : last rendering\n";

#[derive(Debug)]
struct FormatConfig {
    template: Arc<Template>,
    sources: Arc<[ChannelId]>,
}

/// State of one format channel.
#[derive(Debug)]
pub struct FormatState {
    config: ShareRegister<FormatConfig>,
    output: ShareRegister<OutputBuffer>,
}

impl Default for FormatState {
    fn default() -> Self {
        FormatState {
            config: ShareRegister::new(FormatConfig {
                template: Arc::new(Template::default()),
                sources: Arc::from(Vec::new()),
            }),
            output: ShareRegister::default(),
        }
    }
}

impl FormatState {
    /// Text of the last rendering.
    pub fn output(&self) -> String {
        self.output.lock().as_str().to_string()
    }

    fn setup(&self, call: &Call<'_>) {
        let params = call.params;
        let sources: Option<Arc<[ChannelId]>> = (params.len() > 1).then(|| {
            (1..params.len())
                .map(|i| param_to_channel(call.rt, params, i))
                .collect()
        });
        let mut config = self.config.lock();
        if let Some(text) = params.text(0) {
            config.template = Arc::new(Template::parse(&text));
        }
        if let Some(sources) = sources {
            config.sources = sources;
        }
    }

    fn write(&self, call: &Call<'_>) -> AppResult<String> {
        let (template, sources) = {
            let config = self.config.lock();
            (Arc::clone(&config.template), Arc::clone(&config.sources))
        };
        let capacity = self.output.lock().capacity();
        let mut out = OutputBuffer::with_capacity(capacity)?;
        render(call.rt, &template, &sources, call.params, &mut out)?;
        let text = out.as_str().to_string();
        self.output.replace(out);
        Ok(text)
    }
}

/// Setup on the kind channel itself: render once and return the text.
///
/// Parameters after the template are source slots. One naming a registered channel is
/// read from it; any other value fills its slot literally.
fn preview(call: &mut Call<'_>) -> AppResult<()> {
    let Some(text) = call.params.text(0) else {
        return Ok(());
    };
    let template = Template::parse(&text);
    let mut sources = Vec::with_capacity(call.params.len().saturating_sub(1));
    let mut literals = Vec::new();
    for index in 1..call.params.len() {
        let source = call.params.reference(call.rt, index);
        if source.is_none() {
            literals.extend(call.params.text(index));
        }
        sources.push(source);
    }
    let literals = Params::texts(literals);
    let mut out = OutputBuffer::with_capacity(INITIAL_OUTPUT_CAPACITY)?;
    render(call.rt, &template, &sources, &literals, &mut out)?;
    call.return_text(out.into_string());
    Ok(())
}

/// printf formatter kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatChannel;

impl ChannelKind for FormatChannel {
    type State = FormatState;
    const NAME: &'static str = "format";

    fn dispatch(&self, state: Option<&FormatState>, mut call: Call<'_>) {
        let (id, op) = (call.id, call.op);
        let result = match (op, state) {
            (Operation::Help, _) => {
                call.return_text(FORMAT_HELP);
                Ok(())
            }
            (Operation::Create, _) => {
                if !call.params.is_empty() {
                    let state = Arc::new(FormatState::default());
                    let created = call
                        .rt
                        .create_channel_param(call.params, 0, FormatChannel, state);
                    call.return_channel(created);
                }
                Ok(())
            }
            (Operation::Setup, None) => preview(&mut call),
            (Operation::Setup, Some(state)) => {
                state.setup(&call);
                Ok(())
            }
            (Operation::Write, Some(state)) => state.write(&call).map(|text| {
                call.rt.write_linked_string(call.id, &text);
            }),
            (Operation::Read, Some(state)) => {
                call.return_text(state.output());
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(err) = result {
            err.report(id, op.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use crate::testing::attach_recorder;

    #[test]
    fn write_renders_and_forwards() {
        let rt = Runtime::with_std_channels();
        let f = rt.create("format", "f");
        let (sink, rec) = attach_recorder(&rt, "sink");
        rt.link(f, sink);
        rt.setup(f, &Params::texts(["%d-%s"]));
        rt.write(f, &Params::texts(["5", "ok"]));
        assert_eq!(rec.texts(), vec!["5-ok"]);
        assert_eq!(rt.read_string(f), "5-ok");
    }

    #[test]
    fn output_persists_until_next_write() {
        let rt = Runtime::with_std_channels();
        let f = rt.create("format", "f");
        rt.setup(f, &Params::texts(["v=%d"]));
        rt.write_int(f, 1);
        assert_eq!(rt.read_string(f), "v=1");
        assert_eq!(rt.read_string(f), "v=1");
        rt.write_int(f, 2);
        assert_eq!(rt.read_string(f), "v=2");
    }

    #[test]
    fn sources_are_read_at_write_time() {
        let rt = Runtime::with_std_channels();
        let (temp, _) = attach_recorder(&rt, "temp");
        let f = rt.create("format", "f");
        rt.setup(f, &Params::texts(["%s=%.2f", "0", "temp"]));
        rt.write_float(temp, 3.14159);
        rt.write_string(f, "T");
        assert_eq!(rt.read_string(f), "T=3.14");
    }

    #[test]
    fn kind_channel_setup_previews() {
        let rt = Runtime::with_std_channels();
        let class = rt.lookup("format");
        let out = rt.setup(class, &Params::texts(["%s/%s", "a", "b"]));
        assert_eq!(out.map(|v| v.to_text()).as_deref(), Some("a/b"));
    }

    #[test]
    fn kind_channel_setup_reads_named_sources() {
        let rt = Runtime::with_std_channels();
        let (temp, _) = attach_recorder(&rt, "temp");
        rt.write_float(temp, 21.46);
        let class = rt.lookup("format");
        let out = rt.setup(class, &Params::texts(["%s=%.1f %s", "T", "temp", "C"]));
        assert_eq!(out.map(|v| v.to_text()).as_deref(), Some("T=21.5 C"));
    }

    #[test]
    fn long_output_is_not_truncated() {
        let rt = Runtime::with_std_channels();
        let f = rt.create("format", "f");
        rt.setup(f, &Params::texts(["<%s>"]));
        let long = "y".repeat(500);
        rt.write_string(f, &long);
        assert_eq!(rt.read_string(f).len(), 502);
    }
}
