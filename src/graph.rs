//! Building a channel graph from configuration.
//!
//! Three passes, so that setup lists and links may name any declared channel regardless
//! of declaration order:
//!
//! 1. create every enabled channel through its kind channel
//! 2. apply each setup list as text parameters
//! 3. link each channel to its targets, in order

use crate::channel::ChannelId;
use crate::config::{ChannelDefinition, RuntimeConfig};
use crate::error::{AppResult, ChannelError};
use crate::param::Params;
use crate::runtime::Runtime;
use serde::Serialize;
use tracing::{debug, info, instrument};

/// What [`build`] created.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphReport {
    /// Created channels as (name, id), in declaration order
    pub created: Vec<(String, ChannelId)>,
    /// Number of links applied
    pub links: usize,
    /// Names of definitions skipped because they are disabled
    pub disabled: Vec<String>,
}

impl GraphReport {
    /// Id of a created channel.
    pub fn id(&self, name: &str) -> Option<ChannelId> {
        self.created
            .iter()
            .find(|(created, _)| created == name)
            .map(|(_, id)| *id)
    }
}

fn create(rt: &Runtime, definition: &ChannelDefinition) -> AppResult<ChannelId> {
    if rt.lookup(&definition.kind).is_none() {
        return Err(ChannelError::Configuration(format!(
            "channel '{}' has unknown kind '{}'",
            definition.name, definition.kind
        )));
    }
    let id = rt.create(&definition.kind, &definition.name);
    if id.is_none() {
        return Err(ChannelError::DuplicateName(definition.name.clone()));
    }
    debug!(%id, name = %definition.name, kind = %definition.kind, "channel created");
    Ok(id)
}

/// Create, set up and link every enabled channel of `config` on `rt`.
#[instrument(skip_all, fields(app = %config.application.name))]
pub fn build(rt: &Runtime, config: &RuntimeConfig) -> AppResult<GraphReport> {
    config.validate()?;
    let mut report = GraphReport::default();

    let enabled = config.enabled_channels();
    report.disabled = config
        .channels
        .iter()
        .filter(|c| !c.enabled)
        .map(|c| c.name.clone())
        .collect();

    for definition in &enabled {
        let id = create(rt, definition)?;
        report.created.push((definition.name.clone(), id));
    }

    for (definition, (_, id)) in enabled.iter().zip(&report.created) {
        if !definition.setup.is_empty() {
            rt.setup(*id, &Params::texts(definition.setup.iter().cloned()));
        }
    }

    for (definition, (_, id)) in enabled.iter().zip(&report.created) {
        for target_name in &definition.links {
            let target = rt.lookup(target_name);
            if target.is_none() {
                return Err(ChannelError::UnknownChannel(format!(
                    "'{}' links to '{}', which is disabled or was not created",
                    definition.name, target_name
                )));
            }
            rt.link(*id, target);
            report.links += 1;
        }
    }

    info!(
        channels = report.created.len(),
        links = report.links,
        disabled = report.disabled.len(),
        "channel graph built"
    );
    Ok(report)
}
