//! Implementation of the `questline activity` command.

use anyhow::{anyhow, Result};
use clap::Args;
use serde_json::Value;
use uuid::Uuid;

use super::{unlocked, unlocked_lines, CliContext, UnlockedBadge};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{ActivityEvent, Config, EventKind};

#[derive(Args, Debug)]
pub struct ActivityArgs {
    /// User ID
    pub user_id: Uuid,

    /// Event kind, e.g. REVIEW_WRITTEN or MISSION_COMPLETED
    pub kind: String,

    /// Event attribute as key=value; values are read as JSON when they parse
    #[arg(short, long = "attr")]
    pub attributes: Vec<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct ActivityOutput {
    pub event_id: Uuid,
    pub kind: EventKind,
    pub unlocked_badges: Vec<UnlockedBadge>,
}

impl CommandOutput for ActivityOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!("Recorded {} ({})", self.kind.as_str(), self.event_id)];
        lines.extend(unlocked_lines(&self.unlocked_badges));
        lines.join("\n")
    }
}

/// Parse `key=value`; `value` is JSON when it parses, a plain string otherwise.
fn parse_attribute(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("Invalid attribute '{raw}', expected key=value"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("Attribute key cannot be empty in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn build_event(args: &ActivityArgs) -> Result<ActivityEvent> {
    let kind = EventKind::from_str(&args.kind).ok_or_else(|| anyhow!("Unknown event kind: {}", args.kind))?;
    let mut event = ActivityEvent::new(args.user_id, kind);
    for raw in &args.attributes {
        let (key, value) = parse_attribute(raw)?;
        event = event.with_attribute(key, value);
    }
    Ok(event)
}

pub async fn execute(args: ActivityArgs, config: &Config, json_mode: bool) -> Result<()> {
    let event = build_event(&args)?;
    let ctx = CliContext::open(config).await?;

    let (event_id, kind) = (event.id, event.kind);
    let evaluations = ctx.engine.record_activity(event).await?;

    output(
        &ActivityOutput {
            event_id,
            kind,
            unlocked_badges: unlocked(&evaluations),
        },
        json_mode,
    );
    Ok(())
}
