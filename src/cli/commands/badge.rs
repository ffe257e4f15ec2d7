//! Badge CLI commands.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use uuid::Uuid;

use super::CliContext;
use crate::cli::output::{list_table, output, render_list, truncate, CommandOutput};
use crate::domain::models::{Badge, BadgeCondition, BadgeRarity, BadgeWithProgress, Config};
use crate::services::BadgeEvaluation;

#[derive(Args, Debug)]
pub struct BadgeArgs {
    #[command(subcommand)]
    pub command: BadgeCommands,
}

#[derive(Subcommand, Debug)]
pub enum BadgeCommands {
    /// Define a badge from a JSON condition
    ///
    /// Example condition: '{"type":"count","data":{"event":"REVIEW_WRITTEN","threshold":10}}'
    Add {
        /// Badge name
        name: String,
        /// Unlock condition as JSON
        #[arg(short, long)]
        condition: String,
        /// Badge description
        #[arg(short, long, default_value = "")]
        description: String,
        /// Display category
        #[arg(long, default_value = "general")]
        category: String,
        /// Rarity (common, rare, epic, legendary)
        #[arg(short, long, default_value = "common")]
        rarity: String,
    },
    /// List active badges with a user's progress
    List {
        /// User ID
        user_id: Uuid,
    },
    /// Re-evaluate every active badge for a user
    Evaluate {
        /// User ID
        user_id: Uuid,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct BadgeAddedOutput {
    pub id: Uuid,
    pub name: String,
    pub condition_type: &'static str,
    pub rarity: BadgeRarity,
}

impl CommandOutput for BadgeAddedOutput {
    fn to_human(&self) -> String {
        format!(
            "Badge added: {} ({})\nCondition: {}, rarity: {}",
            self.name,
            self.id,
            self.condition_type,
            self.rarity.as_str()
        )
    }
}

#[derive(Debug, serde::Serialize)]
pub struct BadgeProgressOutput {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub rarity: BadgeRarity,
    pub progress: f64,
    pub is_unlocked: bool,
}

impl From<&BadgeWithProgress> for BadgeProgressOutput {
    fn from(entry: &BadgeWithProgress) -> Self {
        Self {
            id: entry.badge.id,
            name: entry.badge.name.clone(),
            category: entry.badge.category.clone(),
            rarity: entry.badge.rarity,
            progress: entry.progress,
            is_unlocked: entry.is_unlocked,
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct BadgeListOutput {
    pub badges: Vec<BadgeProgressOutput>,
    pub total: usize,
}

impl CommandOutput for BadgeListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["name", "category", "rarity", "progress"]);
        for b in &self.badges {
            let progress = if b.is_unlocked {
                "unlocked".to_string()
            } else {
                format!("{:.0}%", b.progress)
            };
            table.add_row(vec![
                truncate(&b.name, 30),
                b.category.clone(),
                b.rarity.as_str().to_string(),
                progress,
            ]);
        }
        render_list("badge", &table, self.total)
    }
}

#[derive(Debug, serde::Serialize)]
pub struct EvaluationOutput {
    pub user_id: Uuid,
    pub evaluations: Vec<BadgeEvaluation>,
}

impl CommandOutput for EvaluationOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["badge", "progress", "state"]);
        for e in &self.evaluations {
            let state = match (e.newly_unlocked, e.unlocked) {
                (true, _) => "newly unlocked",
                (false, true) => "unlocked",
                (false, false) => "locked",
            };
            table.add_row(vec![
                e.badge_id.to_string(),
                format!("{:.0}%", e.progress),
                state.to_string(),
            ]);
        }
        render_list("evaluation", &table, self.evaluations.len())
    }
}

fn build_badge(name: String, condition: &str, description: String, category: String, rarity: &str) -> Result<Badge> {
    let condition: BadgeCondition =
        serde_json::from_str(condition).context("Condition must be a JSON object with 'type' and 'data'")?;
    let rarity = BadgeRarity::from_str(rarity).ok_or_else(|| anyhow!("Invalid rarity: {rarity}"))?;
    Ok(Badge::new(name, condition)
        .with_description(description)
        .with_category(category)
        .with_rarity(rarity))
}

pub async fn execute(args: BadgeArgs, config: &Config, json_mode: bool) -> Result<()> {
    match args.command {
        BadgeCommands::Add { name, condition, description, category, rarity } => {
            let badge = build_badge(name, &condition, description, category, &rarity)?;
            let ctx = CliContext::open(config).await?;
            let badge = ctx.engine.add_badge(badge).await?;
            output(
                &BadgeAddedOutput {
                    id: badge.id,
                    name: badge.name,
                    condition_type: badge.condition.as_str(),
                    rarity: badge.rarity,
                },
                json_mode,
            );
        }
        BadgeCommands::List { user_id } => {
            let ctx = CliContext::open(config).await?;
            let badges: Vec<_> = ctx
                .engine
                .list_badges(user_id)
                .await?
                .iter()
                .map(BadgeProgressOutput::from)
                .collect();
            output(
                &BadgeListOutput {
                    total: badges.len(),
                    badges,
                },
                json_mode,
            );
        }
        BadgeCommands::Evaluate { user_id } => {
            let ctx = CliContext::open(config).await?;
            let evaluations = ctx.engine.evaluate_badges(user_id).await?;
            output(&EvaluationOutput { user_id, evaluations }, json_mode);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::EventKind;

    #[test]
    fn test_build_badge_from_json_condition() {
        let badge = build_badge(
            "Critic".to_string(),
            r#"{"type":"count","data":{"event":"REVIEW_WRITTEN","threshold":10}}"#,
            String::new(),
            "reviews".to_string(),
            "Rare",
        )
        .unwrap();
        assert_eq!(badge.condition, BadgeCondition::count(EventKind::ReviewWritten, 10));
        assert_eq!(badge.rarity, BadgeRarity::Rare);
        assert_eq!(badge.category, "reviews");
    }

    #[test]
    fn test_build_badge_rejects_bad_input() {
        let ok = r#"{"type":"level","data":{"threshold":3}}"#;
        assert!(build_badge("x".into(), "{}", String::new(), "g".into(), "common").is_err());
        assert!(build_badge("x".into(), ok, String::new(), "g".into(), "mythic").is_err());
    }
}
