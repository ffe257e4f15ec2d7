//! Daily mission CLI commands.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Subcommand};
use serde_json::Value;
use uuid::Uuid;

use super::{unlocked, unlocked_lines, CliContext, UnlockedBadge};
use crate::cli::output::{list_table, output, render_list, truncate, CommandOutput};
use crate::domain::models::{
    Config, DailyMissionAssignment, DailyMissionStats, DailyMissionTemplate, MissionReward,
};
use crate::domain::ports::DailyMissionRepository;

#[derive(Args, Debug)]
pub struct MissionArgs {
    #[command(subcommand)]
    pub command: MissionCommands,
}

#[derive(Subcommand, Debug)]
pub enum MissionCommands {
    /// Add a daily mission template to the pool
    AddTemplate {
        /// Template title
        title: String,
        /// Template description
        #[arg(short, long, default_value = "")]
        description: String,
        /// Selection weight; non-positive weights count as 1
        #[arg(short, long, default_value = "1.0")]
        weight: f64,
        /// XP paid on completion
        #[arg(long, default_value = "10")]
        xp: u32,
        /// Coins paid on completion
        #[arg(long, default_value = "0")]
        coins: u32,
    },
    /// Assign (or show) the day's missions for a user
    Assign {
        /// User ID
        user_id: Uuid,
        /// Day to assign, defaults to today (UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List the day's assignments without creating any
    Today {
        /// User ID
        user_id: Uuid,
        /// Day to list, defaults to today (UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Complete an assignment and collect its rewards
    Complete {
        /// User ID
        user_id: Uuid,
        /// Assignment ID
        assignment_id: Uuid,
        /// Proof of completion as JSON
        #[arg(long, default_value = "{}")]
        proof: String,
    },
    /// Skip an assignment for the configured coin cost
    Skip {
        /// User ID
        user_id: Uuid,
        /// Assignment ID
        assignment_id: Uuid,
    },
    /// Lifetime completion statistics
    Stats {
        /// User ID
        user_id: Uuid,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct TemplateOutput {
    pub id: Uuid,
    pub title: String,
    pub weight: f64,
    pub xp_reward: u32,
    pub coin_reward: u32,
}

impl CommandOutput for TemplateOutput {
    fn to_human(&self) -> String {
        format!(
            "Template added: {} ({})\nWeight {}, rewards {} XP / {} coins",
            self.title, self.id, self.weight, self.xp_reward, self.coin_reward
        )
    }
}

#[derive(Debug, serde::Serialize)]
pub struct AssignmentOutput {
    pub id: Uuid,
    pub template_id: Uuid,
    pub title: Option<String>,
    pub status: String,
    pub assigned_date: NaiveDate,
}

#[derive(Debug, serde::Serialize)]
pub struct AssignmentListOutput {
    pub date: NaiveDate,
    pub assignments: Vec<AssignmentOutput>,
    pub total: usize,
}

impl CommandOutput for AssignmentListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "mission", "status"]);
        for a in &self.assignments {
            let title = a.title.clone().unwrap_or_else(|| a.template_id.to_string());
            table.add_row(vec![a.id.to_string(), truncate(&title, 40), a.status.clone()]);
        }
        format!("Daily missions for {}\n{}", self.date, render_list("mission", &table, self.total))
    }
}

#[derive(Debug, serde::Serialize)]
pub struct CompleteOutput {
    pub assignment_id: Uuid,
    pub reward: MissionReward,
    pub unlocked_badges: Vec<UnlockedBadge>,
}

impl CommandOutput for CompleteOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![format!(
            "Mission completed: +{} XP, +{} coins",
            self.reward.xp_reward, self.reward.coin_reward
        )];
        if let Some(bonus) = self.reward.all_complete_bonus {
            lines.push(format!("All daily missions done: +{bonus} XP"));
        }
        lines.extend(unlocked_lines(&self.unlocked_badges));
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct SkipOutput {
    pub assignment_id: Uuid,
    pub cost: u32,
    pub balance: i64,
}

impl CommandOutput for SkipOutput {
    fn to_human(&self) -> String {
        format!(
            "Mission skipped for {} coins. Balance: {}",
            self.cost, self.balance
        )
    }
}

#[derive(Debug, serde::Serialize)]
pub struct StatsOutput {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub stats: DailyMissionStats,
}

impl CommandOutput for StatsOutput {
    fn to_human(&self) -> String {
        format!(
            "Assigned: {}\nCompleted: {}\nCompletion rate: {:.1}%",
            self.stats.total_assigned, self.stats.total_completed, self.stats.completion_rate
        )
    }
}

async fn with_titles(ctx: &CliContext, date: NaiveDate, assignments: Vec<DailyMissionAssignment>) -> Result<AssignmentListOutput> {
    let mut rows = Vec::with_capacity(assignments.len());
    for a in assignments {
        let title = ctx.store.get_template(a.template_id).await?.map(|t| t.title);
        rows.push(AssignmentOutput {
            id: a.id,
            template_id: a.template_id,
            title,
            status: a.status.as_str().to_string(),
            assigned_date: a.assigned_date,
        });
    }
    Ok(AssignmentListOutput {
        date,
        total: rows.len(),
        assignments: rows,
    })
}

pub async fn execute(args: MissionArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = CliContext::open(config).await?;
    let today = || Utc::now().date_naive();

    match args.command {
        MissionCommands::AddTemplate { title, description, weight, xp, coins } => {
            let template = DailyMissionTemplate::new(title)
                .with_description(description)
                .with_weight(weight)
                .with_rewards(xp, coins);
            let template = ctx.engine.add_mission_template(template).await?;
            output(
                &TemplateOutput {
                    id: template.id,
                    title: template.title,
                    weight: template.weight,
                    xp_reward: template.xp_reward,
                    coin_reward: template.coin_reward,
                },
                json_mode,
            );
        }
        MissionCommands::Assign { user_id, date } => {
            let date = date.unwrap_or_else(today);
            let assignments = ctx.engine.assign_daily_missions(user_id, date).await?;
            output(&with_titles(&ctx, date, assignments).await?, json_mode);
        }
        MissionCommands::Today { user_id, date } => {
            let date = date.unwrap_or_else(today);
            let assignments = ctx.engine.todays_missions(user_id, date).await?;
            output(&with_titles(&ctx, date, assignments).await?, json_mode);
        }
        MissionCommands::Complete { user_id, assignment_id, proof } => {
            let proof: Value = serde_json::from_str(&proof).context("Proof must be valid JSON")?;
            let outcome = ctx.engine.complete_daily_mission(user_id, assignment_id, proof).await?;
            output(
                &CompleteOutput {
                    assignment_id,
                    reward: outcome.result,
                    unlocked_badges: unlocked(&outcome.unlocked_badges),
                },
                json_mode,
            );
        }
        MissionCommands::Skip { user_id, assignment_id } => {
            let balance = ctx.engine.skip_daily_mission(user_id, assignment_id).await?;
            output(
                &SkipOutput {
                    assignment_id,
                    cost: ctx.engine.rules().skip_cost,
                    balance,
                },
                json_mode,
            );
        }
        MissionCommands::Stats { user_id } => {
            let stats = ctx.engine.daily_mission_stats(user_id).await?;
            output(&StatsOutput { user_id, stats }, json_mode);
        }
    }

    Ok(())
}
