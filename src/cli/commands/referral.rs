//! Referral CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use uuid::Uuid;

use super::{unlocked, unlocked_lines, CliContext, UnlockedBadge};
use crate::cli::output::{list_table, output, CommandOutput};
use crate::domain::models::{Config, ReferralSummary, VerificationReport};

#[derive(Args, Debug)]
pub struct ReferralArgs {
    #[command(subcommand)]
    pub command: ReferralCommands,
}

#[derive(Subcommand, Debug)]
pub enum ReferralCommands {
    /// Start the referral mission for a user
    Enroll {
        /// User ID
        user_id: Uuid,
    },
    /// Record that a user invited someone
    Submit {
        /// Referrer user ID
        referrer_id: Uuid,
        /// Referee name
        name: String,
        /// Referee phone number
        phone: String,
    },
    /// Verify referrals for a phone that just registered
    Verify {
        /// Registered phone number
        phone: String,
    },
    /// Referral totals and payback amounts for a referrer
    Status {
        /// Referrer user ID
        referrer_id: Uuid,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct ReferralActionOutput {
    pub success: bool,
    pub message: String,
    pub id: Uuid,
}

impl CommandOutput for ReferralActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct VerifyOutput {
    #[serde(flatten)]
    pub report: VerificationReport,
    pub unlocked_badges: Vec<UnlockedBadge>,
}

impl CommandOutput for VerifyOutput {
    fn to_human(&self) -> String {
        if self.report.is_noop() {
            return format!("No pending referrals for {}.", self.report.phone);
        }

        let mut table = list_table(&["referrer", "verified", "mission"]);
        for r in &self.report.referrers {
            table.add_row(vec![
                r.referrer_id.to_string(),
                r.verified_count.to_string(),
                if r.mission_completed { "completed" } else { "-" }.to_string(),
            ]);
        }
        let mut lines = vec![
            format!("Verified {} referral(s) for {}", self.report.newly_verified, self.report.phone),
            table.to_string(),
        ];
        lines.extend(unlocked_lines(&self.unlocked_badges));
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct StatusOutput {
    pub referrer_id: Uuid,
    #[serde(flatten)]
    pub summary: ReferralSummary,
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        [
            format!("Referrals: {}", self.summary.total_referrals),
            format!("Verified: {}", self.summary.verified_referrals),
            format!("Pending reward: {}", self.summary.pending_reward_amount),
            format!("Paid reward: {}", self.summary.paid_reward_amount),
        ]
        .join("\n")
    }
}

pub async fn execute(args: ReferralArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = CliContext::open(config).await?;

    match args.command {
        ReferralCommands::Enroll { user_id } => {
            let participation = ctx.engine.enroll_referral_mission(user_id).await?;
            output(
                &ReferralActionOutput {
                    success: true,
                    message: format!(
                        "Referral mission {} is {}",
                        participation.id,
                        participation.status.as_str()
                    ),
                    id: participation.id,
                },
                json_mode,
            );
        }
        ReferralCommands::Submit { referrer_id, name, phone } => {
            let referral = ctx.engine.submit_referral(referrer_id, &name, &phone).await?;
            output(
                &ReferralActionOutput {
                    success: true,
                    message: format!("Referral recorded for {} ({})", referral.referee_name, referral.referee_phone),
                    id: referral.id,
                },
                json_mode,
            );
        }
        ReferralCommands::Verify { phone } => {
            let outcome = ctx.engine.register_referee(&phone).await?;
            output(
                &VerifyOutput {
                    report: outcome.result,
                    unlocked_badges: unlocked(&outcome.unlocked_badges),
                },
                json_mode,
            );
        }
        ReferralCommands::Status { referrer_id } => {
            let summary = ctx.engine.referral_status(referrer_id).await?;
            output(&StatusOutput { referrer_id, summary }, json_mode);
        }
    }

    Ok(())
}
