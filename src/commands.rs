//! CLI command handlers.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::iter;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clanwatch_core::MemberLedgerRecord;
use clanwatch_ledger::{LedgerStore, MemberFilter, SurrealLedger};
use clanwatch_reconciler::{
    CycleReport, LogNotifier, Notifier, Reconciler, ReconciliationLoop, WebhookNotifier,
};
use clanwatch_roster::{GroupSummary, RosterClient};
use itertools::Itertools;
use tracing::info;

use crate::cli::Commands;
use crate::config::AppConfig;
use crate::shutdown::wait_for_shutdown;

/// Execute a CLI command against a validated configuration.
///
/// # Errors
///
/// Returns an error if startup fails, if `run` is rejected on its initial
/// cycle, or if `once` does not reconcile.
pub async fn execute_command(command: Commands, config: AppConfig) -> Result<()> {
    match command {
        Commands::Run { .. } => cmd_run(&config).await,
        Commands::Once { json } => cmd_once(&config, json).await,
        Commands::Members {
            active,
            exited,
            json,
        } => cmd_members(&config, member_filter(active, exited), json).await,
        Commands::Group { json } => cmd_group(&config, json).await,
    }
}

async fn cmd_run(config: &AppConfig) -> Result<()> {
    let reconciliation = build_loop(config).await?;
    let stopper = reconciliation.stopper();

    tokio::spawn(async move {
        wait_for_shutdown().await;
        stopper.stop();
    });

    info!("clanwatch is running. Press Ctrl+C to stop.");
    reconciliation
        .run()
        .await
        .context("Initial reconciliation cycle failed")?;

    info!("clanwatch stopped gracefully");
    Ok(())
}

async fn cmd_once(config: &AppConfig, json: bool) -> Result<()> {
    let reconciliation = build_loop(config).await?;

    match reconciliation.run_cycle().await {
        CycleReport::Reconciled(result) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{result}");
            }
            Ok(())
        }
        CycleReport::TransientFailure { error, .. } => {
            bail!("Roster service unavailable, try again later: {error}")
        }
        CycleReport::FatalFailure(error) => bail!("Roster fetch rejected: {error}"),
        CycleReport::PersistenceFailure { reason } => {
            bail!("Ledger commit failed, nothing was written: {reason}")
        }
        CycleReport::Skipped => bail!("Another cycle is already running"),
    }
}

async fn cmd_members(config: &AppConfig, filter: MemberFilter, json: bool) -> Result<()> {
    let ledger = open_ledger(config).await?;
    let members = ledger
        .members(filter)
        .await
        .context("Failed to read members from the ledger")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&members)?);
    } else {
        print!("{}", format_members(&members));
    }
    Ok(())
}

async fn cmd_group(config: &AppConfig, json: bool) -> Result<()> {
    let client = RosterClient::with_config(config.roster.clone())
        .context("Failed to build roster client")?;
    let summary = client
        .fetch_group(&config.group_tag()?)
        .await
        .context("Failed to fetch group summary")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", format_group(&summary));
    }
    Ok(())
}

/// Connect to the configured ledger and make sure its schema exists.
async fn open_ledger(config: &AppConfig) -> Result<SurrealLedger> {
    let ledger = SurrealLedger::open(config.store.to_store_config())
        .await
        .context("Failed to open the ledger. Check the [store] settings")?;

    ledger
        .health_check()
        .await
        .context("Ledger health check failed")?;

    Ok(ledger)
}

fn build_notifier(config: &AppConfig) -> Result<Arc<dyn Notifier>> {
    match &config.notify.webhook_url {
        Some(url) => {
            info!(url = %url, "Notifications go to webhook");
            let notifier = WebhookNotifier::new(url.clone(), config.notify.timeout())
                .context("Failed to build webhook notifier")?;
            Ok(Arc::new(notifier))
        }
        None => {
            info!("No webhook configured, notifications go to the log");
            Ok(Arc::new(LogNotifier))
        }
    }
}

async fn build_loop(config: &AppConfig) -> Result<ReconciliationLoop> {
    let group = config.group_tag()?;
    let client = RosterClient::with_config(config.roster.clone())
        .context("Failed to build roster client")?;
    let ledger = open_ledger(config).await?;
    let reconciler = Reconciler::new(Arc::new(ledger), config.reconciler_config());

    Ok(ReconciliationLoop::new(
        Arc::new(client),
        group,
        Arc::new(reconciler),
        build_notifier(config)?,
        config.loop_config(),
    ))
}

const fn member_filter(active: bool, exited: bool) -> MemberFilter {
    match (active, exited) {
        (true, _) => MemberFilter::Active,
        (false, true) => MemberFilter::Exited,
        (false, false) => MemberFilter::All,
    }
}

fn format_members(members: &[MemberLedgerRecord]) -> String {
    if members.is_empty() {
        return "No members recorded\n".to_string();
    }

    let header = format!(
        "{:<14} {:<20} {:<7} {:>12}  {}",
        "TAG", "NAME", "STATUS", "CONTRIBUTION", "LAST SEEN"
    );
    let rows = members.iter().map(|member| {
        let status = if member.has_exited() { "exited" } else { "active" };
        format!(
            "{:<14} {:<20} {:<7} {:>12}  {}",
            member.tag.as_str(),
            member.name,
            status,
            member.current_contribution,
            member.last_seen_at.format("%Y-%m-%d %H:%M"),
        )
    });

    format!(
        "{}\n\n{} member(s)\n",
        iter::once(header).chain(rows).join("\n"),
        members.len()
    )
}

fn format_group(summary: &GroupSummary) -> String {
    let mut lines = vec![
        format!("{} ({})", summary.name, summary.tag),
        format!("  Level:   {}", summary.clan_level),
        format!("  Points:  {}", summary.clan_points),
        format!("  Members: {}", summary.members),
    ];
    if !summary.kind.is_empty() {
        lines.push(format!("  Type:    {}", summary.kind));
    }
    if !summary.description.is_empty() {
        lines.push(format!("\n{}", summary.description));
    }
    format!("{}\n", lines.join("\n"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;
    use chrono::Utc;
    use clanwatch_core::{MemberSnapshotEntry, Role, Tag};

    #[test]
    fn test_member_filter_from_flags() {
        assert_eq!(member_filter(false, false), MemberFilter::All);
        assert_eq!(member_filter(true, false), MemberFilter::Active);
        assert_eq!(member_filter(false, true), MemberFilter::Exited);
    }

    #[test]
    fn test_format_members_table() {
        let entry = MemberSnapshotEntry::new(Tag::new("#ABC").unwrap(), "Alice", Role::Elder, 42);
        let record = MemberLedgerRecord::first_sighting(&entry, Utc::now());

        let mut gone = MemberLedgerRecord::first_sighting(
            &MemberSnapshotEntry::new(Tag::new("#DEF").unwrap(), "Bob", Role::Member, 7),
            Utc::now(),
        );
        gone.active = false;

        let table = format_members(&[record, gone]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("TAG"));
        assert!(lines[1].starts_with("#ABC"));
        assert!(lines[1].contains("Alice"));
        assert!(lines[1].contains("active"));
        assert!(lines[2].contains("exited"));
        assert_eq!(lines[3], "");
        assert!(table.ends_with("\n2 member(s)\n"));
    }

    #[test]
    fn test_format_members_empty() {
        assert_eq!(format_members(&[]), "No members recorded\n");
    }

    #[test]
    fn test_format_group() {
        let summary = GroupSummary {
            tag: "#2PP".to_string(),
            name: "Sniffers".to_string(),
            description: String::new(),
            clan_level: 12,
            clan_points: 40_000,
            members: 48,
            war_wins: 300,
            kind: "inviteOnly".to_string(),
        };

        let text = format_group(&summary);
        assert!(text.starts_with("Sniffers (#2PP)\n"));
        assert!(text.contains("  Members: 48\n"));
        assert!(text.ends_with("  Type:    inviteOnly\n"));

        let described = format_group(&GroupSummary {
            description: "Weekly wars".to_string(),
            ..summary
        });
        assert!(described.ends_with("inviteOnly\n\nWeekly wars\n"));
    }
}
