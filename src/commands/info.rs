//! # Info Command Implementation
//!
//! This module implements the `info` subcommand, which displays the loaded
//! configuration and the catalog status of every configured repository:
//! entry count, last commit time and, for remote repositories, whether a
//! first sync has completed.
//!
//! This command is a safe, read-only operation that never takes catalog
//! locks.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;

use group_index::catalog_manager::CatalogManager;
use group_index::store::{RepositoryKey, RepositoryType};

use super::Context;

/// Show configuration and catalog status
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Only show repositories of this type (hosted, remote, group)
    #[arg(long = "type", value_name = "TYPE")]
    pub repo_type: Option<RepositoryType>,
}

/// Catalog status of one repository
#[derive(Debug, Clone, PartialEq, Eq)]
struct RepositoryStatus {
    key: RepositoryKey,
    entries: Option<usize>,
    committed: Option<DateTime<Utc>>,
    synced: bool,
    error: Option<String>,
}

/// Execute the `info` command.
pub fn execute(args: InfoArgs, ctx: &Context) -> Result<()> {
    let s = &ctx.styler;
    let catalogs = ctx.catalogs()?;

    println!("Configuration: {}", s.path(ctx.config_path.display()));
    println!("Storage root:  {}", s.path(ctx.storage_root.display()));
    println!(
        "Refresh:       groups every {}s, hosted writes after {}s",
        ctx.config.group_ttl_secs, ctx.config.hosted_ttl_secs
    );
    println!("Timer prefix:  {}", ctx.config.key_prefix);
    if !ctx.config.exclude.is_empty() {
        println!("Excluded:      {}", ctx.config.exclude.join(", "));
    }

    let statuses = collect_statuses(ctx, &catalogs, args.repo_type);
    println!("\nRepositories: {}", statuses.len());
    for status in &statuses {
        let detail = match (&status.error, status.entries) {
            (Some(e), _) => s.warn(format!("catalog unreadable: {}", e)).to_string(),
            (None, Some(entries)) => s
                .dim(format!(
                    "{} entries, committed {}",
                    entries,
                    status
                        .committed
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "never".to_string())
                ))
                .to_string(),
            (None, None) => s.warn("no catalog").to_string(),
        };
        let sync = if status.key.repo_type == RepositoryType::Remote && !status.synced {
            format!(" {}", s.warn("(never synced)"))
        } else {
            String::new()
        };
        println!("  {} {}{}", s.key(&status.key), detail, sync);
    }

    Ok(())
}

fn collect_statuses(
    ctx: &Context,
    catalogs: &CatalogManager,
    filter: Option<RepositoryType>,
) -> Vec<RepositoryStatus> {
    ctx.config
        .repositories
        .iter()
        .map(|repo| repo.key())
        .filter(|key| filter.map_or(true, |t| key.repo_type == t))
        .map(|key| {
            let synced = catalogs.has_sync_marker(&key);
            match catalogs.summary(&key) {
                Ok(summary) => RepositoryStatus {
                    entries: summary.as_ref().map(|s| s.entries),
                    committed: summary.and_then(|s| s.timestamp),
                    synced,
                    error: None,
                    key,
                },
                Err(e) => RepositoryStatus {
                    entries: None,
                    committed: None,
                    synced,
                    error: Some(e.to_string()),
                    key,
                },
            }
        })
        .collect()
}
