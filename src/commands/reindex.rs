//! # Reindex Command Implementation
//!
//! This module implements the `reindex` subcommand. It starts the index
//! service against the configured storage, submits the given repositories
//! as added (or every configured repository with `--all`), waits for the
//! work to finish and prints what happened.
//!
//! Hosted repositories are rescanned and cascade to the groups containing
//! them; groups get a merge pass with forced remote refresh. Remote
//! repositories are refreshed through the groups that contain them.

use anyhow::{anyhow, Result};
use clap::Args;
use std::sync::Arc;

use group_index::coordinator::PassReport;
use group_index::remote::CachedContentSource;
use group_index::service::IndexService;
use group_index::store::{RepositoryKey, RepositoryType};

use super::Context;

/// Rebuild catalogs and merge group aggregates
#[derive(Args, Debug)]
pub struct ReindexArgs {
    /// Repositories to reindex, as type:name
    #[arg(value_name = "KEY", required_unless_present = "all")]
    pub keys: Vec<RepositoryKey>,

    /// Reindex every configured repository
    #[arg(long, conflicts_with = "keys")]
    pub all: bool,
}

/// Execute the `reindex` command.
pub fn execute(args: ReindexArgs, ctx: &Context) -> Result<()> {
    let keys = if args.all { all_keys(ctx) } else { args.keys };
    let report = reindex(keys, ctx)?;
    print_report(&report, ctx);

    if !report.aborted.is_empty() {
        return Err(anyhow!(
            "{} group(s) could not be updated: {}",
            report.aborted.len(),
            join(&report.aborted)
        ));
    }
    Ok(())
}

/// Every configured repository, hosted first and groups last.
fn all_keys(ctx: &Context) -> Vec<RepositoryKey> {
    let mut keys: Vec<RepositoryKey> = ctx.config.repositories.iter().map(|r| r.key()).collect();
    keys.sort_by_key(|k| match k.repo_type {
        RepositoryType::Hosted => 0,
        RepositoryType::Remote => 1,
        RepositoryType::Group => 2,
    });
    keys
}

fn reindex(keys: Vec<RepositoryKey>, ctx: &Context) -> Result<PassReport> {
    let content = ctx.content();
    let remote = Arc::new(CachedContentSource::new(
        content.clone(),
        ctx.config.path_filter()?,
    ));
    let service = IndexService::start(&ctx.config, ctx.registry()?, content, remote)?;
    let outcomes = service.subscribe()?;

    service.on_repositories_added(keys)?;
    service.flush()?;
    service.shutdown();

    let mut report = PassReport::default();
    for outcome in outcomes.try_iter() {
        absorb(&mut report, outcome.report);
    }
    Ok(report)
}

fn absorb(into: &mut PassReport, from: PassReport) {
    into.scanned.extend(from.scanned);
    into.synced.extend(from.synced);
    into.up_to_date.extend(from.up_to_date);
    into.skipped.extend(from.skipped);
    into.merged.extend(from.merged);
    into.committed.extend(from.committed);
    into.aborted.extend(from.aborted);
    into.cancelled.extend(from.cancelled);
}

fn print_report(report: &PassReport, ctx: &Context) {
    let s = &ctx.styler;
    if !report.scanned.is_empty() {
        println!("Scanned:    {}", s.key(join(&report.scanned)));
    }
    if !report.synced.is_empty() {
        println!("Synced:     {}", s.key(join(&report.synced)));
    }
    if !report.up_to_date.is_empty() {
        println!("Up to date: {}", s.key(join(&report.up_to_date)));
    }
    for group in &report.committed {
        println!(
            "Merged {} {}",
            s.key(group),
            s.dim(format!("({} members)", report.merged_into(group).len()))
        );
    }
    if !report.skipped.is_empty() {
        println!("Skipped:    {}", s.warn(join(&report.skipped)));
    }
    if report.is_empty() {
        println!("Nothing to do");
    }
}

fn join(keys: &[RepositoryKey]) -> String {
    keys.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::context_with;

    #[test]
    fn test_all_keys_orders_groups_last() {
        let (_temp, ctx) = context_with(&[]);
        let keys = all_keys(&ctx);
        assert_eq!(keys.len(), 5);
        assert_eq!(keys[0], RepositoryKey::hosted("releases"));
        assert_eq!(keys[2], RepositoryKey::remote("central"));
        assert!(keys[3..].iter().all(|k| k.is_group()));
    }

    #[test]
    fn test_reindex_hosted_cascades_to_nested_groups() {
        let (_temp, ctx) = context_with(&[
            ("hosted-releases", "org/a/a.jar"),
            ("hosted-snapshots", "org/b/b.jar"),
        ]);
        let report = reindex(vec![RepositoryKey::hosted("releases")], &ctx).unwrap();

        assert_eq!(
            report.committed,
            vec![RepositoryKey::group("all"), RepositoryKey::group("public")]
        );
        let catalogs = ctx.catalogs().unwrap();
        let summary = catalogs.summary(&RepositoryKey::group("all")).unwrap().unwrap();
        assert_eq!(summary.entries, 2);
    }

    #[test]
    fn test_reindex_all_syncs_remote_once() {
        let (_temp, ctx) = context_with(&[("remote-central", "org/c/c.jar")]);
        let report = reindex(all_keys(&ctx), &ctx).unwrap();

        assert_eq!(
            report.scanned.iter().filter(|k| k.repo_type == RepositoryType::Remote).count(),
            1
        );
        assert!(ctx
            .catalogs()
            .unwrap()
            .has_sync_marker(&RepositoryKey::remote("central")));
    }
}
