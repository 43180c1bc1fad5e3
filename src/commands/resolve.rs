//! # Resolve Command Implementation
//!
//! This module implements the `resolve` subcommand, which reports the member
//! repository (and file) that serves a path for a repository or group.
//! Members are consulted in group order and the first one holding the path
//! wins. Exits non-zero when no member has it.

use anyhow::{anyhow, Result};
use clap::Args;

use group_index::content::Transfer;
use group_index::registry::StoreRegistry;
use group_index::resolver::ContentResolver;
use group_index::store::RepositoryKey;

use super::Context;

/// Find which member repository serves a path
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Repository to resolve in, as type:name (e.g. group:public)
    #[arg(value_name = "KEY")]
    pub key: RepositoryKey,

    /// Path to resolve (e.g. /org/x/1.0/x-1.0.jar)
    #[arg(value_name = "PATH")]
    pub path: String,
}

/// Execute the `resolve` command.
pub fn execute(args: ResolveArgs, ctx: &Context) -> Result<()> {
    let transfer = resolve(&args, ctx)?;
    println!(
        "{} {}",
        ctx.styler.key(&transfer.key),
        ctx.styler.path(transfer.file.display())
    );
    Ok(())
}

fn resolve(args: &ResolveArgs, ctx: &Context) -> Result<Transfer> {
    let registry = ctx.registry()?;
    registry
        .get(&args.key)
        .map_err(|e| anyhow!("{}\n  hint: run `group-index info` to list repositories", e))?;

    ContentResolver::new(registry, ctx.content())
        .resolve(&args.key, &args.path)
        .ok_or_else(|| anyhow!("{} not found in {}", args.path, args.key))
}
