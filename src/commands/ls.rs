//! # Ls Command Implementation
//!
//! This module implements the `ls` subcommand, which lists a folder the way
//! a group serves it: the sorted union of that folder's children across
//! every member that has it. For a concrete repository it is a plain
//! listing.

use anyhow::{anyhow, Result};
use clap::Args;

use group_index::registry::StoreRegistry;
use group_index::resolver::ContentResolver;
use group_index::store::RepositoryKey;

use super::Context;

/// List a folder across a repository or group
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Repository to list, as type:name
    #[arg(value_name = "KEY")]
    pub key: RepositoryKey,

    /// Folder to list
    #[arg(value_name = "FOLDER", default_value = "/")]
    pub folder: String,

    /// Show only the number of children
    #[arg(long)]
    pub count: bool,
}

/// Execute the `ls` command.
pub fn execute(args: LsArgs, ctx: &Context) -> Result<()> {
    let children = list(&args, ctx)?;
    if args.count {
        println!("{}", children.len());
        return Ok(());
    }
    for child in &children {
        println!("{}", ctx.styler.path(child));
    }
    Ok(())
}

fn list(args: &LsArgs, ctx: &Context) -> Result<Vec<String>> {
    let registry = ctx.registry()?;
    registry.get(&args.key).map_err(|e| anyhow!("{}", e))?;
    Ok(ContentResolver::new(registry, ctx.content()).list_children(&args.key, &args.folder))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::context_with;

    fn args(key: &str, folder: &str) -> LsArgs {
        LsArgs {
            key: key.parse().unwrap(),
            folder: folder.to_string(),
            count: false,
        }
    }

    #[test]
    fn test_group_listing_is_union() {
        let (_temp, ctx) = context_with(&[
            ("hosted-releases", "org/a/a.jar"),
            ("hosted-snapshots", "org/b/b.jar"),
            ("remote-central", "org/a/a.pom"),
        ]);
        assert_eq!(list(&args("group:public", "/org"), &ctx).unwrap(), vec!["a", "b"]);
        assert_eq!(
            list(&args("group:all", "/org/a"), &ctx).unwrap(),
            vec!["a.jar", "a.pom"]
        );
    }

    #[test]
    fn test_root_listing_hides_index_dir() {
        let (_temp, ctx) = context_with(&[
            ("hosted-releases", "org/a/a.jar"),
            ("hosted-releases", ".index/catalog.json"),
        ]);
        assert_eq!(list(&args("hosted:releases", "/"), &ctx).unwrap(), vec!["org"]);
    }

    #[test]
    fn test_unknown_repository_is_error() {
        let (_temp, ctx) = context_with(&[]);
        assert!(list(&args("hosted:ghost", "/"), &ctx).is_err());
    }
}
