//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use group_index::defaults::CONFIG_FILE_NAME;
use group_index::output::{ColorChoice, Styler};

use crate::commands::{self, Context};

/// Group Index - Resolve and index content across repository groups
#[derive(Parser, Debug)]
#[command(name = "group-index")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Path to the group-index.yaml configuration file
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        env = "GROUP_INDEX_CONFIG",
        default_value = CONFIG_FILE_NAME
    )]
    config: PathBuf,

    /// Directory holding repository content, overriding `storage_root`
    #[arg(long, global = true, value_name = "DIR", env = "GROUP_INDEX_STORAGE")]
    storage: Option<PathBuf>,

    /// Colorize output
    #[arg(long, global = true, value_name = "WHEN", value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Set log level (error, warn, info, debug, trace). RUST_LOG takes precedence.
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find which member repository serves a path
    Resolve(commands::resolve::ResolveArgs),
    /// List a folder across a repository or group
    Ls(commands::ls::LsArgs),
    /// Rebuild catalogs and merge group aggregates
    Reindex(commands::reindex::ReindexArgs),
    /// Show group membership as a tree
    Tree(commands::tree::TreeArgs),
    /// Show configuration and catalog status
    Info(commands::info::InfoArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        let ctx = Context::load(&self.config, self.storage, Styler::new(self.color))?;
        match self.command {
            Commands::Resolve(args) => commands::resolve::execute(args, &ctx),
            Commands::Ls(args) => commands::ls::execute(args, &ctx),
            Commands::Reindex(args) => commands::reindex::execute(args, &ctx),
            Commands::Tree(args) => commands::tree::execute(args, &ctx),
            Commands::Info(args) => commands::info::execute(args, &ctx),
        }
    }
}

fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // A logger may already be installed when embedded in tests.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_secs()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "group-index",
            "resolve",
            "group:public",
            "/org/x.jar",
            "--config",
            "other.yaml",
            "--color",
            "never",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("other.yaml"));
        assert_eq!(cli.color, ColorChoice::Never);
        assert!(matches!(cli.command, Commands::Resolve(_)));
    }
}
