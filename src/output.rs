//! # Terminal Output
//!
//! Styling for command output. Color is decided once from the `--color`
//! flag and the environment:
//! - `--color=always|never` wins outright
//! - `NO_COLOR` (any value) disables color in auto mode
//! - otherwise the `console` crate's detection decides (TTY, `CLICOLOR`,
//!   `CLICOLOR_FORCE`, `TERM=dumb`)

use clap::ValueEnum;
use console::{style, StyledObject};
use std::env;
use std::fmt::Display;

/// Value of the `--color` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

/// Applies (or skips) styling to command output
#[derive(Debug, Clone, Copy)]
pub struct Styler {
    enabled: bool,
}

impl Styler {
    pub fn new(choice: ColorChoice) -> Self {
        let enabled = match choice {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => {
                env::var_os("NO_COLOR").is_none() && console::colors_enabled()
            }
        };
        Self { enabled }
    }

    pub fn plain() -> Self {
        Self { enabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Repository keys and other identifiers.
    pub fn key<D: Display>(&self, value: D) -> StyledObject<D> {
        self.apply(style(value).cyan().bold())
    }

    /// Paths and file locations.
    pub fn path<D: Display>(&self, value: D) -> StyledObject<D> {
        self.apply(style(value).green())
    }

    /// Secondary details such as counts and timestamps.
    pub fn dim<D: Display>(&self, value: D) -> StyledObject<D> {
        self.apply(style(value).dim())
    }

    pub fn warn<D: Display>(&self, value: D) -> StyledObject<D> {
        self.apply(style(value).yellow())
    }

    fn apply<D>(&self, styled: StyledObject<D>) -> StyledObject<D> {
        if self.enabled {
            styled.force_styling(true)
        } else {
            styled.force_styling(false)
        }
    }
}

impl Default for Styler {
    fn default() -> Self {
        Self::new(ColorChoice::Auto)
    }
}
