// SPDX-License-Identifier: MPL-2.0

//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "cosmic-livewall")]
#[command(about = "Video and GIF wallpapers for COSMIC", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Draw the selected wallpaper on every output (the default).
    Daemon,

    /// Select a video or GIF as the wallpaper.
    Set {
        /// Absolute or relative path to the file.
        path: PathBuf,
    },

    /// Remove the live wallpaper, leaving the background color.
    Clear,

    /// Print the current selection.
    Show,

    /// Check that a file can be played, without selecting it.
    Preview {
        /// Absolute or relative path to the file.
        path: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_runs_the_daemon() {
        let cli = Cli::try_parse_from(["cosmic-livewall"]).unwrap();
        assert!(cli.cmd.is_none());
    }

    #[test]
    fn set_takes_a_path() {
        let cli = Cli::try_parse_from(["cosmic-livewall", "set", "loop.gif"]).unwrap();
        match cli.cmd {
            Some(Command::Set { path }) => assert_eq!(path, PathBuf::from("loop.gif")),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn clear_takes_no_arguments() {
        let cli = Cli::try_parse_from(["cosmic-livewall", "clear"]).unwrap();
        assert!(matches!(cli.cmd, Some(Command::Clear)));
        assert!(Cli::try_parse_from(["cosmic-livewall", "clear", "loop.gif"]).is_err());
    }

    #[test]
    fn set_without_a_path_is_rejected() {
        assert!(Cli::try_parse_from(["cosmic-livewall", "set"]).is_err());
    }
}
