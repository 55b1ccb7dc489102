use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Print the metadata tree of a target inside a bundle as JSON.
    #[command(alias = "i")]
    Info {
        /// Bundle locator: a local path or `azfs://<account>/<container>/<bundle>/<object>[/<subpath>]`.
        #[arg(required = true)]
        locator: String,

        /// Path of the target relative to the bundle root. Defaults to the bundle root.
        #[arg(short, long)]
        path: Option<String>,

        /// Name reported for the bundle root. Defaults to the bundle id in the locator.
        #[arg(long)]
        bundle_id: Option<String>,

        /// How many directory levels to expand below the target.
        #[arg(short, long, default_value_t = 0)]
        depth: usize,

        /// Directory that backs remote objects as `<root>/<account>/<container>/<bundle>/<object>`.
        /// Defaults to the current directory.
        #[arg(long)]
        object_root: Option<PathBuf>,

        /// Remote read timeout in seconds [0 = no timeout]. Overrides BUNDLEARCH_READ_TIMEOUT_SECS.
        #[arg(long)]
        timeout: Option<u64>,

        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,
    },

    /// Show how a locator is interpreted, without touching storage.
    #[command(alias = "p")]
    Parse {
        #[arg(required = true)]
        locator: String,
    },

    /// List every entry of a local archive file, including implied directories.
    #[command(alias = "l")]
    List {
        /// The archive file to list contents of.
        #[arg(required = true)]
        archive: PathBuf,
    },
}

/// Parses command-line arguments using `clap` and returns the command to execute.
pub fn run() -> Result<Commands, Box<dyn std::error::Error>> {
    let args = Args::parse();
    Ok(args.command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_defaults() {
        let args = Args::try_parse_from(["bundlearch", "info", "azfs://a/c/u/contents.zip"]).unwrap();
        match args.command {
            Commands::Info { depth, path, timeout, pretty, .. } => {
                assert_eq!(depth, 0);
                assert_eq!(path, None);
                assert_eq!(timeout, None);
                assert!(!pretty);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn list_requires_archive() {
        assert!(Args::try_parse_from(["bundlearch", "list"]).is_err());
    }
}
