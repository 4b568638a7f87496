use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "filekit")]
#[command(version)]
#[command(about = "Compress, serve, delete and fetch files", long_about = None)]
#[command(after_help = "Examples:\n  \
  filekit compress logs/ logs.zip              pack a directory\n  \
  filekit download report.pdf -o copy.pdf      serve a file into copy.pdf\n  \
  filekit fetch https://example.com/a.png img/a.png")]
pub struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/filekit/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', global = true, action = clap::ArgAction::Count)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compress a file or directory into a zip archive
    Compress {
        source: PathBuf,
        archive: PathBuf,

        /// Store entries without compression
        #[arg(long)]
        store: bool,

        /// Deflate level (0-9)
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..=9))]
        level: Option<u32>,
    },

    /// List the entries of a zip archive
    List {
        archive: PathBuf,

        /// Show sizes, ratio and timestamps
        #[arg(short = 'v')]
        verbose: bool,
    },

    /// Serve a file as an attachment (body to OUTPUT or stdout, headers to stderr)
    Download {
        file: PathBuf,

        /// Display name checked against the allowlist (default: the file's name)
        #[arg(long)]
        name: Option<String>,

        /// Delete the source after serving
        #[arg(long)]
        delete: bool,

        /// Write the body here instead of stdout
        #[arg(short = 'o', value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Delete files or directory trees
    Delete {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Delete everything inside a directory
    Clean { dir: PathBuf },

    /// Download a URL into a local file (best effort)
    Fetch { url: String, dest: PathBuf },
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }
}
