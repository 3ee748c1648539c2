//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use archive_client_core::api::{SortDirection, SortMethod};

/// Command-line client for an archive server.
///
/// Lists, searches and downloads archives, runs extraction jobs and manages
/// categories on a single configured server.
#[derive(Parser, Debug)]
#[command(name = "archive-client")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to the XDG config location)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server base URL, overriding the config file
    #[arg(long, global = true)]
    pub server: Option<String>,

    /// API key, overriding the config file
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show server name, version and settings
    Info,

    /// List archives
    List(ListArgs),

    /// Extract an archive and print its page URLs
    Extract {
        id: String,
        /// Ask the server to re-extract everything
        #[arg(long)]
        force: bool,
    },

    /// Download every page and thumbnail of an archive
    Download {
        id: String,
        /// Delete local files for the archive first
        #[arg(long, conflicts_with = "resume_from")]
        overwrite: bool,
        /// Continue at this zero-based page index
        #[arg(long)]
        resume_from: Option<usize>,
    },

    /// Delete the local copy of an archive
    DeleteLocal { id: String },

    /// List categories
    Categories,

    /// Add an archive to a static category
    CategoryAdd { category: String, archive: String },

    /// Remove an archive from a static category
    CategoryRemove { category: String, archive: String },

    /// Show tag statistics
    Stats {
        /// Hide tags used fewer times than this
        #[arg(long, default_value_t = 1)]
        min_weight: u64,
    },

    /// Empty the server's temporary folder
    ClearTemp,

    /// Manage extra request headers
    #[command(subcommand)]
    Headers(HeadersCommand),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Comma-separated search terms; prefix a term with '-' to exclude it
    #[arg(long)]
    pub filter: Option<String>,

    /// Only archives in this category
    #[arg(long)]
    pub category: Option<String>,

    /// Random sample of this many archives
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=1000))]
    pub random: Option<u32>,

    /// Only archives marked new
    #[arg(long)]
    pub new_only: bool,

    #[arg(long, value_enum, default_value_t = SortArg::Title)]
    pub sort: SortArg,

    #[arg(long, value_enum, default_value_t = OrderArg::Asc)]
    pub order: OrderArg,

    /// Filter a local copy of the archive list instead of asking the server
    #[arg(long)]
    pub local: bool,

    /// Stop after this many pages
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub pages: u32,
}

#[derive(Subcommand, Debug)]
pub enum HeadersCommand {
    /// Print stored headers in order
    List,
    /// Append a header
    Set { name: String, value: String },
    /// Remove all stored headers
    Clear,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortArg {
    Title,
    Date,
}

impl From<SortArg> for SortMethod {
    fn from(value: SortArg) -> Self {
        match value {
            SortArg::Title => SortMethod::Title,
            SortArg::Date => SortMethod::DateAdded,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderArg {
    Asc,
    Desc,
}

impl From<OrderArg> for SortDirection {
    fn from(value: OrderArg) -> Self {
        match value {
            OrderArg::Asc => SortDirection::Asc,
            OrderArg::Desc => SortDirection::Desc,
        }
    }
}
