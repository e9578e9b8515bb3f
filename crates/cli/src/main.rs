use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod client;

use nixnav_protocol::{AddBookmarkRequest, SearchAllRequest, SearchMode, SearchRequest};
use nixnav_runtime::logging;

#[derive(Debug, Parser)]
#[command(name = "nixnav", version, about = "Client for the nixnav indexing daemon")]
pub struct Cli {
    /// Socket path (defaults to the daemon's standard location)
    #[arg(long)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check that the daemon is alive
    Ping,
    /// Show index statistics
    Stats,
    /// Substring search under one bookmark
    Search {
        /// Bookmark root path to search under
        bookmark: String,
        /// Query string (supports `name:` and `*.ext ` prefixes)
        #[arg(default_value = "")]
        query: String,
        /// all, files or dirs
        #[arg(long, default_value = "all")]
        mode: String,
        /// Extension filter without the dot
        #[arg(long)]
        extension: Option<String>,
        /// Result cap
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Substring search across several bookmarks
    SearchAll {
        /// Query string
        query: String,
        /// Bookmark root paths
        #[arg(long = "bookmark", required = true)]
        bookmarks: Vec<String>,
        #[arg(long)]
        extension: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Re-walk a path under a registered bookmark
    Rescan { path: String },
    /// Register a new root with the daemon
    AddBookmark {
        name: String,
        path: String,
        /// Root lives on a network mount (polled, not watched)
        #[arg(long)]
        network: bool,
    },
}

fn main() -> ExitCode {
    logging::init().ok();

    let cli = Cli::parse();
    let socket = cli.socket.unwrap_or_else(nixnav_runtime::socket_path);

    let line = match build_request_line(cli.command) {
        Ok(line) => line,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::FAILURE;
        }
    };

    client::run(&socket, &line)
}

fn build_request_line(command: Command) -> anyhow::Result<String> {
    let line = match command {
        Command::Ping => "PING".to_owned(),
        Command::Stats => "STATS".to_owned(),
        Command::Search {
            bookmark,
            query,
            mode,
            extension,
            limit,
        } => {
            let body = SearchRequest {
                bookmark_path: bookmark,
                mode: parse_mode(&mode)?,
                query,
                extension,
                limit,
            };
            format!("SEARCH {}", serde_json::to_string(&body)?)
        }
        Command::SearchAll {
            query,
            bookmarks,
            extension,
            limit,
        } => {
            let body = SearchAllRequest {
                bookmark_paths: bookmarks,
                query,
                extension,
                limit,
            };
            format!("SEARCH_ALL {}", serde_json::to_string(&body)?)
        }
        Command::Rescan { path } => format!("RESCAN {path}"),
        Command::AddBookmark {
            name,
            path,
            network,
        } => {
            let body = AddBookmarkRequest {
                name,
                path,
                is_network: network,
            };
            format!("ADD_BOOKMARK {}", serde_json::to_string(&body)?)
        }
    };
    Ok(line)
}

fn parse_mode(raw: &str) -> anyhow::Result<SearchMode> {
    match raw {
        "all" => Ok(SearchMode::All),
        "files" => Ok(SearchMode::Files),
        "dirs" => Ok(SearchMode::Dirs),
        other => anyhow::bail!("invalid mode {other:?} (expected all, files or dirs)"),
    }
}
