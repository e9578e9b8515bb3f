pub mod codec;
mod error;

pub use error::DaemonError;

use serde::{Deserialize, Serialize};

/// Which record kinds a search returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    All,
    Files,
    Dirs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub bookmark_path: String,
    pub mode: SearchMode,
    pub query: String,
    pub extension: Option<String>,
    /// Result cap; the daemon applies its default when absent and its
    /// hard ceiling always.
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchAllRequest {
    pub bookmark_paths: Vec<String>,
    pub query: String,
    pub extension: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddBookmarkRequest {
    pub name: String,
    pub path: String,
    pub is_network: bool,
}

/// A parsed request line.
///
/// The wire form is `COMMAND [body]` where `body` is a JSON object for
/// `SEARCH`/`SEARCH_ALL`/`ADD_BOOKMARK`, a bare path for `RESCAN`, and
/// absent for `PING`/`STATS`.
#[derive(Debug, Clone)]
pub enum Request {
    Ping,
    Stats,
    Search(SearchRequest),
    SearchAll(SearchAllRequest),
    Rescan(String),
    AddBookmark(AddBookmarkRequest),
}

impl Request {
    /// Parse one request line. Never touches daemon state. Framing
    /// problems map to `BadRequest`; a well-formed body with missing or
    /// mistyped fields maps to `BadArgument`.
    pub fn parse(line: &str) -> Result<Self, DaemonError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(DaemonError::BadRequest("empty request".into()));
        }

        let (command, rest) = match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (line, ""),
        };

        match command {
            "PING" => Ok(Request::Ping),
            "STATS" => Ok(Request::Stats),
            "SEARCH" => Ok(Request::Search(parse_body("SEARCH", rest)?)),
            "SEARCH_ALL" => Ok(Request::SearchAll(parse_body("SEARCH_ALL", rest)?)),
            "RESCAN" => {
                if rest.is_empty() {
                    return Err(DaemonError::BadRequest("RESCAN requires a path".into()));
                }
                Ok(Request::Rescan(rest.to_owned()))
            }
            "ADD_BOOKMARK" => Ok(Request::AddBookmark(parse_body("ADD_BOOKMARK", rest)?)),
            other => Err(DaemonError::BadRequest(format!("unknown command {other}"))),
        }
    }
}

/// Body decoding happens in two steps so the error kind can tell JSON
/// syntax problems (`bad_request`) apart from missing or mistyped
/// fields (`bad_argument`).
fn parse_body<T: serde::de::DeserializeOwned>(cmd: &str, rest: &str) -> Result<T, DaemonError> {
    if rest.is_empty() {
        return Err(DaemonError::BadRequest(format!("{cmd} requires a body")));
    }
    let value: serde_json::Value = serde_json::from_str(rest)
        .map_err(|e| DaemonError::BadRequest(format!("invalid {cmd} body: {e}")))?;
    serde_json::from_value(value)
        .map_err(|e| DaemonError::BadArgument(format!("invalid {cmd} body: {e}")))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
    pub mtime: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
    pub total_indexed: u64,
    pub search_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub files: u64,
    pub trigrams: u64,
    pub bookmarks: u64,
}

/// `{"status":"ok","indexed":N}`, shared by RESCAN and ADD_BOOKMARK.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub status: String,
    pub indexed: u64,
}

impl AckResponse {
    pub fn ok(indexed: u64) -> Self {
        Self {
            status: "ok".into(),
            indexed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PongResponse {
    pub status: String,
}

impl PongResponse {
    pub fn pong() -> Self {
        Self {
            status: "pong".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl From<&DaemonError> for ErrorResponse {
    fn from(err: &DaemonError) -> Self {
        ErrorResponse {
            error: err.kind().to_owned(),
            message: err.to_string(),
        }
    }
}

/// Client-side view of a response line. Variants are tried in field-shape
/// order, so the most specific shapes come first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Error(ErrorResponse),
    Stats(StatsResponse),
    Search(SearchResponse),
    Ack(AckResponse),
    Pong(PongResponse),
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
