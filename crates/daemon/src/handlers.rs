use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::warn;
use nixnav_engine::{DEFAULT_LIMIT, QuerySpec, parse_query};
use nixnav_protocol::{
    AckResponse, AddBookmarkRequest, DaemonError, PongResponse, Request, Response, SearchAllRequest,
    SearchHit, SearchRequest, SearchResponse, StatsResponse,
};

use crate::config::{HANDLER_DEADLINE, SCAN_HANDLER_DEADLINE};
use crate::state::DaemonState;

/// Dispatches one parsed request. Exactly one response object comes back
/// either way; the server frames and writes it.
pub fn handle(state: &Arc<DaemonState>, request: Request) -> Result<Response, DaemonError> {
    let started = Instant::now();

    let response = match request {
        Request::Ping => Response::Pong(PongResponse::pong()),
        Request::Stats => handle_stats(state),
        Request::Search(req) => Response::Search(handle_search(state, req)?),
        Request::SearchAll(req) => Response::Search(handle_search_all(state, req)?),
        Request::Rescan(path) => {
            require_healthy_store(state)?;
            let indexed = handle_rescan(state, &path)?;
            let response = Response::Ack(AckResponse::ok(indexed as u64));
            check_deadline(started, SCAN_HANDLER_DEADLINE)?;
            return Ok(response);
        }
        Request::AddBookmark(req) => {
            require_healthy_store(state)?;
            let indexed = handle_add_bookmark(state, &req)?;
            let response = Response::Ack(AckResponse::ok(indexed as u64));
            check_deadline(started, SCAN_HANDLER_DEADLINE)?;
            return Ok(response);
        }
    };

    check_deadline(started, HANDLER_DEADLINE)?;
    Ok(response)
}

fn handle_stats(state: &Arc<DaemonState>) -> Response {
    let index = state.index();
    let registry = state.registry();
    Response::Stats(StatsResponse {
        files: index.file_count(),
        trigrams: index.trigram_count() as u64,
        bookmarks: registry.len() as u64,
    })
}

fn handle_search(state: &Arc<DaemonState>, req: SearchRequest) -> Result<SearchResponse, DaemonError> {
    let started = Instant::now();
    let registry = state.registry();

    let root = registry
        .by_path(Path::new(&req.bookmark_path))
        .ok_or_else(|| {
            DaemonError::BadArgument(format!("unknown bookmark path {:?}", req.bookmark_path))
        })?
        .path
        .clone();

    let parsed = parse_query(&req.query, &registry);
    // A name prefix in the query narrows the search to that bookmark.
    let roots = match parsed.bookmark {
        Some(b) => vec![b.path.clone()],
        None => vec![root],
    };

    let spec = QuerySpec {
        roots,
        mode: req.mode,
        needle: parsed.needle,
        extension: parsed
            .extension
            .or_else(|| req.extension.as_ref().map(|e| e.to_ascii_lowercase())),
        limit: req.limit.unwrap_or(DEFAULT_LIMIT),
    };

    Ok(run_query(state, &spec, started))
}

fn handle_search_all(
    state: &Arc<DaemonState>,
    req: SearchAllRequest,
) -> Result<SearchResponse, DaemonError> {
    let started = Instant::now();
    let registry = state.registry();

    let mut roots = Vec::with_capacity(req.bookmark_paths.len());
    for p in &req.bookmark_paths {
        let bookmark = registry.by_path(Path::new(p)).ok_or_else(|| {
            DaemonError::BadArgument(format!("unknown bookmark path {p:?}"))
        })?;
        roots.push(bookmark.path.clone());
    }

    let parsed = parse_query(&req.query, &registry);
    if let Some(b) = parsed.bookmark {
        roots = vec![b.path.clone()];
    }

    let spec = QuerySpec {
        roots,
        mode: nixnav_protocol::SearchMode::All,
        needle: parsed.needle,
        extension: parsed
            .extension
            .or_else(|| req.extension.as_ref().map(|e| e.to_ascii_lowercase())),
        limit: req.limit.unwrap_or(DEFAULT_LIMIT),
    };

    Ok(run_query(state, &spec, started))
}

/// One intersection pass over the index; the roots act as a prefix
/// filter, not as separate queries.
fn run_query(state: &Arc<DaemonState>, spec: &QuerySpec, started: Instant) -> SearchResponse {
    let index = state.index();

    let results = index
        .query(spec)
        .into_iter()
        .map(|rec| SearchHit {
            path: rec.path.to_string_lossy().into_owned(),
            is_dir: rec.is_dir,
            size: rec.size,
            mtime: rec.mtime,
        })
        .collect();

    SearchResponse {
        results,
        total_indexed: index.files_under(&spec.roots),
        search_time_ms: started.elapsed().as_millis() as u64,
    }
}

fn handle_rescan(state: &Arc<DaemonState>, raw_path: &str) -> Result<usize, DaemonError> {
    let path = PathBuf::from(raw_path);
    let bookmark = {
        let registry = state.registry();
        registry
            .longest_prefix_match(&path)
            .cloned()
            .ok_or_else(|| {
                DaemonError::BadArgument(format!("{raw_path:?} is not under any bookmark"))
            })?
    };

    state
        .scan_subtree(&path, &bookmark)
        .map_err(|e| DaemonError::Internal(format!("{e:#}")))
}

fn handle_add_bookmark(
    state: &Arc<DaemonState>,
    req: &AddBookmarkRequest,
) -> Result<usize, DaemonError> {
    if req.name.trim().is_empty() {
        return Err(DaemonError::BadArgument("bookmark name is empty".into()));
    }
    let path = Path::new(&req.path);
    if !path.is_absolute() {
        return Err(DaemonError::BadArgument(format!(
            "bookmark path {:?} is not absolute",
            req.path
        )));
    }

    state
        .add_bookmark(&req.name, path, req.is_network)
        .map_err(|e| DaemonError::BadArgument(format!("{e:#}")))
}

/// Mutating requests fail fast once the writer has given up; queries
/// keep serving from memory.
fn require_healthy_store(state: &Arc<DaemonState>) -> Result<(), DaemonError> {
    if state.db_healthy() {
        Ok(())
    } else {
        Err(DaemonError::Db(
            "persistence writer is unhealthy; mutations are rejected".into(),
        ))
    }
}

/// Handlers that blow their deadline report `timeout` instead of the
/// result; mutations already queued still complete.
fn check_deadline(started: Instant, limit: Duration) -> Result<(), DaemonError> {
    let elapsed = started.elapsed();
    if elapsed > limit {
        warn!("handler exceeded its {limit:?} deadline ({elapsed:?})");
        Err(DaemonError::Timeout(elapsed.as_millis() as u64))
    } else {
        Ok(())
    }
}
