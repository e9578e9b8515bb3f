use std::path::PathBuf;

pub const PROGRAM_NAME: &str = "nixnav";
pub const PROGRAM_LOG_LEVEL: &str = "NIXNAV_LOG_LEVEL";

const SOCKET_FILE_NAME: &str = "nixnav-daemon.sock";
const DATABASE_FILE_NAME: &str = "index.db";

/// Directory for the daemon's listening socket.
///
/// `$XDG_RUNTIME_DIR` when set, otherwise the conventional
/// `/run/user/<euid>` location that login managers create.
pub fn runtime_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("XDG_RUNTIME_DIR") {
        return PathBuf::from(dir);
    }

    #[cfg(unix)]
    {
        let euid = unsafe { libc::geteuid() };
        PathBuf::from(format!("/run/user/{euid}"))
    }
    #[cfg(not(unix))]
    {
        std::env::temp_dir()
    }
}

/// Where the daemon listens. Clients resolve the same path.
pub fn socket_path() -> PathBuf {
    runtime_dir().join(SOCKET_FILE_NAME)
}

fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("XDG_DATA_HOME") {
        return PathBuf::from(dir).join(PROGRAM_NAME);
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local/share")
        .join(PROGRAM_NAME)
}

/// Default path of the persistent index database.
pub fn database_path() -> PathBuf {
    data_dir().join(DATABASE_FILE_NAME)
}

/// Path components the daemon never indexes, matched against every
/// segment of a scanned path.
pub const DAEMON_EXCLUDED_COMPONENTS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    ".cache",
    ".npm",
    ".cargo",
    "target",
    "build",
    "dist",
    ".next",
    ".nuxt",
    "Trash",
];

/// Glob-style exclusions, matched against path components.
pub const DAEMON_EXCLUDED_GLOBS: &[&str] = &[".Trash*"];

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
