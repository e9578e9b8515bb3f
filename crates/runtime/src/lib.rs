mod config;
pub mod logging;

pub use config::{
    DAEMON_EXCLUDED_COMPONENTS, DAEMON_EXCLUDED_GLOBS, PROGRAM_NAME, database_path, runtime_dir,
    socket_path,
};

pub use logging::init;
