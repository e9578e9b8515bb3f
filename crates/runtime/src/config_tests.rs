use super::*;
use serial_test::serial;

#[test]
#[serial]
fn socket_path_honours_xdg_runtime_dir() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    unsafe { std::env::set_var("XDG_RUNTIME_DIR", tmp.path()) };

    let p = socket_path();
    assert_eq!(p, tmp.path().join("nixnav-daemon.sock"));

    unsafe { std::env::remove_var("XDG_RUNTIME_DIR") };
}

#[cfg(unix)]
#[test]
#[serial]
fn socket_path_falls_back_to_run_user() {
    unsafe { std::env::remove_var("XDG_RUNTIME_DIR") };

    let p = socket_path();
    let s = p.to_string_lossy();
    assert!(
        s.starts_with("/run/user/"),
        "fallback socket path should live under /run/user, got {s}"
    );
    assert!(s.ends_with("nixnav-daemon.sock"));
}

#[test]
#[serial]
fn database_path_honours_xdg_data_home() {
    let tmp = tempfile::tempdir().expect("create temp dir");
    unsafe { std::env::set_var("XDG_DATA_HOME", tmp.path()) };

    let p = database_path();
    assert_eq!(p, tmp.path().join("nixnav").join("index.db"));

    unsafe { std::env::remove_var("XDG_DATA_HOME") };
}

#[test]
fn exclusion_list_contains_vcs_and_build_dirs() {
    for name in [".git", "node_modules", "target", "__pycache__"] {
        assert!(
            DAEMON_EXCLUDED_COMPONENTS.contains(&name),
            "{name} must be excluded"
        );
    }
    assert!(DAEMON_EXCLUDED_GLOBS.contains(&".Trash*"));
}
