use super::*;
use log::Level;
use serial_test::serial;

#[test]
fn env_var_name_is_the_documented_contract() {
    // Clients and service files reference this name; renaming it is a
    // breaking change.
    assert_eq!(PROGRAM_LOG_LEVEL, "NIXNAV_LOG_LEVEL");
}

#[test]
#[serial]
fn level_from_env_parses_the_documented_values() {
    let cases: &[(Option<&str>, LevelFilter)] = &[
        (None, LevelFilter::Warn),
        (Some("off"), LevelFilter::Off),
        (Some("error"), LevelFilter::Error),
        (Some("warn"), LevelFilter::Warn),
        (Some("info"), LevelFilter::Info),
        (Some("debug"), LevelFilter::Debug),
        (Some("trace"), LevelFilter::Trace),
        // Values are case-folded before matching.
        (Some("DEBUG"), LevelFilter::Debug),
        (Some("Info"), LevelFilter::Info),
        // Anything unrecognised falls back to the default.
        (Some("verbose"), LevelFilter::Warn),
        (Some(""), LevelFilter::Warn),
    ];

    for (value, expected) in cases {
        match value {
            Some(v) => unsafe { std::env::set_var(PROGRAM_LOG_LEVEL, v) },
            None => unsafe { std::env::remove_var(PROGRAM_LOG_LEVEL) },
        }

        assert_eq!(
            level_from_env(),
            *expected,
            "NIXNAV_LOG_LEVEL={value:?}"
        );
    }

    unsafe { std::env::remove_var(PROGRAM_LOG_LEVEL) };
}

#[test]
#[serial]
fn enabled_follows_the_global_max_level() {
    let original = log::max_level();

    log::set_max_level(LevelFilter::Info);
    let info = Metadata::builder().level(Level::Info).target("t").build();
    let debug = Metadata::builder().level(Level::Debug).target("t").build();
    assert!(LOGGER.enabled(&info));
    assert!(!LOGGER.enabled(&debug));

    log::set_max_level(LevelFilter::Off);
    let error = Metadata::builder().level(Level::Error).target("t").build();
    assert!(!LOGGER.enabled(&error), "off must silence everything");

    log::set_max_level(original);
}

#[test]
fn role_tag_reports_the_worker_thread_name() {
    // The daemon spawns all of its long-lived workers with a name;
    // the tag is what makes interleaved stderr output readable.
    let tag = std::thread::Builder::new()
        .name("reconciler".into())
        .spawn(role_tag)
        .expect("spawn named thread")
        .join()
        .expect("join named thread");
    assert_eq!(tag, "reconciler");

    // std::thread::spawn creates an unnamed thread.
    let tag = std::thread::spawn(role_tag).join().expect("join");
    assert_eq!(tag, "-");
}

#[test]
#[serial]
fn log_records_are_formatted_without_panicking() {
    let original = log::max_level();
    log::set_max_level(LevelFilter::Trace);

    for (level, msg) in [
        (Level::Error, "store write failed"),
        (Level::Info, "scan of /tmp/h finished"),
        (Level::Debug, "query \"readme\": 7 candidates"),
    ] {
        let args = format_args!("{msg}");
        let record = Record::builder()
            .level(level)
            .target("nixnav_daemon::state")
            .args(args)
            .build();
        LOGGER.log(&record);
    }
    LOGGER.flush();

    log::set_max_level(original);
}
