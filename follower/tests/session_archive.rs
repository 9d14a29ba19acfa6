//! Session, logging and telemetry archiving.
//!
//! Kept in its own test binary: the logger and the session epoch are
//! process-global and can only be initialised once.

mod common;

use common::{LinePath, Rig};
use util::logger::{logger_init, LevelFilter};
use util::archive::Archived;
use util::session::Session;

#[test]
fn session_logging_and_archiving() {
    let sessions_dir = std::env::temp_dir().join("follower_test_sessions");
    let sessions_dir = sessions_dir.to_str().unwrap();

    let session = Session::new("follower_test", sessions_dir).unwrap();
    logger_init(LevelFilter::Debug, &session).unwrap();

    let mut rig = Rig::new();
    rig.follower.attach_session(&session).unwrap();

    rig.place(0f64, 0f64, 0f64);
    rig.follower
        .follow_path(Box::new(LinePath::new((0f64, 0f64), (24f64, 0f64), 0f64)), false);

    rig.follower.update().unwrap();
    rig.follower.write().unwrap();
    rig.follower.update().unwrap();
    rig.follower.write().unwrap();

    // Two records plus the header row
    let archive = session.arch_root.join("follower.csv");
    let contents = std::fs::read_to_string(archive).unwrap();
    let lines: Vec<&str> = contents.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("time_s,mode,busy"));
    assert!(lines[1].contains("following_path"));

    // The log file exists and got the initialisation lines
    let log = std::fs::read_to_string(&session.log_file_path).unwrap();
    assert!(log.contains("Logging initialised"));
}
