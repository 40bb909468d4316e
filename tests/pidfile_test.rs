use repmgrd::error::RepmgrdError;
use repmgrd::pidfile::PidFile;
use std::fs;
use tempfile::tempdir;

#[test]
fn claims_when_no_file_exists() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("repmgrd.pid");
    let pidfile = PidFile::claim(&path).unwrap();
    let contents = fs::read_to_string(&path).unwrap();
    assert_eq!(contents, std::process::id().to_string());
    pidfile.remove();
    assert!(!path.exists());
}

#[test]
fn overwrites_stale_pid() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("repmgrd.pid");
    // PID 999999 is not a real process in any sane test environment.
    fs::write(&path, "999999").unwrap();
    let pidfile = PidFile::claim(&path).unwrap();
    let contents = fs::read_to_string(&path).unwrap();
    assert_eq!(contents, std::process::id().to_string());
    pidfile.remove();
}

#[test]
fn refuses_when_pid_is_alive() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("repmgrd.pid");
    // Our own PID is definitely alive.
    fs::write(&path, std::process::id().to_string()).unwrap();
    let err = PidFile::claim(&path).unwrap_err();
    assert!(matches!(err, RepmgrdError::PidFileLocked { .. }));
}

#[test]
fn overwrites_file_with_unparseable_contents() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("repmgrd.pid");
    fs::write(&path, "not-a-pid").unwrap();
    let pidfile = PidFile::claim(&path).unwrap();
    pidfile.remove();
}
