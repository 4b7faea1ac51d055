//! Filesystem tests for rc-file and beserver cfg discovery.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use bercon::rc::{self, RcError, RcFile};

/// Unique scratch directory under the system temp dir.
fn scratch(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "bercon-test-{name}-{}-{}",
        std::process::id(),
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

#[test]
fn explicit_rc_path_is_loaded() {
    let dir = scratch("rc-explicit");
    let path = dir.join("config.ini");
    fs::write(
        &path,
        "[globals]\nip = 10.1.2.3\nport = 2310\n\n[profile.test]\npassword = pw\n",
    )
    .unwrap();

    let file = RcFile::load(Some(&path)).unwrap().expect("rc found");
    assert_eq!(file.globals.ip.as_deref(), Some("10.1.2.3"));

    let eff = file.effective("test").unwrap();
    assert_eq!(eff.ip.as_deref(), Some("10.1.2.3"));
    assert_eq!(eff.port, Some(2310));
    assert_eq!(eff.password.as_deref(), Some("pw"));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_explicit_rc_is_not_found() {
    let dir = scratch("rc-missing");
    let path = dir.join("nope.ini");

    assert!(RcFile::load(Some(&path)).unwrap().is_none());

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn beserver_cfg_from_file() {
    let dir = scratch("becfg-file");
    let path = dir.join("beserver_x64.cfg");
    fs::write(&path, "RConPassword pw123\nRConPort 2306\nRConIP 0.0.0.0\n").unwrap();

    let cfg = rc::load_beserver_cfg(&path).unwrap();
    assert_eq!(cfg.password, "pw123");
    assert_eq!(cfg.port, 2306);
    // Wildcard ip normalizes to loopback.
    assert_eq!(cfg.ip, "127.0.0.1");

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn beserver_cfg_directory_prefers_active() {
    let dir = scratch("becfg-active");
    fs::write(
        dir.join("beserver_x64.cfg"),
        "RConPassword stale\nRConPort 1111\n",
    )
    .unwrap();
    fs::write(
        dir.join("beserver_x64_active_abc.cfg"),
        "RConPassword fresh\nRConPort 2222\n",
    )
    .unwrap();

    let cfg = rc::load_beserver_cfg(&dir).unwrap();
    assert_eq!(cfg.password, "fresh");
    assert_eq!(cfg.port, 2222);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn beserver_cfg_directory_falls_back_to_newest() {
    let dir = scratch("becfg-newest");

    let old = dir.join("beserver_x64_one.cfg");
    fs::write(&old, "RConPassword old\nRConPort 1111\n").unwrap();

    // Ensure a strictly newer mtime for the second file.
    std::thread::sleep(Duration::from_millis(50));
    fs::write(
        dir.join("beserver_x64_two.cfg"),
        "RConPassword new\nRConPort 2222\n",
    )
    .unwrap();

    let cfg = rc::load_beserver_cfg(&dir).unwrap();
    assert_eq!(cfg.password, "new");

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn beserver_cfg_directory_without_candidates_errors() {
    let dir = scratch("becfg-empty");
    fs::write(dir.join("server.cfg"), "RConPassword pw\nRConPort 1\n").unwrap();

    assert!(matches!(
        rc::load_beserver_cfg(&dir),
        Err(RcError::NoServerCfg)
    ));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn profile_listing_renders_resolved_values() {
    let dir = scratch("rc-list");
    let becfg = dir.join("beserver_x64.cfg");
    fs::write(&becfg, "RConPassword pw\nRConPort 2444\nRConIP 192.168.0.9\n").unwrap();

    let rc_path = dir.join("config.ini");
    fs::write(
        &rc_path,
        format!(
            "[globals]\ntimeout = 3\n\n[profile.local]\nserver_cfg = {}\n\n[profile.remote]\nip = 8.8.8.8\nport = 2500\n",
            becfg.display()
        ),
    )
    .unwrap();

    let mut out = Vec::new();
    rc::print_profiles(&mut out, Some(&rc_path), &rc::Profile::default()).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.contains("local"));
    assert!(text.contains("192.168.0.9"));
    assert!(text.contains("2444"));
    assert!(text.contains("remote"));
    assert!(text.contains("8.8.8.8"));

    fs::remove_dir_all(&dir).ok();
}
