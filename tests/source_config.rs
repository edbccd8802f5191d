use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use autolabel::config::SourceConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "AUTOLABEL_CONFIG",
        "AUTOLABEL_DOWNLOAD_DIR",
        "AUTOLABEL_CAPTURE_DIR",
        "AUTOLABEL_FRAME_INTERVAL",
        "AUTOLABEL_LIVE_INTERVAL_MS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "download_dir": "/var/cache/autolabel",
        "capture_dir": "/srv/captures",
        "video": { "frame_interval": 5 },
        "live": { "interval_ms": 250, "read_timeout_ms": 750 },
        "http": { "timeout_secs": 9 }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("AUTOLABEL_CONFIG", file.path());
    std::env::set_var("AUTOLABEL_CAPTURE_DIR", "/tmp/override-captures");
    std::env::set_var("AUTOLABEL_LIVE_INTERVAL_MS", "40");

    let cfg = SourceConfig::load().expect("load config");
    clear_env();

    assert_eq!(cfg.download_dir, std::path::PathBuf::from("/var/cache/autolabel"));
    assert_eq!(cfg.capture_dir, std::path::PathBuf::from("/tmp/override-captures"));
    assert_eq!(cfg.frame_interval, 5);
    assert_eq!(cfg.live_interval_ms, 40);
    assert_eq!(cfg.read_timeout, Duration::from_millis(750));
    assert_eq!(cfg.http_timeout, Duration::from_secs(9));
}

#[test]
fn defaults_without_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = SourceConfig::load().expect("load defaults");
    assert_eq!(cfg.download_dir, std::env::temp_dir());
    assert_eq!(cfg.capture_dir, std::env::temp_dir().join("autolabel"));
    assert_eq!(cfg.frame_interval, 1);
    assert_eq!(cfg.live_interval_ms, 1000);
}

#[test]
fn rejects_non_positive_intervals() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("AUTOLABEL_FRAME_INTERVAL", "0");
    let err = SourceConfig::load().expect_err("zero frame interval");
    assert!(err.to_string().contains("frame interval"));
    clear_env();

    std::env::set_var("AUTOLABEL_LIVE_INTERVAL_MS", "-20");
    let err = SourceConfig::load().expect_err("negative live interval");
    assert!(err.to_string().contains("live interval"));
    clear_env();

    std::env::set_var("AUTOLABEL_FRAME_INTERVAL", "often");
    assert!(SourceConfig::load().is_err());
    clear_env();
}

#[test]
fn rejects_malformed_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{ not json").expect("write config");
    std::env::set_var("AUTOLABEL_CONFIG", file.path());

    assert!(SourceConfig::load().is_err());
    clear_env();
}
