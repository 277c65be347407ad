//! Config file to check settings and gateway

use std::time::Duration;

use pushcheck_config::PushcheckConfig;
use pushcheck_core::PollPolicy;
use pushcheck_engine::CheckSettings;
use pushcheck_types::{BARE_EXPERIENCE_ID, Platform};

fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn config_file_drives_check_settings() {
    let (_dir, path) = write_config(
        r#"
[checks]
platform = "android"
manifest_present = false
settle_ms = 200
poll_interval_ms = 250
poll_attempts = 4
"#,
    );

    let config = PushcheckConfig::load_from(&path).unwrap();
    let settings = CheckSettings::from_config(&config).unwrap();

    assert_eq!(settings.platform, Platform::Android);
    assert_eq!(settings.settle_delay, Duration::from_millis(200));
    assert_eq!(settings.poll, PollPolicy::new(Duration::from_millis(250), 4));
    assert_eq!(settings.poll.budget(), Duration::from_secs(1));
    assert_eq!(
        settings.expo_token_options().experience_id.as_deref(),
        Some(BARE_EXPERIENCE_ID)
    );
}

#[test]
fn missing_config_file_matches_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = PushcheckConfig::load_from(&dir.path().join("nope.toml")).unwrap();
    let settings = CheckSettings::from_config(&config).unwrap();

    assert_eq!(settings, CheckSettings::default());
}

#[test]
fn bad_platform_in_file_is_rejected() {
    let (_dir, path) = write_config("[checks]\nplatform = \"blackberry\"\n");
    let config = PushcheckConfig::load_from(&path).unwrap();
    assert!(CheckSettings::from_config(&config).is_err());
}
