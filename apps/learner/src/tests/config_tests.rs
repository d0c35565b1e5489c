use super::*;
use std::time::{SystemTime, UNIX_EPOCH};

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn defaults_apply_without_file_or_env() {
    let settings = resolve_settings(None, env_from(&[]));
    assert_eq!(settings.server_url, "http://localhost:8000");
    assert_eq!(settings.poll_interval_secs, 60);
    assert_eq!(settings.request_timeout_secs, 30);
    assert!(settings.session_file.ends_with("peer-review/session.toml"));
}

#[test]
fn env_overrides_file_and_app_prefix_wins() {
    let file: HashMap<String, String> = [
        ("server_url", "https://file.example"),
        ("poll_interval_secs", "15"),
        ("session_file", "/tmp/file-session.toml"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let settings = resolve_settings(
        Some(&file),
        env_from(&[
            ("PEER_REVIEW_SERVER_URL", "https://env.example"),
            ("APP__SERVER_URL", "https://app.example"),
            ("PEER_REVIEW_REQUEST_TIMEOUT_SECS", "5"),
        ]),
    );
    assert_eq!(settings.server_url, "https://app.example");
    assert_eq!(settings.poll_interval_secs, 15);
    assert_eq!(settings.request_timeout_secs, 5);
    assert_eq!(settings.session_file, PathBuf::from("/tmp/file-session.toml"));
}

#[test]
fn invalid_numbers_keep_the_previous_value() {
    let settings = resolve_settings(
        None,
        env_from(&[
            ("PEER_REVIEW_POLL_INTERVAL_SECS", "soon"),
            ("APP__REQUEST_TIMEOUT_SECS", "0"),
        ]),
    );
    assert_eq!(settings.poll_interval_secs, 60);
    assert_eq!(settings.request_timeout_secs, 30);
}

#[test]
fn config_file_accepts_bare_numbers() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = std::env::temp_dir().join(format!("learner_config_test_{suffix}.toml"));
    fs::write(
        &path,
        "server_url = \"https://platform.example\"\npoll_interval_secs = 20\n",
    )
    .expect("write config");

    let file = read_config_file(&path).expect("read config");
    let settings = resolve_settings(Some(&file), env_from(&[]));
    assert_eq!(settings.server_url, "https://platform.example");
    assert_eq!(settings.poll_interval_secs, 20);

    fs::remove_file(&path).expect("cleanup");
    assert!(load_settings(Some(&path)).is_err());
}
