// tests/config_env.rs
use page_sentinel::config::{AiProvider, ConfigError, SentinelConfig};
use std::{env, fs};

const VARS: &[&str] = &[
    "SENTINEL_CONFIG_PATH",
    "SENTINEL_STORE_PATH",
    "SENTINEL_INTERVAL_SECS",
    "SENTINEL_BIND",
    "GEMINI_API_KEY",
    "OPENAI_API_KEY",
    "SMTP_HOST",
    "SMTP_SERVER",
    "SMTP_PORT",
    "SMTP_USER",
    "SMTP_PASSWORD",
    "SENDER_EMAIL",
];

fn clear_env() {
    for v in VARS {
        env::remove_var(v);
    }
}

#[serial_test::serial]
#[test]
fn default_uses_env_path_then_fallbacks() {
    clear_env();
    // Isolate CWD so the repo's own config/ is never read.
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::set_var("GEMINI_API_KEY", "g-key");

    // 1) Nothing on disk: built-in defaults
    let cfg = SentinelConfig::load_default().unwrap();
    assert_eq!(cfg.schedule.interval_secs, 21_600);
    assert_eq!(cfg.ai.api_key, "g-key");

    // 2) ./config/sentinel.toml
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(
        tmp.path().join("config/sentinel.toml"),
        "[schedule]\ninterval_secs = 600\n",
    )
    .unwrap();
    let cfg = SentinelConfig::load_default().unwrap();
    assert_eq!(cfg.schedule.interval_secs, 600);

    // 3) SENTINEL_CONFIG_PATH wins
    let p_env = tmp.path().join("other.toml");
    fs::write(&p_env, "[schedule]\ninterval_secs = 60\n").unwrap();
    env::set_var("SENTINEL_CONFIG_PATH", p_env.display().to_string());
    let cfg = SentinelConfig::load_default().unwrap();
    assert_eq!(cfg.schedule.interval_secs, 60);

    clear_env();
    env::set_current_dir(&old).unwrap();
}

#[serial_test::serial]
#[test]
fn env_overrides_deployment_values() {
    clear_env();
    env::set_var("SENTINEL_STORE_PATH", "/var/lib/sentinel/state.json");
    env::set_var("SENTINEL_INTERVAL_SECS", " 3600 ");
    env::set_var("SENTINEL_BIND", "127.0.0.1:9000");
    env::set_var("SMTP_SERVER", "smtp.example.edu");
    env::set_var("SMTP_PORT", "587");
    env::set_var("SMTP_USER", "alerts@example.edu");
    env::set_var("SMTP_PASSWORD", "hunter2");

    let mut cfg = SentinelConfig::from_toml_str(
        "[ai]\nprovider = \"disabled\"\n\n[email]\nenabled = true\n",
    )
    .unwrap();
    cfg.apply_env().unwrap();

    assert_eq!(
        cfg.store.path,
        std::path::PathBuf::from("/var/lib/sentinel/state.json")
    );
    assert_eq!(cfg.schedule.interval_secs, 3600);
    assert_eq!(cfg.server.bind, "127.0.0.1:9000");
    assert_eq!(cfg.email.smtp_host, "smtp.example.edu");
    assert_eq!(cfg.email.smtp_port, 587);
    assert_eq!(cfg.email.password, "hunter2");
    assert_eq!(cfg.email.sender(), "alerts@example.edu");
    assert_eq!(cfg.ai.provider, AiProvider::Disabled);
    assert!(cfg.ai.api_key.is_empty());

    clear_env();
}

#[serial_test::serial]
#[test]
fn missing_secrets_are_reported_by_name() {
    clear_env();

    let mut cfg = SentinelConfig::from_toml_str("[ai]\nprovider = \"openai\"\n").unwrap();
    let err = cfg.apply_env().unwrap_err();
    assert!(matches!(err, ConfigError::MissingEnv("OPENAI_API_KEY")), "got {err:?}");

    env::set_var("OPENAI_API_KEY", "sk-test");
    let mut cfg = SentinelConfig::from_toml_str(
        "[ai]\nprovider = \"openai\"\n\n[email]\nenabled = true\n",
    )
    .unwrap();
    let err = cfg.apply_env().unwrap_err();
    assert!(matches!(err, ConfigError::MissingEnv("SMTP_PASSWORD")), "got {err:?}");

    clear_env();
}

#[serial_test::serial]
#[test]
fn malformed_interval_is_rejected() {
    clear_env();
    env::set_var("SENTINEL_INTERVAL_SECS", "hourly");
    let mut cfg = SentinelConfig::from_toml_str("[ai]\nprovider = \"disabled\"\n").unwrap();
    let err = cfg.apply_env().unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }));
    clear_env();
}
