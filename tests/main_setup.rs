use review_board::{
    AppConfig,
    config::{ConfigError, DEFAULT_PORT, Env},
};
use serial_test::serial;
use std::{env, panic};

// --- Setup/Teardown Utilities ---

const ALL_VARS: [&str; 6] = [
    "APP_ENV",
    "JWT_SECRET_KEY",
    "GUESTBOOK_DB_ADDR",
    "DB_USER",
    "DB_PASSWORD",
    "PORT",
];

/// Runs `test` with exactly the given variables set (every other config variable is
/// cleared), then restores the original environment, even if the test panicked.
fn run_with_env<T, R>(vars: &[(&'static str, &str)], test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&'static str, Option<String>)> = ALL_VARS
        .iter()
        .map(|&var| (var, env::var(var).ok()))
        .collect();

    unsafe {
        for var in ALL_VARS {
            env::remove_var(var);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    let result = panic::catch_unwind(test);

    unsafe {
        for (key, original_value) in originals {
            match original_value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

const REQUIRED: [(&str, &str); 2] = [
    ("JWT_SECRET_KEY", "a-signing-key"),
    ("GUESTBOOK_DB_ADDR", "postgres://app:secret@db:5432/guestbook"),
];

// --- Tests ---

#[test]
#[serial]
fn test_missing_signing_key_is_fatal() {
    let result = run_with_env(
        &[("GUESTBOOK_DB_ADDR", "postgres://app:secret@db:5432/guestbook")],
        AppConfig::from_env,
    );

    assert_eq!(result.err(), Some(ConfigError::Missing("JWT_SECRET_KEY")));
}

#[test]
#[serial]
fn test_missing_db_addr_is_fatal() {
    let result = run_with_env(&[("JWT_SECRET_KEY", "a-signing-key")], AppConfig::from_env);

    assert_eq!(result.err(), Some(ConfigError::Missing("GUESTBOOK_DB_ADDR")));
}

#[test]
#[serial]
fn test_empty_signing_key_counts_as_missing() {
    let result = run_with_env(
        &[
            ("JWT_SECRET_KEY", ""),
            ("GUESTBOOK_DB_ADDR", "postgres://app:secret@db:5432/guestbook"),
        ],
        AppConfig::from_env,
    );

    assert_eq!(result.err(), Some(ConfigError::Missing("JWT_SECRET_KEY")));
}

#[test]
#[serial]
fn test_defaults_with_only_required_vars() {
    let config = run_with_env(&REQUIRED, AppConfig::from_env).unwrap();

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.jwt_secret, "a-signing-key");
    assert_eq!(config.db_addr, "postgres://app:secret@db:5432/guestbook");
    assert_eq!(config.db_credentials(), None);
}

#[test]
#[serial]
fn test_port_override_and_invalid_port() {
    let mut vars = REQUIRED.to_vec();
    vars.push(("PORT", "9090"));
    let config = run_with_env(&vars, AppConfig::from_env).unwrap();
    assert_eq!(config.port, 9090);

    let mut vars = REQUIRED.to_vec();
    vars.push(("PORT", "eighty"));
    let result = run_with_env(&vars, AppConfig::from_env);
    assert_eq!(
        result.err(),
        Some(ConfigError::Invalid {
            name: "PORT",
            value: "eighty".to_string()
        })
    );
}

#[test]
#[serial]
fn test_production_env_selects_json_logging_mode() {
    let mut vars = REQUIRED.to_vec();
    vars.push(("APP_ENV", "production"));
    let config = run_with_env(&vars, AppConfig::from_env).unwrap();
    assert_eq!(config.env, Env::Production);

    let mut vars = REQUIRED.to_vec();
    vars.push(("APP_ENV", "staging"));
    let config = run_with_env(&vars, AppConfig::from_env).unwrap();
    assert_eq!(config.env, Env::Local);
}

#[test]
#[serial]
fn test_db_credentials_need_both_halves() {
    let mut vars = REQUIRED.to_vec();
    vars.push(("DB_USER", "svc"));
    let config = run_with_env(&vars, AppConfig::from_env).unwrap();
    assert_eq!(config.db_credentials(), None);

    vars.push(("DB_PASSWORD", "pw"));
    let config = run_with_env(&vars, AppConfig::from_env).unwrap();
    assert_eq!(config.db_credentials(), Some(("svc", "pw")));
}

#[test]
fn test_default_config_is_safe_for_tests() {
    let config = AppConfig::default();
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.env, Env::Local);
    assert!(!config.jwt_secret.is_empty());
}
