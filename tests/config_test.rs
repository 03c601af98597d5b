use paapi::{ApiClient, ApiError};
use std::env;
use std::fs;
use tempfile::TempDir;

/// Test loading configuration from YAML file
#[test]
fn test_load_yaml_config() {
    let yaml = r#"
profiles:
  japan:
    access_key: AKIATEST
    secret_key: secrettest
    associate_tag: test-22
    locale: jp

client:
  requests_per_second: 2.0
  timeout_secs: 20
  connect_timeout_secs: 3
  user_agent: my-shop/1.0
  endpoint: http://127.0.0.1:9000

default_profile: japan
"#;

    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, yaml).unwrap();

    let config = paapi::config::load_from_yaml(&config_path).unwrap();

    assert_eq!(config.profiles.len(), 1);
    let creds = config.profiles.get("japan").unwrap();
    assert_eq!(creds.access_key, "AKIATEST");
    assert_eq!(creds.secret_key, "secrettest");
    assert_eq!(creds.associate_tag, Some("test-22".to_string()));
    assert_eq!(creds.locale, "jp");

    assert_eq!(config.client.requests_per_second, 2.0);
    assert_eq!(config.client.timeout_secs, 20);
    assert_eq!(config.client.connect_timeout_secs, 3);
    assert_eq!(config.client.user_agent, "my-shop/1.0");
    assert_eq!(config.client.endpoint.as_deref(), Some("http://127.0.0.1:9000"));
    assert_eq!(config.client.version, "2011-08-01");
    assert_eq!(config.default_profile, Some("japan".to_string()));
}

/// Test loading configuration from environment variables
#[test]
fn test_load_env_config() {
    let names = [
        "AWS_ACCESS_KEY_ID",
        "AWS_SECRET_ACCESS_KEY",
        "AWS_ASSOCIATE_TAG",
        "AWS_PRODUCT_LOCALE",
        "PAAPI_VERSION",
        "PAAPI_REQUESTS_PER_SECOND",
        "PAAPI_TIMEOUT",
        "PAAPI_ENDPOINT",
    ];
    let originals: Vec<_> = names.iter().map(|n| env::var(n).ok()).collect();

    env::set_var("AWS_ACCESS_KEY_ID", "env_key");
    env::set_var("AWS_SECRET_ACCESS_KEY", "env_secret");
    env::set_var("AWS_ASSOCIATE_TAG", "env-21");
    env::set_var("AWS_PRODUCT_LOCALE", "uk");
    env::set_var("PAAPI_VERSION", "2013-08-01");
    env::set_var("PAAPI_REQUESTS_PER_SECOND", "0.5");
    env::set_var("PAAPI_TIMEOUT", "12");
    env::set_var("PAAPI_ENDPOINT", "http://localhost:8181");

    let config = paapi::config::load_from_env().unwrap();

    let creds = config.get_profile(None).unwrap();
    assert_eq!(creds.access_key, "env_key");
    assert_eq!(creds.secret_key, "env_secret");
    assert_eq!(creds.associate_tag.as_deref(), Some("env-21"));
    assert_eq!(creds.locale, "uk");
    assert_eq!(config.client.version, "2013-08-01");
    assert_eq!(config.client.requests_per_second, 0.5);
    assert_eq!(config.client.timeout_secs, 12);
    assert_eq!(config.client.endpoint.as_deref(), Some("http://localhost:8181"));
    assert_eq!(config.default_profile, Some("default".to_string()));

    // Missing secret is an error
    env::remove_var("AWS_SECRET_ACCESS_KEY");
    assert!(paapi::config::load_from_env().is_err());

    for (name, original) in names.iter().zip(originals) {
        cleanup_env(name, original);
    }
}

/// Test default values
#[test]
fn test_default_values() {
    let yaml = r#"
profiles:
  minimal:
    access_key: key
    secret_key: secret
"#;

    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, yaml).unwrap();

    let config = paapi::config::load_from_yaml(&config_path).unwrap();

    let creds = config.profiles.get("minimal").unwrap();
    assert_eq!(creds.locale, "us");
    assert_eq!(creds.associate_tag, None);

    assert_eq!(config.client.requests_per_second, 1.0);
    assert_eq!(config.client.timeout_secs, 5);
    assert_eq!(config.client.connect_timeout_secs, 5);
    assert!(config.client.endpoint.is_none());
}

/// Test get_profile and load_config profile selection
#[test]
fn test_get_profile() {
    let yaml = r#"
profiles:
  us:
    access_key: us_key
    secret_key: us_secret
  de:
    access_key: de_key
    secret_key: de_secret
    locale: de

default_profile: us
"#;

    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, yaml).unwrap();

    let config = paapi::config::load_from_yaml(&config_path).unwrap();

    let de = config.get_profile(Some("de")).unwrap();
    assert_eq!(de.access_key, "de_key");
    assert_eq!(config.get_profile(None).unwrap().access_key, "us_key");
    assert!(config.get_profile(Some("nonexistent")).is_none());

    let path = config_path.to_str().unwrap();
    let selected = paapi::config::load_config(Some(path), Some("de")).unwrap();
    assert_eq!(selected.get_profile(None).unwrap().locale, "de");
    assert!(paapi::config::load_config(Some(path), Some("fr")).is_err());
}

/// A profile with an unregistered locale cannot build a client
#[test]
fn test_client_from_config_rejects_unknown_locale() {
    let yaml = r#"
profiles:
  moon:
    access_key: key
    secret_key: secret
    locale: moon
"#;

    let config: paapi::Config = write_and_load(yaml);
    let creds = config.get_profile(None).unwrap().clone();
    match ApiClient::new(creds, config.client.clone()) {
        Err(ApiError::UnknownLocale(locale)) => assert_eq!(locale, "moon"),
        other => panic!("expected UnknownLocale, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent.yaml");
    let err = paapi::config::load_from_yaml(&missing).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

fn write_and_load(yaml: &str) -> paapi::Config {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");
    fs::write(&path, yaml).unwrap();
    paapi::config::load_from_yaml(&path).unwrap()
}

/// Helper function to cleanup environment variables
fn cleanup_env(key: &str, orig_val: Option<String>) {
    match orig_val {
        Some(val) => env::set_var(key, val),
        None => env::remove_var(key),
    }
}
