//! Configuration file loading tests

mod common;

use serial_test::serial;

use chatdesk::cli::Cli;
use chatdesk::config::Config;

#[test]
#[serial]
fn test_bundled_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/config.yaml");
    let config = Config::load(path, &Cli::default()).expect("bundled config loads");
    config.validate().expect("bundled config validates");

    assert_eq!(config.session.page_size, 20);
    assert!(!config.session.archive_on_new_chat);
    assert_eq!(config.topics.len(), 2);
    assert_eq!(config.topics[1].name, "reviews");
}

#[test]
#[serial]
fn test_partial_config_file_keeps_defaults() {
    let (_dir, path) = common::temp_config_file(
        r#"
session:
  archive_on_new_chat: true
speech:
  voice: alloy
"#,
    );

    let config = Config::load(path.to_str().unwrap(), &Cli::default()).expect("load");
    config.validate().expect("validate");

    assert!(config.session.archive_on_new_chat);
    assert!(config.session.retitle_enabled);
    assert_eq!(config.speech.voice, "alloy");
    assert_eq!(config.speech.format, "mp3");
    assert_eq!(config.generation.max_tokens, 2000);
    assert!(!config.topics.is_empty());
}

#[test]
#[serial]
fn test_invalid_values_fail_validation() {
    let (_dir, path) = common::temp_config_file(
        r#"
session:
  page_size: 0
"#,
    );

    let config = Config::load(path.to_str().unwrap(), &Cli::default()).expect("load");
    assert!(config.validate().is_err());
}

#[test]
#[serial]
fn test_greeting_disabled_only_by_null() {
    let (_dir, path) = common::temp_config_file(
        r#"
session:
  greeting: null
"#,
    );
    let config = Config::load(path.to_str().unwrap(), &Cli::default()).expect("load");
    assert!(config.session.greeting.is_none());

    let (_dir, path) = common::temp_config_file(
        r#"
session:
  archive_on_new_chat: false
"#,
    );
    let config = Config::load(path.to_str().unwrap(), &Cli::default()).expect("load");
    assert_eq!(config.session.greeting.as_deref(), Some("Hello"));
}
