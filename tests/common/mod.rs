use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use chatdesk::config::Config;

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Default configuration pointed at a mock server, with short timeouts
#[allow(dead_code)]
pub fn config_for(server_uri: &str) -> Config {
    let mut config = Config::default();
    config.service.api_base = format!("{}/ai", server_uri);
    config.service.timeouts.read_seconds = 2;
    config.service.timeouts.generation_seconds = 2;
    config.service.timeouts.transcription_seconds = 2;
    config.service.timeouts.synthesis_seconds = 2;
    config.generation.temperature = 0.5;
    config
}
