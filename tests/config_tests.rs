// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use kokoro_camera::Config;
use kokoro_camera::config::{BlurMode, CompositorPreference};

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir()
        .join(format!("kokoro-config-{}", uuid::Uuid::new_v4()))
        .join(name)
}

#[test]
fn test_config_default() {
    // Test that default config can be created
    let config = Config::default();

    // Check sensible defaults
    assert!(
        config.unmirror_front_camera,
        "Front camera frames should be un-mirrored by default"
    );
    assert_eq!(config.preview_fps, 15);
    assert_eq!(config.synthetic_frame_rate, 40);
    assert_eq!(config.measurement_secs, 15);
    assert_eq!(config.default_bpm, 60);
    assert_eq!(config.bpm_band(), (60, 100));
    assert_eq!(config.compositor, CompositorPreference::Auto);
}

#[test]
fn test_config_save_and_load() {
    let path = temp_path("config.json");
    let config = Config {
        room: Some("atelier".to_string()),
        blur: BlurMode::None,
        ..Config::default()
    };

    config.save_to(&path).unwrap();
    assert_eq!(Config::load_from(&path), config);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn test_config_invalid_file_falls_back_to_defaults() {
    let path = temp_path("config.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    assert_eq!(Config::load_from(&path), Config::default());
    assert_eq!(Config::load_from(&temp_path("missing.json")), Config::default());

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
