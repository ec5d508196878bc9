//! Unit tests for common-config crate

use common_config::{IqSettings, OptimizationConfig, VkgConfig};

#[test]
fn test_vkg_config_default() {
    let config = VkgConfig::default();

    assert!(!config.iq.test_mode);
    assert_eq!(config.optimization.max_iterations, 100);
    assert!(!config.optimization.enable_trace);
}

#[test]
fn test_iq_settings_testing() {
    assert!(IqSettings::testing().test_mode);
    assert!(!IqSettings::testing().with_test_mode(false).test_mode);
}

#[test]
fn test_vkg_config_serialization() {
    let mut config = VkgConfig::default();
    config.iq.test_mode = true;
    config.optimization.max_iterations = 7;

    let json = config.to_json().unwrap();
    let deserialized = VkgConfig::from_json(&json).unwrap();

    assert_eq!(config, deserialized);
}

#[test]
fn test_partial_json_uses_defaults() {
    let config = VkgConfig::from_json(r#"{ "iq": { "test_mode": true } }"#).unwrap();

    assert!(config.iq.test_mode);
    assert_eq!(config.optimization, OptimizationConfig::default());
}

#[test]
fn test_invalid_json_is_config_error() {
    let err = VkgConfig::from_json("{ not json").unwrap_err();
    assert!(err.to_string().starts_with("ConfigError"));
}

#[test]
fn test_optimization_config_builders() {
    let config = OptimizationConfig::default()
        .with_max_iterations(3)
        .with_trace(true);

    assert_eq!(config.max_iterations, 3);
    assert!(config.enable_trace);
}
