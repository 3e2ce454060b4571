use fleetgauge::config::GatherConfig;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_default_config() {
    let config = GatherConfig::default();
    assert_eq!(config.sampling.period_secs, 60);
    assert_eq!(config.sampling.probe_timeout_secs, 15);
    assert_eq!(config.sampling.percentiles, vec![50, 90, 99]);
    assert!(config.constraints.is_empty());
}

#[test]
fn test_load_from_toml() {
    let toml_content = r#"
[sampling]
period_secs = 30
probe_timeout_secs = 5
percentiles = [50, 99]

[constraints.apiserver]
cpu_limit_cores = 0.5
mem_limit_bytes = 200000000

[constraints.scheduler]
cpu_limit_cores = 0.1
mem_limit_bytes = 50000000
"#;
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(toml_content.as_bytes()).unwrap();
    let config = GatherConfig::load(file.path()).unwrap();
    assert_eq!(config.sampling.period_secs, 30);
    assert_eq!(config.sampling.percentiles, vec![50, 99]);
    assert_eq!(config.constraints.len(), 2);
    assert_eq!(config.constraints["apiserver"].cpu_limit_cores, 0.5);
    assert_eq!(config.constraints["scheduler"].mem_limit_bytes, 50_000_000);
}

#[test]
fn test_save_config() {
    let mut config = GatherConfig::default();
    config.sampling.period_secs = 120;
    let file = NamedTempFile::new().unwrap();
    config.save(file.path()).unwrap();
    let loaded = GatherConfig::load(file.path()).unwrap();
    assert_eq!(loaded.sampling.period_secs, 120);
    assert_eq!(loaded.sampling.percentiles, config.sampling.percentiles);
}

#[test]
fn test_probe_timeout_below_period() {
    let config = GatherConfig::default();
    assert_eq!(config.probe_timeout(), Duration::from_secs(15));
}

#[test]
fn test_probe_timeout_clamped_when_misconfigured() {
    let mut config = GatherConfig::default();
    config.sampling.period_secs = 10;
    config.sampling.probe_timeout_secs = 20;
    assert_eq!(config.probe_timeout(), Duration::from_secs(5));
}
