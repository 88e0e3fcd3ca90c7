use crate::types::Config;
use anyhow::{Context, Result};
use std::fs;

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path))?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use crate::types::Config;

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
engine:
  classifier:
    vertical_threshold: 1.5
video:
  input_dir: "clips"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.engine.classifier.vertical_threshold, 1.5);
        assert_eq!(config.engine.classifier.horizontal_threshold, 1.2);
        assert_eq!(config.engine.tracker.match_distance_px, 120.0);
        assert_eq!(config.video.input_dir, "clips");
        assert_eq!(config.video.proc_width, 640);
        assert_eq!(config.logging.level, "info");
        assert!(config.runner.suppress_repeats);
        assert_eq!(config.runner.repeat_release_ms, 600.0);
        assert_eq!(config.runner.command_throttle_ms, None);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(Config::load("/nonexistent/gesture.yaml").is_err());
    }
}
