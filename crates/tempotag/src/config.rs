//! Global configuration for tempotag
//!
//! Configuration is stored as YAML in the per-user config directory.
//! Default location: ~/.config/tempotag/config.yaml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Analysis settings (tempo search range, optional danceability)
    pub analysis: AnalysisConfig,
    /// Batch processing settings
    pub batch: BatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl Config {
    /// Validate and clamp all sections to their supported ranges
    pub fn validate(&mut self) {
        self.analysis.tempo.validate();
    }
}

/// Analysis configuration section
///
/// Serializable so it can cross the estimation subprocess boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Tempo estimation settings
    pub tempo: TempoConfig,
    /// Also compute the danceability score for each file (logged only,
    /// never embedded in the filename)
    pub danceability: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            tempo: TempoConfig::default(),
            danceability: false,
        }
    }
}

/// Tempo estimation configuration
///
/// These values map directly to the estimator's search-range parameters.
/// Defaults match Essentia's PercivalBpmEstimator (50-210 BPM).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    /// Minimum expected tempo in BPM
    pub min_bpm: i32,
    /// Maximum expected tempo in BPM
    pub max_bpm: i32,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            min_bpm: 50,
            max_bpm: 210,
        }
    }
}

impl TempoConfig {
    /// Validate and clamp values to a range the estimator accepts
    pub fn validate(&mut self) {
        self.min_bpm = self.min_bpm.clamp(30, 200);
        self.max_bpm = self.max_bpm.clamp(60, 300);

        // Keep min < max with at least a 20 BPM search window
        if self.min_bpm >= self.max_bpm {
            self.max_bpm = (self.min_bpm + 20).min(300);
        }
    }
}

/// Batch processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Number of parallel analysis processes (clamped to 1-16 at run time)
    pub parallel_processes: u8,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            parallel_processes: 4,
        }
    }
}

/// Get the default config file path
///
/// Returns: <config_dir>/tempotag/config.yaml
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tempotag")
        .join("config.yaml")
}

/// Load configuration from a YAML file
///
/// If the file doesn't exist, returns default config.
/// If the file exists but is invalid, logs a warning and returns default config.
pub fn load_config(path: &Path) -> Config {
    if !path.exists() {
        log::info!("load_config: no config file at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_yaml::from_str::<Config>(&contents) {
            Ok(mut config) => {
                config.validate();
                log::info!(
                    "load_config: loaded config - tempo range {}-{} BPM, danceability {}",
                    config.analysis.tempo.min_bpm,
                    config.analysis.tempo.max_bpm,
                    if config.analysis.danceability { "on" } else { "off" },
                );
                config
            }
            Err(e) => {
                log::warn!("load_config: failed to parse config: {}, using defaults", e);
                Config::default()
            }
        },
        Err(e) => {
            log::warn!("load_config: failed to read config file: {}, using defaults", e);
            Config::default()
        }
    }
}

/// Save configuration to a YAML file
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.analysis.tempo.min_bpm, 50);
        assert_eq!(config.analysis.tempo.max_bpm, 210);
        assert!(!config.analysis.danceability);
        assert_eq!(config.batch.parallel_processes, 4);
    }

    #[test]
    fn test_tempo_validation_clamps_values() {
        let mut tempo = TempoConfig {
            min_bpm: 5,    // Below minimum
            max_bpm: 1000, // Above maximum
        };
        tempo.validate();
        assert_eq!(tempo.min_bpm, 30);
        assert_eq!(tempo.max_bpm, 300);
    }

    #[test]
    fn test_tempo_validation_min_max_order() {
        let mut tempo = TempoConfig {
            min_bpm: 180,
            max_bpm: 100, // Less than min
        };
        tempo.validate();
        assert!(tempo.max_bpm > tempo.min_bpm);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = Config {
            analysis: AnalysisConfig {
                tempo: TempoConfig {
                    min_bpm: 160,
                    max_bpm: 190,
                },
                danceability: true,
            },
            batch: BatchConfig {
                parallel_processes: 8,
            },
        };

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed.analysis.tempo.min_bpm, 160);
        assert_eq!(parsed.analysis.tempo.max_bpm, 190);
        assert!(parsed.analysis.danceability);
        assert_eq!(parsed.batch.parallel_processes, 8);
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tempotag").join("config.yaml");

        let config = Config {
            analysis: AnalysisConfig {
                tempo: TempoConfig {
                    min_bpm: 70,
                    max_bpm: 150,
                },
                danceability: true,
            },
            batch: BatchConfig {
                parallel_processes: 2,
            },
        };

        // Parent directory does not exist yet; save_config must create it
        save_config(&config, &path).unwrap();
        let loaded = load_config(&path);

        assert_eq!(loaded.analysis.tempo.min_bpm, 70);
        assert_eq!(loaded.analysis.tempo.max_bpm, 150);
        assert!(loaded.analysis.danceability);
        assert_eq!(loaded.batch.parallel_processes, 2);
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let config = load_config(Path::new("/nonexistent/tempotag/config.yaml"));
        assert_eq!(config.analysis.tempo.min_bpm, 50);
    }
}
