use std::path::Path;

use miette::{Context, IntoDiagnostic};
use serde::{Deserialize, Serialize};

use crate::search::DriverConfig;

/// Engine settings as stored on disk. Every field has a default, so a file
/// only needs the values it changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Per-move budget in milliseconds
    pub time_ms: u64,
    pub engine: DriverConfig,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            time_ms: 1_000,
            engine: DriverConfig::default(),
        }
    }
}

impl EngineSettings {
    pub fn load_from_file(path: impl AsRef<Path>) -> miette::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .into_diagnostic()
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        toml::from_str(&text)
            .into_diagnostic()
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> miette::Result<()> {
        let path = path.as_ref();
        let text = toml::to_string_pretty(self)
            .into_diagnostic()
            .context("Failed to serialize settings")?;
        std::fs::write(path, text)
            .into_diagnostic()
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::Strategy;

    #[test]
    fn partial_file_keeps_defaults() {
        let settings: EngineSettings = toml::from_str(
            r#"
            time_ms = 250

            [engine]
            strategy = "mcts"

            [engine.mcts]
            rollout_batch = 8
            "#,
        )
        .unwrap();

        assert_eq!(settings.time_ms, 250);
        assert_eq!(settings.engine.strategy, Strategy::Mcts);
        assert_eq!(settings.engine.mcts.rollout_batch, 8);
        assert_eq!(settings.engine.alpha_beta, DriverConfig::default().alpha_beta);
    }

    #[test]
    fn saved_settings_load_back() {
        let path = std::env::temp_dir().join(format!("arbor_settings_{}.toml", std::process::id()));
        let mut settings = EngineSettings::default();
        settings.engine.strategy = Strategy::Parallel;
        settings.engine.max_depth = Some(7);
        settings.engine.alpha_beta.beam_width = Some(5);

        settings.save_to_file(&path).unwrap();
        let loaded = EngineSettings::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(EngineSettings::load_from_file("/definitely/not/here.toml").is_err());
    }
}
