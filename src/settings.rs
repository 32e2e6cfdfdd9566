use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::ground_truth::GeneratorConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExperimentSettings {
    /// Directory for reference files, response logs and the telemetry DB.
    pub data_dir: PathBuf,
    pub generator: GeneratorConfig,
}

impl Default for ExperimentSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("pipecheck-data"),
            generator: GeneratorConfig::default(),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<ExperimentSettings>,
}

impl SettingsStore {
    /// Loads settings from `path`. A missing or unreadable file falls back to
    /// defaults; the file is only written on update.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring malformed settings in {}: {err}",
                    path.display()
                );
                ExperimentSettings::default()
            })
        } else {
            ExperimentSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn current(&self) -> ExperimentSettings {
        self.read().clone()
    }

    pub fn generator(&self) -> GeneratorConfig {
        self.read().generator.clone()
    }

    pub fn update_generator(&self, generator: GeneratorConfig) -> Result<()> {
        generator.validate()?;
        let mut guard = self.write();
        guard.generator = generator;
        self.persist(&guard)
    }

    pub fn update_data_dir(&self, data_dir: PathBuf) -> Result<()> {
        let mut guard = self.write();
        guard.data_dir = data_dir;
        self.persist(&guard)
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let data: ExperimentSettings = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed settings in {}", self.path.display()))?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &ExperimentSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, ExperimentSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ExperimentSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.current(), ExperimentSettings::default());
    }

    #[test]
    fn updates_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let generator = GeneratorConfig {
            universe_size: 20,
            max_alarm: 4,
            ..Default::default()
        };
        store.update_generator(generator.clone()).unwrap();

        let reopened = SettingsStore::new(path).unwrap();
        assert_eq!(reopened.generator(), generator);
        reopened.reload().unwrap();
        assert_eq!(reopened.generator().max_alarm, 4);
    }

    #[test]
    fn invalid_generator_is_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let generator = GeneratorConfig {
            universe_size: 0,
            ..Default::default()
        };
        assert!(store.update_generator(generator).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        let store = SettingsStore::new(path).unwrap();
        assert_eq!(store.current(), ExperimentSettings::default());
        assert!(store.reload().is_err());
    }
}
