use std::{
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::{retry::RetryPolicy, temperature::TemperatureUnit};

const MAX_KNOWN_PREFERENCES_VERSION: u32 = 1;
const APP_DIR_NAME: &str = "dual-thermal";
const PREFERENCES_FILE_NAME: &str = "preferences.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub preferences_version: u32,
    pub calibration_file: PathBuf,
    pub output_directory: Option<PathBuf>,
    pub recording_label: String,
    pub camera1_index: Option<u32>,
    pub camera2_index: Option<u32>,
    pub refresh_interval_ms: u64,
    pub open_retry: RetryPolicy,
    pub temperature_unit: TemperatureUnit,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            preferences_version: 1,
            calibration_file: PathBuf::from("Data").join("calibrationData.json"),
            output_directory: None,
            recording_label: "Default".to_string(),
            camera1_index: Some(0),
            camera2_index: Some(1),
            refresh_interval_ms: 250,
            open_retry: RetryPolicy::default(),
            temperature_unit: TemperatureUnit::Celsius,
        }
    }
}

impl UserPreferences {
    pub fn default_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir().ok_or_else(|| anyhow!("No config directory"))?;
        path.push(APP_DIR_NAME);
        path.push(PREFERENCES_FILE_NAME);
        Ok(path)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let file = File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let prefs: UserPreferences = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        if prefs.preferences_version > MAX_KNOWN_PREFERENCES_VERSION {
            return Err(anyhow!(
                "Unknown preferences version {}",
                prefs.preferences_version
            ));
        }
        Ok(prefs)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(1))
    }
}
