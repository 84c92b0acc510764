use std::{
    fs::{create_dir_all, File},
    io::{BufReader, Write},
    path::PathBuf,
};

use home::home_dir;
use serde::{Deserialize, Serialize};

use tabplay::TabError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    sound_font_file: Option<PathBuf>,
    speed: f64,
    loop_delay_seconds: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sound_font_file: None,
            speed: 1.0,
            loop_delay_seconds: 0.0,
        }
    }
}

impl Config {
    // folder placed in $HOME directory
    const FOLDER: &'static str = ".tabplay";

    pub fn get_sound_font_file(&self) -> Option<PathBuf> {
        self.sound_font_file.clone()
    }

    pub fn set_sound_font_file(&mut self, new_sound_font_file: Option<PathBuf>) -> Result<(), TabError> {
        if self.sound_font_file == new_sound_font_file {
            // no op
            Ok(())
        } else {
            self.sound_font_file = new_sound_font_file;
            self.save_config()
        }
    }

    pub const fn get_speed(&self) -> f64 {
        self.speed
    }

    pub const fn get_loop_delay_seconds(&self) -> f64 {
        self.loop_delay_seconds
    }

    fn get_base_path() -> Result<PathBuf, TabError> {
        let home = home_dir()
            .ok_or_else(|| TabError::ConfigError("Could not find home directory".to_string()))?;
        let path = home.join(Self::FOLDER);
        Ok(path)
    }

    fn get_path() -> Result<PathBuf, TabError> {
        let base = Self::get_base_path()?;
        Ok(base.join("config.json"))
    }

    /// Creates config if it does not exist
    pub fn read_config() -> Result<Self, TabError> {
        let base_path = Self::get_base_path()?;
        if !base_path.exists() {
            create_dir_all(base_path)?;
        }
        let config_path = Self::get_path()?;
        if !config_path.exists() {
            // create default config
            Self::default().save_config()?;
        }
        let file = File::open(config_path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_json::from_reader(reader).map_err(|err| {
            TabError::ConfigError(format!("Could not read local configuration {err:}"))
        })?;
        Ok(config)
    }

    /// Assumes the config folder exists
    pub fn save_config(&self) -> Result<(), TabError> {
        let config_path = Self::get_path()?;
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            TabError::ConfigError(format!("Could not save local configuration {err:}"))
        })?;
        let mut file = File::create(config_path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
