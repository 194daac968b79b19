use std::fmt::{Display, Formatter};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::stores::state_dir;

const CONFIG_FILE: &str = "config.toml";

/// Optional knobs for the dashboard and manual sessions. Missing file means
/// defaults; a malformed file is a hard error rather than silently ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
	/// Clock time a manual session starts at, "HH:MM".
	pub manual_start: String,
	/// Length of a manual session in minutes.
	pub manual_minutes: i64,
	/// Dashboard poll period while tracking, in milliseconds.
	pub tick_millis: u64,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			manual_start: "09:00".to_string(),
			manual_minutes: 60,
			tick_millis: 1000,
		}
	}
}

impl Config {
	/// The configured manual-session start as (hour, minute).
	pub fn manual_clock(&self) -> Result<(u32, u32), ConfigError> {
		parse_clock(&self.manual_start)
			.ok_or_else(|| ConfigError::InvalidClock(self.manual_start.clone()))
	}
}

pub fn parse_clock(input: &str) -> Option<(u32, u32)> {
	let (hour, minute) = input.split_once(':')?;
	let hour = hour.parse::<u32>().ok()?;
	let minute = minute.parse::<u32>().ok()?;
	if hour < 24 && minute < 60 {
		Some((hour, minute))
	} else {
		None
	}
}

#[derive(Debug)]
pub enum ConfigError {
	Io(std::io::Error),
	TomlDecode(toml::de::Error),
	InvalidClock(String),
	InvalidMinutes(i64),
}

impl Display for ConfigError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			ConfigError::Io(err) => write!(f, "io error: {err}"),
			ConfigError::TomlDecode(err) => write!(f, "failed to parse config: {err}"),
			ConfigError::InvalidClock(value) => {
				write!(f, "invalid manual_start '{value}', expected HH:MM")
			}
			ConfigError::InvalidMinutes(value) => {
				write!(f, "manual_minutes must be positive, got {value}")
			}
		}
	}
}

impl std::error::Error for ConfigError {}

pub fn config_path() -> PathBuf {
	state_dir().join(CONFIG_FILE)
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
	let raw = match fs::read_to_string(path) {
		Ok(raw) => raw,
		Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Config::default()),
		Err(err) => return Err(ConfigError::Io(err)),
	};

	let config: Config = toml::from_str(&raw).map_err(ConfigError::TomlDecode)?;
	config.manual_clock()?;
	if config.manual_minutes <= 0 {
		return Err(ConfigError::InvalidMinutes(config.manual_minutes));
	}
	Ok(config)
}

#[cfg(test)]
mod tests {
	use super::{parse_clock, Config};

	#[test]
	fn defaults_mirror_the_stock_manual_session() {
		let config = Config::default();
		assert_eq!(config.manual_clock().expect("clock"), (9, 0));
		assert_eq!(config.manual_minutes, 60);
		assert_eq!(config.tick_millis, 1000);
	}

	#[test]
	fn parses_partial_config_with_defaults() {
		let config: Config = toml::from_str("manual_start = \"08:30\"").expect("parse");
		assert_eq!(config.manual_clock().expect("clock"), (8, 30));
		assert_eq!(config.manual_minutes, 60);
	}

	#[test]
	fn rejects_nonsense_clock_text() {
		assert_eq!(parse_clock("25:00"), None);
		assert_eq!(parse_clock("09:61"), None);
		assert_eq!(parse_clock("late"), None);
		assert_eq!(parse_clock("07:05"), Some((7, 5)));
	}
}
