use std::env;
use std::fs;
use std::io::{Error, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::storage::STORAGE_NAMESPACE;

const RECENT_STORES_FILE: &str = "recent_stores.txt";
const MAX_RECENT_STORES: usize = 50;

/// Picks the store file to open: the `--store` flag, then `TRACKAPP_STORE`,
/// then the most recently used store, then the default blob in the state
/// directory. Unlike a missing flag, a missing file is fine — loading it
/// yields an empty ledger.
pub fn resolve_store_path(cli_path: Option<PathBuf>) -> PathBuf {
	if let Some(path) = cli_path {
		return absolutize(path);
	}

	if let Some(path) = env::var_os("TRACKAPP_STORE") {
		let path = PathBuf::from(path);
		if !path.as_os_str().is_empty() {
			return absolutize(path);
		}
	}

	if let Ok(mut recent) = recent_stores(MAX_RECENT_STORES) {
		if let Some(path) = recent.drain(..).next() {
			return path;
		}
	}

	state_dir().join(format!("{STORAGE_NAMESPACE}.json"))
}

pub fn remember_store(path: &Path) -> Result<(), Error> {
	let path = absolutize(path.to_path_buf());
	let mut entries = recent_stores(MAX_RECENT_STORES)?;
	entries.retain(|entry| entry != &path);
	entries.insert(0, path);
	entries.truncate(MAX_RECENT_STORES);
	save_recent_stores(&entries)
}

pub fn recent_stores(limit: usize) -> Result<Vec<PathBuf>, Error> {
	let path = recent_stores_path();
	let raw = match fs::read_to_string(path) {
		Ok(raw) => raw,
		Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
		Err(err) => return Err(err),
	};

	let mut rows = Vec::new();
	for line in raw.lines() {
		let trimmed = line.trim();
		if trimmed.is_empty() {
			continue;
		}
		rows.push(PathBuf::from(trimmed));
		if rows.len() >= limit {
			break;
		}
	}

	Ok(rows)
}

fn save_recent_stores(entries: &[PathBuf]) -> Result<(), Error> {
	let state_dir = state_dir();
	fs::create_dir_all(&state_dir)?;

	let mut file = fs::File::create(recent_stores_path())?;
	for path in entries {
		writeln!(file, "{}", path.display())?;
	}

	Ok(())
}

fn recent_stores_path() -> PathBuf {
	state_dir().join(RECENT_STORES_FILE)
}

pub fn state_dir() -> PathBuf {
	if let Some(path) = env::var_os("TRACKAPP_STATE_DIR") {
		return PathBuf::from(path);
	}

	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("LOCALAPPDATA") {
			return PathBuf::from(path).join("trackapp");
		}
	}

	if let Some(path) = env::var_os("XDG_STATE_HOME") {
		return PathBuf::from(path).join("trackapp");
	}

	if let Some(path) = env::var_os("HOME") {
		return PathBuf::from(path)
			.join(".local")
			.join("state")
			.join("trackapp");
	}

	PathBuf::from(".trackapp")
}

fn absolutize(path: PathBuf) -> PathBuf {
	let path = if path.is_absolute() {
		path
	} else if let Ok(cwd) = env::current_dir() {
		cwd.join(path)
	} else {
		path
	};

	if path.exists() {
		fs::canonicalize(&path).unwrap_or(path)
	} else {
		path
	}
}
