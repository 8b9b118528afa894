use std::path::{Path, PathBuf};
use serde::{Serialize, Deserialize};

use crate::organizer::Actions;
use crate::ordering::Order;
use crate::set_cover::Policy;

/// User tunable behaviour of an organize pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	pub policy: Policy,
	pub order: Order,
	pub organize_actions: Actions,
	/// Files under this directory sort into the system bucket.
	pub system_root: PathBuf,
	/// Replace private framework headers with their public forwarding header.
	pub prefer_public_headers: bool,
	/// Search the disk for entries that arrive without a resolved file.
	pub search_unresolved: bool,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			policy: Policy::MinimalEntries,
			order: Order::SpecificFirst,
			organize_actions: Actions::all(),
			system_root: default_system_root(),
			prefer_public_headers: true,
			search_unresolved: true,
		}
	}
}

fn default_system_root() -> PathBuf {
	#[cfg(target_os = "windows")]
	let path = PathBuf::from("C:/Program Files");

	#[cfg(not(target_os = "windows"))]
	let path = PathBuf::from("/usr/");

	path
}

#[derive(Debug, Clone, Default)]
pub struct Config {
	pub settings: Settings,
	/// File the settings were read from, if any.
	pub source: Option<PathBuf>,
}

impl Config {
	/// Location of the per user config file, `None` when no home directory can be determined.
	pub fn default_path() -> Option<PathBuf> {
		#[cfg(target_os = "windows")]
		let path = std::env::var("APPDATA").ok().map(PathBuf::from);

		#[cfg(not(target_os = "windows"))]
		let path = if let Ok(e) = std::env::var("XDG_CONFIG_HOME") {
			Some(PathBuf::from(e))
		} else {
			std::env::var("HOME").ok().map(|home| PathBuf::from(home).join(".config"))
		};

		path.map(|p| p.join("incorg").join("config.json"))
	}

	/// Reads the per user config file, a missing file gives the defaults.
	///
	/// # Errors
	/// - [`IO`](crate::error::Error::IO) when the file exists but cannot be read.
	/// - [`SerdeJSON`](crate::error::Error::SerdeJSON) when the file is malformed.
	pub fn load_from_disk() -> crate::Result<Self> {
		match Self::default_path() {
			Some(path) if path.exists() => Self::load_from_file(path),
			Some(path) => {
				log::debug!("No config at {}, using defaults", path.display());
				Ok(Default::default())
			},
			None => {
				log::debug!("No config directory available, using defaults");
				Ok(Default::default())
			},
		}
	}

	pub fn load_from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
		let path = path.as_ref();
		let settings = serde_json::from_reader(std::io::BufReader::new(std::fs::File::open(path)?))?;
		log::debug!("Loaded config from {}", path.display());
		Ok(Self { settings, source: Some(path.to_path_buf()) })
	}

	pub fn save_to_file(&self, path: impl AsRef<Path>) -> crate::Result<()> {
		let path = path.as_ref();
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		serde_json::to_writer_pretty(std::io::BufWriter::new(std::fs::File::create(path)?), &self.settings)?;
		Ok(())
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test] fn default_policy_is_minimal_entries() { assert_eq!(Settings::default().policy, Policy::MinimalEntries) }
	#[test] fn default_order_is_specific_first() { assert_eq!(Settings::default().order, Order::SpecificFirst) }

	#[test]
	fn partial_config_fills_defaults() {
		let settings: Settings = serde_json::from_str(r#"{ "policy": "MinimalDepth" }"#).unwrap();
		assert_eq!(settings.policy, Policy::MinimalDepth);
		assert_eq!(settings.order, Order::SpecificFirst);
		assert!(settings.search_unresolved);
	}

	#[test]
	fn unknown_policy_fails_to_load() {
		assert!(serde_json::from_str::<Settings>(r#"{ "policy": "Fastest" }"#).is_err());
	}

	#[test]
	fn config_loads_what_was_saved() {
		let dir = tempfile::tempdir().unwrap();
		let file = dir.path().join("incorg").join("config.json");
		let mut config = Config::default();
		config.settings.order = Order::Alphabetical;
		config.save_to_file(&file).unwrap();
		let loaded = Config::load_from_file(&file).unwrap();
		assert_eq!(loaded.settings.order, Order::Alphabetical);
		assert_eq!(loaded.source.as_deref(), Some(file.as_path()));
	}
}
