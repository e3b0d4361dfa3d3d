// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! XDG paths for the uploader's config file and crash directory.

use std::path::PathBuf;

use crate::ConfigError;

/// User config file: `$XDG_CONFIG_HOME/loom/minidump.toml`.
///
/// `None` when the platform has no config directory.
pub fn default_config_file() -> Option<PathBuf> {
	let path = dirs::config_dir().map(|dir| dir.join("loom").join("minidump.toml"));
	tracing::trace!(path = ?path, "resolved default config file");
	path
}

/// Crash directory: `$XDG_DATA_HOME/loom/crash`.
pub fn default_crash_dir() -> Result<PathBuf, ConfigError> {
	dirs::data_dir()
		.map(|dir| dir.join("loom").join("crash"))
		.ok_or(ConfigError::DataDirNotFound)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_paths_are_under_loom() {
		if let Some(path) = default_config_file() {
			assert!(path.ends_with("loom/minidump.toml"));
		}
		if let Ok(dir) = default_crash_dir() {
			assert!(dir.ends_with("loom/crash"));
		}
	}
}
