// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the Loom minidump uploader.
//!
//! This crate provides:
//! - Layered configuration from defaults, a TOML file, the environment and
//!   command-line overrides
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`LOOM_MINIDUMP_*`)
//!
//! # Usage
//!
//! ```ignore
//! use loom_minidump_config::load_config;
//!
//! let config = load_config()?;
//! println!("Uploading from {}", config.storage.crash_dir.display());
//! ```

pub mod error;
pub mod layer;
pub mod paths;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::MinidumpConfigLayer;
pub use sections::*;
pub use sources::{
	load_secret_env, ConfigSource, DefaultsSource, EnvSource, OverrideSource, Precedence, TomlSource,
};

use std::path::PathBuf;

use tracing::{debug, info};

/// Fully resolved uploader configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MinidumpConfig {
	pub upload: UploadConfig,
	pub storage: StorageConfig,
	pub permission: PermissionConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`LOOM_MINIDUMP_*`)
/// 2. Config file (`$XDG_CONFIG_HOME/loom/minidump.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<MinidumpConfig, ConfigError> {
	load_config_with_overrides(None, MinidumpConfigLayer::default())
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<MinidumpConfig, ConfigError> {
	load_config_with_overrides(Some(config_path.into()), MinidumpConfigLayer::default())
}

/// Load configuration, applying `overrides` above every other source.
///
/// `config_path` replaces the default config file location when set.
pub fn load_config_with_overrides(
	config_path: Option<PathBuf>,
	overrides: MinidumpConfigLayer,
) -> Result<MinidumpConfig, ConfigError> {
	let mut sources: Vec<Box<dyn ConfigSource>> = vec![
		Box::new(DefaultsSource),
		Box::new(EnvSource),
		Box::new(OverrideSource(overrides)),
	];
	match config_path.or_else(paths::default_config_file) {
		Some(path) => sources.push(Box::new(TomlSource::new(path))),
		None => debug!("no config directory available, skipping config file"),
	}

	sources.sort_by_key(|s| s.precedence());

	let mut merged = MinidumpConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: MinidumpConfigLayer) -> Result<MinidumpConfig, ConfigError> {
	let upload = layer.upload.unwrap_or_default().finalize();
	let storage = layer.storage.unwrap_or_default().finalize()?;
	let permission = layer.permission.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&upload, &storage)?;

	info!(
		upload_url = %upload.url,
		crash_dir = %storage.crash_dir.display(),
		max_attempts = storage.max_attempts,
		upload_disabled = permission.upload_disabled,
		user_consent = permission.user_consent,
		"Minidump configuration loaded"
	);

	Ok(MinidumpConfig {
		upload,
		storage,
		permission,
		logging,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(upload: &UploadConfig, storage: &StorageConfig) -> Result<(), ConfigError> {
	if storage.max_attempts < 1 {
		return Err(ConfigError::validation("storage.max_attempts must be at least 1"));
	}

	if upload.timeout_secs < 1 {
		return Err(ConfigError::validation("upload.timeout_secs must be at least 1"));
	}

	if !upload.url.starts_with("http://") && !upload.url.starts_with("https://") {
		return Err(ConfigError::Validation(format!(
			"upload.url must start with http:// or https://, got '{}'",
			upload.url
		)));
	}

	Ok(())
}
