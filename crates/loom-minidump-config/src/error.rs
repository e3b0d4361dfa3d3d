// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration error types.

use std::path::PathBuf;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// Config file exists but could not be read
	#[error("failed to read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// TOML parsing error
	#[error("TOML parse error in {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	/// A `*_FILE` variable names a secret file that could not be read
	#[error("failed to read secret file {path} named by {var}: {source}")]
	SecretFileRead {
		var: String,
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// A `*_FILE` variable is set to an empty path
	#[error("secret file path in {var} is empty")]
	EmptySecretPath { var: String },

	/// Environment variable holds a value of the wrong type
	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	/// Resolved configuration breaks a cross-field rule
	#[error("validation error: {0}")]
	Validation(String),

	/// No crash directory configured and no data directory to default to
	#[error("could not determine data directory for crash reports")]
	DataDirNotFound,
}

impl ConfigError {
	/// Create a validation error
	pub fn validation(msg: impl Into<String>) -> Self {
		Self::Validation(msg.into())
	}
}
