// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: defaults, TOML files, environment variables and
//! command-line overrides.

use std::path::PathBuf;
use std::str::FromStr;

use loom_common_secret::SecretString;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::MinidumpConfigLayer;
use crate::sections::{
	LoggingConfigLayer, PermissionConfigLayer, StorageConfigLayer, UploadConfigLayer,
};

/// Order in which layers are merged; a later layer's set fields replace earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
	CommandLine = 60,
}

/// Produces one [`MinidumpConfigLayer`] to merge at its [`Precedence`].
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<MinidumpConfigLayer, ConfigError>;
}

/// Lowest layer. Empty, since every section fills its own defaults in `finalize`.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<MinidumpConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(MinidumpConfigLayer::default())
	}
}

/// Reads `minidump.toml`; an absent file yields an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<MinidumpConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(MinidumpConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: MinidumpConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Reads `LOOM_MINIDUMP_<FIELD>` variables. The upload token may also come
/// from the file named by `LOOM_MINIDUMP_AUTH_TOKEN_FILE`.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<MinidumpConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(MinidumpConfigLayer {
			upload: Some(load_upload_from_env()?),
			storage: Some(load_storage_from_env()?),
			permission: Some(load_permission_from_env()),
			logging: Some(LoggingConfigLayer {
				level: env_var("LOOM_MINIDUMP_LOG_LEVEL"),
			}),
		})
	}
}

/// Overrides collected from the command line, applied last.
pub struct OverrideSource(pub MinidumpConfigLayer);

impl ConfigSource for OverrideSource {
	fn name(&self) -> &'static str {
		"command-line"
	}

	fn precedence(&self) -> Precedence {
		Precedence::CommandLine
	}

	fn load(&self) -> Result<MinidumpConfigLayer, ConfigError> {
		Ok(self.0.clone())
	}
}

/// Loads a secret from the file named by `{var}_FILE`, falling back to `{var}`.
///
/// One trailing line ending is stripped from file contents. A set but empty
/// `{var}_FILE` is an error rather than a silent fallback.
pub fn load_secret_env(var: &str) -> Result<Option<SecretString>, ConfigError> {
	let file_var = format!("{var}_FILE");
	if let Some(path) = std::env::var_os(&file_var) {
		if path.is_empty() {
			return Err(ConfigError::EmptySecretPath { var: file_var });
		}
		let path = PathBuf::from(path);
		let mut content =
			std::fs::read_to_string(&path).map_err(|source| ConfigError::SecretFileRead {
				var: file_var.clone(),
				path: path.clone(),
				source,
			})?;
		if content.ends_with('\n') {
			content.pop();
			if content.ends_with('\r') {
				content.pop();
			}
		}
		debug!(var = %file_var, path = %path.display(), "loaded secret from file");
		return Ok(Some(SecretString::new(content)));
	}

	Ok(env_var(var).map(SecretString::new))
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid {} value '{v}'", std::any::type_name::<T>()),
		}),
		None => Ok(None),
	}
}

fn load_upload_from_env() -> Result<UploadConfigLayer, ConfigError> {
	Ok(UploadConfigLayer {
		url: env_var("LOOM_MINIDUMP_UPLOAD_URL"),
		auth_token: load_secret_env("LOOM_MINIDUMP_AUTH_TOKEN")?,
		timeout_secs: env_parse("LOOM_MINIDUMP_TIMEOUT_SECS")?,
		product: env_var("LOOM_MINIDUMP_PRODUCT"),
		version: env_var("LOOM_MINIDUMP_VERSION"),
	})
}

fn load_storage_from_env() -> Result<StorageConfigLayer, ConfigError> {
	Ok(StorageConfigLayer {
		crash_dir: env_var("LOOM_MINIDUMP_CRASH_DIR").map(PathBuf::from),
		max_attempts: env_parse("LOOM_MINIDUMP_MAX_ATTEMPTS")?,
		clean_out_minidumps: env_bool("LOOM_MINIDUMP_CLEAN_OUT"),
		max_report_age_days: env_parse("LOOM_MINIDUMP_MAX_REPORT_AGE_DAYS")?,
		max_reports_to_keep: env_parse("LOOM_MINIDUMP_MAX_REPORTS_TO_KEEP")?,
	})
}

fn load_permission_from_env() -> PermissionConfigLayer {
	PermissionConfigLayer {
		upload_disabled: env_bool("LOOM_MINIDUMP_UPLOAD_DISABLED"),
		enabled_for_tests: env_bool("LOOM_MINIDUMP_ENABLED_FOR_TESTS"),
		in_sample: env_bool("LOOM_MINIDUMP_IN_SAMPLE"),
		user_consent: env_bool("LOOM_MINIDUMP_USER_CONSENT"),
		metered_network: env_bool("LOOM_MINIDUMP_METERED_NETWORK"),
	}
}
