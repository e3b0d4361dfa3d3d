// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crash directory and retention configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::paths::default_crash_dir;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_MAX_REPORT_AGE_DAYS: u64 = 30;
const DEFAULT_MAX_REPORTS_TO_KEEP: usize = 10;

/// Storage configuration (runtime, fully resolved).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
	pub crash_dir: PathBuf,
	pub max_attempts: u32,
	pub clean_out_minidumps: bool,
	pub max_report_age_days: u64,
	pub max_reports_to_keep: usize,
}

impl StorageConfig {
	pub fn max_report_age(&self) -> Duration {
		Duration::from_secs(self.max_report_age_days * 24 * 60 * 60)
	}
}

/// Storage configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageConfigLayer {
	#[serde(default)]
	pub crash_dir: Option<PathBuf>,
	#[serde(default)]
	pub max_attempts: Option<u32>,
	#[serde(default)]
	pub clean_out_minidumps: Option<bool>,
	#[serde(default)]
	pub max_report_age_days: Option<u64>,
	#[serde(default)]
	pub max_reports_to_keep: Option<usize>,
}

impl StorageConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.crash_dir.is_some() {
			self.crash_dir = other.crash_dir;
		}
		if other.max_attempts.is_some() {
			self.max_attempts = other.max_attempts;
		}
		if other.clean_out_minidumps.is_some() {
			self.clean_out_minidumps = other.clean_out_minidumps;
		}
		if other.max_report_age_days.is_some() {
			self.max_report_age_days = other.max_report_age_days;
		}
		if other.max_reports_to_keep.is_some() {
			self.max_reports_to_keep = other.max_reports_to_keep;
		}
	}

	/// Resolves the layer. The crash directory falls back to the XDG data dir.
	pub fn finalize(self) -> Result<StorageConfig, ConfigError> {
		let crash_dir = match self.crash_dir {
			Some(dir) => dir,
			None => default_crash_dir()?,
		};

		Ok(StorageConfig {
			crash_dir,
			max_attempts: self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
			clean_out_minidumps: self.clean_out_minidumps.unwrap_or(true),
			max_report_age_days: self
				.max_report_age_days
				.unwrap_or(DEFAULT_MAX_REPORT_AGE_DAYS),
			max_reports_to_keep: self
				.max_reports_to_keep
				.unwrap_or(DEFAULT_MAX_REPORTS_TO_KEEP),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_layer_finalize_with_crash_dir() {
		let config = StorageConfigLayer {
			crash_dir: Some(PathBuf::from("/var/crash/loom")),
			..Default::default()
		}
		.finalize()
		.unwrap();

		assert_eq!(config.crash_dir, PathBuf::from("/var/crash/loom"));
		assert_eq!(config.max_attempts, 3);
		assert!(config.clean_out_minidumps);
		assert_eq!(config.max_report_age(), Duration::from_secs(30 * 86400));
		assert_eq!(config.max_reports_to_keep, 10);
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = StorageConfigLayer {
			max_attempts: Some(3),
			clean_out_minidumps: Some(true),
			..Default::default()
		};
		base.merge(StorageConfigLayer {
			max_attempts: Some(5),
			clean_out_minidumps: None,
			..Default::default()
		});
		assert_eq!(base.max_attempts, Some(5));
		assert_eq!(base.clean_out_minidumps, Some(true));
	}

	#[test]
	fn test_deserialize_layer() {
		let layer: StorageConfigLayer = toml::from_str(
			r#"
crash_dir = "/tmp/crash"
max_reports_to_keep = 4
"#,
		)
		.unwrap();
		assert_eq!(layer.crash_dir, Some(PathBuf::from("/tmp/crash")));
		assert_eq!(layer.max_reports_to_keep, Some(4));
		assert!(layer.max_attempts.is_none());
	}
}
