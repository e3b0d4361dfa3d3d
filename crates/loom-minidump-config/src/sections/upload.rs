// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Upload endpoint configuration.

use std::time::Duration;

use loom_common_secret::SecretString;
use serde::{Deserialize, Serialize};

pub const DEFAULT_UPLOAD_URL: &str = "https://crash.loom.dev/api/minidump/upload";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PRODUCT: &str = "loom";

/// Upload configuration (runtime, fully resolved).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadConfig {
	pub url: String,
	pub auth_token: Option<SecretString>,
	pub timeout_secs: u64,
	pub product: String,
	pub version: String,
}

impl UploadConfig {
	pub fn timeout(&self) -> Duration {
		Duration::from_secs(self.timeout_secs)
	}
}

impl Default for UploadConfig {
	fn default() -> Self {
		UploadConfigLayer::default().finalize()
	}
}

/// Upload configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UploadConfigLayer {
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default)]
	pub auth_token: Option<SecretString>,
	#[serde(default)]
	pub timeout_secs: Option<u64>,
	#[serde(default)]
	pub product: Option<String>,
	#[serde(default)]
	pub version: Option<String>,
}

impl UploadConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.url.is_some() {
			self.url = other.url;
		}
		if other.auth_token.is_some() {
			self.auth_token = other.auth_token;
		}
		if other.timeout_secs.is_some() {
			self.timeout_secs = other.timeout_secs;
		}
		if other.product.is_some() {
			self.product = other.product;
		}
		if other.version.is_some() {
			self.version = other.version;
		}
	}

	pub fn finalize(self) -> UploadConfig {
		UploadConfig {
			url: self.url.unwrap_or_else(|| DEFAULT_UPLOAD_URL.to_string()),
			auth_token: self.auth_token,
			timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
			product: self.product.unwrap_or_else(|| DEFAULT_PRODUCT.to_string()),
			version: self
				.version
				.unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
		}
	}
}
