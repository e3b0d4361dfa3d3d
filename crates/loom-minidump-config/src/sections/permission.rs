// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Upload permission inputs.

use serde::{Deserialize, Serialize};

/// Permission configuration (runtime, fully resolved).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PermissionConfig {
	/// Force-disable uploads regardless of every other input.
	pub upload_disabled: bool,
	/// Bypass user consent (sampling and network still apply).
	pub enabled_for_tests: bool,
	pub in_sample: bool,
	/// Whether the user opted in to crash reporting.
	pub user_consent: bool,
	/// Treat the network as metered, which blocks uploads.
	pub metered_network: bool,
}

impl Default for PermissionConfig {
	fn default() -> Self {
		PermissionConfigLayer::default().finalize()
	}
}

/// Permission configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PermissionConfigLayer {
	#[serde(default)]
	pub upload_disabled: Option<bool>,
	#[serde(default)]
	pub enabled_for_tests: Option<bool>,
	#[serde(default)]
	pub in_sample: Option<bool>,
	#[serde(default)]
	pub user_consent: Option<bool>,
	#[serde(default)]
	pub metered_network: Option<bool>,
}

impl PermissionConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.upload_disabled.is_some() {
			self.upload_disabled = other.upload_disabled;
		}
		if other.enabled_for_tests.is_some() {
			self.enabled_for_tests = other.enabled_for_tests;
		}
		if other.in_sample.is_some() {
			self.in_sample = other.in_sample;
		}
		if other.user_consent.is_some() {
			self.user_consent = other.user_consent;
		}
		if other.metered_network.is_some() {
			self.metered_network = other.metered_network;
		}
	}

	pub fn finalize(self) -> PermissionConfig {
		PermissionConfig {
			upload_disabled: self.upload_disabled.unwrap_or(false),
			enabled_for_tests: self.enabled_for_tests.unwrap_or(false),
			in_sample: self.in_sample.unwrap_or(true),
			user_consent: self.user_consent.unwrap_or(false),
			metered_network: self.metered_network.unwrap_or(false),
		}
	}
}
