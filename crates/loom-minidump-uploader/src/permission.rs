// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Upload permission gate.
//!
//! The gate combines the static policy from configuration, the user consent
//! resolved once when a job starts, and the network state sampled right before
//! each upload attempt.

use std::fmt;
use std::net::ToSocketAddrs;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Result, UploaderError};

/// Connectivity of the active network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkState {
	pub connected: bool,
	pub metered: bool,
}

impl NetworkState {
	/// Connected, unmetered network.
	pub const UNMETERED: Self = Self {
		connected: true,
		metered: false,
	};

	/// Connected, metered network.
	pub const METERED: Self = Self {
		connected: true,
		metered: true,
	};

	/// No active network.
	pub const OFFLINE: Self = Self {
		connected: false,
		metered: false,
	};
}

/// Reports the current network state. Sampled once per upload attempt.
pub trait NetworkMonitor: Send + Sync {
	fn current(&self) -> NetworkState;
}

/// A network monitor that always reports the same state.
#[derive(Debug, Clone, Copy)]
pub struct StaticNetwork(pub NetworkState);

impl NetworkMonitor for StaticNetwork {
	fn current(&self) -> NetworkState {
		self.0
	}
}

/// Treats the network as connected when the upload host resolves.
///
/// Whether the link is metered cannot be detected portably, so it comes from
/// configuration.
#[derive(Debug, Clone)]
pub struct ResolverNetwork {
	host: String,
	port: u16,
	metered: bool,
}

impl ResolverNetwork {
	pub fn new(host: impl Into<String>, port: u16, metered: bool) -> Self {
		Self {
			host: host.into(),
			port,
			metered,
		}
	}

	/// Builds a monitor for the host of an upload URL.
	pub fn for_url(url: &str, metered: bool) -> Result<Self> {
		let parsed =
			reqwest::Url::parse(url).map_err(|_| UploaderError::InvalidUploadUrl(url.to_string()))?;
		let host = parsed
			.host_str()
			.ok_or_else(|| UploaderError::InvalidUploadUrl(url.to_string()))?;
		let port = parsed.port_or_known_default().unwrap_or(443);
		Ok(Self::new(host, port, metered))
	}
}

impl NetworkMonitor for ResolverNetwork {
	fn current(&self) -> NetworkState {
		let connected = (self.host.as_str(), self.port)
			.to_socket_addrs()
			.map(|mut addrs| addrs.next().is_some())
			.unwrap_or(false);
		NetworkState {
			connected,
			metered: self.metered,
		}
	}
}

/// Source of the user's crash reporting consent.
///
/// Queried once per job, before the worker starts.
#[async_trait]
pub trait ConsentSource: Send + Sync {
	async fn query_consent(&self) -> bool;
}

/// Consent fixed at construction time, e.g. from configuration.
#[derive(Debug, Clone, Copy)]
pub struct StaticConsent(pub bool);

#[async_trait]
impl ConsentSource for StaticConsent {
	async fn query_consent(&self) -> bool {
		self.0
	}
}

/// Static permission inputs, typically loaded from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionPolicy {
	/// Force-disable switch. Denies every upload.
	pub disabled_by_command_line: bool,
	/// Bypasses the user consent check in test environments.
	pub enabled_for_tests: bool,
	/// Whether this client is in the crash reporting sample.
	pub in_sample: bool,
}

impl Default for PermissionPolicy {
	fn default() -> Self {
		Self {
			disabled_by_command_line: false,
			enabled_for_tests: false,
			// A minidump only exists if the client was sampled when it crashed.
			in_sample: true,
		}
	}
}

/// Every input the gate decides on, captured at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionInputs {
	pub in_sample: bool,
	pub network: NetworkState,
	pub disabled_by_command_line: bool,
	pub permitted_by_user: bool,
	pub enabled_for_tests: bool,
}

/// Outcome of a permission check, with the reason for a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
	Permitted,
	ForceDisabled,
	NotInSample,
	NotPermittedByUser,
	NetworkUnavailable,
	NetworkMetered,
}

impl PermissionDecision {
	pub fn is_permitted(self) -> bool {
		matches!(self, Self::Permitted)
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Permitted => "permitted",
			Self::ForceDisabled => "force_disabled",
			Self::NotInSample => "not_in_sample",
			Self::NotPermittedByUser => "not_permitted_by_user",
			Self::NetworkUnavailable => "network_unavailable",
			Self::NetworkMetered => "network_metered",
		}
	}
}

impl fmt::Display for PermissionDecision {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Decides whether an upload is permitted right now.
///
/// The force-disable input wins over everything else, including the test
/// override.
pub fn evaluate(inputs: &PermissionInputs) -> PermissionDecision {
	if inputs.disabled_by_command_line {
		return PermissionDecision::ForceDisabled;
	}
	if !inputs.in_sample {
		return PermissionDecision::NotInSample;
	}
	if !inputs.enabled_for_tests && !inputs.permitted_by_user {
		return PermissionDecision::NotPermittedByUser;
	}
	if !inputs.network.connected {
		return PermissionDecision::NetworkUnavailable;
	}
	if inputs.network.metered {
		return PermissionDecision::NetworkMetered;
	}
	PermissionDecision::Permitted
}

/// Permission gate for a single job.
///
/// Holds the consent snapshot taken at job start; the network is sampled on
/// every [`check`](Self::check).
#[derive(Clone)]
pub struct PermissionGate {
	policy: PermissionPolicy,
	network: Arc<dyn NetworkMonitor>,
	permitted_by_user: bool,
}

impl PermissionGate {
	pub fn new(
		policy: PermissionPolicy,
		network: Arc<dyn NetworkMonitor>,
		permitted_by_user: bool,
	) -> Self {
		Self {
			policy,
			network,
			permitted_by_user,
		}
	}

	pub fn inputs(&self) -> PermissionInputs {
		PermissionInputs {
			in_sample: self.policy.in_sample,
			network: self.network.current(),
			disabled_by_command_line: self.policy.disabled_by_command_line,
			permitted_by_user: self.permitted_by_user,
			enabled_for_tests: self.policy.enabled_for_tests,
		}
	}

	pub fn check(&self) -> PermissionDecision {
		let inputs = self.inputs();
		let decision = evaluate(&inputs);
		debug!(
			decision = %decision,
			connected = inputs.network.connected,
			metered = inputs.network.metered,
			"Evaluated upload permission"
		);
		decision
	}
}

impl fmt::Debug for PermissionGate {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PermissionGate")
			.field("policy", &self.policy)
			.field("permitted_by_user", &self.permitted_by_user)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn allowed() -> PermissionInputs {
		PermissionInputs {
			in_sample: true,
			network: NetworkState::UNMETERED,
			disabled_by_command_line: false,
			permitted_by_user: true,
			enabled_for_tests: false,
		}
	}

	fn network_state() -> impl Strategy<Value = NetworkState> {
		(any::<bool>(), any::<bool>()).prop_map(|(connected, metered)| NetworkState { connected, metered })
	}

	fn inputs() -> impl Strategy<Value = PermissionInputs> {
		(any::<bool>(), network_state(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
			|(in_sample, network, disabled_by_command_line, permitted_by_user, enabled_for_tests)| {
				PermissionInputs {
					in_sample,
					network,
					disabled_by_command_line,
					permitted_by_user,
					enabled_for_tests,
				}
			},
		)
	}

	#[test]
	fn test_all_inputs_favourable_permits() {
		assert_eq!(evaluate(&allowed()), PermissionDecision::Permitted);
	}

	#[test]
	fn test_user_opt_out_denies() {
		let inputs = PermissionInputs {
			permitted_by_user: false,
			..allowed()
		};
		assert_eq!(evaluate(&inputs), PermissionDecision::NotPermittedByUser);
	}

	#[test]
	fn test_override_bypasses_user_opt_out() {
		let inputs = PermissionInputs {
			permitted_by_user: false,
			enabled_for_tests: true,
			..allowed()
		};
		assert_eq!(evaluate(&inputs), PermissionDecision::Permitted);
	}

	#[test]
	fn test_override_does_not_bypass_force_disable() {
		let inputs = PermissionInputs {
			enabled_for_tests: true,
			disabled_by_command_line: true,
			..allowed()
		};
		assert_eq!(evaluate(&inputs), PermissionDecision::ForceDisabled);
	}

	#[test]
	fn test_network_states() {
		let offline = PermissionInputs {
			network: NetworkState::OFFLINE,
			..allowed()
		};
		assert_eq!(evaluate(&offline), PermissionDecision::NetworkUnavailable);

		let metered = PermissionInputs {
			network: NetworkState::METERED,
			..allowed()
		};
		assert_eq!(evaluate(&metered), PermissionDecision::NetworkMetered);
	}

	#[test]
	fn test_not_in_sample_denies() {
		let inputs = PermissionInputs {
			in_sample: false,
			..allowed()
		};
		assert_eq!(evaluate(&inputs), PermissionDecision::NotInSample);
	}

	#[test]
	fn test_default_policy_assumes_sampled() {
		let policy = PermissionPolicy::default();
		assert!(policy.in_sample);
		assert!(!policy.disabled_by_command_line);
		assert!(!policy.enabled_for_tests);
	}

	#[test]
	fn test_gate_samples_network_each_check() {
		use std::sync::atomic::{AtomicBool, Ordering};

		struct Flapping(AtomicBool);
		impl NetworkMonitor for Flapping {
			fn current(&self) -> NetworkState {
				let up = !self.0.fetch_xor(true, Ordering::SeqCst);
				if up {
					NetworkState::UNMETERED
				} else {
					NetworkState::OFFLINE
				}
			}
		}

		let gate = PermissionGate::new(
			PermissionPolicy::default(),
			Arc::new(Flapping(AtomicBool::new(false))),
			true,
		);
		assert!(gate.check().is_permitted());
		assert_eq!(gate.check(), PermissionDecision::NetworkUnavailable);
		assert!(gate.check().is_permitted());
	}

	#[test]
	fn test_resolver_network_from_url() {
		let monitor = ResolverNetwork::for_url("https://crash.example.com/upload", true).unwrap();
		assert_eq!(monitor.host, "crash.example.com");
		assert_eq!(monitor.port, 443);
		assert!(monitor.metered);

		assert!(matches!(
			ResolverNetwork::for_url("not a url", false),
			Err(UploaderError::InvalidUploadUrl(_))
		));
	}

	#[test]
	fn test_resolver_network_localhost_is_connected() {
		let monitor = ResolverNetwork::new("127.0.0.1", 80, false);
		assert_eq!(monitor.current(), NetworkState::UNMETERED);
	}

	#[tokio::test]
	async fn test_static_consent() {
		assert!(StaticConsent(true).query_consent().await);
		assert!(!StaticConsent(false).query_consent().await);
	}

	proptest! {
		#[test]
		fn force_disable_denies_everything(inputs in inputs()) {
			let inputs = PermissionInputs { disabled_by_command_line: true, ..inputs };
			prop_assert_eq!(evaluate(&inputs), PermissionDecision::ForceDisabled);
		}

		#[test]
		fn permitted_implies_usable_network(inputs in inputs()) {
			if evaluate(&inputs).is_permitted() {
				prop_assert!(inputs.network.connected);
				prop_assert!(!inputs.network.metered);
				prop_assert!(inputs.permitted_by_user || inputs.enabled_for_tests);
			}
		}
	}
}
