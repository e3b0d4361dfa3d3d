// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use loom_minidump_config::{load_config_with_overrides, LoggingConfig, MinidumpConfig};
use loom_minidump_uploader::{
	CrashDirectory, FileQueue, HttpTransport, HttpTransportConfig, MinidumpUploader,
	PermissionPolicy, ResolverNetwork, RetentionPolicy, StaticConsent,
};
use tokio::sync::oneshot;
use tokio::task::LocalSet;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Args, Command};

/// `EX_TEMPFAIL`: minidumps remain, run again later.
const EXIT_RESCHEDULE: u8 = 75;

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
	let args = Args::parse();
	let config = load_config_with_overrides(args.config.clone(), args.overrides())?;
	init_logging(&config.logging);

	let crash_dir = CrashDirectory::open(&config.storage.crash_dir).with_retention(RetentionPolicy {
		max_age: config.storage.max_report_age(),
		max_files: config.storage.max_reports_to_keep,
	});

	match args.subcommand() {
		Command::Upload => upload(&config, crash_dir),
		Command::List => list(&config, &crash_dir),
		Command::Purge => purge(&crash_dir),
	}
}

fn init_logging(config: &LoggingConfig) {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level)),
		)
		.init();
}

fn upload(
	config: &MinidumpConfig,
	crash_dir: CrashDirectory,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
	let transport = HttpTransport::new(HttpTransportConfig {
		upload_url: config.upload.url.clone(),
		auth_token: config.upload.auth_token.clone(),
		product: config.upload.product.clone(),
		version: config.upload.version.clone(),
		request_timeout: config.upload.timeout(),
		upload_log: Some(crash_dir.upload_log_path()),
	})?;
	let network = ResolverNetwork::for_url(&config.upload.url, config.permission.metered_network)?;

	// Built outside the runtime: the blocking HTTP client must not be dropped
	// from async context.
	let uploader = MinidumpUploader::builder()
		.queue(Arc::new(crash_dir))
		.transport(Arc::new(transport))
		.consent(Arc::new(StaticConsent(config.permission.user_consent)))
		.network(Arc::new(network))
		.policy(PermissionPolicy {
			disabled_by_command_line: config.permission.upload_disabled,
			enabled_for_tests: config.permission.enabled_for_tests,
			in_sample: config.permission.in_sample,
		})
		.max_attempts(config.storage.max_attempts)
		.clean_out_minidumps(config.storage.clean_out_minidumps)
		.build()?;

	let runtime = tokio::runtime::Builder::new_current_thread()
		.enable_all()
		.build()?;
	let local = LocalSet::new();

	let reschedule = runtime.block_on(local.run_until(async {
		let (tx, mut rx) = oneshot::channel();
		uploader.start(move |reschedule| {
			let _ = tx.send(reschedule);
		});

		tokio::select! {
			result = &mut rx => result,
			_ = tokio::signal::ctrl_c() => {
				let reschedule = uploader.cancel();
				warn!(reschedule, "Interrupted, waiting for the current upload to finish");
				rx.await
			}
		}
	}))?;

	drop(uploader);

	if reschedule {
		info!("Minidumps remain, run again later");
		Ok(ExitCode::from(EXIT_RESCHEDULE))
	} else {
		Ok(ExitCode::SUCCESS)
	}
}

fn list(
	config: &MinidumpConfig,
	crash_dir: &CrashDirectory,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
	let files = crash_dir.list_eligible(config.storage.max_attempts)?;
	if files.is_empty() {
		println!("No minidumps waiting in {}", crash_dir.dir().display());
		return Ok(ExitCode::SUCCESS);
	}

	for file in files {
		println!(
			"{:>2}/{}  {}",
			file.attempts,
			config.storage.max_attempts,
			file.path.display()
		);
	}
	Ok(ExitCode::SUCCESS)
}

fn purge(crash_dir: &CrashDirectory) -> Result<ExitCode, Box<dyn std::error::Error>> {
	let removed = crash_dir.purge_stale()?;
	println!("Removed {removed} stale crash file(s)");
	Ok(ExitCode::SUCCESS)
}
