// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use loom_minidump_config::{
	MinidumpConfigLayer, PermissionConfigLayer, StorageConfigLayer, UploadConfigLayer,
};

/// Loom minidump uploader - sends queued crash reports to the collector
#[derive(Parser, Debug)]
#[command(name = "loom-minidump", version)]
pub struct Args {
	/// Config file (defaults to $XDG_CONFIG_HOME/loom/minidump.toml)
	#[arg(long, global = true)]
	pub config: Option<PathBuf>,

	/// Directory holding queued minidumps
	#[arg(long, global = true)]
	pub crash_dir: Option<PathBuf>,

	/// Collector endpoint
	#[arg(long, global = true)]
	pub upload_url: Option<String>,

	/// Never upload, whatever else is configured
	#[arg(long, global = true)]
	pub disable_upload: bool,

	/// Upload without user consent (sampling and network still apply)
	#[arg(long, global = true)]
	pub enable_upload_for_tests: bool,

	#[command(subcommand)]
	pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
	/// Run one upload job (default)
	Upload,
	/// List minidumps still eligible for upload
	List,
	/// Delete stale crash files
	Purge,
}

impl Args {
	pub fn subcommand(&self) -> Command {
		self.command.unwrap_or(Command::Upload)
	}

	/// Flags as the highest-precedence configuration layer.
	///
	/// Boolean flags only ever switch behavior on; leaving one off keeps the
	/// configured value.
	pub fn overrides(&self) -> MinidumpConfigLayer {
		MinidumpConfigLayer {
			upload: Some(UploadConfigLayer {
				url: self.upload_url.clone(),
				..Default::default()
			}),
			storage: Some(StorageConfigLayer {
				crash_dir: self.crash_dir.clone(),
				..Default::default()
			}),
			permission: Some(PermissionConfigLayer {
				upload_disabled: self.disable_upload.then_some(true),
				enabled_for_tests: self.enable_upload_for_tests.then_some(true),
				..Default::default()
			}),
			logging: None,
		}
	}
}
