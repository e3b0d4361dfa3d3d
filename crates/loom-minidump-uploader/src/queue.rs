// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The queue of minidumps awaiting upload.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;

/// A pending minidump and the number of upload attempts it has used.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CrashFile {
	pub path: PathBuf,
	pub attempts: u32,
}

impl CrashFile {
	pub fn new(path: impl Into<PathBuf>, attempts: u32) -> Self {
		Self {
			path: path.into(),
			attempts,
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// File name for logs and upload headers.
	pub fn file_name(&self) -> String {
		self
			.path
			.file_name()
			.map(|n| n.to_string_lossy().into_owned())
			.unwrap_or_default()
	}
}

/// Storage of pending minidumps and their attempt counters.
///
/// Implementations are shared between the control thread (which checks for
/// remaining work on cancellation) and the upload worker.
pub trait FileQueue: Send + Sync {
	/// Pending minidumps with fewer than `max_attempts` attempts, in upload order.
	fn list_eligible(&self, max_attempts: u32) -> Result<Vec<CrashFile>>;

	/// Records a failed attempt and returns the updated reference.
	fn increment_attempt(&self, file: &CrashFile) -> Result<CrashFile>;

	/// Records a successful upload so the file is no longer listed.
	fn mark_uploaded(&self, file: &CrashFile) -> Result<()>;

	/// Deletes old and surplus crash files. Returns how many were removed.
	fn purge_stale(&self) -> Result<usize>;
}

/// Whether any minidump is still eligible for upload.
///
/// A queue that cannot be listed is treated as empty, since rescheduling
/// would not make it readable.
pub fn has_pending_uploads(queue: &dyn FileQueue, max_attempts: u32) -> bool {
	match queue.list_eligible(max_attempts) {
		Ok(files) => !files.is_empty(),
		Err(e) => {
			warn!(error = %e, "Failed to list pending minidumps");
			false
		}
	}
}
