// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Filesystem-backed minidump queue.
//!
//! The attempt counter lives in the file name:
//!
//! ```text
//! renderer-1234.dmp          pending, no attempts yet
//! renderer-1234.dmp.try2     pending, two failed attempts
//! renderer-1234.up           uploaded
//! uploads.log                upload log, never purged
//! ```
//!
//! Anything else in the directory is ignored.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, error, info, warn};

use crate::error::{Result, UploaderError};
use crate::queue::{CrashFile, FileQueue};

/// Name of the upload log kept next to the minidumps.
pub const UPLOAD_LOG_FILE: &str = "uploads.log";

const PENDING_SUFFIX: &str = ".dmp";
const ATTEMPT_SUFFIX: &str = ".dmp.try";
const UPLOADED_SUFFIX: &str = ".up";

/// State encoded in a crash file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashFileKind {
	Pending { attempts: u32 },
	Uploaded,
}

/// Splits a crash file name into its stem and state.
pub fn parse_file_name(name: &str) -> Option<(&str, CrashFileKind)> {
	if let Some(stem) = name.strip_suffix(UPLOADED_SUFFIX) {
		return non_empty(stem).map(|s| (s, CrashFileKind::Uploaded));
	}
	if let Some(stem) = name.strip_suffix(PENDING_SUFFIX) {
		return non_empty(stem).map(|s| (s, CrashFileKind::Pending { attempts: 0 }));
	}
	let (stem, attempts) = name.rsplit_once(ATTEMPT_SUFFIX)?;
	if attempts.is_empty() || !attempts.bytes().all(|b| b.is_ascii_digit()) {
		return None;
	}
	let attempts = attempts.parse().ok()?;
	non_empty(stem).map(|s| (s, CrashFileKind::Pending { attempts }))
}

/// File name of a pending minidump with the given attempt count.
pub fn pending_file_name(stem: &str, attempts: u32) -> String {
	if attempts == 0 {
		format!("{stem}{PENDING_SUFFIX}")
	} else {
		format!("{stem}{ATTEMPT_SUFFIX}{attempts}")
	}
}

fn non_empty(stem: &str) -> Option<&str> {
	(!stem.is_empty()).then_some(stem)
}

/// Limits applied by [`CrashDirectory::purge_stale`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
	/// Crash files older than this are deleted.
	pub max_age: Duration,
	/// At most this many crash files are kept, newest first.
	pub max_files: usize,
}

impl Default for RetentionPolicy {
	fn default() -> Self {
		Self {
			max_age: Duration::from_secs(30 * 24 * 60 * 60),
			max_files: 10,
		}
	}
}

#[derive(Debug)]
struct Entry {
	path: PathBuf,
	name: String,
	kind: CrashFileKind,
	modified: SystemTime,
}

/// A directory of minidumps awaiting upload.
#[derive(Debug, Clone)]
pub struct CrashDirectory {
	dir: PathBuf,
	retention: RetentionPolicy,
}

impl CrashDirectory {
	/// Opens the directory, creating it if needed.
	///
	/// A directory that cannot be created is logged; every later operation on
	/// it reports the underlying I/O error.
	pub fn open(dir: impl Into<PathBuf>) -> Self {
		let dir = dir.into();
		if let Err(e) = fs::create_dir_all(&dir) {
			error!(dir = %dir.display(), error = %e, "Crash directory does not exist and could not be created");
		}
		Self {
			dir,
			retention: RetentionPolicy::default(),
		}
	}

	pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
		self.retention = retention;
		self
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	pub fn retention(&self) -> RetentionPolicy {
		self.retention
	}

	pub fn upload_log_path(&self) -> PathBuf {
		self.dir.join(UPLOAD_LOG_FILE)
	}

	fn entries(&self) -> Result<Vec<Entry>> {
		let read_dir = fs::read_dir(&self.dir).map_err(|e| UploaderError::io(&self.dir, e))?;

		let mut entries = Vec::new();
		for dir_entry in read_dir {
			let dir_entry = dir_entry.map_err(|e| UploaderError::io(&self.dir, e))?;
			let name = match dir_entry.file_name().into_string() {
				Ok(name) => name,
				Err(_) => continue,
			};
			let Some((_, kind)) = parse_file_name(&name) else {
				continue;
			};
			// Entries can disappear between read_dir and stat.
			let metadata = match dir_entry.metadata() {
				Ok(m) if m.is_file() => m,
				_ => continue,
			};
			entries.push(Entry {
				path: dir_entry.path(),
				name,
				kind,
				modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
			});
		}

		entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
		Ok(entries)
	}

	fn rename(&self, from: &Path, to: PathBuf) -> Result<()> {
		if !from.exists() {
			return Err(UploaderError::FileVanished(from.to_path_buf()));
		}
		if to.exists() {
			return Err(UploaderError::RenameCollision(to));
		}
		fs::rename(from, &to).map_err(|e| match e.kind() {
			io::ErrorKind::NotFound => UploaderError::FileVanished(from.to_path_buf()),
			_ => UploaderError::io(from, e),
		})
	}
}

fn pending_stem(file: &CrashFile) -> Result<(&str, u32)> {
	let name = file
		.path
		.file_name()
		.and_then(|n| n.to_str())
		.ok_or_else(|| UploaderError::NotAMinidump(file.path.clone()))?;
	match parse_file_name(name) {
		Some((stem, CrashFileKind::Pending { attempts })) => Ok((stem, attempts)),
		_ => Err(UploaderError::NotAMinidump(file.path.clone())),
	}
}

fn sibling(file: &CrashFile, name: String) -> PathBuf {
	match file.path.parent() {
		Some(parent) => parent.join(name),
		None => PathBuf::from(name),
	}
}

impl FileQueue for CrashDirectory {
	fn list_eligible(&self, max_attempts: u32) -> Result<Vec<CrashFile>> {
		Ok(self
			.entries()?
			.into_iter()
			.filter_map(|entry| match entry.kind {
				CrashFileKind::Pending { attempts } if attempts < max_attempts => {
					Some(CrashFile::new(entry.path, attempts))
				}
				_ => None,
			})
			.collect())
	}

	fn increment_attempt(&self, file: &CrashFile) -> Result<CrashFile> {
		let (stem, attempts) = pending_stem(file)?;
		let attempts = attempts.saturating_add(1);
		let target = sibling(file, pending_file_name(stem, attempts));
		self.rename(&file.path, target.clone())?;
		debug!(from = %file.path.display(), to = %target.display(), "Incremented attempt number");
		Ok(CrashFile::new(target, attempts))
	}

	fn mark_uploaded(&self, file: &CrashFile) -> Result<()> {
		let (stem, _) = pending_stem(file)?;
		let target = sibling(file, format!("{stem}{UPLOADED_SUFFIX}"));
		self.rename(&file.path, target)
	}

	fn purge_stale(&self) -> Result<usize> {
		let now = SystemTime::now();
		let mut kept = 0usize;
		let mut removed = 0usize;

		// Newest first, so the count limit drops the oldest files.
		for entry in self.entries()? {
			let age = now.duration_since(entry.modified).unwrap_or_default();
			let too_old = age > self.retention.max_age;
			if !too_old && kept < self.retention.max_files {
				kept += 1;
				continue;
			}
			match fs::remove_file(&entry.path) {
				Ok(()) => {
					removed += 1;
					debug!(path = %entry.path.display(), too_old, "Deleted crash file");
				}
				Err(e) if e.kind() == io::ErrorKind::NotFound => {}
				Err(e) => {
					warn!(path = %entry.path.display(), error = %e, "Failed to delete crash file");
				}
			}
		}

		if removed > 0 {
			info!(removed, kept, dir = %self.dir.display(), "Purged stale crash files");
		}
		Ok(removed)
	}
}
