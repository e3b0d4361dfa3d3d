// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the minidump uploader.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for uploader operations.
pub type Result<T> = std::result::Result<T, UploaderError>;

/// Errors that can occur while managing or uploading minidumps.
#[derive(Debug, Error)]
pub enum UploaderError {
	/// Filesystem operation on a crash file failed.
	#[error("I/O error on {path}: {source}")]
	Io {
		/// Path the operation was applied to.
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// The crash file disappeared between listing and bookkeeping.
	#[error("crash file vanished: {0}")]
	FileVanished(PathBuf),

	/// The rename target already exists.
	#[error("rename target already exists: {0}")]
	RenameCollision(PathBuf),

	/// The path does not follow the minidump naming scheme.
	#[error("not a pending minidump: {0}")]
	NotAMinidump(PathBuf),

	/// HTTP request failed before a response was received.
	#[error("HTTP request failed: {0}")]
	RequestFailed(#[from] reqwest::Error),

	/// Upload URL is not an http(s) URL.
	#[error("invalid upload URL: {0}")]
	InvalidUploadUrl(String),

	/// Builder was not given a file queue.
	#[error("a file queue is required")]
	MissingQueue,

	/// Builder was not given an upload transport.
	#[error("an upload transport is required")]
	MissingTransport,

	/// Builder was not given a consent source.
	#[error("a consent source is required")]
	MissingConsentSource,

	/// Builder was not given a network monitor.
	#[error("a network monitor is required")]
	MissingNetworkMonitor,
}

impl UploaderError {
	pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Io {
			path: path.into(),
			source,
		}
	}
}
