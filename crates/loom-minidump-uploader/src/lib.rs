// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background upload of crash minidumps.
//!
//! A [`MinidumpUploader`] runs one upload job at a time. A job resolves the
//! user's consent asynchronously, then drains the [`FileQueue`] on a dedicated
//! worker thread through an [`UploadTransport`], and finally reports whether
//! eligible minidumps remain so the caller can schedule another run.
//!
//! # Overview
//!
//! - [`permission`]: the permission gate (consent, sampling, network, overrides)
//! - [`queue`] / [`crash_dir`]: the queue trait and its filesystem implementation
//! - [`transport`]: the transport trait and its HTTP implementation
//! - [`worker`]: the per-job upload loop
//! - [`uploader`]: single-flight job orchestration and cancellation

pub mod cancel;
pub mod crash_dir;
pub mod error;
pub mod permission;
pub mod queue;
pub mod transport;
pub mod uploader;
pub mod worker;

pub use cancel::CancellationToken;
pub use crash_dir::{CrashDirectory, CrashFileKind, RetentionPolicy, UPLOAD_LOG_FILE};
pub use error::{Result, UploaderError};
pub use permission::{
	evaluate, ConsentSource, NetworkMonitor, NetworkState, PermissionDecision, PermissionGate,
	PermissionInputs, PermissionPolicy, ResolverNetwork, StaticConsent, StaticNetwork,
};
pub use queue::{has_pending_uploads, CrashFile, FileQueue};
pub use transport::{HttpTransport, HttpTransportConfig, UploadOutcome, UploadTransport};
pub use uploader::{MinidumpUploader, MinidumpUploaderBuilder, WORKER_THREAD_NAME};
pub use worker::{UploadWorker, UploaderOptions, WorkerExit, WorkerReport, MAX_UPLOAD_ATTEMPTS};
