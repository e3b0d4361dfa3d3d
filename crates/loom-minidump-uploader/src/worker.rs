// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The upload worker: drains the queue on a dedicated thread.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::permission::PermissionGate;
use crate::queue::{has_pending_uploads, CrashFile, FileQueue};
use crate::transport::{UploadOutcome, UploadTransport};

/// Maximum number of upload attempts per minidump.
pub const MAX_UPLOAD_ATTEMPTS: u32 = 3;

/// Settings shared by every job of an uploader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploaderOptions {
	/// Attempt ceiling. Files at the ceiling are no longer listed.
	pub max_attempts: u32,
	/// Purge stale crash files after a job that was not cancelled.
	pub clean_out_minidumps: bool,
}

impl Default for UploaderOptions {
	fn default() -> Self {
		Self {
			max_attempts: MAX_UPLOAD_ATTEMPTS,
			clean_out_minidumps: true,
		}
	}
}

/// How a worker run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
	/// Drained the queue. `reschedule` is true if eligible files remain.
	Finished { reschedule: bool },
	/// Stopped after an attempt because the job was cancelled.
	Cancelled,
}

/// Counters for one worker run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
	pub uploaded: usize,
	pub failed: usize,
	pub skipped: usize,
	pub exit: WorkerExit,
}

enum Attempt {
	Uploaded,
	Failed,
	Skipped,
}

/// Uploads every eligible minidump once, in queue order.
pub struct UploadWorker {
	queue: Arc<dyn FileQueue>,
	transport: Arc<dyn UploadTransport>,
	gate: PermissionGate,
	cancel: CancellationToken,
	options: UploaderOptions,
}

impl UploadWorker {
	pub fn new(
		queue: Arc<dyn FileQueue>,
		transport: Arc<dyn UploadTransport>,
		gate: PermissionGate,
		cancel: CancellationToken,
		options: UploaderOptions,
	) -> Self {
		Self {
			queue,
			transport,
			gate,
			cancel,
			options,
		}
	}

	/// Runs the job to completion or cancellation. Blocks on network I/O.
	pub fn run(&self) -> WorkerReport {
		let files = match self.queue.list_eligible(self.options.max_attempts) {
			Ok(files) => files,
			Err(e) => {
				warn!(error = %e, "Failed to list minidumps, nothing to upload");
				Vec::new()
			}
		};
		info!(count = files.len(), "Uploading minidumps");

		let mut report = WorkerReport {
			uploaded: 0,
			failed: 0,
			skipped: 0,
			exit: WorkerExit::Cancelled,
		};

		for file in files {
			let attempt = self.attempt(&file);
			match attempt {
				Attempt::Uploaded => report.uploaded += 1,
				Attempt::Failed => report.failed += 1,
				Attempt::Skipped => report.skipped += 1,
			}

			// Checked after the attempt so every job uploads at least one file,
			// even when each new trigger cancels the previous job. Cleanup and
			// the reschedule decision belong to whoever cancelled.
			if self.cancel.is_cancelled() {
				info!(
					uploaded = report.uploaded,
					failed = report.failed,
					skipped = report.skipped,
					"Upload job cancelled"
				);
				return report;
			}

			if let Attempt::Failed = attempt {
				if let Err(e) = self.queue.increment_attempt(&file) {
					warn!(
						path = %file.path.display(),
						error = %e,
						"Failed to increment attempt number"
					);
				}
			}
		}

		if self.options.clean_out_minidumps {
			if let Err(e) = self.queue.purge_stale() {
				warn!(error = %e, "Failed to clean out stale minidumps");
			}
		}

		let reschedule = has_pending_uploads(self.queue.as_ref(), self.options.max_attempts);
		report.exit = WorkerExit::Finished { reschedule };
		info!(
			uploaded = report.uploaded,
			failed = report.failed,
			skipped = report.skipped,
			reschedule,
			"Upload job finished"
		);
		report
	}

	fn attempt(&self, file: &CrashFile) -> Attempt {
		let decision = self.gate.check();
		if !decision.is_permitted() {
			debug!(file = %file.file_name(), reason = %decision, "Minidump upload not permitted");
			return Attempt::Skipped;
		}

		match self.transport.attempt_upload(file) {
			Ok(UploadOutcome::Success) => {
				if let Err(e) = self.queue.mark_uploaded(file) {
					warn!(path = %file.path.display(), error = %e, "Failed to mark minidump as uploaded");
				}
				Attempt::Uploaded
			}
			Ok(UploadOutcome::Failure) => Attempt::Failed,
			Err(e) => {
				warn!(file = %file.file_name(), error = %e, "Minidump upload attempt failed");
				Attempt::Failed
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::{Result, UploaderError};
	use crate::permission::{NetworkState, PermissionPolicy, StaticNetwork};
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Mutex;

	struct MemFile {
		name: String,
		attempts: u32,
		uploaded: bool,
	}

	#[derive(Default)]
	struct MemoryQueue {
		files: Mutex<Vec<MemFile>>,
		fail_increments: bool,
		purges: AtomicUsize,
	}

	impl MemoryQueue {
		fn with(files: &[(&str, u32)]) -> Self {
			Self {
				files: Mutex::new(
					files
						.iter()
						.map(|(name, attempts)| MemFile {
							name: name.to_string(),
							attempts: *attempts,
							uploaded: false,
						})
						.collect(),
				),
				..Default::default()
			}
		}

		fn attempts(&self, name: &str) -> u32 {
			let files = self.files.lock().unwrap();
			files.iter().find(|f| f.name == name).unwrap().attempts
		}

		fn uploaded(&self, name: &str) -> bool {
			let files = self.files.lock().unwrap();
			files.iter().find(|f| f.name == name).unwrap().uploaded
		}
	}

	impl FileQueue for MemoryQueue {
		fn list_eligible(&self, max_attempts: u32) -> Result<Vec<CrashFile>> {
			let files = self.files.lock().unwrap();
			Ok(files
				.iter()
				.filter(|f| !f.uploaded && f.attempts < max_attempts)
				.map(|f| CrashFile::new(&f.name, f.attempts))
				.collect())
		}

		fn increment_attempt(&self, file: &CrashFile) -> Result<CrashFile> {
			if self.fail_increments {
				return Err(UploaderError::FileVanished(file.path.clone()));
			}
			let mut files = self.files.lock().unwrap();
			let entry = files
				.iter_mut()
				.find(|f| f.name == file.file_name())
				.ok_or_else(|| UploaderError::FileVanished(file.path.clone()))?;
			entry.attempts += 1;
			Ok(CrashFile::new(&entry.name, entry.attempts))
		}

		fn mark_uploaded(&self, file: &CrashFile) -> Result<()> {
			let mut files = self.files.lock().unwrap();
			if let Some(entry) = files.iter_mut().find(|f| f.name == file.file_name()) {
				entry.uploaded = true;
			}
			Ok(())
		}

		fn purge_stale(&self) -> Result<usize> {
			self.purges.fetch_add(1, Ordering::SeqCst);
			Ok(0)
		}
	}

	type Respond = Box<dyn Fn(&CrashFile) -> Result<UploadOutcome> + Send + Sync>;

	struct ScriptedTransport {
		calls: Mutex<Vec<String>>,
		respond: Respond,
	}

	impl ScriptedTransport {
		fn new(respond: impl Fn(&CrashFile) -> Result<UploadOutcome> + Send + Sync + 'static) -> Arc<Self> {
			Arc::new(Self {
				calls: Mutex::new(Vec::new()),
				respond: Box::new(respond),
			})
		}

		fn succeeding() -> Arc<Self> {
			Self::new(|_| Ok(UploadOutcome::Success))
		}

		fn calls(&self) -> Vec<String> {
			self.calls.lock().unwrap().clone()
		}
	}

	impl UploadTransport for ScriptedTransport {
		fn attempt_upload(&self, file: &CrashFile) -> Result<UploadOutcome> {
			self.calls.lock().unwrap().push(file.file_name());
			(self.respond)(file)
		}
	}

	fn gate(permitted_by_user: bool) -> PermissionGate {
		PermissionGate::new(
			PermissionPolicy::default(),
			Arc::new(StaticNetwork(NetworkState::UNMETERED)),
			permitted_by_user,
		)
	}

	fn worker(
		queue: &Arc<MemoryQueue>,
		transport: &Arc<ScriptedTransport>,
		permitted_by_user: bool,
		cancel: &CancellationToken,
	) -> UploadWorker {
		UploadWorker::new(
			queue.clone(),
			transport.clone(),
			gate(permitted_by_user),
			cancel.clone(),
			UploaderOptions::default(),
		)
	}

	#[test]
	fn test_all_uploads_succeed() {
		let queue = Arc::new(MemoryQueue::with(&[("a.dmp", 0), ("b.dmp.try2", 2)]));
		let transport = ScriptedTransport::succeeding();

		let report = worker(&queue, &transport, true, &CancellationToken::new()).run();

		assert_eq!(report.uploaded, 2);
		assert_eq!(report.exit, WorkerExit::Finished { reschedule: false });
		assert_eq!(transport.calls(), vec!["a.dmp", "b.dmp.try2"]);
		assert!(queue.uploaded("a.dmp"));
		assert!(queue.uploaded("b.dmp.try2"));
		assert_eq!(queue.purges.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn test_failure_at_last_attempt_caps_file() {
		let queue = Arc::new(MemoryQueue::with(&[("a.dmp.try2", 2)]));
		let transport = ScriptedTransport::new(|_| Ok(UploadOutcome::Failure));

		let report = worker(&queue, &transport, true, &CancellationToken::new()).run();

		assert_eq!(report.failed, 1);
		assert_eq!(queue.attempts("a.dmp.try2"), 3);
		assert!(!queue.uploaded("a.dmp.try2"));
		assert_eq!(report.exit, WorkerExit::Finished { reschedule: false });
	}

	#[test]
	fn test_failure_below_ceiling_reschedules() {
		let queue = Arc::new(MemoryQueue::with(&[("a.dmp", 0)]));
		let transport = ScriptedTransport::new(|_| Ok(UploadOutcome::Failure));

		let report = worker(&queue, &transport, true, &CancellationToken::new()).run();

		assert_eq!(queue.attempts("a.dmp"), 1);
		assert_eq!(report.exit, WorkerExit::Finished { reschedule: true });
	}

	#[test]
	fn test_transport_error_does_not_stop_the_job() {
		let queue = Arc::new(MemoryQueue::with(&[("a.dmp", 0), ("b.dmp", 0)]));
		let transport = ScriptedTransport::new(|file| {
			if file.file_name() == "a.dmp" {
				Err(UploaderError::FileVanished(file.path.clone()))
			} else {
				Ok(UploadOutcome::Success)
			}
		});

		let report = worker(&queue, &transport, true, &CancellationToken::new()).run();

		assert_eq!(transport.calls(), vec!["a.dmp", "b.dmp"]);
		assert_eq!(report.failed, 1);
		assert_eq!(report.uploaded, 1);
		assert_eq!(queue.attempts("a.dmp"), 1);
	}

	#[test]
	fn test_increment_failure_is_not_fatal() {
		let queue = Arc::new(MemoryQueue {
			fail_increments: true,
			..MemoryQueue::with(&[("a.dmp", 0), ("b.dmp", 0)])
		});
		let transport = ScriptedTransport::new(|_| Ok(UploadOutcome::Failure));

		let report = worker(&queue, &transport, true, &CancellationToken::new()).run();

		assert_eq!(transport.calls().len(), 2);
		assert_eq!(report.failed, 2);
		assert_eq!(report.exit, WorkerExit::Finished { reschedule: true });
	}

	#[test]
	fn test_cancel_stops_after_in_flight_attempt() {
		let queue = Arc::new(MemoryQueue::with(&[("a.dmp", 0), ("b.dmp", 0), ("c.dmp", 0)]));
		let cancel = CancellationToken::new();
		let control = cancel.clone();
		let transport = ScriptedTransport::new(move |_| {
			control.cancel();
			Ok(UploadOutcome::Failure)
		});

		let report = worker(&queue, &transport, true, &cancel).run();

		assert_eq!(report.exit, WorkerExit::Cancelled);
		assert_eq!(transport.calls(), vec!["a.dmp"]);
		// No bookkeeping or cleanup once cancelled.
		assert_eq!(queue.attempts("a.dmp"), 0);
		assert_eq!(queue.purges.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn test_cancel_before_run_still_attempts_first_file() {
		let queue = Arc::new(MemoryQueue::with(&[("a.dmp", 0), ("b.dmp", 0)]));
		let transport = ScriptedTransport::succeeding();
		let cancel = CancellationToken::new();
		cancel.cancel();

		let report = worker(&queue, &transport, true, &cancel).run();

		assert_eq!(report.exit, WorkerExit::Cancelled);
		assert_eq!(transport.calls(), vec!["a.dmp"]);
		assert!(queue.uploaded("a.dmp"));
		assert!(!queue.uploaded("b.dmp"));
	}

	#[test]
	fn test_consent_denied_skips_transport() {
		let queue = Arc::new(MemoryQueue::with(&[("a.dmp", 0), ("b.dmp", 1)]));
		let transport = ScriptedTransport::succeeding();

		let report = worker(&queue, &transport, false, &CancellationToken::new()).run();

		assert!(transport.calls().is_empty());
		assert_eq!(report.skipped, 2);
		assert_eq!(queue.attempts("a.dmp"), 0);
		assert_eq!(queue.attempts("b.dmp"), 1);
		assert_eq!(report.exit, WorkerExit::Finished { reschedule: true });
	}

	#[test]
	fn test_empty_queue() {
		let queue = Arc::new(MemoryQueue::default());
		let transport = ScriptedTransport::succeeding();

		let report = worker(&queue, &transport, true, &CancellationToken::new()).run();

		assert_eq!(report.exit, WorkerExit::Finished { reschedule: false });
		assert!(transport.calls().is_empty());
	}

	#[test]
	fn test_cleanup_disabled() {
		let queue = Arc::new(MemoryQueue::with(&[("a.dmp", 0)]));
		let transport = ScriptedTransport::succeeding();
		let worker = UploadWorker::new(
			queue.clone(),
			transport.clone(),
			gate(true),
			CancellationToken::new(),
			UploaderOptions {
				clean_out_minidumps: false,
				..UploaderOptions::default()
			},
		);

		worker.run();

		assert_eq!(queue.purges.load(Ordering::SeqCst), 0);
	}
}
