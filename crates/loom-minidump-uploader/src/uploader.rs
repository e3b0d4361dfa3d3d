// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Job orchestration: single-flight upload jobs driven from a control thread.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::oneshot;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::cancel::CancellationToken;
use crate::error::{Result, UploaderError};
use crate::permission::{ConsentSource, NetworkMonitor, PermissionGate, PermissionPolicy};
use crate::queue::{has_pending_uploads, FileQueue};
use crate::transport::UploadTransport;
use crate::worker::{UploadWorker, UploaderOptions, WorkerExit, WorkerReport};

/// Name of the worker thread spawned for each job.
pub const WORKER_THREAD_NAME: &str = "minidump-uploader";

/// Builder for constructing a [`MinidumpUploader`].
pub struct MinidumpUploaderBuilder {
	queue: Option<Arc<dyn FileQueue>>,
	transport: Option<Arc<dyn UploadTransport>>,
	consent: Option<Arc<dyn ConsentSource>>,
	network: Option<Arc<dyn NetworkMonitor>>,
	policy: PermissionPolicy,
	options: UploaderOptions,
}

impl MinidumpUploaderBuilder {
	/// Creates a new builder with default settings.
	pub fn new() -> Self {
		Self {
			queue: None,
			transport: None,
			consent: None,
			network: None,
			policy: PermissionPolicy::default(),
			options: UploaderOptions::default(),
		}
	}

	/// Sets the queue of pending minidumps.
	pub fn queue(mut self, queue: Arc<dyn FileQueue>) -> Self {
		self.queue = Some(queue);
		self
	}

	/// Sets the transport performing the uploads.
	pub fn transport(mut self, transport: Arc<dyn UploadTransport>) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Sets the source of user consent, queried once per job.
	pub fn consent(mut self, consent: Arc<dyn ConsentSource>) -> Self {
		self.consent = Some(consent);
		self
	}

	/// Sets the network monitor, sampled before every upload.
	pub fn network(mut self, network: Arc<dyn NetworkMonitor>) -> Self {
		self.network = Some(network);
		self
	}

	/// Sets the static permission inputs.
	pub fn policy(mut self, policy: PermissionPolicy) -> Self {
		self.policy = policy;
		self
	}

	/// Sets the attempt ceiling per minidump.
	pub fn max_attempts(mut self, max_attempts: u32) -> Self {
		self.options.max_attempts = max_attempts;
		self
	}

	/// Enables or disables purging stale minidumps after each completed job.
	pub fn clean_out_minidumps(mut self, enabled: bool) -> Self {
		self.options.clean_out_minidumps = enabled;
		self
	}

	/// Builds the uploader.
	pub fn build(self) -> Result<MinidumpUploader> {
		let inner = UploaderInner {
			queue: self.queue.ok_or(UploaderError::MissingQueue)?,
			transport: self.transport.ok_or(UploaderError::MissingTransport)?,
			consent: self.consent.ok_or(UploaderError::MissingConsentSource)?,
			network: self.network.ok_or(UploaderError::MissingNetworkMonitor)?,
			policy: self.policy,
			options: self.options,
			cancel: CancellationToken::new(),
			state: RefCell::new(JobState::default()),
		};

		info!(
			max_attempts = inner.options.max_attempts,
			clean_out_minidumps = inner.options.clean_out_minidumps,
			"Minidump uploader initialized"
		);

		Ok(MinidumpUploader {
			inner: Rc::new(inner),
		})
	}
}

impl Default for MinidumpUploaderBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct ActiveJob {
	run_id: Uuid,
}

#[derive(Default)]
struct JobState {
	active: Option<ActiveJob>,
	/// Set only while the worker thread of the active job may be running.
	worker: Option<JoinHandle<()>>,
	/// How the last reaped worker thread terminated.
	last_exit: Option<thread::Result<()>>,
}

struct UploaderInner {
	queue: Arc<dyn FileQueue>,
	transport: Arc<dyn UploadTransport>,
	consent: Arc<dyn ConsentSource>,
	network: Arc<dyn NetworkMonitor>,
	policy: PermissionPolicy,
	options: UploaderOptions,
	cancel: CancellationToken,
	state: RefCell<JobState>,
}

impl UploaderInner {
	fn has_pending_uploads(&self) -> bool {
		has_pending_uploads(self.queue.as_ref(), self.options.max_attempts)
	}

	fn finish(&self) {
		self.state.borrow_mut().active = None;
	}

	/// Joins the job's worker thread once it has reported or unwound.
	fn reap_worker(&self) {
		let handle = self.state.borrow_mut().worker.take();
		if let Some(handle) = handle {
			let exit = handle.join();
			self.state.borrow_mut().last_exit = Some(exit);
		}
	}

	async fn run_job(self: Rc<Self>, run_id: Uuid, on_finished: Box<dyn FnOnce(bool)>) {
		let span = info_span!("minidump_upload", run_id = %run_id);

		let permitted_by_user = self.consent.query_consent().instrument(span.clone()).await;

		// Launch even if cancel() ran while consent was pending: the worker
		// checks for cancellation only after its first attempt.
		let worker = UploadWorker::new(
			Arc::clone(&self.queue),
			Arc::clone(&self.transport),
			PermissionGate::new(self.policy, Arc::clone(&self.network), permitted_by_user),
			self.cancel.clone(),
			self.options,
		);

		let (tx, rx) = oneshot::channel::<WorkerReport>();
		let worker_span = span.clone();
		let spawned = thread::Builder::new()
			.name(WORKER_THREAD_NAME.to_string())
			.spawn(move || {
				let _guard = worker_span.enter();
				let report = worker.run();
				let _ = tx.send(report);
			});

		match spawned {
			Ok(handle) => self.state.borrow_mut().worker = Some(handle),
			Err(e) => {
				error!(parent: &span, error = %e, "Failed to spawn minidump upload worker");
				let reschedule = self.has_pending_uploads();
				self.finish();
				on_finished(reschedule);
				return;
			}
		}

		let received = rx.await;
		self.reap_worker();

		let report = match received {
			Ok(report) => report,
			Err(_) => {
				error!(parent: &span, "Minidump upload worker terminated without reporting");
				self.finish();
				return;
			}
		};

		let reschedule = match report.exit {
			WorkerExit::Finished { reschedule } => reschedule,
			// The worker skipped its own listing; it no longer touches the queue.
			WorkerExit::Cancelled => self.has_pending_uploads(),
		};

		// Cleared first so the callback may start the next job.
		self.finish();
		info!(parent: &span, reschedule, "Minidump upload job completed");
		on_finished(reschedule);
	}
}

/// Runs minidump upload jobs, one at a time.
///
/// The uploader belongs to the control thread that created it: it is not
/// `Send`, and [`start`](Self::start) must be called from within a
/// [`tokio::task::LocalSet`] on that thread. Uploads happen on a dedicated
/// worker thread per job.
///
/// # Example
///
/// ```ignore
/// let uploader = MinidumpUploader::builder()
///     .queue(Arc::new(CrashDirectory::open(crash_dir)))
///     .transport(Arc::new(HttpTransport::new(transport_config)?))
///     .consent(Arc::new(StaticConsent(true)))
///     .network(Arc::new(StaticNetwork(NetworkState::UNMETERED)))
///     .build()?;
///
/// let local = tokio::task::LocalSet::new();
/// local.run_until(async {
///     let (tx, rx) = tokio::sync::oneshot::channel();
///     uploader.start(move |reschedule| { let _ = tx.send(reschedule); });
///     let reschedule = rx.await?;
/// }).await;
/// ```
#[derive(Clone)]
pub struct MinidumpUploader {
	inner: Rc<UploaderInner>,
}

impl MinidumpUploader {
	/// Creates a new builder for constructing a MinidumpUploader.
	pub fn builder() -> MinidumpUploaderBuilder {
		MinidumpUploaderBuilder::new()
	}

	/// Starts an upload job.
	///
	/// Consent is queried asynchronously; once it resolves the worker thread
	/// is launched, even if [`cancel`](Self::cancel) was called in the
	/// meantime. `on_finished` runs on the control thread exactly once with
	/// the reschedule verdict, unless the worker thread panics.
	///
	/// # Panics
	///
	/// Panics if a job is already active, or if called outside a `LocalSet`.
	pub fn start<F>(&self, on_finished: F)
	where
		F: FnOnce(bool) + 'static,
	{
		if let Some(job) = &self.inner.state.borrow().active {
			panic!(
				"only one minidump upload job may be active at a time (run {} is still active)",
				job.run_id
			);
		}

		let run_id = Uuid::now_v7();
		self.inner.cancel.reset();
		let inner = Rc::clone(&self.inner);
		tokio::task::spawn_local(inner.run_job(run_id, Box::new(on_finished)));

		// The task cannot run before this returns, and a failed spawn leaves the slot empty.
		let mut state = self.inner.state.borrow_mut();
		state.active = Some(ActiveJob { run_id });
		state.last_exit = None;
		info!(run_id = %run_id, "Starting minidump upload job");
	}

	/// Requests cancellation of the current job, if any.
	///
	/// An upload already in flight is not interrupted; the worker stops
	/// before the next file. Returns whether eligible minidumps remain,
	/// computed now from the queue rather than from worker progress.
	pub fn cancel(&self) -> bool {
		self.inner.cancel.cancel();
		let reschedule = self.inner.has_pending_uploads();

		if let Some(job) = &self.inner.state.borrow().active {
			info!(run_id = %job.run_id, reschedule, "Cancelling minidump upload job");
		}
		reschedule
	}

	/// Returns true while a job is between `start` and its completion.
	pub fn is_job_active(&self) -> bool {
		self.inner.state.borrow().active.is_some()
	}

	/// Blocks until the most recent worker thread has terminated.
	///
	/// Returns immediately if no worker has been launched yet, or if the last
	/// job already reaped its worker. A panic in the worker is returned as the
	/// error.
	pub fn join_for_testing(&self) -> thread::Result<()> {
		let handle = self.inner.state.borrow_mut().worker.take();
		match handle {
			Some(handle) => handle.join(),
			None => self.inner.state.borrow_mut().last_exit.take().unwrap_or(Ok(())),
		}
	}
}

impl fmt::Debug for MinidumpUploader {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MinidumpUploader")
			.field("options", &self.inner.options)
			.field("policy", &self.inner.policy)
			.field("job_active", &self.is_job_active())
			.finish_non_exhaustive()
	}
}
