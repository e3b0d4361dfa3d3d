// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Minidump upload transport.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use loom_common_secret::SecretString;
use reqwest::blocking::{Client, ClientBuilder, Request};
use reqwest::header::CONTENT_TYPE;
use tracing::{info, warn};

use crate::error::{Result, UploaderError};
use crate::queue::CrashFile;

/// Header carrying the original minidump file name.
pub const FILENAME_HEADER: &str = "X-Minidump-Filename";

/// Result of a single upload attempt that reached the collector or failed
/// in a way the collector reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
	Success,
	Failure,
}

/// Performs one blocking upload attempt for one minidump.
///
/// Called only from the upload worker thread. An `Err` is treated by the
/// worker exactly like [`UploadOutcome::Failure`].
pub trait UploadTransport: Send + Sync {
	fn attempt_upload(&self, file: &CrashFile) -> Result<UploadOutcome>;
}

/// Returns the User-Agent sent with every upload.
///
/// Format: `loom-minidump/{version}`
pub fn user_agent() -> String {
	format!("loom-minidump/{}", env!("CARGO_PKG_VERSION"))
}

/// Creates a blocking HTTP client builder with the standard User-Agent.
pub fn blocking_builder() -> ClientBuilder {
	Client::builder().user_agent(user_agent())
}

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
	/// Collector endpoint receiving the raw minidump bytes.
	pub upload_url: String,
	/// Optional bearer token.
	pub auth_token: Option<SecretString>,
	/// Product name sent as a query parameter.
	pub product: String,
	/// Product version sent as a query parameter.
	pub version: String,
	/// Timeout for a single upload request.
	pub request_timeout: Duration,
	/// Where successful uploads are recorded, if anywhere.
	pub upload_log: Option<PathBuf>,
}

/// Uploads minidumps to an HTTP collector.
#[derive(Debug)]
pub struct HttpTransport {
	client: Client,
	config: HttpTransportConfig,
}

impl HttpTransport {
	pub fn new(config: HttpTransportConfig) -> Result<Self> {
		let url = reqwest::Url::parse(&config.upload_url)
			.map_err(|_| UploaderError::InvalidUploadUrl(config.upload_url.clone()))?;
		if !matches!(url.scheme(), "http" | "https") {
			return Err(UploaderError::InvalidUploadUrl(config.upload_url.clone()));
		}

		let client = blocking_builder()
			.timeout(config.request_timeout)
			.build()
			.map_err(UploaderError::RequestFailed)?;

		Ok(Self { client, config })
	}

	pub fn config(&self) -> &HttpTransportConfig {
		&self.config
	}

	/// Builds the upload request for a minidump body.
	pub fn build_request(&self, file: &CrashFile, body: Vec<u8>) -> Result<Request> {
		let mut request = self
			.client
			.post(&self.config.upload_url)
			.query(&[
				("product", self.config.product.as_str()),
				("version", self.config.version.as_str()),
			])
			.header(CONTENT_TYPE, "application/octet-stream")
			.header(FILENAME_HEADER, file.file_name())
			.body(body);

		if let Some(token) = &self.config.auth_token {
			request = request.bearer_auth(token.expose());
		}

		Ok(request.build()?)
	}

	fn record_upload(&self, file: &CrashFile, report_id: &str) {
		let Some(log_path) = &self.config.upload_log else {
			return;
		};

		let line = format!("{},{},{}\n", Utc::now().to_rfc3339(), report_id, file.file_name());
		let written = OpenOptions::new()
			.create(true)
			.append(true)
			.open(log_path)
			.and_then(|mut log| log.write_all(line.as_bytes()));

		if let Err(e) = written {
			warn!(path = %log_path.display(), error = %e, "Failed to append to upload log");
		}
	}
}

impl UploadTransport for HttpTransport {
	fn attempt_upload(&self, file: &CrashFile) -> Result<UploadOutcome> {
		let body = fs::read(&file.path).map_err(|e| match e.kind() {
			io::ErrorKind::NotFound => UploaderError::FileVanished(file.path.clone()),
			_ => UploaderError::io(&file.path, e),
		})?;
		let size = body.len();

		let request = self.build_request(file, body)?;
		let response = self.client.execute(request)?;
		let status = response.status();

		if !status.is_success() {
			let message = response.text().unwrap_or_default();
			warn!(
				status = status.as_u16(),
				file = %file.file_name(),
				message = %message,
				"Minidump upload rejected"
			);
			return Ok(UploadOutcome::Failure);
		}

		let report_id = response.text().unwrap_or_default().trim().to_string();
		info!(
			file = %file.file_name(),
			report_id = %report_id,
			size,
			"Minidump uploaded"
		);
		self.record_upload(file, &report_id);

		Ok(UploadOutcome::Success)
	}
}
