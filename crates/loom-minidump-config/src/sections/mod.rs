// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod logging;
mod permission;
mod storage;
mod upload;

pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use permission::{PermissionConfig, PermissionConfigLayer};
pub use storage::{StorageConfig, StorageConfigLayer};
pub use upload::{UploadConfig, UploadConfigLayer, DEFAULT_UPLOAD_URL};
