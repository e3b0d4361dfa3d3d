// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration produced by each source.

use serde::{Deserialize, Serialize};

use crate::sections::{
	LoggingConfigLayer, PermissionConfigLayer, StorageConfigLayer, UploadConfigLayer,
};

/// One source's view of the configuration. Unset sections are `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MinidumpConfigLayer {
	#[serde(default)]
	pub upload: Option<UploadConfigLayer>,
	#[serde(default)]
	pub storage: Option<StorageConfigLayer>,
	#[serde(default)]
	pub permission: Option<PermissionConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl MinidumpConfigLayer {
	/// Overlays `other` on top of `self`; set fields in `other` win.
	pub fn merge(&mut self, other: Self) {
		merge_section(&mut self.upload, other.upload, UploadConfigLayer::merge);
		merge_section(&mut self.storage, other.storage, StorageConfigLayer::merge);
		merge_section(
			&mut self.permission,
			other.permission,
			PermissionConfigLayer::merge,
		);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_section<T>(base: &mut Option<T>, other: Option<T>, merge: fn(&mut T, T)) {
	let Some(other) = other else {
		return;
	};
	if let Some(existing) = base.as_mut() {
		merge(existing, other);
	} else {
		*base = Some(other);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::PathBuf;

	#[test]
	fn test_merge_fills_missing_sections() {
		let mut base = MinidumpConfigLayer::default();
		base.merge(MinidumpConfigLayer {
			logging: Some(LoggingConfigLayer {
				level: Some("debug".to_string()),
			}),
			..Default::default()
		});
		assert_eq!(base.logging.unwrap().level.as_deref(), Some("debug"));
		assert!(base.upload.is_none());
	}

	#[test]
	fn test_merge_combines_fields_within_section() {
		let mut base = MinidumpConfigLayer {
			storage: Some(StorageConfigLayer {
				crash_dir: Some(PathBuf::from("/a")),
				max_attempts: Some(2),
				..Default::default()
			}),
			..Default::default()
		};
		base.merge(MinidumpConfigLayer {
			storage: Some(StorageConfigLayer {
				max_attempts: Some(7),
				..Default::default()
			}),
			..Default::default()
		});

		let storage = base.storage.unwrap();
		assert_eq!(storage.crash_dir, Some(PathBuf::from("/a")));
		assert_eq!(storage.max_attempts, Some(7));
	}

	#[test]
	fn test_deserialize_full_file() {
		let layer: MinidumpConfigLayer = toml::from_str(
			r#"
[upload]
url = "https://crash.example.com/upload"
timeout_secs = 10

[storage]
max_attempts = 5

[permission]
user_consent = true

[logging]
level = "warn"
"#,
		)
		.unwrap();

		assert_eq!(layer.upload.unwrap().timeout_secs, Some(10));
		assert_eq!(layer.storage.unwrap().max_attempts, Some(5));
		assert_eq!(layer.permission.unwrap().user_consent, Some(true));
		assert_eq!(layer.logging.unwrap().level.as_deref(), Some("warn"));
	}
}
