// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Wrapper for credentials such as upload tokens.
//!
//! A [`Secret`] prints and serializes as [`REDACTED`], is wiped from memory on
//! drop, and only hands out its value through [`Secret::expose`].
//!
//! ```
//! use loom_common_secret::SecretString;
//!
//! let token = SecretString::new("upload-token".to_string());
//! assert_eq!(format!("{token}"), "[REDACTED]");
//! assert_eq!(token.expose(), "upload-token");
//! ```

use std::fmt;

use zeroize::Zeroize;

/// Placeholder printed in place of a secret value.
pub const REDACTED: &str = "[REDACTED]";

/// A sensitive value that never shows up in `Debug`, `Display` or serialized output.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct Secret<T: Zeroize> {
	inner: T,
}

/// The common case: a secret string such as a bearer token.
pub type SecretString = Secret<String>;

impl<T: Zeroize> Secret<T> {
	pub fn new(value: T) -> Self {
		Self { inner: value }
	}

	/// Borrows the wrapped value. Keep the borrow as short as the use site.
	pub fn expose(&self) -> &T {
		&self.inner
	}
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
	fn clone(&self) -> Self {
		Self::new(self.inner.clone())
	}
}

impl<T: Zeroize + PartialEq> PartialEq for Secret<T> {
	fn eq(&self, other: &Self) -> bool {
		self.inner == other.inner
	}
}

impl<T: Zeroize + Eq> Eq for Secret<T> {}

impl<T: Zeroize> fmt::Debug for Secret<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Secret").field(&REDACTED).finish()
	}
}

impl<T: Zeroize> fmt::Display for Secret<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(REDACTED)
	}
}

impl From<String> for SecretString {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

#[cfg(feature = "serde")]
impl<T: Zeroize> serde::Serialize for Secret<T> {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(REDACTED)
	}
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for Secret<T>
where
	T: Zeroize + serde::Deserialize<'de>,
{
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		T::deserialize(deserializer).map(Self::new)
	}
}
