//! Caller identity.
//!
//! A [`Principal`] is the opaque identifier the authentication provider hands
//! out for a signed-in user. Identities can reach us through different
//! representations (typed in, decoded from the wire, copied from a membership
//! list), so the type only ever stores the canonical form: surrounding
//! whitespace removed. The text itself is kept as issued, case included, since
//! providers may tell identities apart by case. Equality, hashing and ordering
//! all operate on that form.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
	/// Returns `None` for text that is blank once canonicalised.
	pub fn parse(text: &str) -> Option<Principal> {
		let canonical = text.trim().to_string();
		if canonical.is_empty() {
			return None
		}
		Some(Principal(canonical))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Principal {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyPrincipal;

impl fmt::Display for EmptyPrincipal {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("principal text is empty")
	}
}

impl std::error::Error for EmptyPrincipal {}

impl FromStr for Principal {
	type Err = EmptyPrincipal;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Principal::parse(s).ok_or(EmptyPrincipal)
	}
}

impl<'de> Deserialize<'de> for Principal {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let text = String::deserialize(deserializer)?;
		Principal::parse(&text).ok_or_else(|| serde::de::Error::custom(EmptyPrincipal))
	}
}
