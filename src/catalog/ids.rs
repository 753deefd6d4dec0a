//! Type-safe ID newtypes for catalog entities
//!
//! Ids are opaque strings wrapped in newtypes for compile-time safety. Asset
//! ids are server-assigned; placeholder ids for unconfirmed uploads are
//! synthesized locally with a reserved prefix so they can never collide with
//! a server-assigned id.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to define a type-safe ID newtype
macro_rules! define_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Get the inner string value
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(AssetId, "Identifier of a catalog asset");
define_id!(ScopeId, "Identifier of the course/container assets belong to");

/// Prefix reserved for locally-synthesized placeholder ids
const PLACEHOLDER_PREFIX: &str = "pending-upload-";

impl AssetId {
    /// Synthesize the id for an unconfirmed upload placeholder
    pub(crate) fn placeholder(seq: u64) -> Self {
        Self(format!("{PLACEHOLDER_PREFIX}{seq}"))
    }

    /// Whether this id names an unconfirmed upload placeholder
    pub fn is_placeholder(&self) -> bool {
        self.0.starts_with(PLACEHOLDER_PREFIX)
    }
}
