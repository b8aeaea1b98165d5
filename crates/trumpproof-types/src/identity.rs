//! Identity types for TrumpProof
//!
//! Identities are strongly typed wrappers around UUIDs so a cycle id can
//! never be confused with any other identifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse from a string (with or without prefix)
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                let s = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id_type!(CycleId, "cycle", "Unique identifier for one harvest-to-stoprule cycle");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_id_prefix_roundtrip() {
        let id = CycleId::new();
        let text = id.to_string();
        assert!(text.starts_with("cycle_"));
        assert_eq!(CycleId::parse(&text).unwrap(), id);
        assert_eq!(CycleId::parse(&id.0.to_string()).unwrap(), id);
    }
}
