//! Unique identifiers for rackflow entities.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a pallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PalletId(Ulid);

impl PalletId {
    /// Generate a new PalletId
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for PalletId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PalletId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

impl std::str::FromStr for PalletId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("P-").unwrap_or(s);
        Ok(Self(raw.parse()?))
    }
}

/// Unique identifier for an activity log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(Ulid);

impl EntryId {
    /// Generate a new EntryId
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique identifier for a generated task sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceId(Ulid);

impl SequenceId {
    /// Generate a new SequenceId
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for SequenceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SequenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

macro_rules! named_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create from a configured name.
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            /// Borrow the underlying name.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

named_id!(
    /// Identifier of a shuttle, as named in the layout document.
    ShuttleId
);
named_id!(
    /// Identifier of a lift, as named in the layout document.
    LiftId
);
named_id!(
    /// Identifier of an operational zone.
    ZoneId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pallet_id_round_trips_through_display() {
        let id = PalletId::new();
        let parsed: PalletId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn named_ids_display_their_name() {
        assert_eq!(ShuttleId::new("SHUTTLE_1").to_string(), "SHUTTLE_1");
        assert_eq!(LiftId::new("LIFT_LOWER").as_str(), "LIFT_LOWER");
    }
}
