//! Strongly-typed identifiers used across the engine.
//!
//! Row ids are opaque: they are minted by a cursor and only mean something when
//! replayed against that same cursor through `record_at`. Never do arithmetic on
//! them outside the cursor that produced them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

macro_rules! new_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(v: u64) -> Self {
                Self(v)
            }
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

new_id!(RowId);
new_id!(CursorId);

static NEXT_CURSOR_ID: AtomicU64 = AtomicU64::new(1);

impl CursorId {
    /// Allocate a process-unique cursor identity.
    pub fn next() -> Self {
        Self(NEXT_CURSOR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_ids_are_unique() {
        let a = CursorId::next();
        let b = CursorId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }

    #[test]
    fn display_names_the_kind() {
        assert_eq!(RowId::new(7).to_string(), "RowId(7)");
    }
}
