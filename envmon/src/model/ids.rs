//! Identifier newtypes.
//!
//! Identifiers are opaque to the scheduling core: it only compares, hashes
//! and forwards them. Wrapping the raw integers keeps a process id from being
//! passed where a register id is expected.

use std::fmt;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name($inner);

        impl $name {
            /// Wraps a raw identifier value.
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            /// Returns the raw identifier value.
            pub const fn get(self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Unique identifier of a schedulable process (collector, analysis, ...).
    ProcessId(u32)
);

numeric_id!(
    /// Handle returned by the process logger for one execution attempt.
    RegisterId(u64)
);

numeric_id!(
    /// Identifier of the project that owns a process.
    ProjectId(u32)
);

numeric_id!(
    /// Identifier of a physical service instance.
    ///
    /// Several instances of the same service type may share one catalog;
    /// each only runs the processes assigned to it.
    ServiceInstanceId(u32)
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_compare_by_value() {
        assert_eq!(ProcessId::new(7), ProcessId::from(7));
        assert_ne!(ProcessId::new(7), ProcessId::new(8));
        assert!(RegisterId::new(1) < RegisterId::new(2));
    }

    #[test]
    fn test_ids_hash_by_value() {
        let mut set = HashSet::new();
        set.insert(ProcessId::new(3));
        set.insert(ProcessId::new(3));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_display_is_raw_value() {
        assert_eq!(ProcessId::new(42).to_string(), "42");
        assert_eq!(ServiceInstanceId::new(2).get(), 2);
    }
}
