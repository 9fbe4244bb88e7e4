//! Identifier generation for newly created resources.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

/// Source of unique identifiers.
pub trait IdGenerator: Send + Sync {
    /// Returns a fresh identifier.
    fn generate(&self) -> String;
}

/// Random version 4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn generate(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

/// Monotonic counter starting at 1; deterministic identifiers for tests and
/// local runs.
#[derive(Debug, Default)]
pub struct SequentialIds {
    issued: AtomicU64,
}

impl SequentialIds {
    /// Creates a counter that has issued nothing.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            issued: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIds {
    fn generate(&self) -> String {
        let next = self.issued.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        next.to_string()
    }
}
