//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// [sync] Section Defaults
// ============================================================================

pub mod sync {
    /// Document extension, without the dot.
    pub fn extension() -> String {
        "md".into()
    }

    /// Seconds a single fetch may take before it is interrupted.
    pub fn fetch_timeout() -> u64 {
        120
    }

    /// Seconds shutdown waits for the sync loop before cleaning up anyway.
    pub fn shutdown_timeout() -> u64 {
        10
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "0.0.0.0".into()
    }

    pub fn port() -> u16 {
        8080
    }

    pub fn workers() -> usize {
        4
    }
}

// ============================================================================
// [paths] Section Defaults
// ============================================================================

pub mod paths {
    use std::path::PathBuf;

    pub fn snapshot() -> PathBuf {
        "content".into()
    }

    pub fn generated() -> PathBuf {
        "generated".into()
    }

    pub fn static_dir() -> PathBuf {
        "static".into()
    }
}
