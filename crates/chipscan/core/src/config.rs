//! Configuration options for the scan engine

use serde::{Deserialize, Serialize};

use crate::ReadMode;

/// Configuration options for [`TagScanner`](crate::TagScanner)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Mode used by [`TagScanner::read`](crate::TagScanner::read)
    pub read_mode: ReadMode,
}

impl ScannerConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default read mode
    pub const fn with_read_mode(mut self, mode: ReadMode) -> Self {
        self.read_mode = mode;
        self
    }
}
