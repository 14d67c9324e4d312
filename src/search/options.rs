// Fri Oct 16 2026 - Alex

use serde::{Deserialize, Serialize};

/// What a scanner does when the bytes under the cursor do not decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResyncPolicy {
    /// Treat the rest of the range as unsearchable.
    #[default]
    Stop,
    /// Skip one byte and try again.
    ByteWise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    pub resync: ResyncPolicy,
    /// Prologue candidates must start on this boundary when set.
    pub function_alignment: Option<u64>,
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resync(mut self, resync: ResyncPolicy) -> Self {
        self.resync = resync;
        self
    }

    pub fn with_function_alignment(mut self, alignment: u64) -> Self {
        self.function_alignment = Some(alignment);
        self
    }
}
