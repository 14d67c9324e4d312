// Fri Oct 16 2026 - Alex

use crate::elf::{FlagMatch, SegmentStep};
use crate::search::{ResyncPolicy, ScanOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Policy for single-range queries.
    pub resync: ResyncPolicy,
    /// Policy for whole-image sweeps, which cross data islands and
    /// instructions outside the decoded subset.
    pub sweep_resync: ResyncPolicy,
    pub function_alignment: Option<u64>,
    pub flag_match: FlagMatch,
    pub segment_step: SegmentStep,
    pub max_listing: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            resync: ResyncPolicy::Stop,
            sweep_resync: ResyncPolicy::ByteWise,
            function_alignment: None,
            flag_match: FlagMatch::Subset,
            segment_step: SegmentStep::FORWARD,
            max_listing: 64,
        }
    }
}

impl ScanConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_resync(mut self, resync: ResyncPolicy) -> Self {
        self.resync = resync;
        self
    }

    pub fn with_sweep_resync(mut self, resync: ResyncPolicy) -> Self {
        self.sweep_resync = resync;
        self
    }

    pub fn with_function_alignment(mut self, alignment: u64) -> Self {
        self.function_alignment = Some(alignment);
        self
    }

    pub fn with_flag_match(mut self, flag_match: FlagMatch) -> Self {
        self.flag_match = flag_match;
        self
    }

    pub fn with_segment_step(mut self, step: SegmentStep) -> Self {
        self.segment_step = step;
        self
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            resync: self.resync,
            function_alignment: self.function_alignment,
        }
    }

    /// Options for [`ImageScanner`](crate::search::ImageScanner) sweeps.
    pub fn sweep_options(&self) -> ScanOptions {
        ScanOptions {
            resync: self.sweep_resync,
            ..self.scan_options()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(align) = self.function_alignment {
            if align == 0 || !align.is_power_of_two() {
                return Err(ConfigError::Invalid(format!(
                    "function_alignment must be a power of two, got {}",
                    align
                )));
            }
        }
        if self.max_listing == 0 {
            return Err(ConfigError::Invalid("max_listing must be greater than 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elf::StepDirection;

    #[test]
    fn test_defaults_are_valid() {
        let config = ScanConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.scan_options(), ScanOptions::default());
    }

    #[test]
    fn test_sweeps_resync_by_default() {
        let config = ScanConfig::new().with_function_alignment(16);
        assert_eq!(config.scan_options().resync, ResyncPolicy::Stop);
        assert_eq!(config.sweep_options().resync, ResyncPolicy::ByteWise);
        assert_eq!(config.sweep_options().function_alignment, Some(16));

        let strict = config.with_sweep_resync(ResyncPolicy::Stop);
        assert_eq!(strict.sweep_options().resync, ResyncPolicy::Stop);
    }

    #[test]
    fn test_partial_json() {
        let config: ScanConfig = serde_json::from_str(
            r#"{ "resync": "byte_wise", "segment_step": { "direction": "backward", "stride": 2 } }"#,
        )
        .unwrap();
        assert_eq!(config.resync, ResyncPolicy::ByteWise);
        assert_eq!(config.segment_step.direction, StepDirection::Backward);
        assert_eq!(config.segment_step.stride.get(), 2);
        assert_eq!(config.flag_match, FlagMatch::Subset);
        assert_eq!(config.max_listing, 64);
    }

    #[test]
    fn test_zero_stride_rejected() {
        let parsed = serde_json::from_str::<ScanConfig>(
            r#"{ "segment_step": { "direction": "forward", "stride": 0 } }"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_alignment_validation() {
        assert!(ScanConfig::new().with_function_alignment(16).validate().is_ok());
        assert!(ScanConfig::new().with_function_alignment(12).validate().is_err());
        assert!(ScanConfig::new().with_function_alignment(0).validate().is_err());
    }
}
