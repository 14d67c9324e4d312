// Fri Oct 16 2026 - Alex

pub mod error;
pub mod image;
pub mod segment;

pub use error::ElfError;
pub use image::ElfImage;
pub use segment::{FlagMatch, SegmentStep, StepDirection};
