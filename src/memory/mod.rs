// Fri Oct 16 2026 - Alex

pub mod address;
pub mod buffer;
pub mod error;
pub mod protection;
pub mod range;
pub mod segment;

pub use address::Address;
pub use buffer::CodeBuffer;
pub use error::MemoryError;
pub use protection::Protection;
pub use range::MemoryRange;
pub use segment::MemorySegment;
