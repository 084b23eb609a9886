//! Convenient re-exports for common usage.
//!
//! ```
//! use lww_dict::prelude::*;
//! ```

pub use crate::clock::TimestampSource;
pub use crate::Crdt;
pub use crate::DeltaCrdt;
pub use crate::LWWDictionary;
pub use crate::TimedValue;
