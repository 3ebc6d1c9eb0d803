#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

mod debug_trace;
mod error;
mod format;
mod generational_index;
mod test_logger;

pub use error::*;
pub use format::*;
pub use generational_index::*;
pub use random_test::*;
pub use test_logger::*;
