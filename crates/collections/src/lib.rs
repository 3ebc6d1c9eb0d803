#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

mod indexed_set;
mod protection_set;
mod table;

pub use indexed_set::*;
pub use protection_set::*;
pub use table::*;
