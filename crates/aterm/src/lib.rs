#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

mod aterm;
mod aterm_list;
mod containers;
mod parse_term;
mod random_term;
mod store;
mod symbol;

pub mod storage;

pub use aterm::*;
pub use aterm_list::*;
pub use containers::*;
pub use parse_term::*;
pub use random_term::*;
pub use store::*;
pub use symbol::*;
