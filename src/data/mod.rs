//! Element feed loading

mod elements;

pub use elements::*;
