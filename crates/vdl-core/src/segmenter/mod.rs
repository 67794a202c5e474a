//! Range math: byte ranges and randomized splitting of a known total size.

mod range;
mod split;

pub use range::UnitTask;
pub use split::{split_ranges, split_ranges_with, SplitParams, DEFAULT_BASE_CHUNK, DEFAULT_SPLIT_COUNT};
