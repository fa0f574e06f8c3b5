//! REST routing primitives: path templates, specificity scoring and method
//! ordering.

pub mod path_pattern;
pub mod sorter;

pub use path_pattern::{from_safe_name, score_path, to_safe_name, PathPattern, PatternError};
pub use sorter::sort_methods;
