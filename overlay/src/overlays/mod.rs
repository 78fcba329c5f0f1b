//! Complete overlay implementations
//!
//! An overlay owns its window, knows how to render its content, and runs
//! until it is dismissed.

mod large_type;

pub use large_type::LargeTypeOverlay;
