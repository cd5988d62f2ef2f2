pub mod config;
pub mod coordinate_resolver;
pub mod duplicate_set;
pub mod markduplicates;
pub mod streaming_window;
pub mod utils;
