//! M3U playlist loading and regeneration

pub mod parser;
pub mod writer;

pub use parser::parse;
pub use writer::{write_entries, write_playlist};
