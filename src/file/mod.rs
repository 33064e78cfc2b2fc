//! File Cache Module
//!
//! Byte-size-bounded cache of file contents, avoiding repeated reads of hot files.

mod cache;
mod reader;

pub use cache::{FileBytes, FileCache, FileSource};
pub use reader::{FileReader, FsReader};
