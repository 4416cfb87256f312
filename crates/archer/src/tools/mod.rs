//! A set of built-in tools that models can use.

mod glob;
mod read_file;
mod time;

pub use glob::GlobTool;
pub use read_file::ReadFileTool;
pub use time::TimeTool;
