pub mod reader;
pub mod splitter;

pub use reader::{load_file, SimpleDirectoryReader};
pub use splitter::{SentenceSplitter, TextSpan};
