pub mod d0010_file;
pub mod path_resolver;

pub use d0010_file::{D0010FileSource, SourceError};
pub use path_resolver::resolve_input_paths;
