pub mod chunk;
pub mod headers;
pub mod parser;
pub mod url;

pub use chunk::{ChunkParser, ChunkState};
pub use headers::HeaderMap;
pub use parser::{HttpMessage, Kind, State};
pub use url::RequestTarget;
