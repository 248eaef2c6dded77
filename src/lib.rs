pub mod chunker;
pub mod configs;
pub mod error;
pub mod ingest;
pub mod runtime;
pub mod sources;
pub mod types;

pub use chunker::{chunk_tree, ChunkStrategy, Chunker, ChunkerConfig};
pub use error::{ChunkError, ParseError, ParseWarning, WarningKind};
pub use sources::usc::citations::{format_citation, parse_citation, CitationIndex, CitationLookup};
pub use sources::usc::parser::{parse_usc_bytes, parse_usc_xml, ParseResult};
pub use types::{Chunk, Level, LevelKind};
