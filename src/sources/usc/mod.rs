pub mod citations;
pub mod discover;
pub mod identifiers;
pub mod notes;
pub mod parser;
