pub mod common;
pub mod usc;
