pub mod fetcher;
pub mod logging;
pub mod sink;
