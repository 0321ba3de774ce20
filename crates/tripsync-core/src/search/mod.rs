//! Place search with response caching, cancellation and recent history.

pub mod controller;
pub mod history;

pub use controller::{SearchConfig, SearchController};
pub use history::RecentSearches;
