//! Scratch Evolve - search-based test generation for interactive programs.
//!
//! Tests are either fixed sequences of input events or evolved neural network
//! policies that pick an input every tick. A many-objective genetic algorithm treats
//! every coverage goal as its own objective and keeps the best chromosome per goal in
//! an archive, which becomes the generated test suite.
//!
//! # Architecture
//!
//! - `schema`: Configuration, gene and genotype records, recordings, run summaries
//! - `search`: Operators, ranking, archive, NEAT and the search engine
//!
//! The program under test is reached only through a [`search::CoverageOracle`].

pub mod schema;
pub mod search;

// Re-export commonly used types
pub use schema::{GoalId, SearchConfig, SearchStats, StopReason};
pub use search::{CoverageOracle, SearchEngine, SearchError, SearchResult};
