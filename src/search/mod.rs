//! Search module - many-objective test generation.
//!
//! # Overview
//!
//! - **Chromosomes** (`chromosome`): the `Variation` capability set shared by all variants
//! - **Event sequences** (`event_sequence`): variable-length input event lists
//! - **NEAT** (`neat`): evolved network policies with speciation
//! - **Ranking** (`ranking`): preference sorting, dominance fronts and parent selection
//! - **Archive** (`archive`): best chromosome per coverage goal, i.e. the test suite
//! - **Engine** (`engine`): the generational loop driving a `CoverageOracle`
//!
//! # Example
//!
//! ```rust,no_run
//! use scratch_evolve::schema::{EventSequenceConfig, SearchConfig};
//! use scratch_evolve::search::{CoverageOracle, EventSequenceOperators, RankBreeder, SearchEngine};
//!
//! fn generate_suite<O: CoverageOracle>(oracle: &mut O) {
//!     let operators = EventSequenceOperators::new(EventSequenceConfig::default()).unwrap();
//!     let mut engine =
//!         SearchEngine::new(SearchConfig::default(), operators, RankBreeder).unwrap();
//!     let result = engine
//!         .run_with_callback(oracle, |progress| {
//!             println!(
//!                 "Generation {}: {}/{} goals",
//!                 progress.generation, progress.covered_goals, progress.total_goals
//!             );
//!         })
//!         .unwrap();
//!     println!("Suite size: {}", result.archive.suite().count());
//! }
//! ```

mod archive;
mod breeder;
mod chromosome;
mod engine;
mod event_sequence;
mod fitness;
mod random;
mod ranking;
mod recorder;
mod refinement;

pub mod neat;
pub mod stats;

pub use archive::*;
pub use breeder::*;
pub use chromosome::*;
pub use engine::*;
pub use event_sequence::*;
pub use fitness::*;
pub use random::*;
pub use ranking::*;
pub use recorder::*;
pub use refinement::*;
