//! Scratch Evolve CLI - Run a test generation search from JSON configuration.
//!
//! The binary drives the engine against a built-in synthetic program whose goals are
//! "press each key" and "replay at least N actions", which is enough to watch the
//! archive fill up and to tune search settings.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use scratch_evolve::{
    schema::{EventSequenceConfig, GoalId, PrimitiveAction, SearchConfig},
    search::{
        CoverageOracle, CoverageReport, EvaluationBudget, EventSequenceOperators, Executable,
        OracleError, RankBreeder, SearchEngine,
    },
};

/// Replay lengths the synthetic program rewards.
const LENGTH_GOALS: [usize; 4] = [5, 10, 20, 40];

/// Run configuration file layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RunConfig {
    #[serde(default)]
    search: SearchConfig,
    #[serde(default)]
    operators: EventSequenceConfig,
}

/// Synthetic program under test.
struct DemoProgram {
    keys: Vec<String>,
}

impl DemoProgram {
    fn key_goal(key: &str) -> GoalId {
        GoalId::new(format!("press:{key}"))
    }

    fn length_goal(n: usize) -> GoalId {
        GoalId::new(format!("replay:{n}"))
    }
}

impl CoverageOracle for DemoProgram {
    fn goals(&self) -> Vec<GoalId> {
        self.keys
            .iter()
            .map(|k| Self::key_goal(k))
            .chain(LENGTH_GOALS.iter().map(|&n| Self::length_goal(n)))
            .collect()
    }

    fn evaluate(
        &mut self,
        executable: &mut Executable,
        budget: &EvaluationBudget,
    ) -> Result<CoverageReport, OracleError> {
        let Executable::Actions(actions) = executable else {
            return Err(OracleError::Crashed(
                "demo program only replays action lists".to_string(),
            ));
        };
        let mut covered = BTreeSet::new();
        for action in actions.iter() {
            if budget.should_stop() {
                return Ok(CoverageReport::timed_out(self.goals().into_iter().collect()));
            }
            if let PrimitiveAction::PressKey { key } = action {
                covered.insert(Self::key_goal(key));
            }
        }
        let mut distances = BTreeMap::new();
        for n in LENGTH_GOALS {
            if actions.len() >= n {
                covered.insert(Self::length_goal(n));
            } else {
                distances.insert(Self::length_goal(n), (n - actions.len()) as f64);
            }
        }
        Ok(CoverageReport {
            covered,
            total: self.goals().into_iter().collect(),
            timed_out: false,
            distances,
            survived_ticks: actions.len() as u64,
            score: 0.0,
        })
    }
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <config.json> [suite_dir]", args[0]);
        eprintln!();
        eprintln!("Run a test generation search against the built-in demo program.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  config.json  Path to run configuration file");
        eprintln!("  suite_dir    Directory to write the generated test suite to");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    if args[1] == "--example" {
        print_example_config();
        return;
    }

    let config_path = PathBuf::from(&args[1]);
    let suite_dir = args.get(2).map(PathBuf::from);

    // Load configuration
    let config_str = fs::read_to_string(&config_path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });

    let config: RunConfig = serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    });

    let mut program = DemoProgram {
        keys: config.operators.action_space.keys.clone(),
    };

    let operators = EventSequenceOperators::new(config.operators).unwrap_or_else(|e| {
        eprintln!("Invalid operator configuration: {}", e);
        std::process::exit(1);
    });
    let mut engine =
        SearchEngine::new(config.search.clone(), operators, RankBreeder).unwrap_or_else(|e| {
            eprintln!("Invalid search configuration: {}", e);
            std::process::exit(1);
        });

    println!("Scratch Evolve Search");
    println!("=====================");
    println!("Goals: {}", program.goals().len());
    println!("Population: {}", config.search.population.size);
    println!("Max generations: {}", config.search.population.max_generations);
    println!("Seed: {}", engine.seed());
    println!();

    println!("Running search...");
    let start = Instant::now();
    let result = engine
        .run_with_callback(&mut program, |progress| {
            println!(
                "  Generation {}/{}: covered={}/{}, best={:.3}, mean={:.3}",
                progress.generation,
                progress.max_generations,
                progress.covered_goals,
                progress.total_goals,
                progress.best_fitness,
                progress.avg_fitness
            );
        })
        .unwrap_or_else(|e| {
            eprintln!("Search failed: {}", e);
            std::process::exit(1);
        });
    let elapsed = start.elapsed();

    println!();
    println!("Result:");
    println!("  Stop reason: {:?}", result.stats.stop_reason);
    println!("  Generations: {}", result.stats.generations);
    println!("  Evaluations: {}", result.stats.evaluations);
    println!("  Coverage: {:.1}%", result.stats.coverage() * 100.0);
    for entry in result.archive.entries() {
        println!(
            "    {:<20} distance={:.3} length={}",
            entry.goal.to_string(),
            entry.distance,
            entry.length
        );
    }
    println!("Time: {:.2}s", elapsed.as_secs_f32());

    if let Some(dir) = suite_dir {
        match result.archive.save_all(&dir) {
            Ok(paths) => println!("Wrote {} tests to {}", paths.len(), dir.display()),
            Err(e) => {
                eprintln!("Error writing suite: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn print_example_config() {
    let config = RunConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing config: {}", e),
    }
}
