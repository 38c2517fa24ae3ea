//! Action types for event-sequence tests.
//!
//! An [`EventGene`] is what the search evolves; a [`PrimitiveAction`] is what the
//! coverage oracle replays against the program under test.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// A primitive input event understood by the execution oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PrimitiveAction {
    /// Let the program run for N ticks without input.
    Wait { ticks: u32 },
    /// Press and hold a key.
    PressKey { key: String },
    /// Release a held key.
    ReleaseKey { key: String },
    /// Click on a named target (sprite or stage).
    Click { target: String },
    /// Move the pointer to stage coordinates.
    MovePointer { x: f64, y: f64 },
    /// Type a text answer.
    TypeText { text: String },
}

/// Action descriptor carried by an event gene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventAction {
    Wait,
    Key { key: String },
    Click { target: String },
    MoveTo { x: f64, y: f64 },
    Type { text: String },
}

/// Smallest heritable unit of an event-sequence chromosome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventGene {
    /// What the gene does.
    pub action: EventAction,
    /// How many ticks the action lasts (key hold time, or idle time afterwards).
    pub duration: u32,
}

impl EventGene {
    pub fn new(action: EventAction, duration: u32) -> Self {
        Self { action, duration }
    }

    /// Expand this gene into the primitive actions replayed by the oracle.
    pub fn to_primitives(&self) -> Vec<PrimitiveAction> {
        let mut out = Vec::with_capacity(3);
        match &self.action {
            EventAction::Wait => {
                out.push(PrimitiveAction::Wait {
                    ticks: self.duration,
                });
                return out;
            }
            EventAction::Key { key } => {
                out.push(PrimitiveAction::PressKey { key: key.clone() });
                if self.duration > 0 {
                    out.push(PrimitiveAction::Wait {
                        ticks: self.duration,
                    });
                }
                out.push(PrimitiveAction::ReleaseKey { key: key.clone() });
                return out;
            }
            EventAction::Click { target } => out.push(PrimitiveAction::Click {
                target: target.clone(),
            }),
            EventAction::MoveTo { x, y } => out.push(PrimitiveAction::MovePointer { x: *x, y: *y }),
            EventAction::Type { text } => out.push(PrimitiveAction::TypeText { text: text.clone() }),
        }
        if self.duration > 0 {
            out.push(PrimitiveAction::Wait {
                ticks: self.duration,
            });
        }
        out
    }
}

/// Kinds of gene the generator may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Wait,
    Key,
    Click,
    MoveTo,
    Type,
}

/// The inputs the program under test reacts to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionSpace {
    /// Keys the program listens to.
    #[serde(default = "default_keys")]
    pub keys: Vec<String>,
    /// Clickable targets.
    #[serde(default = "default_click_targets")]
    pub click_targets: Vec<String>,
    /// Horizontal pointer bounds.
    #[serde(default = "default_x_bounds")]
    pub x_bounds: (f64, f64),
    /// Vertical pointer bounds.
    #[serde(default = "default_y_bounds")]
    pub y_bounds: (f64, f64),
    /// Whether pointer movement is meaningful for the program.
    #[serde(default)]
    pub pointer: bool,
    /// Answers that can be typed.
    #[serde(default)]
    pub texts: Vec<String>,
    /// Whether idle waits may be generated.
    #[serde(default = "default_true")]
    pub waits: bool,
}

impl Default for ActionSpace {
    fn default() -> Self {
        Self {
            keys: default_keys(),
            click_targets: default_click_targets(),
            x_bounds: default_x_bounds(),
            y_bounds: default_y_bounds(),
            pointer: false,
            texts: Vec::new(),
            waits: true,
        }
    }
}

fn default_keys() -> Vec<String> {
    ["space", "left arrow", "right arrow", "up arrow", "down arrow"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_click_targets() -> Vec<String> {
    vec!["Stage".to_string()]
}
fn default_x_bounds() -> (f64, f64) {
    (-240.0, 240.0)
}
fn default_y_bounds() -> (f64, f64) {
    (-180.0, 180.0)
}
fn default_true() -> bool {
    true
}

impl ActionSpace {
    /// Gene kinds available in this action space.
    pub fn kinds(&self) -> Vec<EventKind> {
        let mut kinds = Vec::new();
        if self.waits {
            kinds.push(EventKind::Wait);
        }
        if !self.keys.is_empty() {
            kinds.push(EventKind::Key);
        }
        if !self.click_targets.is_empty() {
            kinds.push(EventKind::Click);
        }
        if self.pointer {
            kinds.push(EventKind::MoveTo);
        }
        if !self.texts.is_empty() {
            kinds.push(EventKind::Type);
        }
        kinds
    }

    /// Whether a gene action can be produced by this action space.
    pub fn admits(&self, action: &EventAction) -> bool {
        match action {
            EventAction::Wait => self.waits,
            EventAction::Key { key } => self.keys.contains(key),
            EventAction::Click { target } => self.click_targets.contains(target),
            EventAction::MoveTo { x, y } => {
                self.pointer
                    && (self.x_bounds.0..=self.x_bounds.1).contains(x)
                    && (self.y_bounds.0..=self.y_bounds.1).contains(y)
            }
            EventAction::Type { text } => self.texts.contains(text),
        }
    }
}

/// Configuration of the event-sequence genetic operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSequenceConfig {
    /// Length bounds for randomly generated chromosomes.
    #[serde(default = "default_initial_length")]
    pub initial_length: (usize, usize),
    /// Minimum chromosome length.
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    /// Maximum chromosome length.
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Maximum duration of a single gene in ticks.
    #[serde(default = "default_max_duration")]
    pub max_duration: u32,
    /// Standard deviation of parameter jitter, as a fraction of the parameter range.
    #[serde(default = "default_mutation_power")]
    pub mutation_power: f64,
    /// Inputs available to generated tests.
    #[serde(default)]
    pub action_space: ActionSpace,
}

impl Default for EventSequenceConfig {
    fn default() -> Self {
        Self {
            initial_length: default_initial_length(),
            min_length: default_min_length(),
            max_length: default_max_length(),
            max_duration: default_max_duration(),
            mutation_power: default_mutation_power(),
            action_space: ActionSpace::default(),
        }
    }
}

fn default_initial_length() -> (usize, usize) {
    (2, 20)
}
fn default_min_length() -> usize {
    1
}
fn default_max_length() -> usize {
    50
}
fn default_max_duration() -> u32 {
    30
}
fn default_mutation_power() -> f64 {
    0.1
}

impl EventSequenceConfig {
    /// Validate length bounds and the action space.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_length == 0 {
            return Err(ConfigError::InvalidLengthBounds(
                "min_length must be at least 1".to_string(),
            ));
        }
        if self.min_length > self.max_length {
            return Err(ConfigError::InvalidLengthBounds(format!(
                "min_length ({}) > max_length ({})",
                self.min_length, self.max_length
            )));
        }
        let (lo, hi) = self.initial_length;
        if lo > hi || lo < self.min_length || hi > self.max_length {
            return Err(ConfigError::InvalidLengthBounds(format!(
                "initial_length ({lo}, {hi}) must lie within [{}, {}]",
                self.min_length, self.max_length
            )));
        }
        if self.mutation_power < 0.0 {
            return Err(ConfigError::InvalidLengthBounds(format!(
                "mutation_power ({}) must be non-negative",
                self.mutation_power
            )));
        }
        let space = &self.action_space;
        if space.x_bounds.0 > space.x_bounds.1 || space.y_bounds.0 > space.y_bounds.1 {
            return Err(ConfigError::EmptyActionSpace);
        }
        if space.kinds().is_empty() {
            return Err(ConfigError::EmptyActionSpace);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_gene_expands_to_press_wait_release() {
        let gene = EventGene::new(
            EventAction::Key {
                key: "space".into(),
            },
            5,
        );
        let prims = gene.to_primitives();
        assert_eq!(prims.len(), 3);
        assert_eq!(
            prims[0],
            PrimitiveAction::PressKey {
                key: "space".into()
            }
        );
        assert_eq!(prims[1], PrimitiveAction::Wait { ticks: 5 });
    }

    #[test]
    fn test_click_without_duration_has_no_wait() {
        let gene = EventGene::new(
            EventAction::Click {
                target: "Stage".into(),
            },
            0,
        );
        assert_eq!(gene.to_primitives().len(), 1);
    }

    #[test]
    fn test_default_config_valid() {
        assert!(EventSequenceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_action_space_rejected() {
        let config = EventSequenceConfig {
            action_space: ActionSpace {
                keys: vec![],
                click_targets: vec![],
                waits: false,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyActionSpace)
        ));
    }
}
