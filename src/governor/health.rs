//! Node health states and the heat map that classifies load into them.

use serde::Serialize;
use std::fmt;

/// Coarse node resource pressure. Ordered `Normal < Warm < Hot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    #[default]
    Normal,
    Warm,
    Hot,
}

impl HealthState {
    pub fn as_u8(self) -> u8 {
        match self {
            HealthState::Normal => 0,
            HealthState::Warm => 1,
            HealthState::Hot => 2,
        }
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => HealthState::Warm,
            2 => HealthState::Hot,
            _ => HealthState::Normal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthState::Normal => "normal",
            HealthState::Warm => "warm",
            HealthState::Hot => "hot",
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `(state, min, max)` band. A value is in the band when `min < value < max`,
/// or `min < value <= max` for a band closed above.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatMapEntry {
    pub state: HealthState,
    pub min: f32,
    pub max: f32,
    pub max_inclusive: bool,
}

impl HeatMapEntry {
    pub const fn new(state: HealthState, min: f32, max: f32) -> Self {
        Self {
            state,
            min,
            max,
            max_inclusive: false,
        }
    }

    pub const fn closed_above(state: HealthState, min: f32, max: f32) -> Self {
        Self {
            state,
            min,
            max,
            max_inclusive: true,
        }
    }

    pub fn contains(&self, value: f32) -> bool {
        self.min < value && (value < self.max || (self.max_inclusive && value == self.max))
    }
}

/// Bands shipped with the node governor.
///
/// Kept compatible with deployed gateways: 85, 86, 95 and 96 fall in no band,
/// nothing maps to `Hot`, and (96, 100] maps to `Normal`.
// TODO: close the gaps and map the top band to Hot once the product owners sign off on the new thresholds.
pub const DEFAULT_HEAT_MAP: [HeatMapEntry; 3] = [
    HeatMapEntry::new(HealthState::Normal, 0.0, 85.0),
    HeatMapEntry::new(HealthState::Warm, 86.0, 95.0),
    HeatMapEntry::closed_above(HealthState::Normal, 96.0, 100.0),
];

/// Immutable, ordered table of heat-map bands.
#[derive(Debug, Clone)]
pub struct HeatMap {
    entries: Vec<HeatMapEntry>,
}

impl HeatMap {
    pub fn new(entries: Vec<HeatMapEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[HeatMapEntry] {
        &self.entries
    }

    /// Highest state among the bands containing `value`, if any.
    pub fn classify(&self, value: f32) -> Option<HealthState> {
        self.entries
            .iter()
            .filter(|entry| entry.contains(value))
            .map(|entry| entry.state)
            .max()
    }

    /// Highest state across all readings; `None` when no reading hit a band.
    pub fn classify_all<I>(&self, values: I) -> Option<HealthState>
    where
        I: IntoIterator<Item = f32>,
    {
        values.into_iter().filter_map(|v| self.classify(v)).max()
    }
}

impl Default for HeatMap {
    fn default() -> Self {
        Self::new(DEFAULT_HEAT_MAP.to_vec())
    }
}

/// Published when the classified state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthTransition {
    pub previous: HealthState,
    pub current: HealthState,
}
