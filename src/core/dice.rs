//! Dice Notation Engine
//!
//! Parses and rolls the dice shorthand used by the dashboard's dice bag:
//! - Standard dice: d4, d6, d8, d10, d12, d20, d100
//! - Compound dice: 2d6, 3d8+5, 4d6-2
//! - Multiset pools: a heterogeneous set of dice dropped together
//!   (two d6 and a d4 roll as `2d6 + 1d4`)
//!
//! A single d20 showing 20 is a critical, showing 1 is a fumble. Any other
//! shape of roll never sets either flag.
//!
//! ## Examples
//!
//! ```rust
//! use gm_dashboard::core::dice::{DiceNotation, DiceRoller};
//!
//! let notation = DiceNotation::parse("2d6+3").unwrap();
//! assert_eq!(notation.count, 2);
//! assert_eq!(notation.sides, 6);
//! assert_eq!(notation.modifier, 3);
//!
//! let mut roller = DiceRoller::seeded(7);
//! let result = roller.roll(&notation);
//! assert!(result.total >= 5 && result.total <= 15);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during dice notation parsing or rolling
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("Invalid dice notation: {0}")]
    InvalidNotation(String),

    #[error("Invalid dice count: must be between 1 and {max}, got {got}")]
    InvalidCount { max: u32, got: u64 },

    #[error("Invalid dice sides: must be between {min} and {max}, got {got}")]
    InvalidSides { min: u32, max: u32, got: u64 },

    #[error("Modifier overflow: result would exceed i32 bounds")]
    ModifierOverflow,

    #[error("Empty notation")]
    EmptyNotation,

    #[error("No dice to roll")]
    EmptyPool,
}

/// Result type for dice operations
pub type DiceResult<T> = Result<T, DiceError>;

/// Maximum number of dice allowed in a single roll
pub const MAX_DICE_COUNT: u32 = 100;

/// Smallest die the engine accepts
pub const MIN_SIDES: u32 = 2;

/// Largest die the engine accepts
pub const MAX_SIDES: u32 = 1000;

// ============================================================================
// Dice Notation
// ============================================================================

/// Parsed dice notation with count, sides, and modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiceNotation {
    /// Number of dice to roll
    pub count: u32,
    /// Sides on each die
    pub sides: u32,
    /// Modifier to add/subtract after rolling
    pub modifier: i32,
}

impl DiceNotation {
    /// Create a validated notation
    pub fn new(count: u32, sides: u32, modifier: i32) -> DiceResult<Self> {
        check_count(u64::from(count))?;
        check_sides(u64::from(sides))?;
        Ok(Self {
            count,
            sides,
            modifier,
        })
    }

    /// Parse a dice notation string
    ///
    /// Supported formats:
    /// - "d20" -> 1d20
    /// - "2d6" -> 2d6
    /// - "3D8+5" -> 3d8+5
    /// - "d20-2" -> 1d20-2
    ///
    /// Leading/trailing whitespace is ignored, whitespace inside the notation
    /// is not.
    pub fn parse(notation: &str) -> DiceResult<Self> {
        let notation = notation.trim().to_lowercase();

        if notation.is_empty() {
            return Err(DiceError::EmptyNotation);
        }

        let invalid = || DiceError::InvalidNotation(notation.clone());

        let d_pos = notation.find('d').ok_or_else(invalid)?;

        // Count defaults to 1 when omitted
        let count_str = &notation[..d_pos];
        let count: u64 = if count_str.is_empty() {
            1
        } else if is_digits(count_str) {
            count_str.parse().unwrap_or(u64::MAX)
        } else {
            return Err(invalid());
        };

        let rest = &notation[d_pos + 1..];
        let (sides_str, modifier_str) = match rest.find(|c: char| c == '+' || c == '-') {
            Some(pos) => (&rest[..pos], Some(&rest[pos..])),
            None => (rest, None),
        };

        if !is_digits(sides_str) {
            return Err(invalid());
        }
        let sides: u64 = sides_str.parse().unwrap_or(u64::MAX);

        let modifier = match modifier_str {
            Some(raw) => {
                // Sign followed by at least one digit, nothing else
                if !is_digits(&raw[1..]) {
                    return Err(invalid());
                }
                raw.parse::<i32>().map_err(|_| DiceError::ModifierOverflow)?
            }
            None => 0,
        };

        let count = check_count(count)?;
        let sides = check_sides(sides)?;

        Ok(Self {
            count,
            sides,
            modifier,
        })
    }

    /// Get the minimum possible result
    pub fn min_result(&self) -> i64 {
        i64::from(self.count) + i64::from(self.modifier)
    }

    /// Get the maximum possible result
    pub fn max_result(&self) -> i64 {
        i64::from(self.count) * i64::from(self.sides) + i64::from(self.modifier)
    }

    /// Get the average expected result
    pub fn average_result(&self) -> f64 {
        let die_average = (1.0 + f64::from(self.sides)) / 2.0;
        f64::from(self.count) * die_average + f64::from(self.modifier)
    }

    /// Whether this notation is a single d20 (the only shape that can crit or fumble)
    pub fn is_single_d20(&self) -> bool {
        self.count == 1 && self.sides == 20
    }
}

impl fmt::Display for DiceNotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.modifier {
            0 => write!(f, "{}d{}", self.count, self.sides),
            m if m > 0 => write!(f, "{}d{}+{}", self.count, self.sides, m),
            m => write!(f, "{}d{}{}", self.count, self.sides, m),
        }
    }
}

impl std::str::FromStr for DiceNotation {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parse notation, returning `None` for anything malformed or out of range.
pub fn parse_notation(text: &str) -> Option<DiceNotation> {
    DiceNotation::parse(text).ok()
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn check_count(count: u64) -> DiceResult<u32> {
    if count == 0 || count > u64::from(MAX_DICE_COUNT) {
        return Err(DiceError::InvalidCount {
            max: MAX_DICE_COUNT,
            got: count,
        });
    }
    Ok(count as u32)
}

fn check_sides(sides: u64) -> DiceResult<u32> {
    if sides < u64::from(MIN_SIDES) || sides > u64::from(MAX_SIDES) {
        return Err(DiceError::InvalidSides {
            min: MIN_SIDES,
            max: MAX_SIDES,
            got: sides,
        });
    }
    Ok(sides as u32)
}

// ============================================================================
// Multiset Dice
// ============================================================================

/// One die in a multiset pool, with the colour tag it is displayed with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DieSpec {
    pub sides: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl DieSpec {
    /// A die with an explicit colour tag (or none)
    pub fn new(sides: u32, color: Option<String>) -> Self {
        Self { sides, color }
    }

    /// A die using the dashboard's colour for its size
    pub fn standard(sides: u32) -> Self {
        Self {
            sides,
            color: default_color(sides).map(String::from),
        }
    }
}

/// Display colour for the standard die sizes
pub fn default_color(sides: u32) -> Option<&'static str> {
    match sides {
        4 => Some("#e74c3c"),
        6 => Some("#e67e22"),
        8 => Some("#f1c40f"),
        10 => Some("#27ae60"),
        12 => Some("#3498db"),
        20 => Some("#9b59b6"),
        100 => Some("#e91e63"),
        _ => None,
    }
}

/// Grouped label for a pool, largest dice first: `3d6 + 1d4`
pub fn grouped_notation(dice: &[DieSpec]) -> String {
    let mut groups: BTreeMap<u32, usize> = BTreeMap::new();
    for die in dice {
        *groups.entry(die.sides).or_default() += 1;
    }

    groups
        .iter()
        .rev()
        .map(|(sides, count)| format!("{}d{}", count, sides))
        .collect::<Vec<_>>()
        .join(" + ")
}

// ============================================================================
// Roll Result Types
// ============================================================================

/// Result of a single die
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DieOutcome {
    /// Sides on the die that was rolled
    pub sides: u32,
    /// Face that came up
    pub value: u32,
    /// Display colour tag carried over from the pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// How a roll was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RollKind {
    /// Typed notation such as `2d6+3`
    Notation { count: u32, sides: u32 },
    /// Heterogeneous pool from the drop zone
    Multiset,
}

/// Complete result of a dice roll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    /// Display notation
    pub notation: String,
    pub kind: RollKind,
    /// Individual die results, in roll order
    pub dice: Vec<DieOutcome>,
    pub modifier: i32,
    /// Sum of all dice plus the modifier
    pub total: i64,
    pub is_critical: bool,
    pub is_fumble: bool,
}

impl RollResult {
    /// Sum of the dice before the modifier
    pub fn subtotal(&self) -> i64 {
        self.dice.iter().map(|d| i64::from(d.value)).sum()
    }

    /// Face values in roll order
    pub fn values(&self) -> Vec<u32> {
        self.dice.iter().map(|d| d.value).collect()
    }

    /// Breakdown text shown next to the total in the roll history.
    ///
    /// Multiset rolls list every die: `(5 + 2 + 1)`. Notation rolls list the
    /// dice and modifier when there is more than one die or a modifier:
    /// `[3+4]+2`. A bare single die has no breakdown.
    pub fn breakdown(&self) -> String {
        match self.kind {
            RollKind::Multiset => {
                let parts: Vec<String> = self.dice.iter().map(|d| d.value.to_string()).collect();
                format!("({})", parts.join(" + "))
            }
            RollKind::Notation { count, .. } => {
                if count <= 1 && self.modifier == 0 {
                    return String::new();
                }
                let parts: Vec<String> = self.dice.iter().map(|d| d.value.to_string()).collect();
                let modifier = match self.modifier {
                    0 => String::new(),
                    m if m > 0 => format!("+{}", m),
                    m => m.to_string(),
                };
                format!("[{}]{}", parts.join("+"), modifier)
            }
        }
    }
}

impl fmt::Display for RollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let breakdown = self.breakdown();
        if breakdown.is_empty() {
            write!(f, "{} = {}", self.notation, self.total)
        } else {
            write!(f, "{} {} = {}", self.notation, breakdown, self.total)
        }
    }
}

fn single_d20_flags(dice: &[DieOutcome]) -> (bool, bool) {
    match dice {
        [only] if only.sides == 20 => (only.value == 20, only.value == 1),
        _ => (false, false),
    }
}

// ============================================================================
// Dice Roller
// ============================================================================

/// Dice roller over an injectable RNG
///
/// `DiceRoller::seeded` gives reproducible sequences for tests and replays.
#[derive(Debug, Clone)]
pub struct DiceRoller<R = StdRng> {
    rng: R,
}

impl DiceRoller<StdRng> {
    /// Create a roller seeded from system entropy
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a roller with a fixed seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for DiceRoller<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> DiceRoller<R> {
    /// Roll with a specific RNG
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Roll one die, uniformly in `1..=sides`
    pub fn roll_die(&mut self, sides: u32) -> u32 {
        self.rng.gen_range(1..=sides.max(1))
    }

    /// Roll dice according to the notation
    pub fn roll(&mut self, notation: &DiceNotation) -> RollResult {
        self.roll_labelled(notation, notation.to_string())
    }

    /// Parse and roll. The result keeps the notation as it was typed.
    pub fn roll_notation(&mut self, text: &str) -> DiceResult<RollResult> {
        let parsed = DiceNotation::parse(text)?;
        Ok(self.roll_labelled(&parsed, text.trim().to_string()))
    }

    /// Roll every die in the pool independently, preserving pool order
    pub fn roll_multiset(&mut self, dice: &[DieSpec]) -> DiceResult<RollResult> {
        if dice.is_empty() {
            return Err(DiceError::EmptyPool);
        }
        check_count(dice.len() as u64)?;
        for die in dice {
            check_sides(u64::from(die.sides))?;
        }

        let outcomes: Vec<DieOutcome> = dice
            .iter()
            .map(|die| DieOutcome {
                sides: die.sides,
                value: self.roll_die(die.sides),
                color: die.color.clone(),
            })
            .collect();

        let total = outcomes.iter().map(|d| i64::from(d.value)).sum();
        let (is_critical, is_fumble) = single_d20_flags(&outcomes);

        Ok(RollResult {
            notation: grouped_notation(dice),
            kind: RollKind::Multiset,
            dice: outcomes,
            modifier: 0,
            total,
            is_critical,
            is_fumble,
        })
    }

    fn roll_labelled(&mut self, notation: &DiceNotation, label: String) -> RollResult {
        let mut dice = Vec::with_capacity(notation.count as usize);
        let mut subtotal: i64 = 0;

        for _ in 0..notation.count {
            let value = self.roll_die(notation.sides);
            subtotal += i64::from(value);
            dice.push(DieOutcome {
                sides: notation.sides,
                value,
                color: None,
            });
        }

        let (is_critical, is_fumble) = single_d20_flags(&dice);

        RollResult {
            notation: label,
            kind: RollKind::Notation {
                count: notation.count,
                sides: notation.sides,
            },
            dice,
            modifier: notation.modifier,
            total: subtotal + i64::from(notation.modifier),
            is_critical,
            is_fumble,
        }
    }
}

/// Roll one die with the thread-local RNG
pub fn roll_die(sides: u32) -> u32 {
    rand::thread_rng().gen_range(1..=sides.max(1))
}

/// Parse and roll notation with the thread-local RNG
pub fn roll_notation(text: &str) -> DiceResult<RollResult> {
    DiceRoller::with_rng(rand::thread_rng()).roll_notation(text)
}

/// Roll a multiset pool with the thread-local RNG
pub fn roll_multiset(dice: &[DieSpec]) -> DiceResult<RollResult> {
    DiceRoller::with_rng(rand::thread_rng()).roll_multiset(dice)
}

// ============================================================================
// Tests
// ============================================================================
