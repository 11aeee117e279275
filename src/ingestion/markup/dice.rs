//! Dice Notation
//!
//! Parses dice notation (`2d6+3`, `d20`, `1d%`) as it appears in tag
//! arguments (`{@dice 1d8}`, `{@damage 2d6 + 1d4}`) and in `damage_avg`
//! placeholder expressions.
//!
//! # Example
//!
//! ```rust
//! use compendium::ingestion::markup::dice::DiceFormula;
//!
//! let formula = DiceFormula::parse("2d6 + 1d4 + 3").unwrap();
//! assert_eq!(formula.average(), 12.5);
//! assert_eq!(formula.to_string(), "2d6+1d4+3");
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// A single dice term (e.g., "2d6+3").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    /// Number of dice to roll (e.g., 2 in "2d6")
    pub count: u32,
    /// Number of sides on each die (e.g., 6 in "2d6")
    pub sides: u32,
    /// Modifier to add/subtract (e.g., 3 in "2d6+3", -1 in "1d4-1")
    pub modifier: i32,
    /// The original matched text
    pub raw_text: String,
}

impl DiceExpression {
    pub fn new(count: u32, sides: u32, modifier: i32, raw_text: String) -> Self {
        Self {
            count,
            sides,
            modifier,
            raw_text,
        }
    }

    /// Parse a whole string as a single dice expression.
    ///
    /// Returns `None` unless the entire (trimmed) input is dice notation
    /// whose numbers fit their fields.
    pub fn parse(text: &str) -> Option<Self> {
        let caps = DICE_EXACT_PATTERN.captures(text.trim())?;
        Self::from_captures(&caps)
    }

    fn from_captures(caps: &regex::Captures<'_>) -> Option<Self> {
        let raw_text = caps.get(0)?.as_str().to_string();

        let count: u32 = match caps.name("count") {
            Some(m) => m.as_str().parse().ok()?,
            None => 1,
        };

        // % means d100
        let sides: u32 = match caps.name("sides")?.as_str() {
            "%" => 100,
            digits => digits.parse().ok()?,
        };

        let modifier: i32 = match (caps.name("mod_sign"), caps.name("modifier")) {
            (Some(sign), Some(value)) => {
                let val: i32 = value.as_str().parse().ok()?;
                if sign.as_str() == "+" {
                    val
                } else {
                    -val
                }
            }
            _ => 0,
        };

        Some(Self::new(count, sides, modifier, raw_text))
    }

    pub fn average_roll(&self) -> f64 {
        let avg_per_die = (1.0 + self.sides as f64) / 2.0;
        (self.count as f64 * avg_per_die) + self.modifier as f64
    }

    /// Format as canonical dice notation (e.g., "2d6+3").
    pub fn to_canonical(&self) -> String {
        let base = format!("{}d{}", self.count, self.sides);
        match self.modifier {
            0 => base,
            m if m > 0 => format!("{}+{}", base, m),
            m => format!("{}{}", base, m),
        }
    }
}

impl std::fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_canonical())
    }
}

/// A sum of dice terms and flat numbers (e.g., "2d6 + 1d4 - 1").
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiceFormula {
    /// Dice terms, paired with whether the term is subtracted
    pub terms: Vec<(bool, DiceExpression)>,
    /// Sum of flat numeric terms
    pub flat: i32,
}

impl DiceFormula {
    /// Parse a `+`/`-` separated sum of dice terms and integers.
    ///
    /// Returns `None` if any term is neither dice notation nor an integer,
    /// or if the flat terms overflow.
    pub fn parse(text: &str) -> Option<Self> {
        let mut formula = Self::default();
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return None;
        }

        for (negated, term) in split_signed_terms(&compact)? {
            if let Some(dice) = DiceExpression::parse(term) {
                formula.terms.push((negated, dice));
            } else {
                let value: i32 = term.parse().ok()?;
                formula.flat = if negated {
                    formula.flat.checked_sub(value)?
                } else {
                    formula.flat.checked_add(value)?
                };
            }
        }
        Some(formula)
    }

    pub fn average(&self) -> f64 {
        let dice: f64 = self
            .terms
            .iter()
            .map(|(negated, d)| if *negated { -d.average_roll() } else { d.average_roll() })
            .sum();
        dice + self.flat as f64
    }
}

impl std::fmt::Display for DiceFormula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (negated, dice) in &self.terms {
            match (first, negated) {
                (true, false) => {}
                (true, true) | (false, true) => f.write_str("-")?,
                (false, false) => f.write_str("+")?,
            }
            write!(f, "{}", dice)?;
            first = false;
        }
        if self.flat != 0 || first {
            if self.flat >= 0 && !first {
                f.write_str("+")?;
            }
            write!(f, "{}", self.flat)?;
        }
        Ok(())
    }
}

/// Split a whitespace-free sum into `(negated, term)` pairs.
///
/// Splits on every sign, so `1d8-1` becomes a dice term and a flat term.
pub(crate) fn split_signed_terms(compact: &str) -> Option<Vec<(bool, &str)>> {
    let mut terms = Vec::new();
    let mut negated = false;
    let mut start = 0;

    for (i, c) in compact.char_indices() {
        if c == '+' || c == '-' {
            if i == start {
                if i != 0 {
                    return None;
                }
                negated = c == '-';
                start = i + 1;
                continue;
            }
            terms.push((negated, &compact[start..i]));
            negated = c == '-';
            start = i + 1;
        }
    }
    if start >= compact.len() {
        return None;
    }
    terms.push((negated, &compact[start..]));
    Some(terms)
}

// ============================================================================
// Regex Patterns
// ============================================================================

/// A whole string that is exactly one dice expression.
static DICE_EXACT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?P<count>\d+)?d(?P<sides>\d+|%)(?:\s*(?P<mod_sign>[+\-])\s*(?P<modifier>\d+))?$")
        .expect("Failed to compile exact dice regex")
});
