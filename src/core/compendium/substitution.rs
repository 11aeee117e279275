//! Text substitutions applied to a merged copy.
//!
//! Two passes run over every string leaf of a copy's merged tree:
//!
//! 1. Whole-record `replaceTxt` rules from `_mod["*"]`.
//! 2. `<$name__expr$>` placeholders, evaluated against the entity's own
//!    ability scores and challenge rating.
//!
//! | Placeholder | Output |
//! |-------------|--------|
//! | `<$to_hit__str$>` | signed bonus, proficiency included: `+4` |
//! | `<$damage_mod__str$>` | ` + 2`, ` - 1`, or nothing for zero |
//! | `<$damage_avg__1d6+str$>` | mean of the expression, rounded down: `5` |
//! | `<$spell_dc__wis$>` | `8 + proficiency + modifier` |
//! | `<$name$>`, `<$short_name$>`, `<$title_short_name$>` | the entity's name forms |
//!
//! Unknown placeholders, and expressions that reference a missing score, are
//! left in the text and logged.

use once_cell::sync::Lazy;
use regex::{Captures, Regex, RegexBuilder};
use serde_json::Value;
use tracing::warn;

use super::types::TextReplace;
use crate::core::document::{as_integer, is_truthy, DocumentExt};
use crate::ingestion::markup::dice::{split_signed_terms, DiceExpression};

/// Ability score mnemonics, in sheet order.
pub const ABILITIES: [&str; 6] = ["str", "dex", "con", "int", "wis", "cha"];

/// `<$name$>` or `<$name__expr$>`
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<\$(?P<name>[a-z]+(?:_[a-z]+)*)(?:__(?P<expr>[^$]*))?\$>")
        .expect("Failed to compile placeholder regex")
});

// ============================================================================
// Game arithmetic
// ============================================================================

/// `floor((score - 10) / 2)`
pub fn ability_modifier(score: i64) -> i64 {
    score.saturating_sub(10).div_euclid(2)
}

/// Proficiency bonus for a challenge rating; CR below 1 counts as 1.
pub fn proficiency_bonus(cr: f64) -> i64 {
    2i64.saturating_add(((cr.max(1.0) - 1.0) / 4.0).floor() as i64)
}

/// Read `cr` from a creature tree: `"5"`, `"1/2"`, `3`, or `{"cr": "5", ..}`.
pub fn challenge_rating(tree: &Value) -> Option<f64> {
    let cr = match tree.get("cr")? {
        Value::Object(map) => map.get("cr")?,
        other => other,
    };
    match cr {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.trim().split_once('/') {
            Some((numerator, denominator)) => {
                let numerator: f64 = numerator.trim().parse().ok()?;
                let denominator: f64 = denominator.trim().parse().ok()?;
                (denominator != 0.0).then(|| numerator / denominator)
            }
            None => s.trim().parse().ok(),
        },
        _ => None,
    }
}

// ============================================================================
// Placeholders
// ============================================================================

/// Values a placeholder can draw on, captured before the tree is mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceholderContext {
    pub name: String,
    pub short_name: String,
    /// Scores in [`ABILITIES`] order
    pub scores: [Option<i64>; 6],
    /// Zero when the tree has no `cr`
    pub proficiency: i64,
}

impl PlaceholderContext {
    pub fn from_tree(name: &str, tree: &Value) -> Self {
        let scores = ABILITIES.map(|ability| tree.get(ability).and_then(as_integer));
        let proficiency = challenge_rating(tree).map(proficiency_bonus).unwrap_or(0);

        let short_name = match tree.get("shortName") {
            Some(Value::String(short)) => short.clone(),
            _ if is_truthy(tree.get("isNamedCreature")) => {
                name.split_whitespace().next().unwrap_or(name).to_string()
            }
            _ => format!("the {}", name.to_lowercase()),
        };

        Self {
            name: name.to_string(),
            short_name,
            scores,
            proficiency,
        }
    }

    /// Modifier for an ability mnemonic, if the tree has that score.
    pub fn modifier(&self, ability: &str) -> Option<i64> {
        let index = ABILITIES.iter().position(|a| *a == ability)?;
        self.scores[index].map(ability_modifier)
    }

    /// Render one placeholder; `None` leaves it in the text.
    pub fn render(&self, name: &str, expr: Option<&str>) -> Option<String> {
        match (name, expr) {
            ("name", None) => Some(self.name.clone()),
            ("short_name", None) => Some(self.short_name.clone()),
            ("title_short_name", None) => Some(title_case_first(&self.short_name)),
            ("to_hit", Some(expr)) => {
                let total = (self.evaluate(expr, false)?.floor() as i64).saturating_add(self.proficiency);
                Some(format!("{:+}", total))
            }
            ("damage_mod", Some(expr)) => {
                let total = self.evaluate(expr, false)?.floor() as i64;
                Some(match total {
                    0 => String::new(),
                    t if t > 0 => format!(" + {}", t),
                    t => format!(" - {}", t.unsigned_abs()),
                })
            }
            ("damage_avg", Some(expr)) => {
                Some((self.evaluate(expr, true)?.floor() as i64).to_string())
            }
            ("spell_dc", Some(expr)) => {
                let total = 8i64
                    .saturating_add(self.proficiency)
                    .saturating_add(self.evaluate(expr, false)?.floor() as i64);
                Some(total.to_string())
            }
            _ => None,
        }
    }

    /// Evaluate a `+`/`-` sum of ability mnemonics and numbers; dice terms
    /// count as their average when `allow_dice` is set.
    fn evaluate(&self, expr: &str, allow_dice: bool) -> Option<f64> {
        let compact: String = expr
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        if compact.is_empty() {
            return None;
        }

        let mut total = 0.0;
        for (negated, term) in split_signed_terms(&compact)? {
            let value = if ABILITIES.contains(&term) {
                self.modifier(term)? as f64
            } else if let Ok(number) = term.parse::<f64>() {
                number
            } else if allow_dice {
                DiceExpression::parse(term)?.average_roll()
            } else {
                return None;
            };
            total += if negated { -value } else { value };
        }
        Some(total)
    }
}

fn title_case_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Replace every placeholder in `text`. Returns how many were left unresolved.
pub fn render_text(text: &mut String, context: &PlaceholderContext) -> usize {
    if !text.contains("<$") {
        return 0;
    }

    let mut unresolved = 0;
    let rendered = PLACEHOLDER.replace_all(text, |caps: &Captures<'_>| {
        let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
        let name = caps.name("name").map(|m| m.as_str()).unwrap_or_default();
        let expr = caps.name("expr").map(|m| m.as_str());
        match context.render(name, expr) {
            Some(value) => value,
            None => {
                warn!(placeholder = whole, entity = %context.name, "Unresolved placeholder");
                unresolved += 1;
                whole.to_string()
            }
        }
    });
    let rendered = rendered.into_owned();
    *text = rendered;
    unresolved
}

/// Render placeholders in every string leaf of `tree`.
pub fn render_placeholders(tree: &mut Value, context: &PlaceholderContext) -> usize {
    let mut unresolved = 0;
    tree.for_each_string_mut(&mut |text| unresolved += render_text(text, context));
    unresolved
}

// ============================================================================
// replaceTxt
// ============================================================================

/// Members never rewritten by whole-record text replacement.
const IDENTITY_MEMBERS: &[&str] = &["name", "source"];

/// Compile a `replaceTxt` rule; the `i` flag makes it case-insensitive.
pub fn compile(replace: &TextReplace) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&replace.replace)
        .case_insensitive(replace.flags.contains('i'))
        .build()
}

/// Apply a compiled rule to every string leaf of `value`.
pub fn replace_in(value: &mut Value, pattern: &Regex, with: &str) {
    value.for_each_string_mut(&mut |text| {
        if pattern.is_match(text) {
            *text = pattern.replace_all(text, with).into_owned();
        }
    });
}

/// Apply whole-record rules in order, skipping identity and `_`-prefixed members.
pub fn apply_text_replacements(
    tree: &mut Value,
    replacements: &[TextReplace],
) -> Result<(), regex::Error> {
    let Some(object) = tree.as_object_mut() else {
        return Ok(());
    };

    for replace in replacements {
        let pattern = compile(replace)?;
        for (member, value) in object.iter_mut() {
            if IDENTITY_MEMBERS.contains(&member.as_str()) || member.starts_with('_') {
                continue;
            }
            replace_in(value, &pattern, &replace.with);
        }
    }
    Ok(())
}
