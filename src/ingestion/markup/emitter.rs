//! Default Markdown tag table.
//!
//! Maps tag names to output transforms for the [`TagExpander`](super::TagExpander).
//! Reference tags (`{@spell fireball|PHB|text}`) become Markdown links when a
//! [`LinkResolver`] knows the target, and plain text otherwise.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::dice::DiceFormula;
use super::expander::TagEmitter;
use crate::core::compendium::types::IndexKey;

/// Resolves a reference key to a link target.
pub trait LinkResolver {
    /// Link target for `key`, or `None` when the key should render as plain text.
    fn resolve_link(&self, key: &IndexKey) -> Option<String>;
}

/// Output transform for one tag name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagRule {
    /// Surround the first argument with a delimiter
    Wrap(&'static str),
    Code,
    /// Dice notation, shown as the display argument or the expression
    Dice,
    /// The last argument of a scaling expression
    ScaleDice,
    /// Signed attack bonus
    Signed,
    Dc,
    Chance,
    Recharge,
    Attack,
    HitLabel,
    Reference {
        content_type: &'static str,
        default_source: &'static str,
    },
    Link,
    /// The first argument as plain text
    Label,
}

const fn reference(content_type: &'static str, default_source: &'static str) -> TagRule {
    TagRule::Reference {
        content_type,
        default_source,
    }
}

static RULES: Lazy<HashMap<&'static str, TagRule>> = Lazy::new(|| {
    HashMap::from([
        ("b", TagRule::Wrap("**")),
        ("bold", TagRule::Wrap("**")),
        ("i", TagRule::Wrap("*")),
        ("italic", TagRule::Wrap("*")),
        ("s", TagRule::Wrap("~~")),
        ("strike", TagRule::Wrap("~~")),
        ("u", TagRule::Wrap("_")),
        ("underline", TagRule::Wrap("_")),
        ("code", TagRule::Code),
        ("dice", TagRule::Dice),
        ("damage", TagRule::Dice),
        ("autodice", TagRule::Dice),
        ("scaledice", TagRule::ScaleDice),
        ("scaledamage", TagRule::ScaleDice),
        ("d20", TagRule::Signed),
        ("hit", TagRule::Signed),
        ("dc", TagRule::Dc),
        ("chance", TagRule::Chance),
        ("recharge", TagRule::Recharge),
        ("atk", TagRule::Attack),
        ("h", TagRule::HitLabel),
        ("spell", reference("spell", "PHB")),
        ("background", reference("background", "PHB")),
        ("race", reference("race", "PHB")),
        ("feat", reference("feat", "PHB")),
        ("class", reference("class", "PHB")),
        ("condition", reference("condition", "PHB")),
        ("skill", reference("skill", "PHB")),
        ("sense", reference("sense", "PHB")),
        ("action", reference("action", "PHB")),
        ("language", reference("language", "PHB")),
        ("deity", reference("deity", "PHB")),
        ("optfeature", reference("optionalfeature", "PHB")),
        ("creature", reference("monster", "MM")),
        ("item", reference("item", "DMG")),
        ("disease", reference("disease", "DMG")),
        ("object", reference("object", "DMG")),
        ("trap", reference("trap", "DMG")),
        ("hazard", reference("hazard", "DMG")),
        ("reward", reference("reward", "DMG")),
        ("table", reference("table", "DMG")),
        ("variantrule", reference("variantrule", "DMG")),
        ("link", TagRule::Link),
        ("filter", TagRule::Label),
        ("book", TagRule::Label),
        ("adventure", TagRule::Label),
        ("quickref", TagRule::Label),
        ("note", TagRule::Label),
    ])
});

/// Renders tags as Markdown.
#[derive(Default, Clone, Copy)]
pub struct MarkdownEmitter<'a> {
    resolver: Option<&'a dyn LinkResolver>,
}

impl<'a> MarkdownEmitter<'a> {
    /// Emitter that renders every reference as plain text.
    pub fn new() -> Self {
        Self { resolver: None }
    }

    /// Emitter that links references `resolver` knows about.
    pub fn with_resolver(resolver: &'a dyn LinkResolver) -> Self {
        Self {
            resolver: Some(resolver),
        }
    }

    /// Whether `tag` has a rule in the default table.
    pub fn knows(tag: &str) -> bool {
        RULES.contains_key(tag.to_ascii_lowercase().as_str())
    }

    fn render(&self, rule: TagRule, args: &[String]) -> String {
        let first = arg(args, 0);

        match rule {
            TagRule::Wrap(delimiter) => format!("{delimiter}{first}{delimiter}"),
            TagRule::Code => format!("`{first}`"),
            TagRule::Dice => display_or(args, 1, || {
                DiceFormula::parse(first)
                    .map(|formula| formula.to_string())
                    .unwrap_or_else(|| first.to_string())
            }),
            TagRule::ScaleDice => args.last().cloned().unwrap_or_default(),
            TagRule::Signed => display_or(args, 1, || match first.trim().parse::<i64>() {
                Ok(bonus) => format!("{:+}", bonus),
                Err(_) => first.to_string(),
            }),
            TagRule::Dc => display_or(args, 1, || format!("DC {}", first.trim())),
            TagRule::Chance => display_or(args, 1, || format!("{} percent", first.trim())),
            TagRule::Recharge => match first.trim() {
                "" | "6" => "(Recharge 6)".to_string(),
                from => format!("(Recharge {}-6)", from),
            },
            TagRule::Attack => format!("*{}:*", attack_label(first)),
            TagRule::HitLabel => "*Hit:* ".to_string(),
            TagRule::Reference {
                content_type,
                default_source,
            } => self.reference(args, content_type, default_source),
            TagRule::Link => match args.get(1).filter(|url| !url.trim().is_empty()) {
                Some(url) => format!("[{}]({})", first, url.trim()),
                None => first.to_string(),
            },
            TagRule::Label => first.to_string(),
        }
    }

    fn reference(&self, args: &[String], content_type: &str, default_source: &str) -> String {
        let name = arg(args, 0).trim();
        let display = display_or(args, 2, || name.to_string());

        let source = match arg(args, 1).trim() {
            "" => default_source,
            source => source,
        };
        let key = IndexKey::new(name, content_type, source);

        match self.resolver.and_then(|resolver| resolver.resolve_link(&key)) {
            Some(target) => format!("[{}]({})", display, target),
            None => display,
        }
    }
}

impl TagEmitter for MarkdownEmitter<'_> {
    fn emit(&mut self, tag: &str, args: &[String]) -> Option<String> {
        let rule = *RULES.get(tag.to_ascii_lowercase().as_str())?;
        Some(self.render(rule, args))
    }
}

fn arg(args: &[String], index: usize) -> &str {
    args.get(index).map(String::as_str).unwrap_or_default()
}

/// The display argument at `index` when present, else `fallback()`.
fn display_or(args: &[String], index: usize, fallback: impl FnOnce() -> String) -> String {
    match args.get(index).map(|s| s.trim()) {
        Some(display) if !display.is_empty() => display.to_string(),
        _ => fallback(),
    }
}

/// `mw` → `Melee Weapon Attack`, `mw,rw` → `Melee or Ranged Weapon Attack`.
fn attack_label(codes: &str) -> String {
    let codes: Vec<&str> = codes.split(',').map(str::trim).collect();
    let range = |code: &str| -> &'static str {
        match code.chars().next() {
            Some('m') => "Melee",
            Some('r') => "Ranged",
            _ => "",
        }
    };
    let kind = if codes.iter().any(|c| c.ends_with('s')) {
        "Spell"
    } else {
        "Weapon"
    };

    let ranges: Vec<&str> = codes
        .iter()
        .copied()
        .map(range)
        .filter(|r| !r.is_empty())
        .collect();
    if ranges.is_empty() {
        return format!("{} Attack", kind);
    }
    format!("{} {} Attack", ranges.join(" or "), kind)
}
