//! Inline tag markup (`{@tag ...}`) expansion.
//!
//! - [`span`]: recursive-descent tokenizer producing [`Segment`] trees
//! - [`expander`]: innermost-first expansion through a [`TagEmitter`]
//! - [`emitter`]: the default Markdown tag table
//! - [`dice`]: dice notation shared by tag rendering and placeholders

pub mod dice;
pub mod emitter;
pub mod expander;
pub mod span;

pub use dice::{DiceExpression, DiceFormula};
pub use emitter::{LinkResolver, MarkdownEmitter};
pub use expander::{Expansion, TagEmitter, TagExpander, FOOTNOTE_TAG};
pub use span::{parse, MarkupError, Segment, TagSpan, MAX_NESTING};
