//! Tag Expander
//!
//! Expands `{@tag ...}` spans in free text through a [`TagEmitter`]
//! callback. Nested spans are rendered innermost-first, so a callback always
//! receives fully expanded argument strings.
//!
//! # Degradation
//!
//! - A tag the emitter does not recognize loses its `{@name ...}` wrapper but
//!   keeps its inner text, and a warning is logged.
//! - `{@footnote visible|annotation}` is handled here rather than by the
//!   emitter: the visible text gets a `[^n]` marker and the annotation is
//!   collected on the [`Expansion`].
//!
//! # Example
//!
//! ```rust
//! use compendium::ingestion::markup::TagExpander;
//!
//! let expander = TagExpander::new();
//! let mut emit = |tag: &str, args: &[String]| match tag {
//!     "b" => Some(format!("**{}**", args[0])),
//!     _ => None,
//! };
//! let text = expander.expand("A {@b bold {@unknown move}}.", &mut emit).unwrap();
//! assert_eq!(text, "A **bold move**.");
//! ```

use tracing::warn;

use super::span::{parse, MarkupError, Segment, TagSpan};

/// Tag name handled by the expander itself.
pub const FOOTNOTE_TAG: &str = "footnote";

/// Renders one tag from its name and expanded arguments.
///
/// Returning `None` means the tag is not recognized.
pub trait TagEmitter {
    fn emit(&mut self, tag: &str, args: &[String]) -> Option<String>;
}

impl<F> TagEmitter for F
where
    F: FnMut(&str, &[String]) -> Option<String>,
{
    fn emit(&mut self, tag: &str, args: &[String]) -> Option<String> {
        self(tag, args)
    }
}

/// Result of expanding one or more text fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expansion {
    /// Expanded text of the most recent field
    pub text: String,
    /// Footnote annotations, numbered from 1 in order of appearance
    pub footnotes: Vec<String>,
    /// Tag names that had no renderer
    pub unknown_tags: Vec<String>,
}

/// Stateless expander; all per-run state lives in [`Expansion`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TagExpander;

impl TagExpander {
    pub fn new() -> Self {
        Self
    }

    /// Expand `text`, discarding footnote annotations.
    pub fn expand(&self, text: &str, emitter: &mut dyn TagEmitter) -> Result<String, MarkupError> {
        Ok(self.expand_full(text, emitter)?.text)
    }

    /// Expand `text`, returning footnotes and unknown tags alongside the text.
    pub fn expand_full(
        &self,
        text: &str,
        emitter: &mut dyn TagEmitter,
    ) -> Result<Expansion, MarkupError> {
        let mut expansion = Expansion::default();
        expansion.text = self.expand_into(text, emitter, &mut expansion)?;
        Ok(expansion)
    }

    /// Expand `text`, appending footnotes and unknown tags to `expansion`.
    ///
    /// Sharing one `Expansion` across the fields of an entity keeps footnote
    /// numbering continuous.
    pub fn expand_into(
        &self,
        text: &str,
        emitter: &mut dyn TagEmitter,
        expansion: &mut Expansion,
    ) -> Result<String, MarkupError> {
        if !text.contains("{@") {
            return Ok(text.to_string());
        }
        let segments = parse(text)?;
        Ok(self.render(&segments, emitter, expansion))
    }

    fn render(
        &self,
        segments: &[Segment],
        emitter: &mut dyn TagEmitter,
        expansion: &mut Expansion,
    ) -> String {
        let mut out = String::new();
        for segment in segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Tag(span) => {
                    let rendered = self.render_tag(span, emitter, expansion);
                    out.push_str(&rendered);
                }
            }
        }
        out
    }

    fn render_tag(
        &self,
        span: &TagSpan,
        emitter: &mut dyn TagEmitter,
        expansion: &mut Expansion,
    ) -> String {
        let args: Vec<String> = span
            .arguments()
            .iter()
            .map(|arg| self.render(arg, emitter, expansion))
            .collect();

        if span.name == FOOTNOTE_TAG {
            let visible = args.first().map(String::as_str).unwrap_or_default();
            let Some(annotation) = args.get(1) else {
                return visible.to_string();
            };
            expansion.footnotes.push(annotation.clone());
            return format!("{}[^{}]", visible, expansion.footnotes.len());
        }

        match emitter.emit(&span.name, &args) {
            Some(rendered) => rendered,
            None => {
                warn!(tag = %span.name, raw = %span.raw, "Unknown tag, keeping inner text");
                if !expansion.unknown_tags.contains(&span.name) {
                    expansion.unknown_tags.push(span.name.clone());
                }
                args.join("|")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold_only(tag: &str, args: &[String]) -> Option<String> {
        match tag {
            "b" => Some(format!("**{}**", args.join(""))),
            "dice" => Some(args[0].clone()),
            _ => None,
        }
    }

    #[test]
    fn test_passthrough_without_tags() {
        let expander = TagExpander::new();
        let text = "Plain {text} with braces";
        assert_eq!(expander.expand(text, &mut bold_only).unwrap(), text);
    }

    #[test]
    fn test_innermost_first() {
        let expander = TagExpander::new();
        let mut seen = Vec::new();
        let mut emit = |tag: &str, args: &[String]| {
            seen.push(format!("{}:{}", tag, args.join("|")));
            Some(format!("<{}>", args.join("|")))
        };
        let text = expander.expand("{@outer a {@inner b|c} d|e}", &mut emit).unwrap();
        assert_eq!(text, "<a <b|c> d|e>");
        assert_eq!(seen, vec!["inner:b|c", "outer:a <b|c> d|e"]);
    }

    #[test]
    fn test_unknown_tag_keeps_inner_text() {
        let expander = TagExpander::new();
        let expansion = expander
            .expand_full("See {@filter all spells|spells|level=1}.", &mut bold_only)
            .unwrap();
        assert_eq!(expansion.text, "See all spells|spells|level=1.");
        assert_eq!(expansion.unknown_tags, vec!["filter"]);
    }

    #[test]
    fn test_footnote_collected() {
        let expander = TagExpander::new();
        let expansion = expander
            .expand_full(
                "Heavy{@footnote  armor|Roll {@dice 1d4} extra}. Light{@footnote |second}",
                &mut bold_only,
            )
            .unwrap();
        assert_eq!(expansion.text, "Heavy armor[^1]. Light[^2]");
        assert_eq!(expansion.footnotes, vec!["Roll 1d4 extra", "second"]);
    }

    #[test]
    fn test_footnote_numbering_continues_across_fields() {
        let expander = TagExpander::new();
        let mut expansion = Expansion::default();
        let first = expander
            .expand_into("a{@footnote x|one}", &mut bold_only, &mut expansion)
            .unwrap();
        let second = expander
            .expand_into("b{@footnote y|two}", &mut bold_only, &mut expansion)
            .unwrap();
        assert_eq!(first, "ax[^1]");
        assert_eq!(second, "by[^2]");
        assert_eq!(expansion.footnotes.len(), 2);
    }

    #[test]
    fn test_footnote_without_annotation() {
        let expander = TagExpander::new();
        assert_eq!(
            expander.expand("{@footnote just text}", &mut bold_only).unwrap(),
            "just text"
        );
    }

    #[test]
    fn test_unbalanced_is_error() {
        let expander = TagExpander::new();
        let err = expander.expand("{@b never closed", &mut bold_only).unwrap_err();
        assert_eq!(err.tag, "b");
    }

    #[test]
    fn test_expansion_is_idempotent() {
        let expander = TagExpander::new();
        let once = expander
            .expand("{@b x} and {@dice 2d6} and {@mystery y}", &mut bold_only)
            .unwrap();
        let twice = expander.expand(&once, &mut bold_only).unwrap();
        assert_eq!(once, twice);
    }
}
