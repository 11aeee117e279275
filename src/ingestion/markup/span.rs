//! Inline tag tokenizer.
//!
//! Splits free text into literal runs and `{@name args}` spans. Spans nest
//! (`{@note see {@spell fireball}}`), so the scan is a recursive descent over
//! the bytes rather than a regex pass. Every opener must be closed; an
//! unclosed span is reported with its byte offset.
//!
//! Only ASCII delimiters (`{`, `@`, `}`, `|`) are inspected, so slicing at
//! the positions found is always on a UTF-8 boundary.

use std::ops::Range;

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

/// Nesting depth past which the tokenizer gives up.
pub const MAX_NESTING: usize = 64;

/// Parse failure for one text field.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
#[error("{reason}: '{{@{tag}' at byte {offset}")]
#[diagnostic(
    code(compendium::markup::unbalanced),
    help("close every tag with a matching brace")
)]
pub struct MarkupError {
    /// Name of the tag whose span could not be closed
    pub tag: String,
    /// Byte offset of the offending opener
    pub offset: usize,
    /// What went wrong
    pub reason: String,
    /// The full text being parsed
    #[source_code]
    pub text: String,
    /// Location of the opener within `text`
    #[label("opened here")]
    pub span: SourceSpan,
}

impl MarkupError {
    fn new(text: &str, tag: &str, offset: usize, reason: &str) -> Self {
        Self {
            tag: tag.to_string(),
            offset,
            reason: reason.to_string(),
            text: text.to_string(),
            span: (offset, 2 + tag.len()).into(),
        }
    }

    /// The text from the offending opener to the end of the field.
    pub fn offending_text(&self) -> &str {
        self.text.get(self.offset..).unwrap_or_default()
    }
}

/// One node of parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A literal run, passed through unchanged
    Text(String),
    /// A tag span
    Tag(TagSpan),
}

/// A parsed `{@name args}` span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpan {
    /// Tag name, e.g. `spell`
    pub name: String,
    /// Argument text exactly as written, nested spans included
    pub raw: String,
    /// Parsed argument content: literal runs and nested spans in order
    pub children: Vec<Segment>,
    /// Byte range of the whole span in the parsed text
    pub range: Range<usize>,
}

impl TagSpan {
    /// Split the children at top-level `|` separators.
    ///
    /// A `|` inside a nested span never splits. There is always at least one
    /// argument, possibly empty.
    pub fn arguments(&self) -> Vec<Vec<Segment>> {
        let mut args = vec![Vec::new()];
        for child in &self.children {
            match child {
                Segment::Text(text) => {
                    let mut pieces = text.split('|');
                    if let Some(first) = pieces.next() {
                        push_text(args.last_mut(), first);
                    }
                    for piece in pieces {
                        args.push(Vec::new());
                        push_text(args.last_mut(), piece);
                    }
                }
                Segment::Tag(span) => {
                    if let Some(current) = args.last_mut() {
                        current.push(Segment::Tag(span.clone()));
                    }
                }
            }
        }
        args
    }
}

fn push_text(target: Option<&mut Vec<Segment>>, text: &str) {
    if let Some(target) = target {
        if !text.is_empty() {
            target.push(Segment::Text(text.to_string()));
        }
    }
}

/// Parse `text` into segments.
pub fn parse(text: &str) -> Result<Vec<Segment>, MarkupError> {
    let mut parser = Parser {
        text,
        bytes: text.as_bytes(),
        pos: 0,
    };
    parser.segments(None, 0)
}

struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

/// The span currently being filled, for error reporting.
struct Open<'a> {
    tag: &'a str,
    offset: usize,
}

impl<'a> Parser<'a> {
    /// Parse until end of input (top level) or the closing brace of `open`.
    fn segments(&mut self, open: Option<Open<'a>>, depth: usize) -> Result<Vec<Segment>, MarkupError> {
        let mut segments = Vec::new();
        let mut literal_start = self.pos;

        while self.pos < self.bytes.len() {
            let byte = self.bytes[self.pos];

            if byte == b'{' && self.bytes.get(self.pos + 1) == Some(&b'@') {
                let name_end = self.scan_name(self.pos + 2);
                if name_end == self.pos + 2 {
                    // "{@" without a tag name is literal text
                    self.pos += 2;
                    continue;
                }

                flush(&mut segments, &self.text[literal_start..self.pos]);
                let span = self.tag(name_end, depth)?;
                segments.push(Segment::Tag(span));
                literal_start = self.pos;
                continue;
            }

            if byte == b'}' && open.is_some() {
                flush(&mut segments, &self.text[literal_start..self.pos]);
                self.pos += 1;
                return Ok(segments);
            }

            self.pos += 1;
        }

        if let Some(open) = open {
            return Err(MarkupError::new(
                self.text,
                open.tag,
                open.offset,
                "unclosed tag",
            ));
        }

        flush(&mut segments, &self.text[literal_start..]);
        Ok(segments)
    }

    fn scan_name(&self, from: usize) -> usize {
        let mut end = from;
        while end < self.bytes.len()
            && (self.bytes[end].is_ascii_alphanumeric() || matches!(self.bytes[end], b'_' | b'-'))
        {
            end += 1;
        }
        end
    }

    /// Parse one span whose opener is at `self.pos` and whose name ends at `name_end`.
    fn tag(&mut self, name_end: usize, depth: usize) -> Result<TagSpan, MarkupError> {
        let text = self.text;
        let start = self.pos;
        let name = &text[start + 2..name_end];

        if depth >= MAX_NESTING {
            return Err(MarkupError::new(text, name, start, "tags nested too deeply"));
        }

        // A single separating space is not part of the arguments
        self.pos = name_end;
        if self.bytes.get(self.pos) == Some(&b' ') {
            self.pos += 1;
        }
        let content_start = self.pos;

        let children = self.segments(
            Some(Open {
                tag: name,
                offset: start,
            }),
            depth + 1,
        )?;

        Ok(TagSpan {
            name: name.to_string(),
            raw: text[content_start..self.pos - 1].to_string(),
            children,
            range: start..self.pos,
        })
    }
}

fn flush(segments: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Segment::Text(previous)) = segments.last_mut() {
        previous.push_str(text);
    } else {
        segments.push(Segment::Text(text.to_string()));
    }
}
