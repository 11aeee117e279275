//! Document Model helpers.
//!
//! Content records are held as [`serde_json::Value`] trees (built with the
//! `preserve_order` feature so object members keep their declaration order).
//! This module adds JSON-pointer addressed mutation on top of the tagged
//! variant: insert, replace and remove at a path, plus a visitor over every
//! string leaf.
//!
//! Paths follow RFC 6901 (`/entries/0/name`, with `~1` for `/` and `~0` for
//! `~`). The leading `/` is optional, so `bonusWeapon` and `/bonusWeapon`
//! address the same member.
//!
//! # Example
//!
//! ```rust
//! use compendium::core::document::DocumentExt;
//! use serde_json::json;
//!
//! let mut doc = json!({"entries": ["a", "c"]});
//! doc.pointer_insert("/entries/1", json!("b")).unwrap();
//! assert_eq!(doc["entries"], json!(["a", "b", "c"]));
//! ```

use serde_json::Value;
use thiserror::Error;

/// Alias used throughout the engine for a content tree.
pub type Document = Value;

/// Errors raised by pointer-addressed mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PointerError {
    /// The empty path addresses the whole document, which cannot be edited in place.
    #[error("empty pointer path cannot be edited")]
    EmptyPath,

    /// An intermediate segment of the path does not exist.
    #[error("parent of '{path}' does not exist")]
    MissingParent { path: String },

    /// The parent exists but is a scalar.
    #[error("parent of '{path}' is not an object or array")]
    NotAContainer { path: String },

    /// An array segment is not a valid index.
    #[error("'{token}' is not a valid array index in '{path}'")]
    InvalidIndex { path: String, token: String },

    /// An array index is past the end of the array.
    #[error("index {index} out of bounds (len {len}) in '{path}'")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },
}

/// Split a pointer into unescaped reference tokens.
///
/// An empty path (or a lone `/`) yields no tokens.
pub fn parse_pointer(path: &str) -> Vec<String> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed
        .split('/')
        .map(|token| token.replace("~1", "/").replace("~0", "~"))
        .collect()
}

fn parse_index(path: &str, token: &str) -> Result<usize, PointerError> {
    token.parse::<usize>().map_err(|_| PointerError::InvalidIndex {
        path: path.to_string(),
        token: token.to_string(),
    })
}

/// Walk `tokens` down from `root`, returning the addressed node mutably.
fn walk_mut<'a>(root: &'a mut Value, tokens: &[String]) -> Option<&'a mut Value> {
    let mut current = root;
    for token in tokens {
        current = match current {
            Value::Object(map) => map.get_mut(token.as_str())?,
            Value::Array(items) => {
                let index = token.parse::<usize>().ok()?;
                items.get_mut(index)?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Pointer navigation and mutation over a content tree.
pub trait DocumentExt {
    /// Get the node at `path`. The leading `/` is optional.
    fn pointer_get(&self, path: &str) -> Option<&Value>;

    /// Insert `value` at `path`.
    ///
    /// - If the parent is an array, the last token is an insertion index
    ///   (`-` or `len` appends), even when the addressed item is itself an array.
    /// - If the parent is an object and the member is an array, `value` is
    ///   appended to it.
    /// - Otherwise the object member is set.
    fn pointer_insert(&mut self, path: &str, value: Value) -> Result<(), PointerError>;

    /// Overwrite the node at `path`.
    ///
    /// The parent must exist. Array indices must already be in bounds; an
    /// absent object member is created.
    fn pointer_replace(&mut self, path: &str, value: Value) -> Result<(), PointerError>;

    /// Remove the subtree at `path`, returning it. A missing path is not an error.
    fn pointer_remove(&mut self, path: &str) -> Option<Value>;

    /// Visit every string leaf in document order.
    fn for_each_string(&self, visit: &mut dyn FnMut(&str));

    /// Visit every string leaf (object member values and array items) mutably.
    fn for_each_string_mut(&mut self, visit: &mut dyn FnMut(&mut String));

    /// Visit every string leaf, stopping at the first error.
    fn try_for_each_string_mut<E>(
        &mut self,
        visit: &mut dyn FnMut(&mut String) -> Result<(), E>,
    ) -> Result<(), E>;
}

impl DocumentExt for Value {
    fn pointer_get(&self, path: &str) -> Option<&Value> {
        let mut current = self;
        for token in parse_pointer(path) {
            current = match current {
                Value::Object(map) => map.get(token.as_str())?,
                Value::Array(items) => items.get(token.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    fn pointer_insert(&mut self, path: &str, value: Value) -> Result<(), PointerError> {
        let tokens = parse_pointer(path);
        let Some((last, parents)) = tokens.split_last() else {
            return Err(PointerError::EmptyPath);
        };

        let parent = walk_mut(self, parents).ok_or_else(|| PointerError::MissingParent {
            path: path.to_string(),
        })?;

        match parent {
            Value::Object(map) => {
                match map.get_mut(last.as_str()) {
                    Some(Value::Array(items)) => items.push(value),
                    _ => {
                        map.insert(last.clone(), value);
                    }
                }
                Ok(())
            }
            Value::Array(items) => {
                let index = if last == "-" {
                    items.len()
                } else {
                    parse_index(path, last)?
                };
                if index > items.len() {
                    return Err(PointerError::IndexOutOfBounds {
                        path: path.to_string(),
                        index,
                        len: items.len(),
                    });
                }
                items.insert(index, value);
                Ok(())
            }
            _ => Err(PointerError::NotAContainer {
                path: path.to_string(),
            }),
        }
    }

    fn pointer_replace(&mut self, path: &str, value: Value) -> Result<(), PointerError> {
        let tokens = parse_pointer(path);
        let Some((last, parents)) = tokens.split_last() else {
            return Err(PointerError::EmptyPath);
        };

        let parent = walk_mut(self, parents).ok_or_else(|| PointerError::MissingParent {
            path: path.to_string(),
        })?;

        match parent {
            Value::Object(map) => {
                map.insert(last.clone(), value);
                Ok(())
            }
            Value::Array(items) => {
                let index = parse_index(path, last)?;
                let len = items.len();
                let slot = items
                    .get_mut(index)
                    .ok_or_else(|| PointerError::IndexOutOfBounds {
                        path: path.to_string(),
                        index,
                        len,
                    })?;
                *slot = value;
                Ok(())
            }
            _ => Err(PointerError::NotAContainer {
                path: path.to_string(),
            }),
        }
    }

    fn pointer_remove(&mut self, path: &str) -> Option<Value> {
        let tokens = parse_pointer(path);
        let (last, parents) = tokens.split_last()?;
        match walk_mut(self, parents)? {
            Value::Object(map) => map.shift_remove(last.as_str()),
            Value::Array(items) => {
                let index = last.parse::<usize>().ok()?;
                (index < items.len()).then(|| items.remove(index))
            }
            _ => None,
        }
    }

    fn for_each_string(&self, visit: &mut dyn FnMut(&str)) {
        match self {
            Value::String(s) => visit(s),
            Value::Array(items) => items.iter().for_each(|item| item.for_each_string(visit)),
            Value::Object(map) => map.values().for_each(|member| member.for_each_string(visit)),
            _ => {}
        }
    }

    fn for_each_string_mut(&mut self, visit: &mut dyn FnMut(&mut String)) {
        let _ = self.try_for_each_string_mut::<()>(&mut |s| {
            visit(s);
            Ok(())
        });
    }

    fn try_for_each_string_mut<E>(
        &mut self,
        visit: &mut dyn FnMut(&mut String) -> Result<(), E>,
    ) -> Result<(), E> {
        match self {
            Value::String(s) => visit(s),
            Value::Array(items) => {
                for item in items {
                    item.try_for_each_string_mut(visit)?;
                }
                Ok(())
            }
            Value::Object(map) => {
                for (_, member) in map.iter_mut() {
                    member.try_for_each_string_mut(visit)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Read a member as an integer, accepting integral floats and numeric strings.
pub fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a member as a boolean flag; anything other than `false`/`null`/absent counts as set.
pub fn is_truthy(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null) | Some(Value::Bool(false)))
}
