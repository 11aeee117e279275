//! Input side of the engine: reading content documents and expanding the
//! inline markup found in their text.

pub mod loader;
pub mod markup;

pub use loader::{discover, load_dir, load_paths, LoadedDocument};
