pub mod compendium;
pub mod document;
pub mod logging;
