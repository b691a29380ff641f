//! Content transformations applied to downloaded text assets
//!
//! - Stylesheets: source maps removed, fonts localized
//! - Scripts: source maps removed, stylesheet literals (plain or templated)
//!   resolved so they can be fetched and rewritten

mod css;
pub mod javascript;
mod sourcemap;

pub use css::{localize_stylesheet, LocalizedStylesheet};
pub use javascript::{find_stylesheet_references, localize_script, ScriptReference};
pub use sourcemap::strip_source_maps;
