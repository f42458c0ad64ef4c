//! Resolution of the indirect parts of a resource definition.
//!
//! - Image names to AMIs through the static catalog
//! - Script references to the rendered script bodies
//! - Remote script fragments and their cache

mod fetch;
mod image;
mod script;

pub use fetch::{
    FragmentCache, FragmentSource, HttpFragmentSource, ScriptFolder, DEFAULT_SCRIPTS_URL,
};
pub use image::{ImageCatalog, ResolvedImage};
pub use script::{minify, normalize_script, ScriptResolver, ScriptTarget};
