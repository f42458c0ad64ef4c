// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # strigo-sync
//!
//! A declarative, idempotent synchronization tool for Strigo training classes.
//!
//! ## Overview
//!
//! A class is described in a local configuration file: its metadata, at most
//! one presentation with speaker notes, and the lab machines attendees get.
//! strigo-sync brings the platform in line with that file, allowing you to:
//!
//! - Keep training classes as code next to the training material
//! - Compose machine init scripts from a shared library of fragments
//! - Upload presentations only when their content changed
//! - Detect drift between the platform and the configuration
//!
//! ## Architecture
//!
//! Every run follows the same steps:
//!
//! 1. **Desired State**: Parsed from `strigo.json`, images resolved, scripts
//!    rendered and speaker notes extracted
//! 2. **Remote State**: Fetched once from the Strigo API
//! 3. **Reconciler**: Compares both states in three phases (class,
//!    presentations, resources) and executes the resulting plan
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing, validation and import
//! - [`platform`]: Strigo API client
//! - [`resolve`]: Image catalog and script rendering
//! - [`notes`]: Speaker notes extraction
//! - [`planner`]: Diff computation and execution planning
//! - [`reconciler`]: Synchronization engine
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```json
//! {
//!   "name": "Docker Fundamentals",
//!   "description": ["Three days of hands-on Docker"],
//!   "labels": ["docker"],
//!   "presentations": [{ "file": "PDF/docker.pdf" }],
//!   "resources": [
//!     {
//!       "name": "lab",
//!       "instance_type": "t3.medium",
//!       "image": "ubuntu-20.04",
//!       "init_scripts": [{ "script": "docker.sh" }],
//!       "webview_links": [{ "name": "IDE", "url": "http://{{ .IP }}:8080" }]
//!     }
//!   ]
//! }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod notes;
pub mod planner;
pub mod platform;
pub mod reconciler;
pub mod resolve;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ClassConfig, ConfigImporter, ConfigParser, ConfigValidator};
pub use error::{Result, SyncError};
pub use notes::NotesParser;
pub use planner::{DiffEngine, PlanExecutor, SyncPlan};
pub use platform::{RemoteApi, StrigoClient};
pub use reconciler::{DriftReport, ReconciliationResult, Reconciler};
pub use resolve::{ImageCatalog, ScriptResolver};
