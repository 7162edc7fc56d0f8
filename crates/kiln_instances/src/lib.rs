//! The install and launch pipeline.
//!
//! ```text
//! resolve -> plan -> acquire -> extract natives -> build command -> spawn
//! ```
//!
//! # Contains
//! - [`InstallationRecord`]: the builds a user created
//! - [`resolve()`]: version JSON + loader profile into a [`kiln_core::json::VersionDescriptor`]
//! - [`download::acquire`]: every file the descriptor needs
//! - [`natives::extract_natives`]
//! - [`launch()`]: the command line, and the running game

pub mod download;
pub mod launch;
pub mod natives;
mod record;
pub mod resolve;

pub use download::{acquire, AcquireError, AcquireReport};
pub use launch::{launch, select_runtime, Credentials, LaunchError, ProcessSpec, RunningProcessHandle};
pub use record::{EffectiveSettings, InstallLayout, InstallationRecord, RecordError, LATEST};
pub use resolve::{resolve, ResolveError, ResolveState, Resolver};
