//! Thin re-export of `reqwest` for the Kiln crates.
//!
//! Every crate in the workspace goes through `kiln_reqwest` instead of
//! depending on `reqwest` directly, so the TLS backend and feature set
//! are picked in exactly one `Cargo.toml`:
//! - Linux: `rustls`
//! - everything else: the platform native TLS
//!
//! ```no_run
//! pub use reqwest::*;
//! ```

pub use reqwest::*;
