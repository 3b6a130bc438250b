//! Embedded static resources.
//!
//! The replay shell is compiled into the binary so the server has no asset
//! directory to locate at runtime. It is served for `GET /` until the first
//! replay finishes; everything it needs (styles, stream wiring, typewriter)
//! is inline.

/// The replay shell page.
pub const SHELL_HTML: &str = include_str!("shell.html");
