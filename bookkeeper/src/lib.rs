//! Generate serialization code for annotated C structs.
//!
//! Structs declared with `typedef struct { ... } Name derive_json();` are
//! scanned from C sources, and every schema they derive contributes guarded
//! dump and parse code to a generated header next to the source.

pub mod config;
pub mod emit;
pub mod files;
pub mod lexer;
pub mod model;
pub mod reporting;
pub mod scanner;
pub mod schema;
pub mod source;
pub mod template;

// Top level API
mod driver;

pub use driver::{Driver, Status};
