//! A Forth virtual machine: threaded code in a flat byte-addressed memory, a dictionary
//! of headers, and an outer interpreter that compiles or executes text.

pub mod config;
pub mod error;
pub mod internals;
pub mod kernel;
pub mod runtime;

pub use error::{ForthError, Result};
pub use runtime::ForthRuntime;
