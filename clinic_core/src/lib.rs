//! `clinic_core` generates the argument parsing boilerplate of CPython
//! extension functions from declarations embedded in C source files.
//!
//! ## Processing Pipeline
//!
//! ```text
//! C / Python source file
//!   → Scanner (splits the file into literal text and marker-delimited blocks)
//!   → Lexer (tokenizes each header and parameter line)
//!   → Parser (builds a Function, resolving converters through the registry)
//!   → Renderer (emits the docstring, method definition and parser function)
//!   → Engine (prints every block back with fresh checksums)
//! ```
//!
//! A block looks like this:
//!
//! ```c
//! /*[clinic input]
//! os.getpid
//!
//! Return the current process id.
//! [clinic start generated code]*/
//! ...generated code...
//! /*[clinic end generated code: output=0123456789abcdef input=fedcba9876543210]*/
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading from `clinic.toml`.
//! - [`project`]: The `--make` directory walk.
//! - [`renderer`]: C code generation for one function.
//! - [`option_groups`]: Arities of functions with optional groups.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clinic_core::ClinicOptions;
//! use clinic_core::ConverterRegistry;
//! use clinic_core::parse_file;
//! use std::path::Path;
//!
//! let registry = ConverterRegistry::builtin();
//! let processed = parse_file(
//! 	Path::new("Modules/posixmodule.c"),
//! 	None,
//! 	&registry,
//! 	ClinicOptions::default(),
//! )?;
//! println!("rewritten: {}", processed.is_rewritten());
//! # Ok::<(), clinic_core::ClinicError>(())
//! ```

pub use converters::*;
pub use engine::*;
pub use error::*;
pub use function::*;
pub use language::*;
pub use parser::*;
pub use scanner::*;
pub use version::*;

pub mod checksum;
pub mod config;
mod converters;
mod engine;
#[allow(unused_assignments)]
mod error;
mod function;
mod language;
pub mod lexer;
pub mod option_groups;
mod parser;
pub mod project;
pub mod renderer;
mod scanner;
pub mod tokens;
mod version;

#[cfg(test)]
mod __fixtures;
