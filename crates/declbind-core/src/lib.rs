//! declbind core library: compiles declaration records extracted from native
//! headers into CPython extension glue.
//!
//! Records are classified into a class / function / namespace model
//! ([`indexer`]), base classes are resolved, and the [`codegen`] generator
//! emits C++ fragments plus a signature catalog that [`store`] persists.

pub mod cli;
pub mod codegen;
pub mod config;
pub mod errors;
pub mod indexer;
pub mod models;
pub mod store;
