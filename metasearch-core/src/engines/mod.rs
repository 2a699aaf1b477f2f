//! Built-in backend implementations.
//!
//! Each module provides a struct implementing [`crate::backend::Backend`]
//! that scrapes one provider's HTML results pages.

pub mod brave;

pub use brave::{BraveBackend, BraveCategory};
