//! Core traits, layered settings and the module registry shared by every
//! bookscout crate.

pub mod module;
pub mod registry;
pub mod settings;

pub use module::{InitCtx, Migration, Module};
pub use registry::ModuleRegistry;
