//! Bookscout application library
//!
//! Feature modules plus the [`App`] composition root shared by the server
//! binary and the CLI.

pub mod app;
pub mod modules;

pub use app::App;
pub use modules::books;
