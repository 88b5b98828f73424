pub mod books;

use std::sync::Arc;

use bookscout_kernel::ModuleRegistry;

/// Register all project-specific modules with the registry
pub fn register_all(
    registry: &mut ModuleRegistry,
    books: Arc<books::BooksService>,
) -> anyhow::Result<()> {
    registry.register(books::create_module(books))?;
    Ok(())
}
