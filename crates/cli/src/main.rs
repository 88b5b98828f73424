use anyhow::Context;
use bookscout_app::{
    books::{
        client::BookSearch as _,
        models::{SearchTarget, SortOrder},
        pagination::LoadOutcome,
    },
    App,
};
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "bookscout", version, about = "Search books, keep a saved list and view history")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve,
    /// Search and print the accumulated results as JSON
    Search {
        query: String,
        /// Number of pages to fetch
        #[arg(long, default_value_t = 1)]
        pages: u32,
        #[arg(long, value_enum, default_value_t = SortArg::Accuracy)]
        sort: SortArg,
        #[arg(long, value_enum, default_value_t = TargetArg::Title)]
        target: TargetArg,
    },
    /// Saved books
    Saved {
        #[command(subcommand)]
        action: SavedAction,
    },
    /// Recently viewed books
    Recent {
        #[command(subcommand)]
        action: RecentAction,
    },
    /// Apply pending migrations and list what is recorded
    Migrate,
}

#[derive(Debug, Subcommand)]
enum SavedAction {
    List,
    /// Look a title up and save the first match
    Add { title: String },
    /// Remove by row number as printed by `saved list`
    Remove { index: usize },
    Clear,
}

#[derive(Debug, Subcommand)]
enum RecentAction {
    List,
    /// Look a title up and record a view of it
    View { title: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    Accuracy,
    Latest,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Accuracy => SortOrder::Accuracy,
            SortArg::Latest => SortOrder::Latest,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TargetArg {
    Title,
    Isbn,
    Publisher,
    Person,
}

impl From<TargetArg> for SearchTarget {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Title => SearchTarget::Title,
            TargetArg::Isbn => SearchTarget::Isbn,
            TargetArg::Publisher => SearchTarget::Publisher,
            TargetArg::Person => SearchTarget::Person,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = bookscout_kernel::settings::Settings::load()
        .context("failed to load bookscout settings")?;
    bookscout_telemetry::init(&settings.telemetry);

    tracing::debug!(env = ?settings.environment, command = ?cli.command, "bookscout cli");

    let app = App::build(settings).await?;
    let books = app.books.clone();

    match cli.command {
        Command::Serve => {
            app.serve(shutdown_signal()).await?;
        }
        Command::Search {
            query,
            pages,
            sort,
            target,
        } => {
            let controller = books
                .paginator()
                .with_sort(sort.into())
                .with_target(target.into());

            let mut outcome = controller.reset(&query).await;
            for _ in 1..pages {
                if !outcome.is_loaded() {
                    break;
                }
                outcome = controller.load_more(&query).await;
            }
            if let LoadOutcome::Failed(err) = outcome {
                return Err(err).context("search failed");
            }

            print_json(&controller.snapshot())?;
        }
        Command::Saved { action } => match action {
            SavedAction::List => print_json(&books.saved.list().await?)?,
            SavedAction::Add { title } => {
                let record = books.client.lookup_title(&title).await?;
                print_json(&books.saved.add(&record).await?)?;
            }
            SavedAction::Remove { index } => {
                books.saved.list().await?;
                print_json(&books.saved.remove_at(index).await?)?;
            }
            SavedAction::Clear => {
                let removed = books.saved.remove_all().await?;
                println!("removed {removed} saved books");
            }
        },
        Command::Recent { action } => match action {
            RecentAction::List => print_json(&books.recent.list().await?)?,
            RecentAction::View { title } => {
                let record = books.client.lookup_title(&title).await?;
                print_json(&books.recent.record_view(&record).await?)?;
            }
        },
        Command::Migrate => {
            for module in app.registry.modules() {
                for id in app.db.applied_migrations(module.name()).await? {
                    println!("{}:{id}", module.name());
                }
            }
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn shutdown_waits_for_a_signal() {
        let waited = tokio::time::timeout(Duration::from_millis(50), shutdown_signal()).await;
        assert!(waited.is_err());
    }
}
