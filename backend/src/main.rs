//! Command-line front end for the wiki page store
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wiki_backend::application::{
    FindPage, ListPages, PageLookup, PageRepository, RevisionPolicy, ViewPage,
};
use wiki_backend::config::{DatabaseLocation, StoreConfig};
use wiki_backend::domain::{base::Entity, value_objects::UserId, Page, PageType, PageUrl};
use wiki_backend::infrastructure::persistence::SqlitePageRepository;

#[derive(Parser)]
#[command(name = "wiki-backend")]
#[command(about = "Manage wiki pages, drafts and published revisions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database file, overrides WIKI_DATABASE_PATH
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty, unpublished page
    Create {
        url: String,
    },

    /// Show the last published revision of a page
    Show {
        url: String,
        /// Acting user (anonymous when omitted)
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Show the user's current draft of a page, creating it if needed
    Draft {
        url: String,
        #[arg(short, long)]
        user: String,
    },

    /// Write a new title and body into the user's draft
    Edit {
        url: String,
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        title: String,
        #[arg(short, long)]
        content: String,
    },

    /// Publish the user's draft
    Publish {
        url: String,
        #[arg(short, long)]
        user: String,
    },

    /// Throw away the user's draft
    Discard {
        url: String,
        #[arg(short, long)]
        user: String,
    },

    /// List published revisions, newest first
    History {
        url: String,
    },

    /// Delete a page and all of its revisions
    Delete {
        url: String,
    },

    /// List all pages
    Pages,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wiki_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = StoreConfig::from_env().context("Invalid store configuration")?;
    if let Some(path) = cli.database {
        config.database = DatabaseLocation::File(path);
    }

    let mut repo = SqlitePageRepository::open(&config)
        .with_context(|| format!("Failed to open page store at {:?}", config.database))?;

    match cli.command {
        Commands::Create { url } => {
            let page = repo.create(parse_url(&url)?, PageType::Markdown)?;
            println!("{}\t{}", page.id(), page.url());
        }

        Commands::Show { url, user } => {
            let actor = match user {
                Some(name) => parse_user(&name)?,
                None => UserId::anonymous(),
            };
            let view = ViewPage::new(&mut repo).execute(&PageLookup::Url(parse_url(&url)?), &actor)?;

            if view.is_placeholder() {
                println!("{} has not been published yet", view.page.url());
            } else {
                println!("# {}", view.revision.title());
                println!();
                println!("{}", view.revision.raw_content());
            }
        }

        Commands::Draft { url, user } => {
            let page = find_page(&repo, &url)?;
            let draft = RevisionPolicy::new(&mut repo).current_draft_for(&page, &parse_user(&user)?)?;
            println!("draft {} ({})", draft.id(), draft.created_at());
            println!("# {}", draft.title());
            println!();
            println!("{}", draft.raw_content());
        }

        Commands::Edit {
            url,
            user,
            title,
            content,
        } => {
            let page = find_page(&repo, &url)?;
            let draft = RevisionPolicy::new(&mut repo).update_draft(
                &page,
                &parse_user(&user)?,
                title,
                content,
            )?;
            println!("Updated draft {}", draft.id());
        }

        Commands::Publish { url, user } => {
            let mut page = find_page(&repo, &url)?;
            let revision = RevisionPolicy::new(&mut repo).publish(&mut page, &parse_user(&user)?)?;
            println!("Published revision {} of {}", revision.id(), page.url());
        }

        Commands::Discard { url, user } => {
            let page = find_page(&repo, &url)?;
            if RevisionPolicy::new(&mut repo).discard_draft(&page, &parse_user(&user)?)? {
                println!("Discarded draft of {}", page.url());
            } else {
                println!("{} has no draft to discard", user);
            }
        }

        Commands::History { url } => {
            let page = find_page(&repo, &url)?;
            let batch_size = config.history_batch_size;
            let policy = RevisionPolicy::new(&mut repo).with_history_batch_size(batch_size);
            for revision in policy.history(&page) {
                let revision = revision?;
                println!(
                    "{}\t{}\t{}\t{}",
                    revision.created_at(),
                    revision.created_by(),
                    revision.id(),
                    revision.title()
                );
            }
        }

        Commands::Delete { url } => {
            let page = find_page(&repo, &url)?;
            if repo.delete(page.id())? {
                println!("Deleted {}", page.url());
            }
        }

        Commands::Pages => {
            for summary in ListPages::new(&repo).execute()? {
                let published = summary
                    .last_published_at
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "never published".to_string());
                println!("{}\t{}\t{}", summary.url, summary.title, published);
            }
        }
    }

    Ok(())
}

fn parse_url(url: &str) -> Result<PageUrl> {
    PageUrl::new(url).with_context(|| format!("Invalid page url {:?}", url))
}

fn parse_user(user: &str) -> Result<UserId> {
    UserId::new(user).with_context(|| format!("Invalid user {:?}", user))
}

fn find_page<R: PageRepository>(repo: &R, url: &str) -> Result<Page> {
    let lookup = PageLookup::Url(parse_url(url)?);
    Ok(FindPage::new(repo).execute(&lookup)?)
}
