//! Storyshelf CLI
//!
//! Manage the tag library of a story archive:
//! - Categories (create, rename, delete)
//! - Tags and their implications (`A implies B`)
//! - Resolving the effective closure of a set of explicit tags

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use storyshelf_graph::{Category, CategoryId, Color, Tag, TagId};
use storyshelf_storage::{StorageConfig, TagLibrary};
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Parser)]
#[command(name = "storyshelf")]
#[command(author, version, about = "Storyshelf: tag library for a story archive")]
struct Cli {
    /// Data directory holding `tags.json`
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// JSON storage config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage categories
    Category {
        #[command(subcommand)]
        command: CategoryCommands,
    },
    /// Manage tags and implications
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },
    /// Print every tag implied by the given explicit tags
    Resolve {
        /// Explicit tag ids
        #[arg(required = true)]
        ids: Vec<u32>,
    },
}

#[derive(Subcommand, Debug)]
enum CategoryCommands {
    /// List categories in display order
    List,
    /// Create a category
    Add {
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Display order (lower first)
        #[arg(long, default_value_t = 0)]
        order: i32,
        /// Display color as #rrggbb
        #[arg(long)]
        color: Option<Color>,
    },
    /// Rename a category
    Rename { id: u32, name: String },
    /// Delete an empty category
    Rm { id: u32 },
}

#[derive(Subcommand, Debug)]
enum TagCommands {
    /// List tags, optionally only one category
    List {
        #[arg(long)]
        category: Option<u32>,
    },
    /// Create a tag
    Add {
        name: String,
        #[arg(long)]
        category: u32,
        /// Ids of tags this tag implies
        #[arg(long, num_args = 1..)]
        implies: Vec<u32>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Show a tag with its direct and indirect implications
    Show {
        /// Tag id or name
        tag: String,
    },
    /// Add implications to a tag
    Imply {
        id: u32,
        #[arg(required = true)]
        implied: Vec<u32>,
    },
    /// Remove implications from a tag
    Unimply {
        id: u32,
        #[arg(required = true)]
        implied: Vec<u32>,
    },
    /// Delete a tag
    Rm {
        id: u32,
        /// Also strip the tag from every tag that implies it
        #[arg(long)]
        purge: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| anyhow!("failed to initialize tokio runtime: {e}"))?;

    rt.block_on(async move {
        let config = storage_config(&cli)?;
        let library = TagLibrary::open_with_config(&config).await?;
        tracing::debug!(
            path = %config.snapshot_path.display(),
            command = ?cli.command,
            "running command"
        );

        let result = run(&library, cli.command);
        let flushed = library.shutdown().await;
        result?;
        flushed
    })
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_env("STORYSHELF_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// `--config` is read first; `--data` then overrides its snapshot path.
fn storage_config(cli: &Cli) -> Result<StorageConfig> {
    let mut config = match &cli.config {
        Some(path) => StorageConfig::from_file(path)?,
        None => StorageConfig::default(),
    };
    if let Some(dir) = &cli.data {
        config.snapshot_path = StorageConfig::in_dir(dir).snapshot_path;
    }
    Ok(config)
}

fn run(library: &TagLibrary, command: Commands) -> Result<()> {
    match command {
        Commands::Category { command } => match command {
            CategoryCommands::List => cmd_category_list(library),
            CategoryCommands::Add {
                name,
                description,
                order,
                color,
            } => cmd_category_add(library, name, description, order, color),
            CategoryCommands::Rename { id, name } => cmd_category_rename(library, id, name),
            CategoryCommands::Rm { id } => cmd_category_rm(library, id),
        },
        Commands::Tag { command } => match command {
            TagCommands::List { category } => cmd_tag_list(library, category),
            TagCommands::Add {
                name,
                category,
                implies,
                description,
            } => cmd_tag_add(library, name, category, implies, description),
            TagCommands::Show { tag } => cmd_tag_show(library, &tag),
            TagCommands::Imply { id, implied } => cmd_tag_imply(library, id, implied, true),
            TagCommands::Unimply { id, implied } => cmd_tag_imply(library, id, implied, false),
            TagCommands::Rm { id, purge } => cmd_tag_rm(library, id, purge),
        },
        Commands::Resolve { ids } => cmd_resolve(library, ids),
    }
}

// ============================================================================
// Categories
// ============================================================================

fn cmd_category_list(library: &TagLibrary) -> Result<()> {
    let categories = library.categories();
    if categories.is_empty() {
        println!("{}", "No categories.".dimmed());
        return Ok(());
    }
    for category in &categories {
        let count = library.tag_count_in_category(category.id);
        println!("{}", render::category_line(category, count));
    }
    Ok(())
}

fn cmd_category_add(
    library: &TagLibrary,
    name: String,
    description: Option<String>,
    order: i32,
    color: Option<Color>,
) -> Result<()> {
    let mut category = Category::new(name).with_sort_order(order);
    category.description = description;
    if let Some(color) = color {
        category = category.with_color(color);
    }
    let created = library.create_category(category)?;
    println!(
        "{} category {} {}",
        "Created".green().bold(),
        created.id,
        created.name.bold()
    );
    Ok(())
}

fn cmd_category_rename(library: &TagLibrary, id: u32, name: String) -> Result<()> {
    let id = CategoryId::new(id);
    let mut category = library
        .category(id)
        .ok_or_else(|| anyhow!("no category {id}"))?;
    category.name = name;
    let updated = library.update_category(category)?;
    println!(
        "{} category {} to {}",
        "Renamed".green().bold(),
        updated.id,
        updated.name.bold()
    );
    Ok(())
}

fn cmd_category_rm(library: &TagLibrary, id: u32) -> Result<()> {
    let removed = library.delete_category(CategoryId::new(id))?;
    println!(
        "{} category {} {}",
        "Deleted".green().bold(),
        removed.id,
        removed.name.bold()
    );
    Ok(())
}

// ============================================================================
// Tags
// ============================================================================

fn cmd_tag_list(library: &TagLibrary, category: Option<u32>) -> Result<()> {
    let snapshot = library.snapshot();
    let tags: Vec<&Tag> = match category {
        Some(raw) => {
            let id = CategoryId::new(raw);
            if snapshot.category(id).is_none() {
                return Err(anyhow!("no category {id}"));
            }
            snapshot.tags_in_category(id)
        }
        None => snapshot.tags().collect(),
    };
    if tags.is_empty() {
        println!("{}", "No tags.".dimmed());
        return Ok(());
    }
    for tag in tags {
        println!("{}", render::tag_line(&snapshot, tag));
    }
    Ok(())
}

fn cmd_tag_add(
    library: &TagLibrary,
    name: String,
    category: u32,
    implies: Vec<u32>,
    description: Option<String>,
) -> Result<()> {
    let mut tag = Tag::new(name, CategoryId::new(category))
        .implying(implies.into_iter().map(TagId::new));
    tag.description = description;
    let created = library.create_tag(tag)?;
    println!(
        "{} tag {} {}",
        "Created".green().bold(),
        created.id,
        created.name.bold()
    );
    Ok(())
}

fn cmd_tag_show(library: &TagLibrary, key: &str) -> Result<()> {
    let tag = find_tag(library, key)?;
    let extended = library
        .extended_tag(tag.id)
        .ok_or_else(|| anyhow!("no tag '{key}'"))?;
    print!("{}", render::extended_tag(&extended));
    Ok(())
}

fn cmd_tag_imply(library: &TagLibrary, id: u32, implied: Vec<u32>, add: bool) -> Result<()> {
    let id = TagId::new(id);
    let mut tag = library.tag(id).ok_or_else(|| anyhow!("no tag {id}"))?;
    for raw in implied {
        if add {
            tag.implies.insert(TagId::new(raw));
        } else {
            tag.implies.remove(&TagId::new(raw));
        }
    }
    let updated = library.update_tag(tag)?;
    let implied = render::id_list(updated.implies.iter().copied());
    println!(
        "{} {} now implies {}",
        "Updated".green().bold(),
        updated.name.bold(),
        implied
    );
    Ok(())
}

fn cmd_tag_rm(library: &TagLibrary, id: u32, purge: bool) -> Result<()> {
    let id = TagId::new(id);
    if !purge {
        let removed = library.delete_tag(id)?;
        println!(
            "{} tag {} {}",
            "Deleted".green().bold(),
            removed.id,
            removed.name.bold()
        );
        return Ok(());
    }

    let stripped = library.purge_tag(id)?;
    println!("{} tag {}", "Purged".green().bold(), id);
    for tag in stripped {
        println!("  {} from {} {}", "stripped".yellow(), tag.id, tag.name);
    }
    Ok(())
}

fn cmd_resolve(library: &TagLibrary, ids: Vec<u32>) -> Result<()> {
    let explicit: Vec<TagId> = ids.into_iter().map(TagId::new).collect();
    let snapshot = library.snapshot();
    for id in &explicit {
        if snapshot.tag(*id).is_none() {
            eprintln!("{} unknown tag {}", "warning:".yellow().bold(), id);
        }
    }

    let implied = snapshot.resolve_implied_closure(&explicit);
    if implied.is_empty() {
        println!("{}", "No implied tags.".dimmed());
        return Ok(());
    }
    for id in implied {
        if let Some(tag) = snapshot.tag(id) {
            println!("{}", render::tag_line(&snapshot, tag));
        }
    }
    Ok(())
}

/// Look a tag up by id, falling back to a case-insensitive name match.
fn find_tag(library: &TagLibrary, key: &str) -> Result<Tag> {
    key.parse::<u32>()
        .ok()
        .and_then(|raw| library.tag(TagId::new(raw)))
        .or_else(|| library.tag_by_name(key))
        .ok_or_else(|| anyhow!("no tag '{key}'"))
}
