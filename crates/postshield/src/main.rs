//! `pshield` - CLI for postshield
//!
//! This binary provides the command-line interface for registering users,
//! publishing posts, browsing the feed and checking crime levels.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::Path;

use clap::Parser;

use postshield::cli::{
    Cli, Command, ConfigCommand, FeedCommand, LevelCommand, OutputFormat, PostAddCommand,
    PostCommand, UserCommand,
};
use postshield::compose::StaticGeocoder;
use postshield::{
    init_logging, Config, CrimeMap, FeedPost, GeocodedPlace, NewUser, PostDraft, PostStore,
    SqliteStore, User,
};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> CliResult {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Configuration commands never touch the database
    let command = match cli.command {
        Command::Config(config_cmd) => return handle_config(&config, config_cmd),
        other => other,
    };

    let store = SqliteStore::open(config.database_path())?;
    let map = CrimeMap::with_config(store, &config);

    match command {
        Command::User(user_cmd) => handle_user(&map, user_cmd).await,
        Command::Post(PostCommand::Add(post_cmd)) => handle_post_add(map, post_cmd).await,
        Command::Feed(feed_cmd) => handle_feed(&map, &feed_cmd).await,
        Command::Level(level_cmd) => handle_level(&map, &level_cmd).await,
        Command::Import(import_cmd) => handle_import(map.store(), &import_cmd.file),
        Command::Status(status_cmd) => handle_status(map.store(), status_cmd.json),
        Command::Config(_) => Ok(()),
    }
}

async fn handle_user(map: &CrimeMap<SqliteStore>, cmd: UserCommand) -> CliResult {
    match cmd {
        UserCommand::Add {
            id,
            email,
            username,
            avatar,
        } => {
            let user = map
                .store()
                .create_user(NewUser {
                    id,
                    email,
                    username,
                    profile_image_url: avatar.unwrap_or_default(),
                })
                .await?;
            println!("Created user {} ({})", user.id, user.username);
        }
        UserCommand::Show { id, json } => {
            let Some(user) = map.store().get_user(&id).await? else {
                return Err(postshield::Error::user_not_found(id).into());
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&user)?);
            } else {
                print_user(&user);
            }
        }
    }
    Ok(())
}

fn print_user(user: &User) {
    println!("User {}", user.id);
    println!("---------------");
    println!("Username:      {}", user.username);
    println!("Email:         {}", user.email);
    println!("Created:       {}", user.created_at.to_rfc3339());
    println!("Posts:         {}", user.post_count());
    for post in &user.posts {
        let level = post.crime_level.as_deref().unwrap_or("-");
        println!("  [{level}] {} - {}", post.location, post.description);
    }
}

async fn handle_post_add(map: CrimeMap<SqliteStore>, cmd: PostAddCommand) -> CliResult {
    let place = cmd
        .address
        .map(|address| GeocodedPlace::from_parts(None, None, Some(address)));

    let (map, resolved) = match &cmd.geocode {
        Some(file) => {
            let resolved = GeocodedPlace::from_nominatim(&std::fs::read_to_string(file)?)?;
            (
                map.with_geocoder(StaticGeocoder::new(resolved.clone())),
                Some(resolved),
            )
        }
        None => (map, None),
    };

    let draft = PostDraft {
        description: cmd.description,
        image_ref: cmd.image,
        latitude: cmd.lat,
        longitude: cmd.lng,
        crime_level: cmd.crime_level.map(Into::into),
    };

    if map.publish(&cmd.user, draft, place.as_ref()).await? {
        match resolved {
            Some(place) => println!("Post published near {}.", place.headline()),
            None => println!("Post published."),
        }
    } else {
        println!("An identical post already exists; nothing written.");
    }
    Ok(())
}

async fn handle_feed(map: &CrimeMap<SqliteStore>, cmd: &FeedCommand) -> CliResult {
    let query = cmd.query.join(" ");
    let entries = map.feed(&query, cmd.limit).await?;

    match cmd.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => {
            for entry in &entries {
                println!("{}", plain_line(entry));
            }
        }
        OutputFormat::Table => print_table(&entries),
    }
    Ok(())
}

fn plain_line(entry: &FeedPost) -> String {
    format!(
        "{}\t{}\t{}\t{}",
        entry.username,
        entry.post.crime_level.as_deref().unwrap_or("-"),
        entry.post.location,
        entry.post.description
    )
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let cut: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

fn print_table(entries: &[FeedPost]) {
    if entries.is_empty() {
        println!("No posts found.");
        return;
    }
    println!(
        "{:<16} {:<8} {:<32} {}",
        "USER", "LEVEL", "LOCATION", "DESCRIPTION"
    );
    for entry in entries {
        println!(
            "{:<16} {:<8} {:<32} {}",
            truncate(&entry.username, 16),
            entry.post.crime_level.as_deref().unwrap_or("-"),
            truncate(&entry.post.location, 32),
            truncate(&entry.post.description, 48)
        );
    }
}

async fn handle_level(map: &CrimeMap<SqliteStore>, cmd: &LevelCommand) -> CliResult {
    let summary = map.crime_level_at(cmd.lat, cmd.lng).await?;
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Crime level at ({}, {})", cmd.lat, cmd.lng);
        println!("---------------");
        println!("Level:         {}", summary.result);
        println!("Nearby posts:  {}", summary.matched);
        println!("Labeled:       {}", summary.labeled);
        match summary.average {
            Some(average) => println!("Average:       {average:.2}"),
            None => println!("Average:       -"),
        }
    }
    Ok(())
}

fn handle_import(store: &SqliteStore, file: &Path) -> CliResult {
    let contents = std::fs::read_to_string(file)?;
    let users: Vec<User> = serde_json::from_str(&contents)?;
    let stats = store.import_snapshot(&users)?;
    println!(
        "Imported {} users: {} new, {} posts added, {} duplicates skipped.",
        users.len(),
        stats.users_created,
        stats.posts_added,
        stats.posts_skipped
    );
    Ok(())
}

fn handle_status(store: &SqliteStore, json: bool) -> CliResult {
    let stats = store.stats()?;
    if json {
        let status = serde_json::json!({
            "database_path": store.path(),
            "users": stats.users,
            "posts": stats.posts,
            "unlabeled_posts": stats.unlabeled_posts,
            "db_size_bytes": stats.db_size_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("pshield status");
        println!("---------------");
        println!("Database:      {}", store.path().display());
        println!("Users:         {}", stats.users);
        println!("Posts:         {}", stats.posts);
        println!("Unlabeled:     {}", stats.unlabeled_posts);
        println!("Size:          {} bytes", stats.db_size_bytes);
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> CliResult {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Aggregation]");
                println!("  Tolerance (deg):    {}", config.aggregation.tolerance);
                println!("  Unlabeled posts:    {:?}", config.aggregation.unlabeled);
                println!();
                println!("[Feed]");
                println!("  Page size:          {}", config.feed.page_size);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
