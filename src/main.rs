use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use albumshelf::catalog::{
    format_for_display, AddOutcome, AlbumResult, Catalog, Confirmation, ImageOutcome, ScanReport,
    UserDetails,
};
use albumshelf::config::Config;
use albumshelf::db::{Album, AlbumUpdate, Database, Enrichment, NewAlbum, SearchCriteria, SortKey};
use albumshelf::export::{export_albums, ExportFormat};
use albumshelf::llm::{create_provider, ExtractedAlbum, MetadataProvider};
use albumshelf::{logging, site};

#[derive(Parser, Debug)]
#[command(name = "albumshelf")]
#[command(version)]
#[command(about = "Catalog a music album collection with LLM-assisted metadata", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "ALBUMSHELF_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract albums from new cover images and add them
    Scan(ScanArgs),
    /// Add an album by hand
    Add(AddArgs),
    /// List albums
    List(ListArgs),
    /// Search albums; all given criteria must match
    Search(SearchArgs),
    /// Show every field of one album
    Show {
        /// Album id or name
        album: String,
    },
    /// Change fields of one album
    Update(UpdateArgs),
    /// Fill in album details from the LLM
    Enrich {
        /// Album id or name
        album: String,
        /// Re-fetch every field, overwriting existing values
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Write all albums to a JSON or CSV file
    Export(ExportArgs),
    /// Manage the category vocabulary used for matching
    #[command(subcommand)]
    Categories(CategoryCommands),
    /// Generate the static HTML site
    Site(SiteArgs),
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Directory to scan instead of the configured image directories
    #[arg(short, long)]
    directory: Option<PathBuf>,

    /// Genre for every album found, skipping the genre prompt
    #[arg(short, long)]
    genre: Option<String>,
}

#[derive(Args, Debug)]
struct AddArgs {
    #[arg(long)]
    name: String,

    /// Performing artist; repeat for collaborations
    #[arg(long = "artist", required = true)]
    artists: Vec<String>,

    #[arg(long)]
    genre: String,

    /// Rating from 1 to 10
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
    rating: Option<u8>,

    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args, Debug)]
struct ListArgs {
    #[arg(long)]
    genre: Option<String>,

    /// name, artist, rating or date-added
    #[arg(long = "sort-by", default_value = "date-added")]
    sort_by: SortKey,
}

#[derive(Args, Debug)]
struct SearchArgs {
    #[arg(long)]
    name: Option<String>,

    #[arg(long)]
    artist: Option<String>,

    #[arg(long)]
    genre: Option<String>,

    /// Matches LLM and user categories
    #[arg(long)]
    category: Option<String>,

    #[arg(long = "rating-min", value_parser = clap::value_parser!(u8).range(1..=10))]
    rating_min: Option<u8>,

    #[arg(long = "rating-max", value_parser = clap::value_parser!(u8).range(1..=10))]
    rating_max: Option<u8>,

    #[arg(long = "sort-by")]
    sort_by: Option<SortKey>,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    /// Album id or name
    album: String,

    #[arg(long)]
    name: Option<String>,

    /// Replaces the artist list; repeat for several
    #[arg(long = "artist")]
    artists: Vec<String>,

    #[arg(long)]
    genre: Option<String>,

    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=10))]
    rating: Option<u8>,

    #[arg(long)]
    notes: Option<String>,

    #[arg(long = "release-date")]
    release_date: Option<String>,

    #[arg(long)]
    label: Option<String>,

    #[arg(long)]
    producer: Option<String>,

    /// Replaces the user categories; repeat for several
    #[arg(long = "category")]
    categories: Vec<String>,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// csv or json
    #[arg(short, long)]
    format: ExportFormat,

    /// Defaults to albums.<format> in the current directory
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum CategoryCommands {
    /// Show the configured categories
    List,
    /// Add a category
    Add { name: String },
    /// Remove a category
    Remove { name: String },
}

#[derive(Args, Debug)]
struct SiteArgs {
    /// Output directory (defaults to site.output_dir)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Regenerate even if nothing changed
    #[arg(long, default_value_t = false)]
    force: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging goes to journald or a file, never to the terminal
    let _ = logging::init(None);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Scan(args) => with_catalog(&config, |catalog, provider| {
            run_scan(catalog, &config, provider, args)
        }),
        Commands::Add(args) => with_catalog(&config, |catalog, _| run_add(catalog, args)),
        Commands::List(args) => with_catalog(&config, |catalog, _| {
            let albums = catalog.list(args.genre.as_deref(), args.sort_by)?;
            print_albums(&albums);
            Ok(())
        }),
        Commands::Search(args) => with_catalog(&config, |catalog, _| {
            let albums = catalog.search(&SearchCriteria {
                name: args.name,
                artist: args.artist,
                genre: args.genre,
                category: args.category,
                rating_min: args.rating_min,
                rating_max: args.rating_max,
                sort: args.sort_by,
            })?;
            print_albums(&albums);
            Ok(())
        }),
        Commands::Show { album } => with_catalog(&config, |catalog, _| {
            let album = catalog.get(&album)?;
            println!("{}", format_for_display(&album, true));
            Ok(())
        }),
        Commands::Update(args) => with_catalog(&config, |catalog, _| {
            let query = args.album.clone();
            let album = catalog.update(&query, update_from_args(args))?;
            println!("Updated:\n{}", format_for_display(&album, true));
            Ok(())
        }),
        Commands::Enrich { album, force } => with_catalog(&config, |catalog, _| {
            let album = catalog.enrich(&album, force)?;
            println!("{}", format_for_display(&album, true));
            Ok(())
        }),
        Commands::Export(args) => {
            let db = open_database(&config)?;
            let output = args
                .output
                .unwrap_or_else(|| args.format.default_file_name());
            let count = export_albums(&db, &output, args.format)?;
            println!(
                "Exported {} album(s) as {} to {}",
                count,
                args.format.name(),
                output.display()
            );
            Ok(())
        }
        Commands::Categories(command) => run_categories(&mut config, command),
        Commands::Site(args) => {
            let db = open_database(&config)?;
            run_site(&db, &config, args)
        }
    }
}

/// Build the provider, then open the store. Provider problems are reported
/// before the database is touched.
fn with_catalog<F>(config: &Config, f: F) -> Result<()>
where
    F: FnOnce(&Catalog<'_>, &dyn MetadataProvider) -> Result<()>,
{
    let provider = create_provider(config)?;
    let db = open_database(config)?;
    let catalog = Catalog::new(&db, provider.as_ref(), config);
    f(&catalog, provider.as_ref())
}

fn open_database(config: &Config) -> Result<Database> {
    let db = Database::open(&config.db_path)
        .with_context(|| format!("cannot open database {}", config.db_path.display()))?;
    db.initialize()?;
    Ok(db)
}

fn print_albums(albums: &[Album]) {
    if albums.is_empty() {
        println!("No albums found.");
        return;
    }
    for album in albums {
        println!("{}\n", format_for_display(album, false));
    }
    println!("{} album(s)", albums.len());
}

fn run_add(catalog: &Catalog<'_>, args: AddArgs) -> Result<()> {
    let outcome = catalog.add_manual(NewAlbum {
        album_name: args.name,
        artists: args.artists,
        genre: Some(args.genre),
        rating: args.rating,
        personal_notes: args.notes,
        source_image_path: None,
    })?;
    report_add(&outcome);

    if let AddOutcome::Added { id, .. } = outcome {
        println!("{}", format_for_display(&catalog.get(&id.to_string())?, true));
    }
    Ok(())
}

fn report_add(outcome: &AddOutcome) {
    match outcome {
        AddOutcome::Added {
            id,
            duplicate_of,
            enrich_failure,
        } => {
            println!("Added album #{}", id);
            if let Some(existing) = duplicate_of {
                println!("  note: looks like a duplicate of #{}", existing);
            }
            if let Some(reason) = enrich_failure {
                println!("  warning: {}", reason);
            }
        }
        AddOutcome::Duplicate { existing_id } => {
            println!("Already in the collection as #{}, not added", existing_id);
        }
    }
}

fn update_from_args(args: UpdateArgs) -> AlbumUpdate {
    AlbumUpdate {
        album_name: args.name,
        artists: if args.artists.is_empty() {
            None
        } else {
            Some(args.artists)
        },
        genre: args.genre,
        rating: args.rating,
        personal_notes: args.notes,
        enrichment: Enrichment {
            release_date: args.release_date,
            label: args.label,
            producer: args.producer,
            user_categories: if args.categories.is_empty() {
                None
            } else {
                Some(args.categories)
            },
            ..Default::default()
        },
    }
}

fn run_scan(
    catalog: &Catalog<'_>,
    config: &Config,
    provider: &dyn MetadataProvider,
    args: ScanArgs,
) -> Result<()> {
    let directories = match args.directory {
        Some(dir) => vec![dir],
        None => config.settings.image_directories.clone(),
    };
    println!(
        "Scanning {} with {}",
        directories
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
        provider.provider_name()
    );

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let genres = &config.settings.predefined_genres;
    let fixed_genre = args.genre;

    let report = catalog.scan(&directories, |path, extracted| {
        confirm_album(&mut input, path, extracted, fixed_genre.as_deref(), genres)
    })?;

    print_scan_report(&report);
    Ok(())
}

fn prompt(input: &mut impl BufRead, question: &str) -> Option<String> {
    print!("{}", question);
    let _ = io::stdout().flush();
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()),
    }
}

/// Interactive confirmation for one extracted album. End of input aborts
/// the scan rather than declining, so unanswered images are offered again.
fn confirm_album(
    input: &mut impl BufRead,
    path: &Path,
    extracted: &ExtractedAlbum,
    fixed_genre: Option<&str>,
    genres: &[String],
) -> Confirmation {
    println!();
    println!("{}", path.display());
    println!("  Album:   {}", extracted.album_name);
    println!("  Artists: {}", extracted.artists.join(", "));

    let Some(answer) = prompt(input, "Add this album? [Y/n] ") else {
        return Confirmation::Abort;
    };
    if answer.eq_ignore_ascii_case("n") || answer.eq_ignore_ascii_case("no") {
        return Confirmation::Decline;
    }

    let genre = match fixed_genre {
        Some(genre) => genre.to_string(),
        None => {
            if !genres.is_empty() {
                println!("  Genres: {}", genres.join(", "));
            }
            loop {
                let Some(genre) = prompt(input, "Genre: ") else {
                    return Confirmation::Abort;
                };
                if !genre.is_empty() {
                    break genre;
                }
                println!("  Genre is required.");
            }
        }
    };

    let rating = loop {
        let Some(answer) = prompt(input, "Rating 1-10 (0 or blank to skip): ") else {
            return Confirmation::Abort;
        };
        if answer.is_empty() || answer == "0" {
            break None;
        }
        match answer.parse::<u8>() {
            Ok(r) if (1..=10).contains(&r) => break Some(r),
            _ => println!("  Enter a number from 1 to 10."),
        }
    };

    Confirmation::Accept(UserDetails {
        genre,
        rating,
        personal_notes: None,
    })
}

fn print_scan_report(report: &ScanReport) {
    for (path, outcome) in &report.images {
        match outcome {
            ImageOutcome::Processed(albums) => {
                for entry in albums {
                    print!("{}: {}: ", path.display(), entry.album.album_name);
                    match &entry.result {
                        AlbumResult::Stored(outcome) => report_add(outcome),
                        AlbumResult::Declined => println!("declined"),
                        AlbumResult::Invalid(reason) => println!("not added ({})", reason),
                    }
                }
            }
            ImageOutcome::Skipped { reason } => {
                println!("{}: skipped ({})", path.display(), reason);
            }
            ImageOutcome::Aborted => {}
        }
    }
    for (path, error) in &report.failures {
        println!("{}: failed ({})", path.display(), error);
    }

    println!();
    println!(
        "{} image(s): {} added, {} duplicate(s), {} skipped, {} failed",
        report.images.len() + report.failures.len(),
        report.added(),
        report.duplicates(),
        report.skipped(),
        report.failures.len()
    );
    if report.aborted {
        println!("Scan stopped early; remaining images will be offered on the next scan.");
    }
}

fn run_categories(config: &mut Config, command: CategoryCommands) -> Result<()> {
    match command {
        CategoryCommands::List => {
            if config.settings.user_categories.is_empty() {
                println!("No categories configured.");
            }
            for category in &config.settings.user_categories {
                println!("{}", category);
            }
        }
        CategoryCommands::Add { name } => {
            if config.add_category(&name)? {
                config.save()?;
                println!("Added category '{}'", name.trim().to_lowercase());
            } else {
                println!("Category '{}' already exists", name.trim().to_lowercase());
            }
        }
        CategoryCommands::Remove { name } => {
            if config.remove_category(&name) {
                config.save()?;
                println!("Removed category '{}'", name.trim().to_lowercase());
            } else {
                anyhow::bail!("category '{}' is not configured", name.trim());
            }
        }
    }
    Ok(())
}

fn run_site(db: &Database, config: &Config, args: SiteArgs) -> Result<()> {
    let output = args
        .output
        .unwrap_or_else(|| config.site.output_dir.clone());
    let report = site::generate(db, &config.site.title, &output, args.force)?;

    if report.skipped {
        println!("No changes since last build; {} is up to date (use --force to rebuild)", output.display());
    } else {
        println!(
            "Wrote {} file(s) for {} album(s) to {}",
            report.files_written,
            report.albums,
            output.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn extracted() -> ExtractedAlbum {
        ExtractedAlbum {
            album_name: "Kind of Blue".to_string(),
            artists: vec!["Miles Davis".to_string()],
        }
    }

    fn answer(input: &str, fixed_genre: Option<&str>) -> Confirmation {
        let mut input = Cursor::new(input.as_bytes().to_vec());
        confirm_album(&mut input, Path::new("cover.jpg"), &extracted(), fixed_genre, &[])
    }

    #[test]
    fn test_end_of_input_aborts() {
        assert!(matches!(answer("", Some("jazz")), Confirmation::Abort));
        // Input ends halfway through the questions
        assert!(matches!(answer("y\n", None), Confirmation::Abort));
        assert!(matches!(answer("y\njazz\n", None), Confirmation::Abort));
    }

    #[test]
    fn test_no_declines() {
        assert!(matches!(answer("n\n", Some("jazz")), Confirmation::Decline));
        assert!(matches!(answer("No\n", None), Confirmation::Decline));
    }

    #[test]
    fn test_accept_collects_details() {
        match answer("\n\njazz\n11\n9\n", None) {
            Confirmation::Accept(details) => {
                assert_eq!(details.genre, "jazz");
                assert_eq!(details.rating, Some(9));
            }
            other => panic!("unexpected {:?}", other),
        }
        match answer("y\n0\n", Some("rock")) {
            Confirmation::Accept(details) => {
                assert_eq!(details.genre, "rock");
                assert_eq!(details.rating, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
