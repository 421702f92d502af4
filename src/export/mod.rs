use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::db::{Album, Database, SearchCriteria};
use crate::error::Result;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn default_file_name(&self) -> PathBuf {
        PathBuf::from(format!("albums.{}", self.extension()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExportFormat::Json => "JSON",
            ExportFormat::Csv => "CSV",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unknown export format '{}' (expected csv or json)", other)),
        }
    }
}

/// Separator for list fields in CSV cells
const CSV_LIST_SEPARATOR: &str = "; ";

const CSV_HEADER: [&str; 21] = [
    "id",
    "album_name",
    "artists",
    "genre",
    "rating",
    "personal_notes",
    "release_date",
    "label",
    "producer",
    "total_duration",
    "track_count",
    "track_listing",
    "album_review",
    "musical_style",
    "similar_artists",
    "awards",
    "llm_categories",
    "user_categories",
    "source_image_path",
    "date_added",
    "last_updated",
];

/// Export every album to `output_path`, ordered by id. Returns the number written.
pub fn export_albums(db: &Database, output_path: &Path, format: ExportFormat) -> Result<usize> {
    let albums = db.search_albums(&SearchCriteria::default())?;
    let count = albums.len();

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    match format {
        ExportFormat::Json => export_json(&albums, output_path)?,
        ExportFormat::Csv => export_csv(&albums, output_path)?,
    }

    tracing::info!(
        "Exported {} album(s) as {} to {:?}",
        count,
        format.name(),
        output_path
    );
    Ok(count)
}

fn export_json(albums: &[Album], output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(albums)?;
    let mut file = File::create(output_path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

fn export_csv(albums: &[Album], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;

    wtr.write_record(CSV_HEADER)?;

    for album in albums {
        let id = album.id.to_string();
        let rating = album.rating.map(|v| v.to_string()).unwrap_or_default();
        let track_count = album.track_count.map(|v| v.to_string()).unwrap_or_default();
        let artists = album.artists.join(CSV_LIST_SEPARATOR);
        let track_listing = album.track_listing.join(CSV_LIST_SEPARATOR);
        let similar_artists = album.similar_artists.join(CSV_LIST_SEPARATOR);
        let awards = album.awards.join(CSV_LIST_SEPARATOR);
        let llm_categories = album.llm_categories.join(CSV_LIST_SEPARATOR);
        let user_categories = album.user_categories.join(CSV_LIST_SEPARATOR);

        wtr.write_record([
            id.as_str(),
            album.album_name.as_str(),
            artists.as_str(),
            opt(&album.genre),
            rating.as_str(),
            opt(&album.personal_notes),
            opt(&album.release_date),
            opt(&album.label),
            opt(&album.producer),
            opt(&album.total_duration),
            track_count.as_str(),
            track_listing.as_str(),
            opt(&album.album_review),
            opt(&album.musical_style),
            similar_artists.as_str(),
            awards.as_str(),
            llm_categories.as_str(),
            user_categories.as_str(),
            opt(&album.source_image_path),
            album.date_added.as_str(),
            album.last_updated.as_str(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
