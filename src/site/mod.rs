//! Static HTML site generated from the album store.
//!
//! Generation is skipped when the store has not changed since the last run.
//! The store fingerprint is kept in a sidecar file in the output directory
//! and written only after every page has been written, so an interrupted
//! run is redone next time.

pub mod pages;

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;

use crate::db::{Album, Database, SearchCriteria};
use crate::error::Result;

pub const FINGERPRINT_FILE: &str = ".albumshelf-fingerprint";

pub(crate) const UNKNOWN: &str = "Unknown";

const GENRE_PALETTE: [&str; 10] = [
    "#e57373", "#f06292", "#ba68c8", "#7986cb", "#4fc3f7", "#4db6ac", "#81c784", "#dce775",
    "#ffb74d", "#a1887f",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateReport {
    /// True when the store was unchanged and nothing was written
    pub skipped: bool,
    pub files_written: usize,
    pub albums: usize,
}

/// Case- and whitespace-insensitive form of a genre, used wherever genres
/// are compared.
pub(crate) fn genre_key(genre: &str) -> String {
    genre.trim().to_lowercase()
}

/// Badge colour for a genre. Same genre, same colour, on every run.
pub fn genre_color(genre: &str) -> &'static str {
    let digest = Sha256::digest(genre_key(genre).as_bytes());
    GENRE_PALETTE[digest[0] as usize % GENRE_PALETTE.len()]
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Leading four-digit year of a release date, if there is one.
pub fn release_year(release_date: Option<&str>) -> Option<u16> {
    let date = release_date?.trim();
    let year = date.get(..4)?;
    if year.chars().all(|c| c.is_ascii_digit()) {
        year.parse().ok()
    } else {
        None
    }
}

pub(crate) struct Group<'a> {
    pub name: String,
    pub albums: Vec<&'a Album>,
}

/// Bucket albums under every key `keys` returns for them. Groups sort
/// case-insensitively, albums inside a group by name.
pub(crate) fn group_albums<F>(albums: &[Album], keys: F) -> Vec<Group<'_>>
where
    F: Fn(&Album) -> Vec<String>,
{
    let mut buckets: HashMap<String, Vec<&Album>> = HashMap::new();
    for album in albums {
        for key in keys(album) {
            let key = key.trim().to_string();
            if key.is_empty() {
                continue;
            }
            let bucket = buckets.entry(key).or_default();
            if !bucket.iter().any(|a| a.id == album.id) {
                bucket.push(album);
            }
        }
    }

    let mut groups: Vec<Group<'_>> = buckets
        .into_iter()
        .map(|(name, mut albums)| {
            albums.sort_by(|a, b| {
                a.album_name
                    .to_lowercase()
                    .cmp(&b.album_name.to_lowercase())
                    .then(a.id.cmp(&b.id))
            });
            Group { name, albums }
        })
        .collect();
    groups.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name))
    });
    groups
}

pub(crate) fn move_unknown_last(groups: &mut Vec<Group<'_>>) {
    if let Some(pos) = groups.iter().position(|g| g.name == UNKNOWN) {
        let unknown = groups.remove(pos);
        groups.push(unknown);
    }
}

fn write_page(output_dir: &Path, relative: &str, content: &str) -> Result<()> {
    let path = output_dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Regenerate the site in `output_dir` if the store changed (or `force`).
pub fn generate(db: &Database, site_title: &str, output_dir: &Path, force: bool) -> Result<GenerateReport> {
    let store = db.fingerprint()?;
    // The title is on every page, so a new title invalidates the site too
    let fingerprint = format!("{}|{}", store, site_title);
    let sidecar = output_dir.join(FINGERPRINT_FILE);

    if !force {
        if let Ok(previous) = std::fs::read_to_string(&sidecar) {
            if previous.trim() == fingerprint.trim() {
                tracing::info!("Album store unchanged, site at {:?} is up to date", output_dir);
                return Ok(GenerateReport {
                    skipped: true,
                    files_written: 0,
                    albums: store.count as usize,
                });
            }
        }
    }

    let albums = db.search_albums(&SearchCriteria::default())?;
    std::fs::create_dir_all(output_dir)?;

    let mut written = 0;
    let mut write = |relative: &str, content: String| -> Result<()> {
        write_page(output_dir, relative, &content)?;
        written += 1;
        Ok(())
    };

    write("style.css", pages::STYLE_CSS.to_string())?;
    write("index.html", pages::dashboard(site_title, &albums))?;
    write("albums/index.html", pages::album_index(site_title, &albums))?;
    for album in &albums {
        write(&format!("albums/{}.html", album.id), pages::album_page(site_title, album))?;
    }
    write("artists.html", pages::artists_page(site_title, &albums))?;
    write("genres.html", pages::genres_page(site_title, &albums))?;
    write("years.html", pages::years_page(site_title, &albums))?;
    write("categories.html", pages::categories_page(site_title, &albums))?;

    std::fs::write(&sidecar, &fingerprint)?;

    tracing::info!(
        "Generated site for {} album(s) in {:?} ({} files)",
        albums.len(),
        output_dir,
        written
    );

    Ok(GenerateReport {
        skipped: false,
        files_written: written,
        albums: albums.len(),
    })
}
