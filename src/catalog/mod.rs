//! Catalog operations: adding, enriching, updating and querying albums.
//!
//! The catalog owns no state. It borrows the record store, the metadata
//! provider and the loaded configuration for the duration of one command.

pub mod display;

use std::path::{Path, PathBuf};

use crate::config::{Config, DuplicatePolicy};
use crate::db::{
    Album, AlbumLookup, AlbumUpdate, Database, Enrichment, NewAlbum, SearchCriteria, SortKey,
};
use crate::error::{CatalogError, Result};
use crate::llm::{EnrichmentRequest, ExtractedAlbum, MetadataProvider};
use crate::scanner::{image_key, pending_images};

pub use display::{format_for_display, rating_stars};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added {
        id: i64,
        /// Set when the duplicate policy is `warn` and a likely match existed
        duplicate_of: Option<i64>,
        /// Auto-enrichment failure; the album itself was stored
        enrich_failure: Option<String>,
    },
    Duplicate {
        existing_id: i64,
    },
}

/// The user's answer for one extracted album.
#[derive(Debug, Clone)]
pub enum Confirmation {
    Accept(UserDetails),
    Decline,
    /// Stop scanning; the current image is left unprocessed
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlbumResult {
    Stored(AddOutcome),
    Declined,
    /// Rejected by validation, e.g. an empty genre
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageAlbum {
    pub album: ExtractedAlbum,
    pub result: AlbumResult,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageOutcome {
    /// One entry per album read off the image
    Processed(Vec<ImageAlbum>),
    Skipped { reason: String },
    /// Confirmation was aborted before anything was written
    Aborted,
}

impl ImageOutcome {
    fn count(&self, wanted: fn(&AlbumResult) -> bool) -> usize {
        match self {
            ImageOutcome::Processed(albums) => albums.iter().filter(|a| wanted(&a.result)).count(),
            _ => 0,
        }
    }

    pub fn added(&self) -> usize {
        self.count(|r| matches!(r, AlbumResult::Stored(AddOutcome::Added { .. })))
    }
}

/// What the user supplies after seeing an extracted album.
#[derive(Debug, Clone, Default)]
pub struct UserDetails {
    pub genre: String,
    pub rating: Option<u8>,
    pub personal_notes: Option<String>,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub images: Vec<(PathBuf, ImageOutcome)>,
    /// Images that hit an infrastructure error; the scan carried on
    pub failures: Vec<(PathBuf, String)>,
    /// The user stopped the scan before every image was seen
    pub aborted: bool,
}

impl ScanReport {
    pub fn added(&self) -> usize {
        self.images.iter().map(|(_, o)| o.added()).sum()
    }

    pub fn duplicates(&self) -> usize {
        self.images
            .iter()
            .map(|(_, o)| o.count(|r| matches!(r, AlbumResult::Stored(AddOutcome::Duplicate { .. }))))
            .sum()
    }

    /// Unreadable images plus albums the user declined or that failed validation.
    pub fn skipped(&self) -> usize {
        self.images
            .iter()
            .map(|(_, o)| match o {
                ImageOutcome::Skipped { .. } => 1,
                _ => o.count(|r| !matches!(r, AlbumResult::Stored(_))),
            })
            .sum()
    }
}

/// Lowercase, drop punctuation, collapse whitespace.
fn normalize(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalized_artists(artists: &[String]) -> Vec<String> {
    let mut artists: Vec<String> = artists.iter().map(|a| normalize(a)).collect();
    artists.sort();
    artists
}

fn validate_rating(rating: Option<u8>) -> Result<()> {
    match rating {
        Some(r) if !(1..=10).contains(&r) => Err(CatalogError::Validation(format!(
            "rating must be between 1 and 10, got {}",
            r
        ))),
        _ => Ok(()),
    }
}

pub struct Catalog<'a> {
    store: &'a Database,
    provider: &'a dyn MetadataProvider,
    config: &'a Config,
}

impl<'a> Catalog<'a> {
    pub fn new(store: &'a Database, provider: &'a dyn MetadataProvider, config: &'a Config) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    /// Likely duplicate: same normalized name and the same normalized artist set.
    pub fn find_duplicate(&self, album_name: &str, artists: &[String]) -> Result<Option<Album>> {
        let name = normalize(album_name);
        let artists = normalized_artists(artists);

        let existing = self.store.search_albums(&SearchCriteria::default())?;
        Ok(existing
            .into_iter()
            .find(|a| normalize(&a.album_name) == name && normalized_artists(&a.artists) == artists))
    }

    pub fn add_manual(&self, album: NewAlbum) -> Result<AddOutcome> {
        let album = NewAlbum {
            album_name: album.album_name.trim().to_string(),
            artists: album
                .artists
                .iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            genre: album
                .genre
                .map(|g| g.trim().to_string())
                .filter(|g| !g.is_empty()),
            ..album
        };

        if album.album_name.is_empty() {
            return Err(CatalogError::Validation("album name is required".to_string()));
        }
        if album.artists.is_empty() {
            return Err(CatalogError::Validation(
                "at least one artist is required".to_string(),
            ));
        }
        if album.genre.is_none() {
            return Err(CatalogError::Validation("genre is required".to_string()));
        }
        validate_rating(album.rating)?;

        let mut duplicate_of = None;
        if let Some(existing) = self.find_duplicate(&album.album_name, &album.artists)? {
            match self.config.settings.duplicate_policy {
                DuplicatePolicy::Block => {
                    tracing::info!(
                        "Skipping '{}': already in catalog as #{}",
                        album.album_name,
                        existing.id
                    );
                    return Ok(AddOutcome::Duplicate {
                        existing_id: existing.id,
                    });
                }
                DuplicatePolicy::Warn => {
                    tracing::warn!(
                        "'{}' looks like a duplicate of #{}, adding anyway",
                        album.album_name,
                        existing.id
                    );
                    duplicate_of = Some(existing.id);
                }
            }
        }

        let id = self.store.add_album(&album)?;
        tracing::info!("Added album #{} '{}'", id, album.album_name);

        let mut enrich_failure = None;
        if self.config.settings.auto_enrich {
            let stored = self.store.get_by_id(id)?;
            if let Err(e) = self.enrich_album(&stored, false) {
                tracing::warn!("Auto-enrichment failed for #{}: {}", id, e);
                enrich_failure = Some(e.to_string());
            }
        }

        Ok(AddOutcome::Added {
            id,
            duplicate_of,
            enrich_failure,
        })
    }

    /// Extract the albums on an image and add the ones the user confirms.
    /// The image is marked processed unless the user aborts.
    pub fn add_from_image<F>(&self, path: &Path, mut confirm: F) -> Result<ImageOutcome>
    where
        F: FnMut(&Path, &ExtractedAlbum) -> Confirmation,
    {
        let key = image_key(path);
        let outcome = self.process_image(path, &mut confirm);

        match &outcome {
            Ok(ImageOutcome::Aborted) => {
                tracing::info!("Stopped at {:?}, it will be offered again next scan", path);
                return outcome;
            }
            Ok(ImageOutcome::Skipped { reason }) => tracing::warn!("Skipped {:?}: {}", path, reason),
            _ => {}
        }

        let added = outcome.as_ref().map(ImageOutcome::added).unwrap_or(0);
        self.store.mark_image_processed(&key, added as u32)?;
        outcome
    }

    fn process_image<F>(&self, path: &Path, confirm: &mut F) -> Result<ImageOutcome>
    where
        F: FnMut(&Path, &ExtractedAlbum) -> Confirmation,
    {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                return Ok(ImageOutcome::Skipped {
                    reason: format!("cannot read image: {}", e),
                })
            }
        };

        let extracted = match self.provider.extract_from_image(&bytes) {
            Ok(extracted) => extracted,
            Err(e) => {
                return Ok(ImageOutcome::Skipped {
                    reason: CatalogError::Extraction(e).to_string(),
                })
            }
        };
        tracing::debug!("Extracted {} album(s) from {:?}", extracted.len(), path);

        // Every album is confirmed before any is written, so an abort
        // leaves the image exactly as it was
        let mut answers = Vec::with_capacity(extracted.len());
        for album in extracted {
            match confirm(path, &album) {
                Confirmation::Abort => return Ok(ImageOutcome::Aborted),
                answer => answers.push((album, answer)),
            }
        }

        let mut albums = Vec::with_capacity(answers.len());
        for (album, answer) in answers {
            let result = match answer {
                Confirmation::Accept(details) => {
                    let new_album = NewAlbum {
                        album_name: album.album_name.clone(),
                        artists: album.artists.clone(),
                        genre: Some(details.genre),
                        rating: details.rating,
                        personal_notes: details.personal_notes,
                        source_image_path: Some(path.to_string_lossy().into_owned()),
                    };
                    match self.add_manual(new_album) {
                        Ok(outcome) => AlbumResult::Stored(outcome),
                        Err(CatalogError::Validation(reason)) => AlbumResult::Invalid(reason),
                        Err(e) => return Err(e),
                    }
                }
                _ => AlbumResult::Declined,
            };
            albums.push(ImageAlbum { album, result });
        }

        Ok(ImageOutcome::Processed(albums))
    }

    /// Run every unprocessed image in `directories` through [`Self::add_from_image`].
    /// An abort ends the scan early.
    pub fn scan<F>(&self, directories: &[PathBuf], mut confirm: F) -> Result<ScanReport>
    where
        F: FnMut(&Path, &ExtractedAlbum) -> Confirmation,
    {
        let mut report = ScanReport::default();
        let extensions = &self.config.settings.image_extensions;

        for directory in directories {
            let pending = pending_images(self.store, directory, extensions)?;
            tracing::info!("{} new image(s) in {:?}", pending.len(), directory);

            for path in pending {
                match self.add_from_image(&path, &mut confirm) {
                    Ok(ImageOutcome::Aborted) => {
                        report.aborted = true;
                        return Ok(report);
                    }
                    Ok(outcome) => report.images.push((path, outcome)),
                    Err(e) => {
                        tracing::error!("Failed to process {:?}: {}", path, e);
                        report.failures.push((path, e.to_string()));
                    }
                }
            }
        }

        Ok(report)
    }

    /// Resolve an id or name to exactly one album.
    pub fn resolve(&self, query: &str) -> Result<Album> {
        match self.store.find_album(query)? {
            AlbumLookup::Found(album) => Ok(album),
            AlbumLookup::Ambiguous(albums) => Err(CatalogError::Ambiguous {
                query: query.trim().to_string(),
                candidates: albums.iter().map(Album::label_line).collect(),
            }),
        }
    }

    pub fn get(&self, query: &str) -> Result<Album> {
        self.resolve(query)
    }

    pub fn enrich(&self, query: &str, force: bool) -> Result<Album> {
        let album = self.resolve(query)?;
        self.enrich_album(&album, force)
    }

    /// Ask the provider for missing fields (all fields if `force`) and merge
    /// the answer. Nothing is written unless the provider call succeeds.
    pub fn enrich_album(&self, album: &Album, force: bool) -> Result<Album> {
        let vocabulary = &self.config.settings.user_categories;
        let current = album.enrichment();

        if !force && current.missing_fields(!vocabulary.is_empty()).is_empty() {
            tracing::debug!("#{} already fully enriched", album.id);
            return Ok(album.clone());
        }

        let blank = Enrichment::default();
        let request = EnrichmentRequest {
            album_name: &album.album_name,
            artists: &album.artists,
            existing: if force { &blank } else { &current },
            vocabulary,
        };

        tracing::info!(
            "Enriching #{} '{}' via {}",
            album.id,
            album.album_name,
            self.provider.provider_name()
        );
        let incoming = self
            .provider
            .enrich(&request)
            .map_err(CatalogError::Enrichment)?;

        let changes = current.merge(&incoming, force);
        if changes.is_empty() {
            return Ok(album.clone());
        }

        self.store.update_album(
            album.id,
            &AlbumUpdate {
                enrichment: changes,
                ..Default::default()
            },
        )
    }

    pub fn update(&self, query: &str, update: AlbumUpdate) -> Result<Album> {
        if update.is_empty() {
            return Err(CatalogError::Validation("nothing to update".to_string()));
        }
        validate_rating(update.rating)?;
        if let Some(ref genre) = update.genre {
            if genre.trim().is_empty() {
                return Err(CatalogError::Validation("genre cannot be empty".to_string()));
            }
        }

        let album = self.resolve(query)?;
        let updated = self.store.update_album(album.id, &update)?;
        tracing::info!("Updated album #{}", updated.id);
        Ok(updated)
    }

    pub fn search(&self, criteria: &SearchCriteria) -> Result<Vec<Album>> {
        validate_rating(criteria.rating_min)?;
        validate_rating(criteria.rating_max)?;
        self.store.search_albums(criteria)
    }

    pub fn list(&self, genre: Option<&str>, sort: SortKey) -> Result<Vec<Album>> {
        self.store.search_albums(&SearchCriteria {
            genre: genre.map(|g| g.to_string()),
            sort: Some(sort),
            ..Default::default()
        })
    }
}
