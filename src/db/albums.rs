//! Album records and the queries over them.

use rusqlite::types::Value;
use rusqlite::{params_from_iter, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{now_timestamp, Database};
use crate::error::{CatalogError, Result};

/// A stored album. Empty lists mean the field has not been filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    pub id: i64,
    pub album_name: String,
    pub artists: Vec<String>,
    pub genre: Option<String>,
    pub rating: Option<u8>,
    pub personal_notes: Option<String>,

    pub release_date: Option<String>,
    pub label: Option<String>,
    pub producer: Option<String>,
    pub total_duration: Option<String>,
    pub track_count: Option<u32>,
    pub track_listing: Vec<String>,
    pub album_review: Option<String>,
    pub musical_style: Option<String>,
    pub similar_artists: Vec<String>,
    pub awards: Vec<String>,
    pub llm_categories: Vec<String>,
    pub user_categories: Vec<String>,

    pub source_image_path: Option<String>,
    pub date_added: String,
    pub last_updated: String,
}

/// Fields supplied when a record is first inserted.
#[derive(Debug, Clone, Default)]
pub struct NewAlbum {
    pub album_name: String,
    pub artists: Vec<String>,
    pub genre: Option<String>,
    pub rating: Option<u8>,
    pub personal_notes: Option<String>,
    pub source_image_path: Option<String>,
}

/// The enrichable fields. `None` means absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub release_date: Option<String>,
    pub label: Option<String>,
    pub producer: Option<String>,
    pub total_duration: Option<String>,
    pub track_count: Option<u32>,
    pub track_listing: Option<Vec<String>>,
    pub album_review: Option<String>,
    pub musical_style: Option<String>,
    pub similar_artists: Option<Vec<String>>,
    pub awards: Option<Vec<String>>,
    pub llm_categories: Option<Vec<String>>,
    pub user_categories: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichField {
    ReleaseDate,
    Label,
    Producer,
    TotalDuration,
    TrackCount,
    TrackListing,
    AlbumReview,
    MusicalStyle,
    SimilarArtists,
    Awards,
    LlmCategories,
    UserCategories,
}

impl EnrichField {
    pub const ALL: [EnrichField; 12] = [
        EnrichField::ReleaseDate,
        EnrichField::Label,
        EnrichField::Producer,
        EnrichField::TotalDuration,
        EnrichField::TrackCount,
        EnrichField::TrackListing,
        EnrichField::AlbumReview,
        EnrichField::MusicalStyle,
        EnrichField::SimilarArtists,
        EnrichField::Awards,
        EnrichField::LlmCategories,
        EnrichField::UserCategories,
    ];

    /// Key used in provider responses.
    pub fn key(&self) -> &'static str {
        match self {
            EnrichField::ReleaseDate => "release_date",
            EnrichField::Label => "label",
            EnrichField::Producer => "producer",
            EnrichField::TotalDuration => "total_duration",
            EnrichField::TrackCount => "track_count",
            EnrichField::TrackListing => "track_listing",
            EnrichField::AlbumReview => "album_review",
            EnrichField::MusicalStyle => "musical_style",
            EnrichField::SimilarArtists => "similar_artists",
            EnrichField::Awards => "awards",
            EnrichField::LlmCategories => "categories",
            EnrichField::UserCategories => "matched_categories",
        }
    }
}

impl Enrichment {
    pub fn has(&self, field: EnrichField) -> bool {
        match field {
            EnrichField::ReleaseDate => self.release_date.is_some(),
            EnrichField::Label => self.label.is_some(),
            EnrichField::Producer => self.producer.is_some(),
            EnrichField::TotalDuration => self.total_duration.is_some(),
            EnrichField::TrackCount => self.track_count.is_some(),
            EnrichField::TrackListing => self.track_listing.is_some(),
            EnrichField::AlbumReview => self.album_review.is_some(),
            EnrichField::MusicalStyle => self.musical_style.is_some(),
            EnrichField::SimilarArtists => self.similar_artists.is_some(),
            EnrichField::Awards => self.awards.is_some(),
            EnrichField::LlmCategories => self.llm_categories.is_some(),
            EnrichField::UserCategories => self.user_categories.is_some(),
        }
    }

    /// Fields still absent. User categories are only considered when a
    /// vocabulary exists to match against.
    pub fn missing_fields(&self, with_user_categories: bool) -> Vec<EnrichField> {
        EnrichField::ALL
            .iter()
            .copied()
            .filter(|f| with_user_categories || *f != EnrichField::UserCategories)
            .filter(|f| !self.has(*f))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        EnrichField::ALL.iter().all(|f| !self.has(*f))
    }

    /// Fold `incoming` into `self`. With `force` every field present in
    /// `incoming` wins, otherwise only absent fields are filled.
    /// Returns the subset that actually changed.
    pub fn merge(&self, incoming: &Enrichment, force: bool) -> Enrichment {
        fn pick<T: Clone>(current: &Option<T>, new: &Option<T>, force: bool) -> Option<T> {
            match (current, new) {
                (_, None) => None,
                (None, Some(v)) => Some(v.clone()),
                (Some(_), Some(v)) if force => Some(v.clone()),
                (Some(_), Some(_)) => None,
            }
        }

        Enrichment {
            release_date: pick(&self.release_date, &incoming.release_date, force),
            label: pick(&self.label, &incoming.label, force),
            producer: pick(&self.producer, &incoming.producer, force),
            total_duration: pick(&self.total_duration, &incoming.total_duration, force),
            track_count: pick(&self.track_count, &incoming.track_count, force),
            track_listing: pick(&self.track_listing, &incoming.track_listing, force),
            album_review: pick(&self.album_review, &incoming.album_review, force),
            musical_style: pick(&self.musical_style, &incoming.musical_style, force),
            similar_artists: pick(&self.similar_artists, &incoming.similar_artists, force),
            awards: pick(&self.awards, &incoming.awards, force),
            llm_categories: pick(&self.llm_categories, &incoming.llm_categories, force),
            user_categories: pick(&self.user_categories, &incoming.user_categories, force),
        }
    }
}

/// Partial update: only `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct AlbumUpdate {
    pub album_name: Option<String>,
    pub artists: Option<Vec<String>>,
    pub genre: Option<String>,
    pub rating: Option<u8>,
    pub personal_notes: Option<String>,
    pub enrichment: Enrichment,
}

impl AlbumUpdate {
    pub fn is_empty(&self) -> bool {
        self.album_name.is_none()
            && self.artists.is_none()
            && self.genre.is_none()
            && self.rating.is_none()
            && self.personal_notes.is_none()
            && self.enrichment.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Artist,
    Rating,
    DateAdded,
}

impl SortKey {
    fn order_clause(&self) -> &'static str {
        match self {
            SortKey::Name => "album_name COLLATE NOCASE ASC, id ASC",
            SortKey::Artist => "json_extract(artists, '$[0]') COLLATE NOCASE ASC, id ASC",
            SortKey::Rating => "rating IS NULL, rating DESC, id ASC",
            SortKey::DateAdded => "date_added ASC, id ASC",
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "name" => Ok(SortKey::Name),
            "artist" => Ok(SortKey::Artist),
            "rating" => Ok(SortKey::Rating),
            "date-added" | "date" | "added" => Ok(SortKey::DateAdded),
            other => Err(format!(
                "unknown sort key '{}' (expected name, artist, rating or date-added)",
                other
            )),
        }
    }
}

/// Search filters. Every supplied criterion must hold.
#[derive(Debug, Clone, Default)]
pub struct SearchCriteria {
    pub name: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub category: Option<String>,
    pub rating_min: Option<u8>,
    pub rating_max: Option<u8>,
    pub sort: Option<SortKey>,
}

/// Result of looking an album up by id or name.
#[derive(Debug, Clone)]
pub enum AlbumLookup {
    Found(Album),
    /// Several names matched; the caller has to pick one
    Ambiguous(Vec<Album>),
}

/// Cheap summary of the table, changes whenever a row is added or updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFingerprint {
    pub count: i64,
    pub max_last_updated: Option<String>,
    pub max_id: Option<i64>,
}

impl std::fmt::Display for StoreFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}|{}|{}",
            self.count,
            self.max_last_updated.as_deref().unwrap_or("-"),
            self.max_id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string())
        )
    }
}

const ALBUM_COLUMNS: &str = "id, album_name, artists, genre, rating, personal_notes, \
     release_date, label, producer, total_duration, track_count, track_listing, \
     album_review, musical_style, similar_artists, awards, llm_categories, user_categories, \
     source_image_path, date_added, last_updated";

fn encode_list(values: &[String]) -> Option<String> {
    if values.is_empty() {
        None
    } else {
        serde_json::to_string(values).ok()
    }
}

fn decode_list(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str::<Vec<String>>(&s).ok())
        .unwrap_or_default()
}

fn album_from_row(row: &Row<'_>) -> rusqlite::Result<Album> {
    Ok(Album {
        id: row.get(0)?,
        album_name: row.get(1)?,
        artists: decode_list(row.get(2)?),
        genre: row.get(3)?,
        rating: row.get(4)?,
        personal_notes: row.get(5)?,
        release_date: row.get(6)?,
        label: row.get(7)?,
        producer: row.get(8)?,
        total_duration: row.get(9)?,
        track_count: row.get(10)?,
        track_listing: decode_list(row.get(11)?),
        album_review: row.get(12)?,
        musical_style: row.get(13)?,
        similar_artists: decode_list(row.get(14)?),
        awards: decode_list(row.get(15)?),
        llm_categories: decode_list(row.get(16)?),
        user_categories: decode_list(row.get(17)?),
        source_image_path: row.get(18)?,
        date_added: row.get(19)?,
        last_updated: row.get(20)?,
    })
}

fn clean_artists(artists: &[String]) -> Vec<String> {
    artists
        .iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect()
}

/// Escape LIKE wildcards so user text matches literally.
fn like_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn text_value(value: &Option<String>) -> Value {
    match value {
        Some(s) => Value::Text(s.clone()),
        None => Value::Null,
    }
}

fn list_value(values: &[String]) -> Value {
    match encode_list(values) {
        Some(s) => Value::Text(s),
        None => Value::Null,
    }
}

impl Album {
    /// Current enrichment values, with empty strings and lists treated as absent.
    pub fn enrichment(&self) -> Enrichment {
        fn text(v: &Option<String>) -> Option<String> {
            v.as_ref().filter(|s| !s.trim().is_empty()).cloned()
        }
        fn list(v: &[String]) -> Option<Vec<String>> {
            if v.is_empty() {
                None
            } else {
                Some(v.to_vec())
            }
        }

        Enrichment {
            release_date: text(&self.release_date),
            label: text(&self.label),
            producer: text(&self.producer),
            total_duration: text(&self.total_duration),
            track_count: self.track_count,
            track_listing: list(&self.track_listing),
            album_review: text(&self.album_review),
            musical_style: text(&self.musical_style),
            similar_artists: list(&self.similar_artists),
            awards: list(&self.awards),
            llm_categories: list(&self.llm_categories),
            user_categories: list(&self.user_categories),
        }
    }

    /// Short `#id Name - Artists` label for disambiguation lists.
    pub fn label_line(&self) -> String {
        format!("#{} {} - {}", self.id, self.album_name, self.artists.join(", "))
    }
}

impl Database {
    /// Insert a new album and return its id.
    pub fn add_album(&self, album: &NewAlbum) -> Result<i64> {
        let name = album.album_name.trim();
        let artists = clean_artists(&album.artists);
        if name.is_empty() {
            return Err(CatalogError::Validation("album name is required".to_string()));
        }
        if artists.is_empty() {
            return Err(CatalogError::Validation(
                "at least one artist is required".to_string(),
            ));
        }

        let now = now_timestamp();
        self.conn.execute(
            r#"
            INSERT INTO albums (
                album_name, artists, genre, rating, personal_notes,
                source_image_path, date_added, last_updated
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            rusqlite::params![
                name,
                encode_list(&artists),
                album.genre,
                album.rating,
                album.personal_notes,
                album.source_image_path,
                now,
                now,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_by_id(&self, id: i64) -> Result<Album> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM albums WHERE id = ?", ALBUM_COLUMNS),
                [id],
                album_from_row,
            )
            .optional()?
            .ok_or_else(|| CatalogError::NotFound(format!("no album with id {}", id)))
    }

    /// Look up by numeric id or by case-insensitive name (exact first, then substring).
    pub fn find_album(&self, query: &str) -> Result<AlbumLookup> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CatalogError::Validation("empty album identifier".to_string()));
        }

        if let Ok(id) = query.parse::<i64>() {
            match self.get_by_id(id) {
                Ok(album) => return Ok(AlbumLookup::Found(album)),
                // Numeric titles ("1999", "21") fall through to a name lookup
                Err(CatalogError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        let mut matches = self.query_albums(
            &format!(
                "SELECT {} FROM albums WHERE lower(album_name) = lower(?) ORDER BY id",
                ALBUM_COLUMNS
            ),
            vec![Value::Text(query.to_string())],
        )?;

        if matches.is_empty() {
            matches = self.query_albums(
                &format!(
                    "SELECT {} FROM albums WHERE album_name LIKE ? ESCAPE '\\' ORDER BY id",
                    ALBUM_COLUMNS
                ),
                vec![Value::Text(like_pattern(query))],
            )?;
        }

        match matches.len() {
            0 => Err(CatalogError::NotFound(query.to_string())),
            1 => Ok(AlbumLookup::Found(matches.remove(0))),
            _ => Ok(AlbumLookup::Ambiguous(matches)),
        }
    }

    /// Apply the supplied fields and return the updated record.
    pub fn update_album(&self, id: i64, update: &AlbumUpdate) -> Result<Album> {
        // Existence check doubles as the NotFound path
        self.get_by_id(id)?;

        let mut sets: Vec<(&'static str, Value)> = Vec::new();

        if let Some(ref name) = update.album_name {
            let name = name.trim();
            if name.is_empty() {
                return Err(CatalogError::Validation("album name cannot be empty".to_string()));
            }
            sets.push(("album_name", Value::Text(name.to_string())));
        }
        if let Some(ref artists) = update.artists {
            let artists = clean_artists(artists);
            if artists.is_empty() {
                return Err(CatalogError::Validation(
                    "artist list cannot be empty".to_string(),
                ));
            }
            sets.push(("artists", list_value(&artists)));
        }
        if update.genre.is_some() {
            sets.push(("genre", text_value(&update.genre)));
        }
        if let Some(rating) = update.rating {
            sets.push(("rating", Value::Integer(rating as i64)));
        }
        if update.personal_notes.is_some() {
            sets.push(("personal_notes", text_value(&update.personal_notes)));
        }

        let e = &update.enrichment;
        if e.release_date.is_some() {
            sets.push(("release_date", text_value(&e.release_date)));
        }
        if e.label.is_some() {
            sets.push(("label", text_value(&e.label)));
        }
        if e.producer.is_some() {
            sets.push(("producer", text_value(&e.producer)));
        }
        if e.total_duration.is_some() {
            sets.push(("total_duration", text_value(&e.total_duration)));
        }
        if let Some(count) = e.track_count {
            sets.push(("track_count", Value::Integer(count as i64)));
        }
        if let Some(ref tracks) = e.track_listing {
            sets.push(("track_listing", list_value(tracks)));
        }
        if e.album_review.is_some() {
            sets.push(("album_review", text_value(&e.album_review)));
        }
        if e.musical_style.is_some() {
            sets.push(("musical_style", text_value(&e.musical_style)));
        }
        if let Some(ref similar) = e.similar_artists {
            sets.push(("similar_artists", list_value(similar)));
        }
        if let Some(ref awards) = e.awards {
            sets.push(("awards", list_value(awards)));
        }
        if let Some(ref categories) = e.llm_categories {
            sets.push(("llm_categories", list_value(categories)));
        }
        if let Some(ref categories) = e.user_categories {
            sets.push(("user_categories", list_value(categories)));
        }

        if !sets.is_empty() {
            sets.push(("last_updated", Value::Text(now_timestamp())));

            let clause = sets
                .iter()
                .map(|(column, _)| format!("{} = ?", column))
                .collect::<Vec<_>>()
                .join(", ");
            let mut values: Vec<Value> = sets.into_iter().map(|(_, v)| v).collect();
            values.push(Value::Integer(id));

            self.conn.execute(
                &format!("UPDATE albums SET {} WHERE id = ?", clause),
                params_from_iter(values.iter()),
            )?;
        }

        self.get_by_id(id)
    }

    /// Filtered listing; see [`SearchCriteria`].
    pub fn search_albums(&self, criteria: &SearchCriteria) -> Result<Vec<Album>> {
        let mut sql = format!("SELECT {} FROM albums WHERE 1=1", ALBUM_COLUMNS);
        let mut params: Vec<Value> = Vec::new();

        if let Some(ref name) = criteria.name {
            sql.push_str(" AND album_name LIKE ? ESCAPE '\\'");
            params.push(Value::Text(like_pattern(name.trim())));
        }
        if let Some(ref artist) = criteria.artist {
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM json_each(albums.artists) \
                 WHERE json_each.value LIKE ? ESCAPE '\\')",
            );
            params.push(Value::Text(like_pattern(artist.trim())));
        }
        if let Some(ref genre) = criteria.genre {
            sql.push_str(" AND genre LIKE ? ESCAPE '\\'");
            params.push(Value::Text(like_pattern(genre.trim())));
        }
        if let Some(ref category) = criteria.category {
            sql.push_str(
                " AND (EXISTS (SELECT 1 FROM json_each(albums.llm_categories) \
                 WHERE lower(json_each.value) = lower(?)) \
                 OR EXISTS (SELECT 1 FROM json_each(albums.user_categories) \
                 WHERE lower(json_each.value) = lower(?)))",
            );
            params.push(Value::Text(category.trim().to_string()));
            params.push(Value::Text(category.trim().to_string()));
        }
        if let Some(min) = criteria.rating_min {
            sql.push_str(" AND rating >= ?");
            params.push(Value::Integer(min as i64));
        }
        if let Some(max) = criteria.rating_max {
            sql.push_str(" AND rating <= ?");
            params.push(Value::Integer(max as i64));
        }

        let order = criteria
            .sort
            .map(|s| s.order_clause())
            .unwrap_or("id ASC");
        sql.push_str(" ORDER BY ");
        sql.push_str(order);

        self.query_albums(&sql, params)
    }

    pub fn list_albums(&self, sort: SortKey) -> Result<Vec<Album>> {
        self.search_albums(&SearchCriteria {
            sort: Some(sort),
            ..Default::default()
        })
    }

    pub fn fingerprint(&self) -> Result<StoreFingerprint> {
        let fingerprint = self.conn.query_row(
            "SELECT COUNT(*), MAX(last_updated), MAX(id) FROM albums",
            [],
            |row| {
                Ok(StoreFingerprint {
                    count: row.get(0)?,
                    max_last_updated: row.get(1)?,
                    max_id: row.get(2)?,
                })
            },
        )?;
        Ok(fingerprint)
    }

    fn query_albums(&self, sql: &str, params: Vec<Value>) -> Result<Vec<Album>> {
        let mut stmt = self.conn.prepare(sql)?;
        let albums = stmt
            .query_map(params_from_iter(params.iter()), album_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(albums)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn new_album(name: &str, artists: &[&str], genre: &str, rating: Option<u8>) -> NewAlbum {
        NewAlbum {
            album_name: name.to_string(),
            artists: artists.iter().map(|a| a.to_string()).collect(),
            genre: Some(genre.to_string()),
            rating,
            ..Default::default()
        }
    }

    fn seed(db: &Database) -> (i64, i64) {
        let kind_of_blue = db
            .add_album(&new_album("Kind of Blue", &["Miles Davis"], "jazz", Some(9)))
            .unwrap();
        let dark_side = db
            .add_album(&new_album("Dark Side of the Moon", &["Pink Floyd"], "rock", Some(10)))
            .unwrap();
        (kind_of_blue, dark_side)
    }

    #[test]
    fn test_add_then_get_returns_inserted_fields() {
        let db = test_db();
        let mut album = new_album("Watch the Throne", &["Jay-Z", "Kanye West"], "hip-hop", Some(8));
        album.personal_notes = Some("gift".to_string());

        let id = db.add_album(&album).unwrap();
        let stored = db.get_by_id(id).unwrap();

        assert_eq!(stored.id, id);
        assert_eq!(stored.album_name, "Watch the Throne");
        assert_eq!(stored.artists, vec!["Jay-Z", "Kanye West"]);
        assert_eq!(stored.genre.as_deref(), Some("hip-hop"));
        assert_eq!(stored.rating, Some(8));
        assert_eq!(stored.personal_notes.as_deref(), Some("gift"));
        assert!(!stored.date_added.is_empty());
        assert_eq!(stored.date_added, stored.last_updated);
        assert!(stored.track_listing.is_empty());
        assert_eq!(stored.release_date, None);
    }

    #[test]
    fn test_add_rejects_missing_name_or_artists() {
        let db = test_db();
        let err = db.add_album(&new_album("  ", &["Someone"], "rock", None)).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));

        let err = db.add_album(&new_album("Untitled", &[" ", ""], "rock", None)).unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));

        assert_eq!(db.fingerprint().unwrap().count, 0);
    }

    #[test]
    fn test_rating_out_of_range_rejected_by_schema() {
        let db = test_db();
        let result = db.add_album(&new_album("Too Good", &["Band"], "rock", Some(11)));
        assert!(matches!(result, Err(CatalogError::Database(_))));
    }

    #[test]
    fn test_get_by_id_not_found() {
        let db = test_db();
        assert!(matches!(db.get_by_id(42), Err(CatalogError::NotFound(_))));
    }

    #[test]
    fn test_find_album_by_id_and_name() {
        let db = test_db();
        let (kind_of_blue, dark_side) = seed(&db);

        match db.find_album(&kind_of_blue.to_string()).unwrap() {
            AlbumLookup::Found(a) => assert_eq!(a.id, kind_of_blue),
            other => panic!("unexpected {:?}", other),
        }
        match db.find_album("dark side of the moon").unwrap() {
            AlbumLookup::Found(a) => assert_eq!(a.id, dark_side),
            other => panic!("unexpected {:?}", other),
        }
        match db.find_album("moon").unwrap() {
            AlbumLookup::Found(a) => assert_eq!(a.id, dark_side),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(db.find_album("thriller"), Err(CatalogError::NotFound(_))));
    }

    #[test]
    fn test_find_album_ambiguous_returns_all_matches() {
        let db = test_db();
        db.add_album(&new_album("Blue Train", &["John Coltrane"], "jazz", None)).unwrap();
        db.add_album(&new_album("Blue", &["Joni Mitchell"], "folk", None)).unwrap();
        db.add_album(&new_album("Blue Lines", &["Massive Attack"], "electronic", None)).unwrap();

        // Exact match wins over substring matches
        match db.find_album("BLUE").unwrap() {
            AlbumLookup::Found(a) => assert_eq!(a.album_name, "Blue"),
            other => panic!("unexpected {:?}", other),
        }

        match db.find_album("blue ").unwrap() {
            AlbumLookup::Found(a) => assert_eq!(a.album_name, "Blue"),
            other => panic!("unexpected {:?}", other),
        }

        match db.find_album("Blue L").unwrap() {
            AlbumLookup::Found(a) => assert_eq!(a.album_name, "Blue Lines"),
            other => panic!("unexpected {:?}", other),
        }

        match db.find_album("lu").unwrap() {
            AlbumLookup::Ambiguous(all) => assert_eq!(all.len(), 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_numeric_title_falls_back_to_name() {
        let db = test_db();
        let id = db.add_album(&new_album("1999", &["Prince"], "funk", None)).unwrap();
        match db.find_album("1999").unwrap() {
            AlbumLookup::Found(a) => assert_eq!(a.id, id),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_update_applies_only_supplied_fields() {
        let db = test_db();
        let (id, _) = seed(&db);
        let before = db.get_by_id(id).unwrap();

        let updated = db
            .update_album(
                id,
                &AlbumUpdate {
                    rating: Some(10),
                    enrichment: Enrichment {
                        label: Some("Columbia".to_string()),
                        track_listing: Some(vec!["So What".to_string(), "Freddie Freeloader".to_string()]),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.rating, Some(10));
        assert_eq!(updated.label.as_deref(), Some("Columbia"));
        assert_eq!(updated.track_listing, vec!["So What", "Freddie Freeloader"]);
        assert_eq!(updated.album_name, before.album_name);
        assert_eq!(updated.genre, before.genre);
        assert_eq!(updated.date_added, before.date_added);
        assert!(updated.last_updated >= before.last_updated);
    }

    #[test]
    fn test_update_missing_id_is_not_found() {
        let db = test_db();
        let update = AlbumUpdate {
            rating: Some(5),
            ..Default::default()
        };
        assert!(matches!(db.update_album(7, &update), Err(CatalogError::NotFound(_))));
    }

    #[test]
    fn test_update_rejects_empty_artists() {
        let db = test_db();
        let (id, _) = seed(&db);
        let update = AlbumUpdate {
            artists: Some(vec![" ".to_string()]),
            ..Default::default()
        };
        assert!(matches!(db.update_album(id, &update), Err(CatalogError::Validation(_))));
        assert_eq!(db.get_by_id(id).unwrap().artists, vec!["Miles Davis"]);
    }

    #[test]
    fn test_search_ands_criteria() {
        let db = test_db();
        let (_, dark_side) = seed(&db);

        let results = db
            .search_albums(&SearchCriteria {
                genre: Some("rock".to_string()),
                rating_min: Some(9),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, dark_side);

        let none = db
            .search_albums(&SearchCriteria {
                genre: Some("jazz".to_string()),
                rating_min: Some(10),
                ..Default::default()
            })
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_search_artist_and_category() {
        let db = test_db();
        let (kind_of_blue, dark_side) = seed(&db);
        db.update_album(
            kind_of_blue,
            &AlbumUpdate {
                enrichment: Enrichment {
                    llm_categories: Some(vec!["Modal Jazz".to_string()]),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .unwrap();
        db.update_album(
            dark_side,
            &AlbumUpdate {
                enrichment: Enrichment {
                    user_categories: Some(vec!["late night".to_string()]),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .unwrap();

        let by_artist = db
            .search_albums(&SearchCriteria {
                artist: Some("floyd".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_artist.len(), 1);
        assert_eq!(by_artist[0].id, dark_side);

        let by_llm_category = db
            .search_albums(&SearchCriteria {
                category: Some("modal jazz".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_llm_category.len(), 1);
        assert_eq!(by_llm_category[0].id, kind_of_blue);

        let by_user_category = db
            .search_albums(&SearchCriteria {
                category: Some("Late Night".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_user_category.len(), 1);
        assert_eq!(by_user_category[0].id, dark_side);

        // Membership, not substring
        let partial = db
            .search_albums(&SearchCriteria {
                category: Some("late".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert!(partial.is_empty());
    }

    #[test]
    fn test_search_wildcards_are_literal() {
        let db = test_db();
        seed(&db);
        db.add_album(&new_album("100% Pure", &["Band"], "pop", None)).unwrap();

        let results = db
            .search_albums(&SearchCriteria {
                name: Some("100%".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(results.len(), 1);

        let underscore = db
            .search_albums(&SearchCriteria {
                name: Some("_".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert!(underscore.is_empty());
    }

    #[test]
    fn test_no_criteria_returns_insertion_order() {
        let db = test_db();
        let a = db.add_album(&new_album("Zebra", &["Beach House"], "pop", None)).unwrap();
        let b = db.add_album(&new_album("Abbey Road", &["The Beatles"], "rock", None)).unwrap();

        let ids: Vec<i64> = db
            .search_albums(&SearchCriteria::default())
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_list_sorting() {
        let db = test_db();
        let zebra = db.add_album(&new_album("Zebra", &["Beach House"], "pop", Some(7))).unwrap();
        let abbey = db.add_album(&new_album("abbey road", &["The Beatles"], "rock", Some(10))).unwrap();
        let unrated = db.add_album(&new_album("Moon Safari", &["Air"], "electronic", None)).unwrap();
        let tie = db.add_album(&new_album("Revolver", &["The Beatles"], "rock", Some(10))).unwrap();

        let ids = |sort| -> Vec<i64> { db.list_albums(sort).unwrap().iter().map(|a| a.id).collect() };

        assert_eq!(ids(SortKey::Name), vec![abbey, unrated, tie, zebra]);
        assert_eq!(ids(SortKey::Artist), vec![unrated, zebra, abbey, tie]);
        assert_eq!(ids(SortKey::Rating), vec![abbey, tie, zebra, unrated]);
        assert_eq!(ids(SortKey::DateAdded), vec![zebra, abbey, unrated, tie]);
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!("name".parse::<SortKey>().unwrap(), SortKey::Name);
        assert_eq!("date_added".parse::<SortKey>().unwrap(), SortKey::DateAdded);
        assert_eq!("Date-Added".parse::<SortKey>().unwrap(), SortKey::DateAdded);
        assert!("popularity".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_corrupt_json_reads_as_empty_list() {
        let db = test_db();
        let (id, _) = seed(&db);
        db.conn
            .execute("UPDATE albums SET awards = 'not json' WHERE id = ?", [id])
            .unwrap();
        assert!(db.get_by_id(id).unwrap().awards.is_empty());
    }

    #[test]
    fn test_fingerprint_changes_on_add_and_update() {
        let db = test_db();
        let empty = db.fingerprint().unwrap();
        assert_eq!(empty.count, 0);
        assert_eq!(empty.max_id, None);

        let (id, _) = seed(&db);
        let seeded = db.fingerprint().unwrap();
        assert_eq!(seeded.count, 2);
        assert_ne!(seeded, empty);

        std::thread::sleep(std::time::Duration::from_millis(2));
        db.update_album(
            id,
            &AlbumUpdate {
                personal_notes: Some("remaster".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_ne!(db.fingerprint().unwrap(), seeded);
    }

    #[test]
    fn test_enrichment_merge_policy() {
        let current = Enrichment {
            label: Some("Harvest".to_string()),
            ..Default::default()
        };
        let incoming = Enrichment {
            label: Some("Capitol".to_string()),
            producer: Some("Pink Floyd".to_string()),
            ..Default::default()
        };

        let smart = current.merge(&incoming, false);
        assert_eq!(smart.label, None);
        assert_eq!(smart.producer.as_deref(), Some("Pink Floyd"));

        let forced = current.merge(&incoming, true);
        assert_eq!(forced.label.as_deref(), Some("Capitol"));
        assert_eq!(forced.producer.as_deref(), Some("Pink Floyd"));
    }

    #[test]
    fn test_missing_fields_respects_vocabulary_flag() {
        let empty = Enrichment::default();
        assert_eq!(empty.missing_fields(true).len(), 12);
        assert_eq!(empty.missing_fields(false).len(), 11);
        assert!(!empty.missing_fields(false).contains(&EnrichField::UserCategories));
    }
}
