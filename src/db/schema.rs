pub const SCHEMA: &str = r#"
-- Albums table: one row per album, list-valued fields stored as JSON arrays
CREATE TABLE IF NOT EXISTS albums (
    id INTEGER PRIMARY KEY AUTOINCREMENT,

    -- Identity and user-entered fields
    album_name TEXT NOT NULL,
    artists TEXT NOT NULL,           -- JSON array
    genre TEXT,
    rating INTEGER CHECK(rating IS NULL OR (rating >= 1 AND rating <= 10)),
    personal_notes TEXT,

    -- Enrichment fields, NULL until fetched
    release_date TEXT,
    label TEXT,
    producer TEXT,
    total_duration TEXT,
    track_count INTEGER,
    track_listing TEXT,              -- JSON array
    album_review TEXT,
    musical_style TEXT,
    similar_artists TEXT,            -- JSON array
    awards TEXT,                     -- JSON array
    llm_categories TEXT,             -- JSON array, open vocabulary
    user_categories TEXT,            -- JSON array, configured vocabulary

    -- Bookkeeping
    source_image_path TEXT,
    date_added TEXT NOT NULL,
    last_updated TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_albums_name ON albums(album_name COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS idx_albums_genre ON albums(genre);

-- Images already run through extraction, so repeated scans skip them
CREATE TABLE IF NOT EXISTS processed_images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    image_path TEXT NOT NULL UNIQUE,
    processed_date TEXT NOT NULL,
    albums_extracted INTEGER NOT NULL DEFAULT 0
);
"#;

/// Columns added after the first release. Each is checked against
/// `PRAGMA table_info` and added when missing.
pub const ALBUM_MIGRATIONS: &[(&str, &str)] = &[
    ("personal_notes", "TEXT"),
    ("release_date", "TEXT"),
    ("label", "TEXT"),
    ("producer", "TEXT"),
    ("total_duration", "TEXT"),
    ("track_count", "INTEGER"),
    ("track_listing", "TEXT"),
    ("album_review", "TEXT"),
    ("musical_style", "TEXT"),
    ("similar_artists", "TEXT"),
    ("awards", "TEXT"),
    ("llm_categories", "TEXT"),
    ("user_categories", "TEXT"),
    ("source_image_path", "TEXT"),
];
