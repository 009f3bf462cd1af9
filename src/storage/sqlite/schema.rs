//! Embedded `SQLite` schema.

/// Pet types seeded into a fresh database.
pub const DEFAULT_PET_TYPES: &[&str] = &["Dog", "Cat", "Other"];

/// Tables and indexes, all idempotent.
///
/// Dates are stored as RFC 3339 text in UTC with millisecond precision, so
/// text comparison orders them chronologically.
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS types (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS pets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    picture_id INTEGER,
    type_id INTEGER REFERENCES types(id),
    name TEXT NOT NULL DEFAULT '',
    color TEXT NOT NULL DEFAULT '',
    marks TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS pet_breeds (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pet_id INTEGER NOT NULL REFERENCES pets(id) ON DELETE CASCADE,
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pet_id INTEGER NOT NULL REFERENCES pets(id) ON DELETE CASCADE,
    shape TEXT NOT NULL DEFAULT '',
    text TEXT NOT NULL DEFAULT '',
    color TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS postings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    guid TEXT NOT NULL UNIQUE,
    pet_id INTEGER NOT NULL REFERENCES pets(id),
    date TEXT NOT NULL,
    location TEXT NOT NULL DEFAULT '',
    name TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS sightings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    guid TEXT NOT NULL UNIQUE,
    pet_id INTEGER NOT NULL REFERENCES pets(id),
    date TEXT NOT NULL,
    location TEXT NOT NULL DEFAULT '',
    name TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL DEFAULT '',
    in_custody INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS matches (
    postings_id INTEGER NOT NULL REFERENCES postings(id) ON DELETE CASCADE,
    sightings_id INTEGER NOT NULL REFERENCES sightings(id) ON DELETE CASCADE,
    last_contacted TEXT,
    PRIMARY KEY (postings_id, sightings_id)
);

CREATE INDEX IF NOT EXISTS idx_pet_breeds_pet ON pet_breeds(pet_id);
CREATE INDEX IF NOT EXISTS idx_tags_pet ON tags(pet_id);
CREATE INDEX IF NOT EXISTS idx_matches_sighting ON matches(sightings_id);
";
