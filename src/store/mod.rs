//! Relational cache for canonical locations and recommended places
//!
//! SQLite is the durable store behind the dedup exclusion sets. Row
//! invariants are enforced by unique constraints, and every get-or-create
//! is a single-statement upsert, so concurrent first-sight requests for the
//! same city race safely at the database level with no application locks.

use crate::error::{Result, TripweaverError};
use crate::models::{CachedPlace, CanonicalLocation, Category, PlaceCandidate};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::task;
use tracing::{debug, info};

/// Region name stored for cities whose input carried no region; keeps the
/// `(name, region_id)` uniqueness invariant enforceable (SQLite treats
/// NULLs in unique constraints as distinct)
const DEFAULT_REGION: &str = "";

/// Durable store for countries, regions, cities and cached places
///
/// Cheap to clone; all clones share one connection. Access from async code
/// goes through `spawn_blocking` so store calls never block the runtime.
#[derive(Clone)]
pub struct PlaceStore {
    conn: Arc<Mutex<Connection>>,
}

impl PlaceStore {
    /// Open (or create) the store at the given path and run migrations
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let connection = Connection::open(path.as_ref())?;
        connection.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;
        run_migrations(&connection)?;
        info!(path = %path.as_ref().display(), "place store ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(connection)),
        })
    }

    /// Open an in-memory store, used by tests
    pub fn open_in_memory() -> Result<Self> {
        let connection = Connection::open_in_memory()?;
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        run_migrations(&connection)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(connection)),
        })
    }

    /// Run a closure against the connection on the blocking pool
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        // A join failure means the closure panicked; propagate the panic.
        let result = task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        })
        .await
        .expect("blocking store task panicked");
        result.map_err(TripweaverError::from)
    }

    /// Get or lazily create a country row by canonical name
    pub async fn get_or_create_country(&self, name: &str) -> Result<i64> {
        let name = name.trim().to_string();
        self.blocking(move |conn| {
            conn.query_row(
                "INSERT INTO countries (name) VALUES (?1)
                 ON CONFLICT(name) DO UPDATE SET name = excluded.name
                 RETURNING id",
                params![name],
                |row| row.get(0),
            )
        })
        .await
    }

    /// Get or lazily create a region row under a country
    ///
    /// `None` maps to the country's sentinel region.
    pub async fn get_or_create_region(
        &self,
        country_id: i64,
        region: Option<&str>,
    ) -> Result<i64> {
        let name = region.map_or(DEFAULT_REGION, str::trim).to_string();
        self.blocking(move |conn| {
            conn.query_row(
                "INSERT INTO regions (country_id, name) VALUES (?1, ?2)
                 ON CONFLICT(country_id, name) DO UPDATE SET name = excluded.name
                 RETURNING id",
                params![country_id, name],
                |row| row.get(0),
            )
        })
        .await
    }

    /// Get or lazily create a city row under a country and region
    pub async fn get_or_create_city(
        &self,
        name: &str,
        country_id: i64,
        region_id: i64,
    ) -> Result<i64> {
        let name = name.trim().to_string();
        self.blocking(move |conn| {
            conn.query_row(
                "INSERT INTO cities (name, country_id, region_id) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name, region_id) DO UPDATE SET name = excluded.name
                 RETURNING id",
                params![name, country_id, region_id],
                |row| row.get(0),
            )
        })
        .await
    }

    /// Ensure the Country/Region/City rows for a canonical identity exist,
    /// returning the city id
    pub async fn ensure_city(&self, location: &CanonicalLocation) -> Result<i64> {
        let country_id = self.get_or_create_country(&location.country).await?;
        let region_id = self
            .get_or_create_region(country_id, location.region.as_deref())
            .await?;
        let city_id = self
            .get_or_create_city(&location.city, country_id, region_id)
            .await?;
        debug!(
            city = %location.city,
            city_id, "canonical location rows ensured"
        );
        Ok(city_id)
    }

    /// Names of every place already recommended for a city, lowercased
    ///
    /// Category-agnostic on purpose: a place recommended once under any
    /// category is excluded from all future categories for that city.
    pub async fn exclusion_set(&self, city_id: i64) -> Result<HashSet<String>> {
        self.blocking(move |conn| {
            let mut stmt = conn.prepare("SELECT name FROM cached_places WHERE city_id = ?1")?;
            let rows = stmt.query_map(params![city_id], |row| row.get::<_, String>(0))?;
            let mut names = HashSet::new();
            for name in rows {
                names.insert(name?.to_lowercase());
            }
            Ok(names)
        })
        .await
    }

    /// Upsert a batch of newly recommended places for a city
    ///
    /// Idempotent on `(city_id, external_place_id)`; a re-sighted place
    /// only refreshes its mutable fields (rating, review count).
    pub async fn upsert_places(
        &self,
        city_id: i64,
        places: Vec<(Category, PlaceCandidate)>,
    ) -> Result<usize> {
        if places.is_empty() {
            return Ok(0);
        }
        self.blocking(move |conn| {
            let now = Utc::now().to_rfc3339();
            let mut stmt = conn.prepare(
                "INSERT INTO cached_places
                     (city_id, external_place_id, name, category, address,
                      latitude, longitude, rating, review_count, raw_payload, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(city_id, external_place_id) DO UPDATE SET
                     rating = excluded.rating,
                     review_count = excluded.review_count",
            )?;
            let mut written = 0;
            for (category, place) in &places {
                written += stmt.execute(params![
                    city_id,
                    place.external_id,
                    place.name,
                    category.as_str(),
                    place.address,
                    place.latitude,
                    place.longitude,
                    place.rating,
                    place.review_count,
                    place.raw_payload.to_string(),
                    now,
                ])?;
            }
            Ok(written)
        })
        .await
    }

    /// Read cached places for a city, optionally narrowed to one category
    pub async fn cached_places(
        &self,
        city_id: i64,
        category: Option<Category>,
    ) -> Result<Vec<CachedPlace>> {
        self.blocking(move |conn| {
            let mut sql = String::from(
                "SELECT id, city_id, external_place_id, name, category, address,
                        latitude, longitude, rating, review_count, created_at
                 FROM cached_places WHERE city_id = ?1",
            );
            if category.is_some() {
                sql.push_str(" AND category = ?2");
            }
            sql.push_str(" ORDER BY id");

            let mut stmt = conn.prepare(&sql)?;
            let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<CachedPlace> {
                let category_raw: String = row.get(4)?;
                let created_raw: String = row.get(10)?;
                Ok(CachedPlace {
                    id: row.get(0)?,
                    city_id: row.get(1)?,
                    external_place_id: row.get(2)?,
                    name: row.get(3)?,
                    category: Category::from_str_opt(&category_raw)
                        .unwrap_or(Category::Tourism),
                    address: row.get(5)?,
                    latitude: row.get(6)?,
                    longitude: row.get(7)?,
                    rating: row.get(8)?,
                    review_count: row.get(9)?,
                    created_at: created_raw
                        .parse::<DateTime<Utc>>()
                        .unwrap_or_else(|_| Utc::now()),
                })
            };

            let rows: Vec<CachedPlace> = match category {
                Some(cat) => stmt
                    .query_map(params![city_id, cat.as_str()], map_row)?
                    .collect::<rusqlite::Result<_>>()?,
                None => stmt
                    .query_map(params![city_id], map_row)?
                    .collect::<rusqlite::Result<_>>()?,
            };
            Ok(rows)
        })
        .await
    }

    /// Administrative purge of every cached place for a city
    ///
    /// The only path that deletes cache rows; normal operation never does.
    pub async fn purge_city_places(&self, city_id: i64) -> Result<usize> {
        self.blocking(move |conn| {
            conn.execute(
                "DELETE FROM cached_places WHERE city_id = ?1",
                params![city_id],
            )
        })
        .await
    }

    /// Fetch a prompt template by name
    pub async fn get_prompt(&self, name: &str) -> Result<Option<String>> {
        let name = name.to_string();
        self.blocking(move |conn| {
            conn.query_row(
                "SELECT content FROM prompts WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
        })
        .await
    }

    /// Seed a prompt template if no row with that name exists yet
    ///
    /// Operator edits to existing rows are never overwritten.
    pub async fn seed_prompt(&self, name: &str, content: &str) -> Result<()> {
        let name = name.to_string();
        let content = content.to_string();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO prompts (name, content, version, updated_at)
                 VALUES (?1, ?2, 1, ?3)
                 ON CONFLICT(name) DO NOTHING",
                params![name, content, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
        .await
    }
}

fn run_migrations(connection: &Connection) -> rusqlite::Result<()> {
    connection.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS countries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS regions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            country_id INTEGER NOT NULL,
            UNIQUE (country_id, name),
            FOREIGN KEY (country_id) REFERENCES countries(id)
        );

        CREATE TABLE IF NOT EXISTS cities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            country_id INTEGER NOT NULL,
            region_id INTEGER NOT NULL,
            UNIQUE (name, region_id),
            FOREIGN KEY (country_id) REFERENCES countries(id),
            FOREIGN KEY (region_id) REFERENCES regions(id)
        );

        CREATE TABLE IF NOT EXISTS cached_places (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            city_id INTEGER NOT NULL,
            external_place_id TEXT NOT NULL,
            name TEXT NOT NULL,
            category TEXT NOT NULL
                CHECK (category IN ('tourism', 'food', 'activity', 'accommodation')),
            address TEXT,
            latitude REAL,
            longitude REAL,
            rating REAL,
            review_count INTEGER,
            raw_payload TEXT,
            created_at TEXT NOT NULL,
            UNIQUE (city_id, external_place_id),
            FOREIGN KEY (city_id) REFERENCES cities(id)
        );

        CREATE TABLE IF NOT EXISTS prompts (
            name TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            updated_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_cached_places_city ON cached_places(city_id);
        "#,
    )
}
