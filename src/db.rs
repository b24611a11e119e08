use std::{str::FromStr, time::Duration};

use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    SqliteConnection,
};

use crate::{
    data::{NewRestaurant, ObjectId, RecordKey, Restaurant, RestaurantPatch, Submission},
    error::Result,
    seed::SeedFixture,
};

const SCHEMA: [&str; 3] = [
    r#"
CREATE TABLE IF NOT EXISTS restaurant (
    seq              INTEGER PRIMARY KEY AUTOINCREMENT,
    oid              TEXT    NOT NULL UNIQUE,
    id               INTEGER NOT NULL,
    name             TEXT    NOT NULL,
    category         TEXT    NOT NULL,
    location         TEXT    NOT NULL,
    price_range      TEXT    NOT NULL,
    rating           REAL    NOT NULL DEFAULT 0,
    description      TEXT    NOT NULL DEFAULT '',
    recommended_menu TEXT    NOT NULL DEFAULT '[]',
    likes            INTEGER NOT NULL DEFAULT 0,
    image            TEXT    NOT NULL DEFAULT ''
)"#,
    "CREATE INDEX IF NOT EXISTS restaurant_legacy_id ON restaurant (id)",
    r#"
CREATE TABLE IF NOT EXISTS submission (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    oid TEXT    NOT NULL UNIQUE,
    doc TEXT    NOT NULL
)"#,
];

const RESTAURANT_COLUMNS: &str = "oid, id, name, category, location, price_range, rating, \
                                  description, recommended_menu, likes, image";

#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

/// Open the pool and make sure both collections exist.
///
/// An in-memory database lives inside a single connection, so such urls are pinned to
/// one connection that is never reaped.
pub async fn connect(url: &str, settings: &PoolSettings) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool_options = SqlitePoolOptions::new().acquire_timeout(settings.acquire_timeout);
    let pool_options = if url.contains(":memory:") {
        pool_options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        pool_options.max_connections(settings.max_connections)
    };

    let pool = pool_options.connect_with(options).await?;
    for statement in SCHEMA {
        sqlx::query(statement).execute(&pool).await?;
    }
    tracing::info!("connected to {url}");

    Ok(pool)
}

/// Connection state codes reported by the health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connected = 1,
    Connecting = 2,
    Disconnecting = 3,
}

impl ConnectionState {
    pub fn of(pool: &SqlitePool) -> Self {
        if pool.is_closed() {
            Self::Disconnected
        } else {
            Self::Connected
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub seeded: bool,
    pub count: i64,
}

#[derive(sqlx::FromRow)]
struct RestaurantRow {
    oid: String,
    id: i64,
    name: String,
    category: String,
    location: String,
    price_range: String,
    rating: f64,
    description: String,
    recommended_menu: String,
    likes: i64,
    image: String,
}

impl TryFrom<RestaurantRow> for Restaurant {
    type Error = crate::error::Error;

    fn try_from(row: RestaurantRow) -> Result<Self> {
        let oid = ObjectId::parse_str(&row.oid).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Restaurant {
            oid,
            id: row.id,
            name: row.name,
            category: row.category,
            location: row.location,
            price_range: row.price_range,
            rating: row.rating,
            description: row.description,
            recommended_menu: serde_json::from_str(&row.recommended_menu)?,
            likes: row.likes,
            image: row.image,
        })
    }
}

async fn fetch_restaurant(
    conn: &mut SqliteConnection,
    key: &RecordKey,
) -> Result<Option<Restaurant>> {
    let predicate = match key {
        RecordKey::Object(_) => "oid = ?",
        RecordKey::Legacy(_) => "id = ?",
    };
    let sql = format!(
        "SELECT {RESTAURANT_COLUMNS} FROM restaurant WHERE {predicate} ORDER BY seq LIMIT 1"
    );
    let query = sqlx::query_as::<_, RestaurantRow>(&sql);
    let query = match key {
        RecordKey::Object(oid) => query.bind(oid.to_hex()),
        RecordKey::Legacy(id) => query.bind(*id),
    };

    query
        .fetch_optional(&mut *conn)
        .await?
        .map(Restaurant::try_from)
        .transpose()
}

async fn next_restaurant_id(conn: &mut SqliteConnection) -> Result<i64> {
    let max: Option<i64> = sqlx::query_scalar("SELECT MAX(id) FROM restaurant")
        .fetch_one(&mut *conn)
        .await?;
    Ok(max.unwrap_or(0) + 1)
}

async fn write_restaurant(conn: &mut SqliteConnection, restaurant: &Restaurant) -> Result<()> {
    let sql = format!(
        "INSERT INTO restaurant ({RESTAURANT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    );
    sqlx::query(&sql)
        .bind(restaurant.oid.to_hex())
        .bind(restaurant.id)
        .bind(&restaurant.name)
        .bind(&restaurant.category)
        .bind(&restaurant.location)
        .bind(&restaurant.price_range)
        .bind(restaurant.rating)
        .bind(&restaurant.description)
        .bind(serde_json::to_string(&restaurant.recommended_menu)?)
        .bind(restaurant.likes)
        .bind(&restaurant.image)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Insert fixture entries, keeping their own legacy ids and numbering the rest after
/// the current maximum.
async fn insert_fixture(conn: &mut SqliteConnection, entries: Vec<NewRestaurant>) -> Result<()> {
    let mut next = next_restaurant_id(conn).await?;
    for entry in entries {
        let id = match entry.id {
            Some(id) => {
                next = next.max(id + 1);
                id
            }
            None => {
                next += 1;
                next - 1
            }
        };
        write_restaurant(conn, &entry.into_restaurant(ObjectId::new(), id)).await?;
    }
    Ok(())
}

/// Persistence gateway for the restaurant collection.
#[derive(Clone)]
pub struct RestaurantStore {
    pool: SqlitePool,
}

impl RestaurantStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_all(&self) -> Result<Vec<Restaurant>> {
        let sql = format!("SELECT {RESTAURANT_COLUMNS} FROM restaurant ORDER BY seq");
        sqlx::query_as::<_, RestaurantRow>(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Restaurant::try_from)
            .collect()
    }

    /// Highest rated first, ties keep storage order.
    pub async fn find_popular(&self, limit: u32) -> Result<Vec<Restaurant>> {
        let sql = format!(
            "SELECT {RESTAURANT_COLUMNS} FROM restaurant ORDER BY rating DESC, seq LIMIT ?"
        );
        sqlx::query_as::<_, RestaurantRow>(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Restaurant::try_from)
            .collect()
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Restaurant>> {
        let Some(key) = RecordKey::resolve(id) else {
            return Ok(None);
        };
        let mut conn = self.pool.acquire().await?;
        fetch_restaurant(&mut conn, &key).await
    }

    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM restaurant")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Allocates the next legacy id as max + 1. The read and the write are not isolated
    /// from other writers, so concurrent inserts can hand out the same id.
    pub async fn insert(&self, new: NewRestaurant) -> Result<Restaurant> {
        let mut conn = self.pool.acquire().await?;
        let id = next_restaurant_id(&mut conn).await?;
        let restaurant = new.into_restaurant(ObjectId::new(), id);
        write_restaurant(&mut conn, &restaurant).await?;
        tracing::info!("restaurant {} stored as {}", restaurant.id, restaurant.oid);
        Ok(restaurant)
    }

    pub async fn update_by_id(
        &self,
        id: &str,
        patch: RestaurantPatch,
    ) -> Result<Option<Restaurant>> {
        let Some(key) = RecordKey::resolve(id) else {
            return Ok(None);
        };
        let mut tx = self.pool.begin().await?;
        let Some(mut restaurant) = fetch_restaurant(&mut tx, &key).await? else {
            return Ok(None);
        };

        patch.apply(&mut restaurant);
        sqlx::query(
            r#"
UPDATE restaurant
SET name = ?, category = ?, location = ?, price_range = ?, rating = ?,
    description = ?, recommended_menu = ?, image = ?
WHERE oid = ?"#,
        )
        .bind(&restaurant.name)
        .bind(&restaurant.category)
        .bind(&restaurant.location)
        .bind(&restaurant.price_range)
        .bind(restaurant.rating)
        .bind(&restaurant.description)
        .bind(serde_json::to_string(&restaurant.recommended_menu)?)
        .bind(&restaurant.image)
        .bind(restaurant.oid.to_hex())
        .execute(&mut tx)
        .await?;
        tx.commit().await?;

        Ok(Some(restaurant))
    }

    pub async fn delete_by_id(&self, id: &str) -> Result<Option<Restaurant>> {
        let Some(key) = RecordKey::resolve(id) else {
            return Ok(None);
        };
        let mut tx = self.pool.begin().await?;
        let Some(restaurant) = fetch_restaurant(&mut tx, &key).await? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM restaurant WHERE oid = ?")
            .bind(restaurant.oid.to_hex())
            .execute(&mut tx)
            .await?;
        tx.commit().await?;

        Ok(Some(restaurant))
    }

    /// Load the fixture into an empty collection. A collection that already holds
    /// documents is left alone and the fixture is not read.
    pub async fn ensure_seeded(&self, fixture: &SeedFixture) -> Result<SeedReport> {
        let count = self.count().await?;
        if count > 0 {
            return Ok(SeedReport {
                seeded: false,
                count,
            });
        }

        let entries = fixture.load()?;
        let count = entries.len() as i64;
        let mut tx = self.pool.begin().await?;
        insert_fixture(&mut tx, entries).await?;
        tx.commit().await?;

        Ok(SeedReport {
            seeded: true,
            count,
        })
    }

    /// Drop every restaurant and reload the fixture.
    pub async fn reset_to_seed(&self, fixture: &SeedFixture) -> Result<()> {
        let entries = fixture.load()?;
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM restaurant").execute(&mut tx).await?;
        insert_fixture(&mut tx, entries).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct SubmissionRow {
    oid: String,
    doc: String,
}

impl TryFrom<SubmissionRow> for Submission {
    type Error = crate::error::Error;

    fn try_from(row: SubmissionRow) -> Result<Self> {
        let oid = ObjectId::parse_str(&row.oid).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Submission {
            oid,
            body: serde_json::from_str(&row.doc)?,
        })
    }
}

async fn fetch_submission(
    conn: &mut SqliteConnection,
    oid: ObjectId,
) -> Result<Option<Submission>> {
    sqlx::query_as::<_, SubmissionRow>("SELECT oid, doc FROM submission WHERE oid = ?")
        .bind(oid.to_hex())
        .fetch_optional(&mut *conn)
        .await?
        .map(Submission::try_from)
        .transpose()
}

/// Generic document collection for submissions. Only object ids address a submission.
#[derive(Clone)]
pub struct SubmissionStore {
    pool: SqlitePool,
}

impl SubmissionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_all(&self) -> Result<Vec<Submission>> {
        sqlx::query_as::<_, SubmissionRow>("SELECT oid, doc FROM submission ORDER BY seq")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Submission::try_from)
            .collect()
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Submission>> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(None);
        };
        let mut conn = self.pool.acquire().await?;
        fetch_submission(&mut conn, oid).await
    }

    pub async fn insert(&self, mut body: Map<String, Value>) -> Result<Submission> {
        body.remove("_id");
        let submission = Submission {
            oid: ObjectId::new(),
            body,
        };
        sqlx::query("INSERT INTO submission (oid, doc) VALUES (?, ?)")
            .bind(submission.oid.to_hex())
            .bind(serde_json::to_string(&submission.body)?)
            .execute(&self.pool)
            .await?;
        Ok(submission)
    }

    /// Shallow merge: top level keys in `patch` replace the stored ones.
    pub async fn update_by_id(
        &self,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Option<Submission>> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(None);
        };
        let mut tx = self.pool.begin().await?;
        let Some(mut submission) = fetch_submission(&mut tx, oid).await? else {
            return Ok(None);
        };

        submission
            .body
            .extend(patch.into_iter().filter(|(key, _)| key != "_id"));
        sqlx::query("UPDATE submission SET doc = ? WHERE oid = ?")
            .bind(serde_json::to_string(&submission.body)?)
            .bind(oid.to_hex())
            .execute(&mut tx)
            .await?;
        tx.commit().await?;

        Ok(Some(submission))
    }

    pub async fn delete_by_id(&self, id: &str) -> Result<Option<Submission>> {
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(None);
        };
        let mut tx = self.pool.begin().await?;
        let Some(submission) = fetch_submission(&mut tx, oid).await? else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM submission WHERE oid = ?")
            .bind(oid.to_hex())
            .execute(&mut tx)
            .await?;
        tx.commit().await?;

        Ok(Some(submission))
    }
}
