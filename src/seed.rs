//! Bundled restaurant fixture.
//!
//! Read synchronously from disk, both to fill an empty store and to back the
//! `sync-demo` endpoint which never touches storage.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::{
    data::{NewRestaurant, RestaurantPayload},
    error::{Error, Result},
    service,
};

#[derive(Deserialize)]
struct SeedEntry {
    id: Option<i64>,
    likes: Option<i64>,
    #[serde(flatten)]
    payload: RestaurantPayload,
}

#[derive(Debug, Clone)]
pub struct SeedFixture {
    path: PathBuf,
}

impl SeedFixture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The fixture documents exactly as they are written on disk.
    pub fn read_raw(&self) -> Result<Vec<Value>> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| Error::Fixture {
            path: self.path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// The fixture validated and normalized the same way a created restaurant is.
    pub fn load(&self) -> Result<Vec<NewRestaurant>> {
        self.read_raw()?
            .into_iter()
            .map(|value| {
                let SeedEntry { id, likes, payload } = serde_json::from_value(value)?;
                service::new_restaurant(payload, id, likes)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundled() -> SeedFixture {
        SeedFixture::new(concat!(env!("CARGO_MANIFEST_DIR"), "/data/restaurants.json"))
    }

    #[test]
    fn test_bundled_fixture_loads() {
        let fixture = bundled();
        let raw = fixture.read_raw().unwrap();
        let loaded = fixture.load().unwrap();

        assert!(!loaded.is_empty());
        assert_eq!(raw.len(), loaded.len());
        assert!(loaded.iter().all(|r| r.id.is_some()));
        assert!(loaded.iter().all(|r| !r.name.is_empty()));
    }

    #[test]
    fn test_fixture_menus_are_sequences() {
        let raw = bundled().read_raw().unwrap();
        let loaded = bundled().load().unwrap();

        for (raw, loaded) in raw.iter().zip(&loaded) {
            if let Some(menu) = raw["recommendedMenu"].as_str() {
                let expected = service::normalize_menu(Some(&Value::from(menu)));
                assert_eq!(loaded.recommended_menu, expected);
            }
        }
    }

    #[test]
    fn test_missing_fixture_reports_path() {
        let fixture = SeedFixture::new("does/not/exist.json");
        let err = fixture.read_raw().unwrap_err();
        assert!(matches!(err, Error::Fixture { .. }));
        assert!(err.to_string().contains("does/not/exist.json"));
    }
}
