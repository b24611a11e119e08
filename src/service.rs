use serde_json::{Map, Value};

use crate::{
    data::{
        NewRestaurant, NewRestaurantBuilder, Restaurant, RestaurantPatch, RestaurantPayload,
        Submission,
    },
    db::{RestaurantStore, SeedReport, SubmissionStore},
    error::{Error, Resource, Result},
    seed::SeedFixture,
};

pub const DEFAULT_POPULAR_LIMIT: u32 = 5;

/// Canonical menu form: a list or a comma separated string becomes a list of names.
pub fn normalize_menu(menu: Option<&Value>) -> Vec<String> {
    match menu {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(menu)) => menu
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Validate a payload into a storable restaurant. The fixture goes through here as well
/// so it carries its own `id` and `likes`; client payloads never do.
pub(crate) fn new_restaurant(
    payload: RestaurantPayload,
    id: Option<i64>,
    likes: Option<i64>,
) -> Result<NewRestaurant> {
    let mut builder = NewRestaurantBuilder::default();
    if let Some(name) = non_blank(payload.name) {
        builder.name(name);
    }
    if let Some(category) = non_blank(payload.category) {
        builder.category(category);
    }
    if let Some(location) = non_blank(payload.location) {
        builder.location(location);
    }
    if let Some(price_range) = payload.price_range {
        builder.price_range(price_range);
    }
    if let Some(rating) = payload.rating {
        builder.rating(rating);
    }
    if let Some(description) = payload.description {
        builder.description(description);
    }
    if let Some(image) = payload.image {
        builder.image(image);
    }
    if let Some(id) = id {
        builder.id(id);
    }
    if let Some(likes) = likes {
        builder.likes(likes);
    }
    builder.recommended_menu(normalize_menu(payload.recommended_menu.as_ref()));

    builder.build()
}

/// Present but blank required fields are rejected, absent ones are simply not updated.
fn required_on_update(field: &'static str, value: Option<String>) -> Result<Option<String>> {
    match value {
        Some(v) if v.trim().is_empty() => Err(Error::Validation { field }),
        other => Ok(other),
    }
}

#[derive(Clone)]
pub struct RestaurantService {
    store: RestaurantStore,
    fixture: SeedFixture,
}

impl RestaurantService {
    pub fn new(store: RestaurantStore, fixture: SeedFixture) -> Self {
        Self { store, fixture }
    }

    pub async fn list(&self) -> Result<Vec<Restaurant>> {
        self.store.find_all().await
    }

    pub async fn popular(&self, limit: u32) -> Result<Vec<Restaurant>> {
        self.store.find_popular(limit).await
    }

    pub async fn get(&self, id: &str) -> Result<Restaurant> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(Resource::Restaurant, id))
    }

    pub async fn create(&self, payload: RestaurantPayload) -> Result<Restaurant> {
        // likes always start at zero for client created restaurants
        let new = new_restaurant(payload, None, None)?;
        self.store.insert(new).await
    }

    pub async fn update(&self, id: &str, payload: RestaurantPayload) -> Result<Restaurant> {
        let patch = RestaurantPatch {
            name: required_on_update("name", payload.name)?,
            category: required_on_update("category", payload.category)?,
            location: required_on_update("location", payload.location)?,
            price_range: payload.price_range,
            rating: payload.rating,
            description: payload.description,
            recommended_menu: payload
                .recommended_menu
                .as_ref()
                .map(|menu| normalize_menu(Some(menu))),
            image: payload.image,
        };

        self.store
            .update_by_id(id, patch)
            .await?
            .ok_or_else(|| Error::not_found(Resource::Restaurant, id))
    }

    pub async fn remove(&self, id: &str) -> Result<Restaurant> {
        self.store
            .delete_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(Resource::Restaurant, id))
    }

    /// Fixture documents read straight from disk, storage is never consulted.
    pub fn sync_demo(&self) -> Result<Vec<Value>> {
        self.fixture.read_raw()
    }

    pub async fn ensure_seeded(&self) -> Result<SeedReport> {
        self.store.ensure_seeded(&self.fixture).await
    }

    pub async fn reset_to_seed(&self) -> Result<()> {
        self.store.reset_to_seed(&self.fixture).await
    }
}

#[derive(Clone)]
pub struct SubmissionService {
    store: SubmissionStore,
}

impl SubmissionService {
    pub fn new(store: SubmissionStore) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<Submission>> {
        self.store.find_all().await
    }

    pub async fn get(&self, id: &str) -> Result<Submission> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(Resource::Submission, id))
    }

    pub async fn create(&self, body: Map<String, Value>) -> Result<Submission> {
        self.store.insert(body).await
    }

    pub async fn update(&self, id: &str, body: Map<String, Value>) -> Result<Submission> {
        self.store
            .update_by_id(id, body)
            .await?
            .ok_or_else(|| Error::not_found(Resource::Submission, id))
    }

    pub async fn remove(&self, id: &str) -> Result<Submission> {
        self.store
            .delete_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(Resource::Submission, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{connect, PoolSettings};
    use serde_json::json;

    async fn restaurants() -> RestaurantService {
        let pool = connect("sqlite::memory:", &PoolSettings::default())
            .await
            .unwrap();
        RestaurantService::new(
            RestaurantStore::new(pool),
            SeedFixture::new(concat!(env!("CARGO_MANIFEST_DIR"), "/data/restaurants.json")),
        )
    }

    fn payload(value: Value) -> RestaurantPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_normalize_menu() {
        assert_eq!(
            normalize_menu(Some(&json!("a, b ,c"))),
            vec!["a", "b", "c"]
        );
        assert_eq!(normalize_menu(Some(&json!(" , x,,"))), vec!["x"]);
        assert_eq!(normalize_menu(Some(&Value::Null)), Vec::<String>::new());
        assert_eq!(normalize_menu(None), Vec::<String>::new());
        assert_eq!(normalize_menu(Some(&json!(["x"]))), vec!["x"]);
        assert_eq!(normalize_menu(Some(&json!(42))), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_create_requires_fields() {
        let service = restaurants().await;
        let cases = [
            (json!({"category": "Y", "location": "Z"}), "name"),
            (json!({"name": "X", "location": "Z"}), "category"),
            (json!({"name": "X", "category": "Y"}), "location"),
            (json!({"name": "X", "category": "  ", "location": "Z"}), "category"),
            (json!({}), "name"),
        ];

        for (body, missing) in cases {
            let err = service.create(payload(body)).await.unwrap_err();
            assert!(
                matches!(err, Error::Validation { field } if field == missing),
                "expected {missing} to be reported, got {err}"
            );
            assert!(err.to_string().contains("required"));
        }
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_applies_defaults_and_normalizes() {
        let service = restaurants().await;
        let created = service
            .create(payload(json!({
                "name": "X",
                "category": "Y",
                "location": "Z",
                "rating": 4.5,
                "likes": 99,
                "recommendedMenu": "tteokbokki, kimbap"
            })))
            .await
            .unwrap();

        assert_eq!(created.name, "X");
        assert_eq!(created.rating, 4.5);
        assert_eq!(created.likes, 0);
        assert_eq!(created.price_range, crate::data::DEFAULT_PRICE_RANGE);
        assert_eq!(created.recommended_menu, vec!["tteokbokki", "kimbap"]);
        assert_eq!(service.get(&created.oid.to_hex()).await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_created_ids_are_unused() {
        let service = restaurants().await;
        service.ensure_seeded().await.unwrap();
        let before = service.list().await.unwrap();

        let created = service
            .create(payload(json!({"name": "X", "category": "Y", "location": "Z"})))
            .await
            .unwrap();

        assert!(before.iter().all(|r| r.id != created.id && r.oid != created.oid));
    }

    #[tokio::test]
    async fn test_missing_ids_are_not_found() {
        let service = restaurants().await;

        let get = service.get("999").await.unwrap_err();
        let update = service
            .update("999", payload(json!({"name": "X"})))
            .await
            .unwrap_err();
        let remove = service.remove("abc").await.unwrap_err();

        for err in [get, update, remove] {
            assert!(matches!(err, Error::NotFound { resource: Resource::Restaurant, .. }));
            assert!(err.to_string().contains("not found"));
        }
    }

    #[tokio::test]
    async fn test_update_is_partial() {
        let service = restaurants().await;
        let created = service
            .create(payload(json!({
                "name": "X",
                "category": "Y",
                "location": "Z",
                "recommendedMenu": ["ramen"]
            })))
            .await
            .unwrap();

        let updated = service
            .update(&created.id.to_string(), payload(json!({"rating": 3.5})))
            .await
            .unwrap();
        assert_eq!(updated.rating, 3.5);
        assert_eq!(updated.name, "X");
        assert_eq!(updated.recommended_menu, vec!["ramen"]);

        let updated = service
            .update(
                &created.oid.to_hex(),
                payload(json!({"recommendedMenu": "udon,soba"})),
            )
            .await
            .unwrap();
        assert_eq!(updated.recommended_menu, vec!["udon", "soba"]);

        let err = service
            .update(&created.oid.to_hex(), payload(json!({"name": ""})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { field: "name" }));
    }

    #[tokio::test]
    async fn test_remove_then_get_is_not_found() {
        let service = restaurants().await;
        let created = service
            .create(payload(json!({"name": "X", "category": "Y", "location": "Z"})))
            .await
            .unwrap();

        let removed = service.remove(&created.id.to_string()).await.unwrap();
        assert_eq!(removed, created);
        assert!(matches!(
            service.get(&created.oid.to_hex()).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_popular_limit() {
        let service = restaurants().await;
        for rating in [4.8, 4.2, 3.9, 4.9] {
            service
                .create(payload(json!({
                    "name": "X",
                    "category": "Y",
                    "location": "Z",
                    "rating": rating
                })))
                .await
                .unwrap();
        }

        let ratings: Vec<f64> = service
            .popular(3)
            .await
            .unwrap()
            .iter()
            .map(|r| r.rating)
            .collect();
        assert_eq!(ratings, vec![4.9, 4.8, 4.2]);
        assert_eq!(service.popular(DEFAULT_POPULAR_LIMIT).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_sync_demo_bypasses_storage() {
        let service = restaurants().await;
        let demo = service.sync_demo().unwrap();

        assert!(!demo.is_empty());
        assert!(service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submissions_round_trip() {
        let pool = connect("sqlite::memory:", &PoolSettings::default())
            .await
            .unwrap();
        let service = SubmissionService::new(SubmissionStore::new(pool));

        let created = service
            .create(json!({"name": "new spot"}).as_object().unwrap().clone())
            .await
            .unwrap();
        let id = created.oid.to_hex();
        assert_eq!(service.get(&id).await.unwrap(), created);
        assert_eq!(service.list().await.unwrap().len(), 1);

        service.remove(&id).await.unwrap();
        let err = service.get(&id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { resource: Resource::Submission, .. }));
        assert!(matches!(
            service.update(&id, Map::new()).await,
            Err(Error::NotFound { .. })
        ));
    }
}
