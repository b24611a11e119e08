use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Storage-native document identifier, always rendered as 24 hex digits.
pub use bson::oid::ObjectId;

pub const DEFAULT_PRICE_RANGE: &str = "unspecified";

/// An external identifier resolved against one of the two key spaces a restaurant
/// can be addressed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKey {
    Object(ObjectId),
    Legacy(i64),
}

impl RecordKey {
    /// The object id form wins whenever the input parses as one. Otherwise the input
    /// is read as a legacy number, either integer text or a float without fraction.
    pub fn resolve(raw: &str) -> Option<Self> {
        if let Ok(oid) = ObjectId::parse_str(raw) {
            return Some(Self::Object(oid));
        }

        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(id) = raw.parse::<i64>() {
            return Some(Self::Legacy(id));
        }
        match raw.parse::<f64>() {
            Ok(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                Some(Self::Legacy(n as i64))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    #[serde(
        rename = "_id",
        serialize_with = "bson::serde_helpers::serialize_object_id_as_hex_string"
    )]
    pub oid: ObjectId,
    pub id: i64,
    pub name: String,
    pub category: String,
    pub location: String,
    pub price_range: String,
    pub rating: f64,
    pub description: String,
    pub recommended_menu: Vec<String>,
    pub likes: i64,
    /// path or url to image
    pub image: String,
}

/// A validated restaurant ready to be stored. Only the seed fixture carries its own
/// legacy `id`; everything else gets one allocated on insert.
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(setter(into), build_fn(error = "crate::error::Error"))]
pub struct NewRestaurant {
    pub name: String,
    pub category: String,
    pub location: String,
    #[builder(setter(strip_option), default)]
    pub id: Option<i64>,
    #[builder(default = "DEFAULT_PRICE_RANGE.to_string()")]
    pub price_range: String,
    #[builder(default)]
    pub rating: f64,
    #[builder(default)]
    pub description: String,
    #[builder(default)]
    pub recommended_menu: Vec<String>,
    #[builder(default)]
    pub likes: i64,
    #[builder(default)]
    pub image: String,
}

impl NewRestaurant {
    pub fn into_restaurant(self, oid: ObjectId, id: i64) -> Restaurant {
        Restaurant {
            oid,
            id,
            name: self.name,
            category: self.category,
            location: self.location,
            price_range: self.price_range,
            rating: self.rating,
            description: self.description,
            recommended_menu: self.recommended_menu,
            likes: self.likes,
            image: self.image,
        }
    }
}

/// Client supplied restaurant fields, as received on create and update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantPayload {
    pub name: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub price_range: Option<String>,
    pub rating: Option<f64>,
    pub description: Option<String>,
    /// either a list or a comma separated string
    pub recommended_menu: Option<Value>,
    pub image: Option<String>,
}

/// Partial update. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestaurantPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub price_range: Option<String>,
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub recommended_menu: Option<Vec<String>>,
    pub image: Option<String>,
}

impl RestaurantPatch {
    pub fn apply(self, target: &mut Restaurant) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        set(&mut target.name, self.name);
        set(&mut target.category, self.category);
        set(&mut target.location, self.location);
        set(&mut target.price_range, self.price_range);
        set(&mut target.rating, self.rating);
        set(&mut target.description, self.description);
        set(&mut target.recommended_menu, self.recommended_menu);
        set(&mut target.image, self.image);
    }
}

/// A free-form submission document. The body never carries its own `_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    #[serde(
        rename = "_id",
        serialize_with = "bson::serde_helpers::serialize_object_id_as_hex_string"
    )]
    pub oid: ObjectId,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_object_id() {
        let oid = ObjectId::new();
        assert_eq!(
            RecordKey::resolve(&oid.to_hex()),
            Some(RecordKey::Object(oid))
        );
        assert_eq!(
            RecordKey::resolve(&oid.to_hex().to_uppercase()),
            Some(RecordKey::Object(oid))
        );
        // all digits, but still a well formed object id
        assert!(matches!(
            RecordKey::resolve("000000000000000000000001"),
            Some(RecordKey::Object(_))
        ));
    }

    #[test]
    fn test_resolve_legacy_numbers() {
        assert_eq!(RecordKey::resolve("7"), Some(RecordKey::Legacy(7)));
        assert_eq!(RecordKey::resolve(" 12 "), Some(RecordKey::Legacy(12)));
        assert_eq!(RecordKey::resolve("3.0"), Some(RecordKey::Legacy(3)));
        assert_eq!(RecordKey::resolve("3.5"), None);
        assert_eq!(RecordKey::resolve("abc"), None);
        assert_eq!(RecordKey::resolve(""), None);
        // 24 characters, but not hex
        assert_eq!(RecordKey::resolve("zzzzzzzzzzzzzzzzzzzzzzzz"), None);
    }

    #[test]
    fn test_builder_fills_defaults() {
        let new = NewRestaurantBuilder::default()
            .name("X")
            .category("Y")
            .location("Z")
            .build()
            .unwrap();
        assert_eq!(new.price_range, DEFAULT_PRICE_RANGE);
        assert_eq!(new.rating, 0.0);
        assert!(new.recommended_menu.is_empty());
        assert_eq!(new.likes, 0);
        assert_eq!(new.id, None);
    }

    #[test]
    fn test_builder_reports_first_missing_field() {
        let err = NewRestaurantBuilder::default()
            .name("X")
            .location("Z")
            .build()
            .unwrap_err();
        assert!(matches!(err, crate::error::Error::Validation { field: "category" }));
        assert_eq!(err.to_string(), "'category' is required");
    }

    #[test]
    fn test_patch_only_touches_present_fields() {
        let mut restaurant = NewRestaurantBuilder::default()
            .name("Old")
            .category("Cafe")
            .location("Gate")
            .rating(4.0)
            .build()
            .unwrap()
            .into_restaurant(ObjectId::new(), 1);

        RestaurantPatch {
            name: Some("New".to_string()),
            recommended_menu: Some(vec!["latte".to_string()]),
            ..Default::default()
        }
        .apply(&mut restaurant);

        assert_eq!(restaurant.name, "New");
        assert_eq!(restaurant.category, "Cafe");
        assert_eq!(restaurant.rating, 4.0);
        assert_eq!(restaurant.recommended_menu, vec!["latte"]);
    }

    #[test]
    fn test_restaurant_serializes_with_camel_case_and_object_id() {
        let oid = ObjectId::new();
        let restaurant = NewRestaurantBuilder::default()
            .name("X")
            .category("Y")
            .location("Z")
            .build()
            .unwrap()
            .into_restaurant(oid, 3);
        let json = serde_json::to_value(&restaurant).unwrap();
        assert_eq!(json["_id"], oid.to_hex());
        assert_eq!(json["id"], 3);
        assert_eq!(json["priceRange"], DEFAULT_PRICE_RANGE);
        assert_eq!(json["recommendedMenu"], serde_json::json!([]));
    }
}
