//! Record-store interfaces for the business services. The storage engine
//! behind them is a deployment choice.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::StoreError;
use crate::role::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: i64,
    #[schema(example = "ana")]
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    #[schema(example = "ana@example.com")]
    pub email: String,
    #[schema(value_type = String, example = "USER")]
    pub role: Role,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: i64,
    #[schema(example = "Widget")]
    pub name: String,
    pub description: String,
    #[schema(example = 9.5)]
    pub price: f64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewProduct {
    #[schema(example = "Widget")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: f64,
}

/// Partial update. Empty strings and non-positive prices leave the stored
/// value alone.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProductPatch {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: f64,
}

impl ProductPatch {
    pub fn apply(&self, product: &mut Product, now: i64) {
        if !self.name.is_empty() {
            product.name = self.name.clone();
        }
        if !self.description.is_empty() {
            product.description = self.description.clone();
        }
        if self.price > 0.0 {
            product.price = self.price;
        }
        product.updated_at = now;
    }
}

pub trait UserStore: Send + Sync {
    fn create_user(&self, user: &NewUser, now: i64) -> Result<User, StoreError>;
    fn find_user_by_name(&self, username: &str) -> Result<User, StoreError>;
    fn get_user(&self, id: i64) -> Result<User, StoreError>;
    fn set_role(&self, username: &str, role: &Role) -> Result<(), StoreError>;
    fn list_users(&self) -> Result<Vec<User>, StoreError>;
}

pub trait ProductStore: Send + Sync {
    fn list_products(&self) -> Result<Vec<Product>, StoreError>;
    fn get_product(&self, id: i64) -> Result<Product, StoreError>;
    fn create_product(&self, product: &NewProduct, now: i64) -> Result<Product, StoreError>;
    fn update_product(&self, id: i64, patch: &ProductPatch, now: i64) -> Result<Product, StoreError>;
    fn delete_product(&self, id: i64) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_skips_blank_fields() {
        let mut product = Product {
            id: 1,
            name: "Widget".into(),
            description: "blue".into(),
            price: 3.0,
            created_at: 0,
            updated_at: 0,
        };
        let patch = ProductPatch {
            name: String::new(),
            description: "red".into(),
            price: 0.0,
        };
        patch.apply(&mut product, 5);
        assert_eq!(product.name, "Widget");
        assert_eq!(product.description, "red");
        assert_eq!(product.price, 3.0);
        assert_eq!(product.updated_at, 5);
    }

    #[test]
    fn password_hash_never_serializes() {
        let user = User {
            id: 1,
            username: "ana".into(),
            password_hash: "$argon2id$secret".into(),
            email: "ana@example.com".into(),
            role: Role::User,
            created_at: 0,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"role\":\"USER\""));
    }

    #[test]
    fn user_schema_carries_examples_but_no_hash() {
        let (name, schema) = <User as utoipa::ToSchema>::schema();
        assert_eq!(name, "User");
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["properties"]["username"]["example"], "ana");
        assert_eq!(json["properties"]["role"]["example"], "USER");
        assert!(json["properties"].get("password_hash").is_none());
    }
}
