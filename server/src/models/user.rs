// /server/src/models/user.rs
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::address::Address;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub first_name: String,
    pub mid_name: Option<String>,
    pub last_name: String,
    pub address_id: Option<Uuid>,
    pub phone: String,
    pub photo: Option<String>,
    pub rating: f64,
    pub is_staff: bool,
    pub is_municipal: bool,
    pub municipal_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub async fn by_id(pool: &PgPool, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }

    pub async fn by_email(pool: &PgPool, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await?;
        Ok(user)
    }
}

pub async fn load_map(pool: &PgPool, ids: &[Uuid]) -> Result<HashMap<Uuid, User>, AppError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let users = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await?;
    Ok(users.into_iter().map(|u| (u.id, u)).collect())
}

// Рейтинг хранится как double, наружу отдается с одним знаком после запятой.
fn serialize_rating<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64((value * 10.0).round() / 10.0)
}

/// Полное представление пользователя (админ и собственный профиль).
#[derive(Debug, Serialize)]
pub struct UserFull {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub mid_name: Option<String>,
    pub last_name: String,
    pub address: Option<Address>,
    pub phone: String,
    pub photo: Option<String>,
    #[serde(serialize_with = "serialize_rating")]
    pub rating: f64,
    pub is_municipal: bool,
    pub municipal_name: Option<String>,
}

impl UserFull {
    pub fn new(user: &User, address: Option<Address>) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            mid_name: user.mid_name.clone(),
            last_name: user.last_name.clone(),
            address,
            phone: user.phone.clone(),
            photo: user.photo.clone(),
            rating: user.rating,
            is_municipal: user.is_municipal,
            municipal_name: user.municipal_name.clone(),
        }
    }
}

/// Краткое представление (авторы комментариев, публичный список).
#[derive(Debug, Serialize)]
pub struct UserShort {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub mid_name: Option<String>,
    pub last_name: String,
    #[serde(serialize_with = "serialize_rating")]
    pub rating: f64,
}

impl UserShort {
    pub fn new(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            mid_name: user.mid_name.clone(),
            last_name: user.last_name.clone(),
            rating: user.rating,
        }
    }
}

/// Карточка муниципальной службы в ответах гражданину.
#[derive(Debug, Serialize)]
pub struct MunicipalCard {
    pub id: Uuid,
    pub municipal_name: Option<String>,
    pub address: Option<Address>,
    pub email: String,
    pub phone: String,
    pub photo: Option<String>,
}

impl MunicipalCard {
    pub fn new(user: &User, address: Option<Address>) -> Self {
        Self {
            id: user.id,
            municipal_name: user.municipal_name.clone(),
            address,
            email: user.email.clone(),
            phone: user.phone.clone(),
            photo: user.photo.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "ivan@example.ru".to_string(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$abc$def".to_string(),
            first_name: "Иван".to_string(),
            mid_name: None,
            last_name: "Иванов".to_string(),
            address_id: None,
            phone: "+79991234567".to_string(),
            photo: None,
            rating: 87.6543,
            is_staff: false,
            is_municipal: false,
            municipal_name: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn password_hash_never_serialized() {
        let value = serde_json::to_value(user()).unwrap();
        assert!(value.get("password_hash").is_none());
        assert!(value.get("email").is_some());
    }

    #[test]
    fn rating_rounded_to_one_decimal() {
        let full = UserFull::new(&user(), None);
        let value = serde_json::to_value(&full).unwrap();
        assert_eq!(value.get("rating"), Some(&serde_json::json!(87.7)));
    }
}
