// /server/src/models/address.rs
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::AppError;
use crate::validators;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Address {
    pub id: Uuid,
    pub city: String,
    pub district: String,
    pub street: String,
    pub house: i16,
    pub building: String,
    pub entrance: Option<i16>,
    pub floor: Option<i16>,
    pub apartment: Option<i16>,
    #[serde(rename = "index")]
    pub postal_index: i32,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressPayload {
    pub city: String,
    pub district: String,
    pub street: String,
    pub house: i16,
    pub building: String,
    pub entrance: Option<i16>,
    pub floor: Option<i16>,
    pub apartment: Option<i16>,
    #[serde(rename = "index")]
    pub postal_index: i32,
    pub latitude: f64,
    pub longitude: f64,
}

impl AddressPayload {
    /// Собирает все ошибки полей адреса разом.
    pub fn validate(&self) -> Vec<(&'static str, String)> {
        let mut errors = Vec::new();
        if let Err(e) = validators::validate_max_len(&self.city, 50, "Укажите корректный город.") {
            errors.push(("city", e));
        }
        if let Err(e) =
            validators::validate_max_len(&self.district, 50, "Укажите корректный район.")
        {
            errors.push(("district", e));
        }
        if let Err(e) = validators::validate_max_len(&self.street, 50, "Укажите корректную улицу.")
        {
            errors.push(("street", e));
        }
        if !(0..=validators::ADDRESS_HOUSE_MAX_VAL).contains(&self.house) {
            errors.push(("house", "Укажите корректный номер дома.".to_string()));
        }
        if let Err(e) = validators::validate_building(&self.building) {
            errors.push(("building", e));
        }
        if let Some(entrance) = self.entrance {
            if !(0..=validators::ADDRESS_ENTRANCE_MAX_VAL).contains(&entrance) {
                errors.push(("entrance", "Укажите корректный подъезд.".to_string()));
            }
        }
        if let Some(floor) = self.floor {
            if !(0..=validators::ADDRESS_FLOOR_MAX_VAL).contains(&floor) {
                errors.push(("floor", "Укажите корректный этаж.".to_string()));
            }
        }
        if let Some(apartment) = self.apartment {
            if !(0..=validators::ADDRESS_APARTMENT_MAX_VAL).contains(&apartment) {
                errors.push(("apartment", "Укажите корректный номер квартиры.".to_string()));
            }
        }
        if !(0..=validators::ADDRESS_INDEX_MAX_VAL).contains(&self.postal_index) {
            errors.push(("index", "Укажите корректный индекс.".to_string()));
        }
        if let Err(e) = validators::validate_lat(self.latitude) {
            errors.push(("latitude", e));
        }
        if let Err(e) = validators::validate_lon(self.longitude) {
            errors.push(("longitude", e));
        }
        errors
    }
}

/// Ищет адрес по точному совпадению ключа уникальности, иначе создает.
/// Вызывается внутри транзакции пишущей операции.
pub async fn get_or_create(
    conn: &mut PgConnection,
    payload: &AddressPayload,
) -> Result<Address, AppError> {
    let existing = sqlx::query_as::<_, Address>(
        "SELECT * FROM addresses
         WHERE city = $1 AND street = $2 AND house = $3 AND building = $4
           AND apartment IS NOT DISTINCT FROM $5",
    )
    .bind(&payload.city)
    .bind(&payload.street)
    .bind(payload.house)
    .bind(&payload.building)
    .bind(payload.apartment)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(address) = existing {
        return Ok(address);
    }

    let address = sqlx::query_as::<_, Address>(
        "INSERT INTO addresses
             (city, district, street, house, building, entrance, floor,
              apartment, postal_index, latitude, longitude)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         RETURNING *",
    )
    .bind(&payload.city)
    .bind(&payload.district)
    .bind(&payload.street)
    .bind(payload.house)
    .bind(&payload.building)
    .bind(payload.entrance)
    .bind(payload.floor)
    .bind(payload.apartment)
    .bind(payload.postal_index)
    .bind(payload.latitude)
    .bind(payload.longitude)
    .fetch_one(&mut *conn)
    .await?;

    Ok(address)
}

pub async fn by_id(pool: &PgPool, id: Uuid) -> Result<Option<Address>, AppError> {
    let address = sqlx::query_as::<_, Address>("SELECT * FROM addresses WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(address)
}

pub async fn load_map(
    pool: &PgPool,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, Address>, AppError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let addresses = sqlx::query_as::<_, Address>("SELECT * FROM addresses WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await?;
    Ok(addresses.into_iter().map(|a| (a.id, a)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> AddressPayload {
        AddressPayload {
            city: "Москва".to_string(),
            district: "Центральный".to_string(),
            street: "Тверская".to_string(),
            house: 12,
            building: "1А".to_string(),
            entrance: Some(2),
            floor: Some(5),
            apartment: Some(48),
            postal_index: 125009,
            latitude: 55.7558,
            longitude: 37.6176,
        }
    }

    #[test]
    fn valid_payload_has_no_errors() {
        assert!(payload().validate().is_empty());
    }

    #[test]
    fn out_of_range_fields_are_reported_per_field() {
        let mut bad = payload();
        bad.house = 1000;
        bad.building = "12345".to_string();
        bad.apartment = Some(10_000);
        bad.postal_index = 1_000_000;
        let errors = bad.validate();
        let fields: Vec<&str> = errors.iter().map(|(f, _)| *f).collect();
        assert_eq!(fields, vec!["house", "building", "apartment", "index"]);
    }

    #[test]
    fn optional_parts_may_be_absent() {
        let mut minimal = payload();
        minimal.entrance = None;
        minimal.floor = None;
        minimal.apartment = None;
        assert!(minimal.validate().is_empty());
    }
}
