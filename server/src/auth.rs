// /server/src/auth.rs
use crate::{config::AuthScheme, error::AppError, models::user::User, state::AppState};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ACCESS_TOKEN_DAYS: i64 = 1;
pub const REFRESH_TOKEN_DAYS: i64 = 7;

/// Закрытый набор ролей. Права заданы фиксированной таблицей методов,
/// а не проверками флагов по месту.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Anonymous,
    Citizen,
    Municipal,
    Admin,
}

impl Role {
    pub fn from_flags(is_staff: bool, is_municipal: bool) -> Self {
        if is_staff {
            Role::Admin
        } else if is_municipal {
            Role::Municipal
        } else {
            Role::Citizen
        }
    }

    pub fn can_create_appeal(self) -> bool {
        matches!(self, Role::Citizen)
    }

    pub fn can_answer_appeal(self) -> bool {
        matches!(self, Role::Municipal)
    }

    pub fn can_rate_appeal(self) -> bool {
        matches!(self, Role::Citizen)
    }

    pub fn can_create_news(self) -> bool {
        matches!(self, Role::Municipal)
    }

    pub fn can_comment(self) -> bool {
        !matches!(self, Role::Anonymous)
    }

    pub fn can_vote(self) -> bool {
        !matches!(self, Role::Anonymous)
    }

    pub fn sees_all_appeals(self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn sees_full_users(self) -> bool {
        matches!(self, Role::Admin)
    }
}

// Флаги is_staff/is_municipal попадают в токен только когда истинны.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_staff: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_municipal: bool,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: Uuid,
    pub refresh: bool,
    pub exp: i64,
}

/// Проверенная личность вызывающего, прокидывается через Extension.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Для публичных маршрутов, где личность нужна, но не обязательна.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthUser>);

impl MaybeUser {
    pub fn role(&self) -> Role {
        self.0.as_ref().map(|u| u.role).unwrap_or(Role::Anonymous)
    }
}

#[derive(sqlx::FromRow)]
struct TokenOwner {
    id: Uuid,
    email: String,
    is_staff: bool,
    is_municipal: bool,
}

async fn resolve_user(state: &AppState, header: &str) -> Result<AuthUser, AppError> {
    match state.config.auth_scheme {
        AuthScheme::Jwt => {
            let token = header.strip_prefix("Bearer ").ok_or(AppError::Unauthorized)?;
            let claims = decode::<Claims>(
                token,
                &DecodingKey::from_secret(state.config.jwt_secret.as_ref()),
                &Validation::default(),
            )?
            .claims;
            Ok(AuthUser {
                id: claims.sub,
                email: claims.email,
                role: Role::from_flags(claims.is_staff, claims.is_municipal),
            })
        }
        AuthScheme::Token => {
            let key = header.strip_prefix("Token ").ok_or(AppError::Unauthorized)?;
            let owner = sqlx::query_as::<_, TokenOwner>(
                "SELECT u.id, u.email, u.is_staff, u.is_municipal
                 FROM auth_tokens t JOIN users u ON u.id = t.user_id
                 WHERE t.key = $1",
            )
            .bind(key)
            .fetch_optional(&state.pool)
            .await?
            .ok_or(AppError::Unauthorized)?;
            Ok(AuthUser {
                id: owner.id,
                email: owner.email,
                role: Role::from_flags(owner.is_staff, owner.is_municipal),
            })
        }
    }
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|auth_header| auth_header.to_str().ok())
        .ok_or(AppError::Unauthorized)?
        .to_string();

    let user = resolve_user(&state, &header).await?;
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

// Как auth_middleware, но отсутствие заголовка дает анонимную роль.
// Предъявленный недействительный токен все равно отклоняется.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|auth_header| auth_header.to_str().ok())
        .map(str::to_owned);

    let maybe = match header {
        Some(h) => MaybeUser(Some(resolve_user(&state, &h).await?)),
        None => MaybeUser(None),
    };
    req.extensions_mut().insert(maybe);

    Ok(next.run(req).await)
}

pub fn issue_access_token(user: &User, secret: &str) -> Result<String, AppError> {
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        is_staff: user.is_staff,
        is_municipal: user.is_municipal,
        exp: (Utc::now() + Duration::days(ACCESS_TOKEN_DAYS)).timestamp(),
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?)
}

pub fn issue_refresh_token(user_id: Uuid, secret: &str) -> Result<String, AppError> {
    let claims = RefreshClaims {
        sub: user_id,
        refresh: true,
        exp: (Utc::now() + Duration::days(REFRESH_TOKEN_DAYS)).timestamp(),
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?)
}

pub fn decode_refresh_token(token: &str, secret: &str) -> Result<Uuid, AppError> {
    let claims = decode::<RefreshClaims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?
    .claims;
    if !claims.refresh {
        return Err(AppError::Unauthorized);
    }
    Ok(claims.sub)
}

/// Хеширует пароль argon2 со свежей солью. Хеширование стоит дорого,
/// поэтому уводится из async-потока.
pub async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    })
    .await
    .map_err(|_| AppError::InternalServerError)?
    .map_err(AppError::PasswordHashError)
}

/// Сверяет пароль с сохраненным хешем. Нечитаемый хеш равносилен
/// несовпадению: наружу в обоих случаях уходит единый отказ.
pub async fn verify_password(password: String, password_hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || {
        argon2::PasswordHash::new(&password_hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    })
    .await
    .map_err(|_| AppError::InternalServerError)
}

/// Ключ непрозрачного токена: 40 шестнадцатеричных символов.
pub fn generate_token_key() -> String {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_is_derived_from_flags() {
        assert_eq!(Role::from_flags(true, false), Role::Admin);
        assert_eq!(Role::from_flags(true, true), Role::Admin);
        assert_eq!(Role::from_flags(false, true), Role::Municipal);
        assert_eq!(Role::from_flags(false, false), Role::Citizen);
    }

    #[test]
    fn capability_table_is_fixed_per_role() {
        assert!(Role::Citizen.can_create_appeal());
        assert!(Role::Citizen.can_rate_appeal());
        assert!(!Role::Citizen.can_answer_appeal());
        assert!(!Role::Citizen.can_create_news());

        assert!(Role::Municipal.can_answer_appeal());
        assert!(Role::Municipal.can_create_news());
        assert!(!Role::Municipal.can_create_appeal());
        assert!(!Role::Municipal.can_rate_appeal());

        assert!(Role::Admin.sees_all_appeals());
        assert!(Role::Admin.sees_full_users());
        assert!(!Role::Admin.can_create_news());

        assert!(!Role::Anonymous.can_comment());
        assert!(!Role::Anonymous.can_vote());
        assert!(Role::Citizen.can_comment());
        assert!(Role::Municipal.can_vote());
    }

    #[test]
    fn false_flags_are_omitted_from_claims() {
        let claims = Claims {
            sub: Uuid::nil(),
            email: "ivan@example.ru".to_string(),
            is_staff: false,
            is_municipal: true,
            exp: 0,
        };
        let value = serde_json::to_value(&claims).unwrap();
        assert!(value.get("is_staff").is_none());
        assert_eq!(value.get("is_municipal"), Some(&serde_json::json!(true)));
    }

    #[tokio::test]
    async fn hash_never_equals_plaintext_and_round_trips() {
        let hash = hash_password("aB1!xyz".to_string()).await.unwrap();
        assert_ne!(hash, "aB1!xyz");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("aB1!xyz".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!verify_password("другой".to_string(), hash).await.unwrap());
    }

    #[tokio::test]
    async fn same_password_hashes_differently_each_time() {
        let a = hash_password("aB1!xyz".to_string()).await.unwrap();
        let b = hash_password("aB1!xyz".to_string()).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn unreadable_stored_hash_is_a_mismatch() {
        let ok = verify_password("aB1!xyz".to_string(), "не-хеш".to_string())
            .await
            .unwrap();
        assert!(!ok);
    }

    #[test]
    fn token_key_is_40_hex_chars() {
        let key = generate_token_key();
        assert_eq!(key.len(), 40);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, generate_token_key());
    }
}
