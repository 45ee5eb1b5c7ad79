// /server/src/handlers/user_handler.rs
use crate::{
    auth,
    auth::MaybeUser,
    error::{is_unique_violation, AppError},
    mail::MailMessage,
    models::address::{self, AddressPayload},
    models::user::{User, UserFull, UserShort},
    secret,
    state::AppState,
    validators,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

#[derive(Deserialize)]
pub struct RegisterPayload {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub mid_name: Option<String>,
    pub last_name: String,
    pub phone: String,
    pub address: Option<AddressPayload>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<UserFull>), AppError> {
    let email = payload.email.trim().to_lowercase();

    let mut errors = Vec::new();
    if let Err(e) = validators::validate_email(&email) {
        errors.push(("email", e));
    }
    if let Err(e) = validators::validate_password(&payload.password) {
        errors.push(("password", e));
    }
    if let Err(e) = validators::validate_first_name(&payload.first_name) {
        errors.push(("first_name", e));
    }
    if let Err(e) = validators::validate_mid_name(payload.mid_name.as_deref()) {
        errors.push(("mid_name", e));
    }
    if let Err(e) = validators::validate_last_name(&payload.last_name) {
        errors.push(("last_name", e));
    }
    if let Err(e) = validators::validate_phone(&payload.phone) {
        errors.push(("phone", e));
    }
    if let Some(addr) = &payload.address {
        errors.extend(addr.validate());
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    if User::by_email(&state.pool, &email).await?.is_some() {
        return Err(AppError::Validation(vec![(
            "email",
            "Пользователь с таким email уже зарегистрирован.".to_string(),
        )]));
    }

    let password_hash = auth::hash_password(payload.password.clone()).await?;

    let mut tx = state.pool.begin().await?;

    let address = match &payload.address {
        Some(a) => Some(address::get_or_create(&mut tx, a).await?),
        None => None,
    };

    let new_user = sqlx::query_as::<_, User>(
        "INSERT INTO users
             (email, password_hash, first_name, mid_name, last_name, address_id, phone)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING *",
    )
    .bind(&email)
    .bind(&password_hash)
    .bind(&payload.first_name)
    .bind(&payload.mid_name)
    .bind(&payload.last_name)
    .bind(address.as_ref().map(|a| a.id))
    .bind(&payload.phone)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e, "users_email_key") {
            AppError::Validation(vec![(
                "email",
                "Пользователь с таким email уже зарегистрирован.".to_string(),
            )])
        } else if is_unique_violation(&e, "users_phone_key") {
            AppError::Validation(vec![(
                "phone",
                "Пользователь с таким номером телефона уже зарегистрирован.".to_string(),
            )])
        } else {
            e.into()
        }
    })?;

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(UserFull::new(&new_user, address))))
}

#[derive(Deserialize)]
pub struct UsersQuery {
    pub is_municipal: Option<String>,
}

/// Список пользователей: штабные аккаунты не показываются никогда,
/// администратору отдается полное представление, остальным краткое.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(viewer): Extension<MaybeUser>,
    Query(query): Query<UsersQuery>,
) -> Result<Response, AppError> {
    let municipal = query.is_municipal.as_deref() == Some("true");
    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users
         WHERE is_staff = FALSE AND is_municipal = $1
         ORDER BY created_at",
    )
    .bind(municipal)
    .fetch_all(&state.pool)
    .await?;

    if viewer.role().sees_full_users() {
        let ids: Vec<Uuid> = users.iter().filter_map(|u| u.address_id).collect();
        let addresses = address::load_map(&state.pool, &ids).await?;
        let out: Vec<UserFull> = users
            .iter()
            .map(|u| {
                UserFull::new(u, u.address_id.and_then(|id| addresses.get(&id).cloned()))
            })
            .collect();
        return Ok(Json(out).into_response());
    }

    let out: Vec<UserShort> = users.iter().map(UserShort::new).collect();
    Ok(Json(out).into_response())
}

#[derive(Deserialize)]
pub struct ConfirmEmailPayload {
    pub email: String,
}

/// Высылает на почту одноразовый код подтверждения, выведенный
/// детерминированно из email и серверной соли.
pub async fn confirm_email(
    State(state): State<AppState>,
    Json(payload): Json<ConfirmEmailPayload>,
) -> Result<Json<Value>, AppError> {
    let email = payload.email.trim().to_lowercase();
    if let Err(e) = validators::validate_email(&email) {
        return Err(AppError::Validation(vec![("email", e)]));
    }
    let user = User::by_email(&state.pool, &email)
        .await?
        .ok_or(AppError::NotFound)?;

    let code = secret::create_secret_code(&user.email, &state.config.secret_salt);
    state.mailer.send(MailMessage {
        subject: "Подтверждение электронной почты".to_string(),
        body: format!("Ваш код подтверждения: {code}"),
        to: vec![user.email.clone()],
    });

    Ok(Json(json!({
        "detail": "Письмо с кодом подтверждения отправлено."
    })))
}

#[derive(Deserialize)]
pub struct CredentialsPayload {
    pub email: Option<String>,
    pub password: Option<String>,
}

// Единый отказ на неверную пару, чтобы не раскрывать, какое поле не подошло.
async fn authenticate(state: &AppState, payload: CredentialsPayload) -> Result<User, AppError> {
    let (email, password) = match (payload.email, payload.password) {
        (Some(e), Some(p)) => (e, p),
        (e, p) => {
            let mut errors = Vec::new();
            if e.is_none() {
                errors.push(("email", "Обязательное поле.".to_string()));
            }
            if p.is_none() {
                errors.push(("password", "Обязательное поле.".to_string()));
            }
            return Err(AppError::Validation(errors));
        }
    };

    let email = email.trim().to_lowercase();
    let user = User::by_email(&state.pool, &email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !auth::verify_password(password, user.password_hash.clone()).await? {
        return Err(AppError::InvalidCredentials);
    }

    Ok(user)
}

/// Непрозрачный токен: один ключ на пользователя, повторный запрос
/// возвращает уже существующий.
pub async fn obtain_auth_token(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsPayload>,
) -> Result<Json<Value>, AppError> {
    let user = authenticate(&state, payload).await?;

    let key = sqlx::query_scalar::<_, String>(
        "INSERT INTO auth_tokens (key, user_id) VALUES ($1, $2)
         ON CONFLICT (user_id) DO UPDATE SET key = auth_tokens.key
         RETURNING key",
    )
    .bind(auth::generate_token_key())
    .bind(user.id)
    .fetch_one(&state.pool)
    .await?;

    let mut response = Map::new();
    response.insert("token".to_string(), json!(key));
    response.insert("user_id".to_string(), json!(user.id));
    // Флаги ролей присутствуют в ответе, только когда истинны.
    if user.is_municipal {
        response.insert("is_municipal".to_string(), json!(true));
    }
    if user.is_staff {
        response.insert("is_staff".to_string(), json!(true));
    }
    Ok(Json(Value::Object(response)))
}

pub async fn obtain_jwt_pair(
    State(state): State<AppState>,
    Json(payload): Json<CredentialsPayload>,
) -> Result<Json<Value>, AppError> {
    let user = authenticate(&state, payload).await?;
    let access = auth::issue_access_token(&user, &state.config.jwt_secret)?;
    let refresh = auth::issue_refresh_token(user.id, &state.config.jwt_secret)?;
    Ok(Json(json!({ "access": access, "refresh": refresh })))
}

#[derive(Deserialize)]
pub struct RefreshPayload {
    pub refresh: String,
}

pub async fn refresh_jwt(
    State(state): State<AppState>,
    Json(payload): Json<RefreshPayload>,
) -> Result<Json<Value>, AppError> {
    let user_id = auth::decode_refresh_token(&payload.refresh, &state.config.jwt_secret)?;
    let user = User::by_id(&state.pool, user_id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    let access = auth::issue_access_token(&user, &state.config.jwt_secret)?;
    Ok(Json(json!({ "access": access })))
}
