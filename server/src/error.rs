// /server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};

#[derive(Debug)]
pub enum AppError {
    // Ошибки полей: пары (поле, сообщение), отдаются картой поле -> сообщение.
    Validation(Vec<(&'static str, String)>),
    Unauthorized,
    InvalidCredentials,
    // Запрещенное действие без уточнения причины.
    Forbidden,
    // Запрещенное действие с пояснением (например, оценка незавершенного обращения).
    ActionForbidden(String),
    NotFound,
    // Допустимое, но заблокированное состоянием действие (повторный ответ и т.п.).
    Conflict(String),
    SqlxError(sqlx::Error),
    PasswordHashError(argon2::password_hash::Error),
    JwtError(jsonwebtoken::errors::Error),
    InternalServerError,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Validation(fields) => {
                let mut map = Map::new();
                for (field, message) in fields {
                    map.insert(field.to_string(), Value::String(message));
                }
                (StatusCode::BAD_REQUEST, Value::Object(map))
            }
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                json!({ "detail": "Учетные данные не были предоставлены." }),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                json!({ "detail": "Указаны неверные email или password." }),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                json!({ "detail": "У вас недостаточно прав для выполнения данного действия." }),
            ),
            AppError::ActionForbidden(detail) => {
                (StatusCode::FORBIDDEN, json!({ "detail": detail }))
            }
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                json!({ "detail": "Страница не найдена." }),
            ),
            AppError::Conflict(detail) => (StatusCode::BAD_REQUEST, json!({ "detail": detail })),
            AppError::SqlxError(e) => {
                tracing::error!("SQLx error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "detail": "Database Error" }),
                )
            }
            AppError::PasswordHashError(e) => {
                tracing::error!("Password hashing error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "detail": "Hashing Error" }),
                )
            }
            AppError::JwtError(e) => {
                tracing::error!("JWT error: {:?}", e);
                (
                    StatusCode::UNAUTHORIZED,
                    json!({ "detail": "Недействительный токен." }),
                )
            }
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "detail": "An internal error occurred" }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            _ => AppError::SqlxError(err),
        }
    }
}

impl From<argon2::password_hash::Error> for AppError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AppError::PasswordHashError(err)
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::JwtError(err)
    }
}

/// Проверяет, нарушено ли именованное уникальное ограничение.
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.code().as_deref() == Some("23505") && db.constraint() == Some(constraint)
        }
        _ => false,
    }
}
