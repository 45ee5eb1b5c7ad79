// /server/src/config.rs
use std::env;

// Схема аутентификации. Активна ровно одна, выбирается переменной AUTH_TYPE.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthScheme {
    Token,
    Jwt,
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub secret_salt: String,
    pub auth_scheme: AuthScheme,
    pub media_root: String,
    pub sent_mail_dir: String,
}

impl Config {
    pub fn from_env() -> Self {
        let auth_scheme = match env::var("AUTH_TYPE").as_deref() {
            Ok("jwt") => AuthScheme::Jwt,
            _ => AuthScheme::Token,
        };
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL не задан"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET не задан"),
            secret_salt: env::var("SECRET_SALT").expect("SECRET_SALT не задан"),
            auth_scheme,
            media_root: env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".to_string()),
            sent_mail_dir: env::var("SENT_MAIL_DIR")
                .unwrap_or_else(|_| "sent_emails".to_string()),
        }
    }
}
