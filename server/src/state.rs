// /server/src/state.rs
use crate::config::Config;
use crate::mail::MailQueue;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub mailer: MailQueue,
}
