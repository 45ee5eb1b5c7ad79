// /server/src/handlers/mod.rs
pub mod appeal_handler;
pub mod news_handler;
pub mod task_handler;
pub mod user_handler;
