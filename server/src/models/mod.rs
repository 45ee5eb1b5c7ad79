// /server/src/models/mod.rs
pub mod address;
pub mod appeal;
pub mod news;
pub mod user;
