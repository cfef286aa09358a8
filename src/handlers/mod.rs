pub mod admin;
pub mod auth;
pub mod driver;
pub mod user;
pub mod vehicles;
pub mod ws;
