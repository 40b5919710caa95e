#![warn(clippy::unwrap_used)]

#[macro_use]
extern crate rust_i18n;

rust_i18n::i18n!("locales", fallback = "ru");

pub mod app;
pub mod entity;
pub mod logger;
pub mod services;
pub mod settings;
pub mod telegram;
pub mod utils;
