#[macro_use]
pub mod macros;

pub mod api;
pub mod config;
pub mod cookie_store;
pub mod fs_json_util;
pub mod messages;
pub mod parser;
pub mod service;
pub mod telegram;
