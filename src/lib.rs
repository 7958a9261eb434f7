//! Inkwell - blogging CMS core
//!
//! Posts with authors, categories and tags, reader comments, dashboard users
//! and site settings, stored in SQLite or MySQL and served as a JSON API.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
