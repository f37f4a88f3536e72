//! turath: incremental, write-once ingestion of hadith collections and
//! fatwa archives into SQLite.

pub mod catalog;
pub mod classify;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod progress;
pub mod source;
pub mod state;
pub mod store;
