//! Guided tour of an ORM session lifecycle on SQLite.
//!
//! The [`orm`] module holds the engine, model, session and query types;
//! [`models`] declares the `User` model; [`walkthrough`] strings them together
//! in the order a newcomer meets them.

pub mod app;
pub mod cli;
pub mod commands;
pub mod configuration;
pub mod models;
pub mod orm;
pub mod tracing;
pub mod walkthrough;

pub use models::User;
pub use orm::{create_engine, Engine, MetaData, Model, OrmError, Session};
