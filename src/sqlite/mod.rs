// SQLite backend for the delay thread:
// - config: connection options and builder
// - connection: `SqlConnection` implementation with indexed prepared statements
// - params: conversion between `RowValues` and rusqlite values
// - query: result materialization

pub mod config;
pub mod connection;
pub mod params;
pub mod query;

pub use config::{SqliteOptions, SqliteOptionsBuilder};
pub use connection::SqliteConnection;
pub use query::build_result_set;
