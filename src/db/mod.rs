//! Client-side persistence

pub mod sqlite;
