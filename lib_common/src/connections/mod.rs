//! # Connections Module
//!
//! This module handles persistent connections to external services,
//! currently the PostgreSQL record store.

/// Module for PostgreSQL connection pooling and the durable record store.
pub mod db_postgres;
