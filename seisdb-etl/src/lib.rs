//! # seisdb ETL
//!
//! Reconciles the forecast-processing pipeline's expectations against what
//! actually exists on disk, and records the outcome in the seisdb SQLite
//! database.
//!
//! A reconciliation pass walks dispatcher run scripts to their forecast
//! groups, expands each group's schedule into expected forecast and
//! evaluation artifacts, locates those artifacts in the archive, classifies
//! each one (Missing / Scheduled / Complete), associates evaluations with
//! the observation catalog they consumed, and persists the resulting entity
//! graphs without duplicating rows already recorded by earlier passes.

pub mod config;
pub mod locate;
pub mod model;
pub mod report;
pub mod walk;
