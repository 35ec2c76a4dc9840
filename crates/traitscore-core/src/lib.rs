//! Scoring engine, localization and data model for bilingual psychometric assessments.
//!
//! Turns completed response sessions into per-instrument trait scores with
//! interpretation labels. Question banks are bilingual (English and Arabic);
//! scoring never depends on the display language.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod localization;
pub mod model;
pub mod normalize;
pub mod parser;
pub mod record;
pub mod report;
pub mod store;
