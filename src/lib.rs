//! Live total-points pace triggers and post-game scoring narratives for
//! basketball.
//!
//! The pure core lives in [`pace`] (metrics and trigger classification) and
//! [`postgame`] (play parsing, run detection, narrative). [`live_scores`]
//! drives the classifier against a live feed; the remaining modules wire the
//! service together.

pub mod config;
pub mod dashboard;
pub mod db;
pub mod handoff;
pub mod live_scores;
pub mod models;
pub mod pace;
pub mod postgame;
