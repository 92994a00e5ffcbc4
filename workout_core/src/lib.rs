#![forbid(unsafe_code)]

//! Core domain model and business logic for workout session tracking.
//!
//! This crate provides:
//! - Domain entities (sessions, exercises, sets, planned workouts, metrics)
//! - Session state machine, scoring and calorie estimates
//! - Persistence (JSON store, measurement event queue)
//! - Measurement synchronization, history and CSV export
//! - The `Tracker` application service

pub mod types;
pub mod error;
pub mod set;
pub mod session_exercise;
pub mod session;
pub mod planned;
pub mod metric;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod store;
pub mod queue;
pub mod sync;
pub mod history;
pub mod export;
pub mod service;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use set::ExerciseSet;
pub use session_exercise::SessionExercise;
pub use session::{
    ExerciseSummary, NewSession, PerformanceSummary, WorkoutSession, WorkoutSessionRecord,
};
pub use planned::{PlannedWorkout, PlannedWorkoutRecord};
pub use metric::{UserMetric, UserMetricRecord};
pub use catalog::{build_default_catalog, get_default_catalog, CatalogExercise, ExerciseCatalog, StaticCatalog};
pub use config::Config;
pub use store::{FileStore, MemoryStore, Repository, Store, StoreData};
pub use queue::{DrainGuard, EventSink, JsonlQueue, MeasurementChanged};
pub use sync::{MetricSynchronizer, SyncOutcome, SyncReport};
pub use export::export_sessions_csv;
pub use service::Tracker;
