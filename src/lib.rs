//! Batch translation pipeline: one scheduler-triggered pass per token over
//! the queued work items, dispatched to a configured vendor backend with
//! per-item failure isolation and content-based change detection for
//! documents.
pub mod changes;
pub mod config;
pub mod db;
pub mod model;
pub mod provider;
pub mod runner;
pub mod staging;
