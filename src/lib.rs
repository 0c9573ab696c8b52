//! Hourly trajectory prediction reconciler.
//!
//! Watches a dataset directory and a scenario directory, keeps track of the
//! latest weather dataset, and reruns a week-long hourly prediction batch per
//! scenario through an external predictor process, publishing one atomically
//! swapped manifest per scenario.

pub mod config;
pub mod dataset;
pub mod domain;
pub mod error;
pub mod executor;
pub mod publish;
pub mod reconcile;
pub mod runner;
pub mod scenario;
pub mod watch;
