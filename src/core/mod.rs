//! Core domain models for the workflow runner
//!
//! This module defines the workflow configuration, the build matrix,
//! steps with their guards, and the per-configuration run results.

pub mod config;
pub mod pipeline;
pub mod step;
pub mod condition;
pub mod context;
pub mod failure;
pub mod matrix;
pub mod state;

pub use pipeline::*;
pub use step::*;
pub use context::*;
pub use failure::StepFailure;
pub use matrix::{Configuration, Matrix, MatrixAxis, MatrixError};
pub use state::*;
