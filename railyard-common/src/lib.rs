//! # Railyard Common Library
//!
//! Shared code for the model-train inventory tools:
//! - Entity models for railroads, car classes, locations, cars and loads
//! - Car field resolution against car-class defaults
//! - The location tree (parent links, ancestry, cycle rejection)
//! - Configuration loading

pub mod config;
pub mod error;
pub mod locations;
pub mod models;
pub mod resolver;

pub use error::{Error, Result};
pub use locations::{LocationTree, TreeIssue};
pub use resolver::{resolve, resolve_reporting_mark, EffectiveCar};
