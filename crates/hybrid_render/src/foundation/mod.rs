//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the pipeline:
//! - Math types and conversions for GPU upload
//! - Name-indexed handle arenas
//! - Logging initialisation

pub mod collections;
pub mod logging;
pub mod math;
