//! Value and entity model shared by every query layer.
//!
//! # Responsibility
//! - Define runtime values and the semantic markers typing expressions.
//! - Define entity metadata and aliased relation handles.

pub mod entity;
pub mod value;
