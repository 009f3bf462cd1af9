//! Criteria-based query compiler.
//!
//! Filter groups are compiled in three stages:
//!
//! 1. [`resolver`] renders one filter on one column with a named placeholder.
//! 2. [`group`] AND-joins the filters of a group, naming placeholders
//!    `<column><index>`.
//! 3. [`compiler`] binds each group to positional parameters, expands list
//!    values and OR-joins the groups, numbering placeholders in one pass.
//!
//! Logical field names are translated through a [`FieldMap`]. The textual
//! syntax used by the CLI lives in [`parse`].

pub mod compiler;
mod field_map;
pub mod group;
pub mod parse;
pub mod resolver;

pub use compiler::{CompiledQuery, PlaceholderStyle, SqlParam, compile, compile_with_style};
pub use field_map::FieldMap;
pub use group::{CompiledPredicate, compile_group};
pub use parse::{parse_filter_group, parse_timestamp};
pub use resolver::{Resolved, resolve};
