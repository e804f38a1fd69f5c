//! Query construction: token grammar, the SELECT builder and the dashboard
//! presets built on top of it.

pub mod builder;
pub mod presets;
pub mod safety;

pub use builder::{Aggregate, Field, Fill, SelectQuery};
pub use safety::{
    Identifier, TimeRange, escape_identifier, escape_string_literal, validate_identifier,
    validate_time_range,
};
