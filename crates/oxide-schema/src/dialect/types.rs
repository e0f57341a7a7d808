//! Native value type to database parameter type mapping.

use std::any::TypeId;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Typed parameter kinds understood by the supported backends.
///
/// Each dialect renders these with its own type names through
/// [`Dialect::parameter_type_name`](super::Dialect::parameter_type_name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterType {
    /// Boolean.
    Boolean,
    /// Unsigned 8-bit integer.
    TinyInt,
    /// 16-bit integer.
    SmallInt,
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    BigInt,
    /// Single precision float.
    Real,
    /// Double precision float.
    Double,
    /// Unbounded text.
    Text,
    /// Binary data.
    Binary,
    /// Date only.
    Date,
    /// Time only.
    Time,
    /// Timestamp without time zone.
    Timestamp,
    /// Timestamp with time zone.
    TimestampTz,
    /// JSON document.
    Json,
}

/// Maps a native Rust type to its parameter type, if one is known.
///
/// This is the mapping shared by all dialects; dialects may narrow or widen
/// it in [`Dialect::parameter_type`](super::Dialect::parameter_type).
#[must_use]
pub fn native_parameter_type(type_id: TypeId) -> Option<ParameterType> {
    let mapping: [(TypeId, ParameterType); 17] = [
        (TypeId::of::<bool>(), ParameterType::Boolean),
        (TypeId::of::<i16>(), ParameterType::SmallInt),
        (TypeId::of::<i32>(), ParameterType::Integer),
        (TypeId::of::<i64>(), ParameterType::BigInt),
        (TypeId::of::<f32>(), ParameterType::Real),
        (TypeId::of::<f64>(), ParameterType::Double),
        (TypeId::of::<String>(), ParameterType::Text),
        (TypeId::of::<&'static str>(), ParameterType::Text),
        (TypeId::of::<char>(), ParameterType::Text),
        (TypeId::of::<Vec<u8>>(), ParameterType::Binary),
        (TypeId::of::<&'static [u8]>(), ParameterType::Binary),
        (TypeId::of::<NaiveDate>(), ParameterType::Date),
        (TypeId::of::<NaiveTime>(), ParameterType::Time),
        (TypeId::of::<NaiveDateTime>(), ParameterType::Timestamp),
        (TypeId::of::<DateTime<Utc>>(), ParameterType::TimestampTz),
        (TypeId::of::<serde_json::Value>(), ParameterType::Json),
        (TypeId::of::<u8>(), ParameterType::SmallInt),
    ];

    mapping
        .iter()
        .find(|(id, _)| *id == type_id)
        .map(|(_, parameter_type)| *parameter_type)
}
