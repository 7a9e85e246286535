//! Lossless decoding of Bolt values from result rows.
//!
//! The driver's own `BoltType` decoding rejects points and turns durations
//! into a two element list. [`PropertyValue`] walks the driver's value
//! representation kind by kind instead and rebuilds the exact Bolt value, so
//! a property read from the source is written to the target with its type.
//!
//! Durations are the one lossy case: the driver only exposes their total
//! seconds and nanoseconds, so months and days are folded into seconds.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use neo4rs::{
    BoltBoolean, BoltDate, BoltDateTime, BoltDateTimeZoneId, BoltDuration, BoltFloat, BoltInteger, BoltList,
    BoltLocalDateTime, BoltLocalTime, BoltMap, BoltNull, BoltPoint2D, BoltPoint3D, BoltString, BoltTime, BoltType,
};
use serde::de::{self, Deserialize, Deserializer, EnumAccess, IgnoredAny, MapAccess, SeqAccess, VariantAccess, Visitor};

/// A Bolt value decoded without going through the driver's `BoltType` visitor.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValue(pub BoltType);

impl PropertyValue {
    pub fn into_inner(self) -> BoltType {
        self.0
    }
}

impl<'de> Deserialize<'de> for PropertyValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // The driver only exposes the value kind to this exact enum name.
        deserializer
            .deserialize_enum(std::any::type_name::<BoltType>(), &[], ValueVisitor)
            .map(PropertyValue)
    }
}

/// All columns of one result row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Columns(pub BTreeMap<String, BoltType>);

impl<'de> Deserialize<'de> for Columns {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ColumnsVisitor;

        impl<'de> Visitor<'de> for ColumnsVisitor {
            type Value = Columns;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a result row")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Columns, A::Error> {
                let mut columns = BTreeMap::new();
                while let Some((name, value)) = map.next_entry::<String, PropertyValue>()? {
                    columns.insert(name, value.into_inner());
                }
                Ok(Columns(columns))
            }
        }

        deserializer.deserialize_map(ColumnsVisitor)
    }
}

/// Value kinds in the order the driver numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Null,
    String,
    Boolean,
    Map,
    Integer,
    Float,
    List,
    Node,
    Relation,
    UnboundedRelation,
    Point2D,
    Point3D,
    Bytes,
    Path,
    Duration,
    Date,
    Time,
    LocalTime,
    DateTime,
    LocalDateTime,
    DateTimeZoneId,
}

impl Kind {
    const ALL: [Kind; 21] = [
        Kind::Null,
        Kind::String,
        Kind::Boolean,
        Kind::Map,
        Kind::Integer,
        Kind::Float,
        Kind::List,
        Kind::Node,
        Kind::Relation,
        Kind::UnboundedRelation,
        Kind::Point2D,
        Kind::Point3D,
        Kind::Bytes,
        Kind::Path,
        Kind::Duration,
        Kind::Date,
        Kind::Time,
        Kind::LocalTime,
        Kind::DateTime,
        Kind::LocalDateTime,
        Kind::DateTimeZoneId,
    ];
}

impl<'de> Deserialize<'de> for Kind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct KindVisitor;

        impl<'de> Visitor<'de> for KindVisitor {
            type Value = Kind;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a Bolt value kind")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Kind, E> {
                usize::try_from(v)
                    .ok()
                    .and_then(|i| Kind::ALL.get(i).copied())
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }
        }

        deserializer.deserialize_any(KindVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = BoltType;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a Bolt property value")
    }

    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> Result<BoltType, A::Error> {
        let (kind, variant): (Kind, _) = data.variant()?;
        match kind {
            Kind::Point2D => variant.tuple_variant(3, PointVisitor { with_z: false }),
            Kind::Point3D => variant.tuple_variant(4, PointVisitor { with_z: true }),
            Kind::Duration
            | Kind::Date
            | Kind::Time
            | Kind::LocalTime
            | Kind::DateTime
            | Kind::LocalDateTime
            | Kind::DateTimeZoneId => {
                let parts = variant.tuple_variant(1, PartsVisitor)?;
                temporal(kind, &parts).map_err(de::Error::custom)
            }
            Kind::Node | Kind::Relation | Kind::UnboundedRelation | Kind::Path => {
                Err(de::Error::custom(format!("{kind:?} is not a property value")))
            }
            _ => variant.tuple_variant(1, ValueVisitor),
        }
    }

    fn visit_unit<E: de::Error>(self) -> Result<BoltType, E> {
        Ok(BoltType::Null(BoltNull))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<BoltType, E> {
        Ok(BoltType::Boolean(BoltBoolean::new(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<BoltType, E> {
        Ok(BoltType::Integer(BoltInteger::new(v)))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<BoltType, E> {
        i64::try_from(v)
            .map(|v| BoltType::Integer(BoltInteger::new(v)))
            .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<BoltType, E> {
        Ok(BoltType::Float(BoltFloat::new(v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<BoltType, E> {
        Ok(BoltType::String(BoltString::new(v)))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<BoltType, E> {
        Ok(BoltType::from(v.to_vec()))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<BoltType, A::Error> {
        let mut list = BoltList::with_capacity(seq.size_hint().unwrap_or_default());
        while let Some(item) = seq.next_element::<PropertyValue>()? {
            list.push(item.into_inner());
        }
        Ok(BoltType::List(list))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<BoltType, A::Error> {
        let mut bolt = BoltMap::with_capacity(map.size_hint().unwrap_or_default());
        while let Some((key, value)) = map.next_entry::<String, PropertyValue>()? {
            bolt.put(BoltString::from(key), value.into_inner());
        }
        Ok(BoltType::Map(bolt))
    }
}

/// Reads `srid, x, y[, z]`.
struct PointVisitor {
    with_z: bool,
}

impl<'de> Visitor<'de> for PointVisitor {
    type Value = BoltType;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a spatial point")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<BoltType, A::Error> {
        let sr_id: i64 = next(&mut seq, 0, &self)?;
        let x: f64 = next(&mut seq, 1, &self)?;
        let y: f64 = next(&mut seq, 2, &self)?;
        if self.with_z {
            let z: f64 = next(&mut seq, 3, &self)?;
            Ok(BoltType::Point3D(BoltPoint3D {
                sr_id: BoltInteger::new(sr_id),
                x: BoltFloat::new(x),
                y: BoltFloat::new(y),
                z: BoltFloat::new(z),
            }))
        } else {
            Ok(BoltType::Point2D(BoltPoint2D {
                sr_id: BoltInteger::new(sr_id),
                x: BoltFloat::new(x),
                y: BoltFloat::new(y),
            }))
        }
    }
}

fn next<'de, A, T>(seq: &mut A, index: usize, expected: &dyn de::Expected) -> Result<T, A::Error>
where
    A: SeqAccess<'de>,
    T: Deserialize<'de>,
{
    seq.next_element()?
        .ok_or_else(|| de::Error::invalid_length(index, expected))
}

/// One component of a temporal value.
#[derive(Debug, Clone, PartialEq)]
enum Part {
    Int(i64),
    Text(String),
}

impl<'de> Deserialize<'de> for Part {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PartVisitor;

        impl<'de> Visitor<'de> for PartVisitor {
            type Value = Part;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("an integer or a time zone id")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Part, E> {
                Ok(Part::Int(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Part, E> {
                i64::try_from(v)
                    .map(Part::Int)
                    .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Part, E> {
                Ok(Part::Text(v.to_string()))
            }
        }

        deserializer.deserialize_any(PartVisitor)
    }
}

/// Collects temporal components in the order the driver yields them.
struct PartsVisitor;

impl<'de> Visitor<'de> for PartsVisitor {
    type Value = Vec<Part>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("temporal components")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<Part>, A::Error> {
        let mut parts = Vec::new();
        while let Some(part) = seq.next_element()? {
            parts.push(part);
        }
        Ok(parts)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Vec<Part>, A::Error> {
        let mut parts = Vec::new();
        while let Some((_, part)) = map.next_entry::<IgnoredAny, Part>()? {
            parts.push(part);
        }
        Ok(parts)
    }
}

/// Rebuild a temporal value from its components.
///
/// Component order per kind: duration `seconds, nanoseconds`; date `days`;
/// time `nanoseconds, offset`; local time `nanoseconds`; date time
/// `local seconds, nanoseconds, offset`; local date time `seconds,
/// nanoseconds`; zoned date time `seconds, nanoseconds, zone id`.
fn temporal(kind: Kind, parts: &[Part]) -> Result<BoltType, String> {
    let int = |index: usize| match parts.get(index) {
        Some(Part::Int(value)) => Ok(*value),
        other => Err(format!("{kind:?} component {index} is not an integer: {other:?}")),
    };

    match kind {
        Kind::Duration => Ok(BoltType::Duration(BoltDuration::new(
            BoltInteger::new(0),
            BoltInteger::new(0),
            BoltInteger::new(int(0)?),
            BoltInteger::new(int(1)?),
        ))),
        Kind::Date => Ok(BoltType::Date(BoltDate::from(date_from_days(int(0)?)?))),
        Kind::Time => Ok(BoltType::Time(BoltTime::from((
            time_from_nanos(int(0)?)?,
            offset(int(1)?)?,
        )))),
        Kind::LocalTime => Ok(BoltType::LocalTime(BoltLocalTime::from(time_from_nanos(int(0)?)?))),
        Kind::DateTime => {
            let offset_seconds = int(2)?;
            let utc = naive_from_timestamp(int(0)? - offset_seconds, int(1)?)?;
            let local = DateTime::<FixedOffset>::from_naive_utc_and_offset(utc, offset(offset_seconds)?);
            Ok(BoltType::DateTime(BoltDateTime::from(local)))
        }
        Kind::LocalDateTime => Ok(BoltType::LocalDateTime(BoltLocalDateTime::from(
            naive_from_timestamp(int(0)?, int(1)?)?,
        ))),
        Kind::DateTimeZoneId => {
            let naive = naive_from_timestamp(int(0)?, int(1)?)?;
            match parts.get(2) {
                Some(Part::Text(zone)) => Ok(BoltType::DateTimeZoneId(BoltDateTimeZoneId::from((
                    naive,
                    zone.as_str(),
                )))),
                other => Err(format!("zoned date time has no zone id: {other:?}")),
            }
        }
        other => Err(format!("{other:?} is not a temporal kind")),
    }
}

fn date_from_days(days: i64) -> Result<NaiveDate, String> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).ok_or("epoch is out of range")?;
    let delta = Days::new(days.unsigned_abs());
    let date = if days >= 0 {
        epoch.checked_add_days(delta)
    } else {
        epoch.checked_sub_days(delta)
    };
    date.ok_or_else(|| format!("{days} days from epoch is out of range"))
}

fn time_from_nanos(nanos: i64) -> Result<NaiveTime, String> {
    let seconds = u32::try_from(nanos / 1_000_000_000).map_err(|_| format!("invalid time of day {nanos}ns"))?;
    let fraction = u32::try_from(nanos % 1_000_000_000).map_err(|_| format!("invalid time of day {nanos}ns"))?;
    NaiveTime::from_num_seconds_from_midnight_opt(seconds, fraction)
        .ok_or_else(|| format!("invalid time of day {nanos}ns"))
}

fn offset(seconds: i64) -> Result<FixedOffset, String> {
    i32::try_from(seconds)
        .ok()
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| format!("invalid UTC offset {seconds}s"))
}

fn naive_from_timestamp(seconds: i64, nanos: i64) -> Result<NaiveDateTime, String> {
    let fraction = u32::try_from(nanos).map_err(|_| format!("invalid nanoseconds {nanos}"))?;
    DateTime::from_timestamp(seconds, fraction)
        .map(|utc| utc.naive_utc())
        .ok_or_else(|| format!("timestamp {seconds}.{nanos} is out of range"))
}
