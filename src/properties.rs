//! Property bags: sparse, typed metadata a log file exposes to its consumers
//! (progress, size, timestamps) so that they never have to poll raw state.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// Well-known properties of a log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Name,
    LogEntryCount,
    Size,
    Encoding,
    Format,
    PercentageProcessed,
    StartTimestamp,
    EndTimestamp,
    Duration,
    LastModified,
    Created,
}

impl Property {
    pub const ALL: [Property; 11] = [
        Property::Name,
        Property::LogEntryCount,
        Property::Size,
        Property::Encoding,
        Property::Format,
        Property::PercentageProcessed,
        Property::StartTimestamp,
        Property::EndTimestamp,
        Property::Duration,
        Property::LastModified,
        Property::Created,
    ];

    /// Stable identifier, for hosts that key settings or UI state by name.
    pub const fn id(self) -> &'static str {
        match self {
            Property::Name => "name",
            Property::LogEntryCount => "log_entry_count",
            Property::Size => "size",
            Property::Encoding => "encoding",
            Property::Format => "format",
            Property::PercentageProcessed => "percentage_processed",
            Property::StartTimestamp => "start_timestamp",
            Property::EndTimestamp => "end_timestamp",
            Property::Duration => "duration",
            Property::LastModified => "last_modified",
            Property::Created => "created",
        }
    }
}

/// A fraction in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default)]
pub struct Percentage(f32);

impl Percentage {
    pub const ZERO: Self = Self(0.0);
    pub const HUNDRED: Self = Self(1.0);

    pub fn from_ratio(ratio: f32) -> Self {
        if ratio.is_nan() {
            return Self::ZERO;
        }
        Self(ratio.clamp(0.0, 1.0))
    }

    /// `part / total`, with an empty total counting as fully processed.
    pub fn of(part: u64, total: u64) -> Self {
        if total == 0 {
            return Self::HUNDRED;
        }
        Self::from_ratio(part as f32 / total as f32)
    }

    pub fn ratio(self) -> f32 {
        self.0
    }

    pub fn is_complete(self) -> bool {
        self.0 >= 1.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.0}%", self.0 * 100.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Count(usize),
    Bytes(u64),
    Percentage(Percentage),
    Timestamp(NaiveDateTime),
    Duration(Duration),
    Time(DateTime<Utc>),
}

/// Sparse mapping from property to value. Absent means "not known yet".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    values: HashMap<Property, PropertyValue>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, property: Property) -> Option<&PropertyValue> {
        self.values.get(&property)
    }

    pub fn set(&mut self, property: Property, value: PropertyValue) {
        self.values.insert(property, value);
    }

    pub fn remove(&mut self, property: Property) {
        self.values.remove(&property);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn count(&self) -> Option<usize> {
        match self.get(Property::LogEntryCount) {
            Some(PropertyValue::Count(count)) => Some(*count),
            _ => None,
        }
    }

    pub fn percentage_processed(&self) -> Percentage {
        match self.get(Property::PercentageProcessed) {
            Some(PropertyValue::Percentage(p)) => *p,
            _ => Percentage::ZERO,
        }
    }

    pub fn size(&self) -> Option<u64> {
        match self.get(Property::Size) {
            Some(PropertyValue::Bytes(bytes)) => Some(*bytes),
            _ => None,
        }
    }

    pub fn text(&self, property: Property) -> Option<&str> {
        match self.get(property) {
            Some(PropertyValue::Text(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn timestamp(&self, property: Property) -> Option<NaiveDateTime> {
        match self.get(property) {
            Some(PropertyValue::Timestamp(ts)) => Some(*ts),
            _ => None,
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        match self.get(Property::Duration) {
            Some(PropertyValue::Duration(d)) => Some(*d),
            _ => None,
        }
    }
}

/// Display names of the properties meant to be shown to users.
///
/// Built once by the host and handed to whatever presents properties;
/// properties without a display name are internal.
#[derive(Debug, Clone)]
pub struct PropertyDisplayNames {
    names: HashMap<Property, &'static str>,
}

impl PropertyDisplayNames {
    pub fn new() -> Self {
        let names = HashMap::from([
            (Property::LogEntryCount, "Count"),
            (Property::Name, "Name"),
            (Property::StartTimestamp, "First Timestamp"),
            (Property::EndTimestamp, "Last Timestamp"),
            (Property::Duration, "Duration"),
            (Property::LastModified, "Last Modified"),
            (Property::Created, "Created"),
            (Property::Size, "Size"),
            (Property::PercentageProcessed, "Processed"),
            (Property::Format, "Format"),
            (Property::Encoding, "Encoding"),
        ]);
        Self { names }
    }

    pub fn display_name(&self, property: Property) -> Option<&'static str> {
        self.names.get(&property).copied()
    }

    /// Displayable properties present in `bag`, in [`Property::ALL`] order.
    pub fn visible<'a>(
        &'a self,
        bag: &'a PropertyBag,
    ) -> impl Iterator<Item = (&'static str, &'a PropertyValue)> + 'a {
        Property::ALL
            .into_iter()
            .filter_map(move |p| Some((self.display_name(p)?, bag.get(p)?)))
    }
}

impl Default for PropertyDisplayNames {
    fn default() -> Self {
        Self::new()
    }
}
