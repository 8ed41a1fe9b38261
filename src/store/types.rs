use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The identifier of one query or expression within a request. Case-sensitive.
pub type RefId = String;

/// Label set attached to a `Number` or `Series`. Ordered so that rendering and
/// equality are stable.
pub type Labels = BTreeMap<String, String>;

/// Position of a node in the request, used as its arena index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

/// Absolute time range of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// One sample of a series. `None` is a null sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub time: DateTime<Utc>,
    pub value: Option<f64>,
}

impl Point {
    pub fn new(time: DateTime<Utc>, value: Option<f64>) -> Self {
        Self { time, value }
    }

    /// A sample that carries a usable number (present and not NaN).
    #[inline]
    pub fn valid(&self) -> Option<f64> {
        self.value.filter(|v| !v.is_nan())
    }
}
