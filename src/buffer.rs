//! In-memory buffer of data points waiting to be sent.
//!
//! Sending never clears the buffer: repeated sends resend the same points
//! until the caller calls [`DataBuffer::clear`].

use std::fmt;

use crate::message::{DataPoint, ItemValue};

/// Ordered list of buffered data points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataBuffer {
    points: Vec<DataPoint>,
}

impl DataBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a data point built from its parts.
    pub fn add(
        &mut self,
        host: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<ItemValue>,
        clock: Option<i64>,
    ) {
        let mut point = DataPoint::new(host, key, value);
        point.clock = clock;
        self.points.push(point);
    }

    /// Append an already-built data point.
    pub fn push(&mut self, point: DataPoint) {
        self.points.push(point);
    }

    /// Remove every buffered point.
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Independent copy of the buffered points.
    pub fn snapshot(&self) -> Vec<DataPoint> {
        self.points.clone()
    }

    /// Remove the first point structurally equal to `point`.
    ///
    /// Returns `true` if a point was found and removed.
    pub fn remove(&mut self, point: &DataPoint) -> bool {
        match self.points.iter().position(|p| p == point) {
            Some(index) => {
                self.points.remove(index);
                true
            }
            None => false,
        }
    }

    /// Borrow the buffered points in insertion order.
    #[inline]
    pub fn as_slice(&self) -> &[DataPoint] {
        &self.points
    }

    /// Iterate over the buffered points.
    pub fn iter(&self) -> std::slice::Iter<'_, DataPoint> {
        self.points.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl Extend<DataPoint> for DataBuffer {
    fn extend<I: IntoIterator<Item = DataPoint>>(&mut self, iter: I) {
        self.points.extend(iter);
    }
}

impl FromIterator<DataPoint> for DataBuffer {
    fn from_iter<I: IntoIterator<Item = DataPoint>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a DataBuffer {
    type Item = &'a DataPoint;
    type IntoIter = std::slice::Iter<'a, DataPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// One point per line followed by the count.
impl fmt::Display for DataBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for point in &self.points {
            writeln!(f, "{}", point)?;
        }
        write!(f, "Count: {}", self.points.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_len() {
        let mut buffer = DataBuffer::new();
        assert!(buffer.is_empty());

        buffer.add("h", "k", 1, None);
        buffer.add("h", "k", "2", Some(1_366_033_479));

        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.as_slice()[1].clock, Some(1_366_033_479));
    }

    #[test]
    fn test_snapshot_does_not_alias() {
        let mut buffer = DataBuffer::new();
        buffer.add("h", "k", 1, None);

        let mut copy = buffer.snapshot();
        copy[0].value = ItemValue::from(99);
        copy.push(DataPoint::new("x", "y", 0));

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.as_slice()[0].value, ItemValue::Int(1));
    }

    #[test]
    fn test_remove_first_match_only() {
        let mut buffer = DataBuffer::new();
        buffer.add("h", "k", 1, None);
        buffer.add("h", "other", 2, None);
        buffer.add("h", "k", 1, None);

        assert!(buffer.remove(&DataPoint::new("h", "k", 1)));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.as_slice()[0].key, "other");

        assert!(!buffer.remove(&DataPoint::new("h", "missing", 1)));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_clear() {
        let mut buffer: DataBuffer = (0..3).map(|i| DataPoint::new("h", "k", i)).collect();
        assert_eq!(buffer.len(), 3);
        buffer.clear();
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_display_lists_points_and_count() {
        let mut buffer = DataBuffer::new();
        buffer.add("test_host", "test_trap", "12", None);
        buffer.add("test_host", "test_trap", 13, Some(1_365_787_627));

        assert_eq!(
            buffer.to_string(),
            "test_host:test_trap = \"12\"\ntest_host:test_trap = 13 @1365787627\nCount: 2"
        );
    }
}
