use crate::core::{BookingError, BookingResult};

/// Immutable half-open time range `[start, end)` in Unix milliseconds
///
/// `end > start` is enforced at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    start: i64,
    end: i64,
}

impl TimeRange {
    pub fn new(start: i64, end: i64) -> BookingResult<Self> {
        if end <= start {
            return Err(BookingError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Caller guarantees `end > start`
    pub(crate) fn from_bounds(start: i64, end: i64) -> Self {
        debug_assert!(end > start, "empty range {start}..{end}");
        Self { start, end }
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn duration_millis(&self) -> i64 {
        self.end - self.start
    }

    /// `self.start < other.end && other.start < self.end`
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `other` lies entirely within this range
    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn contains_instant(&self, at: i64) -> bool {
        self.start <= at && at < self.end
    }

    /// Overlapping part of two ranges, if any
    pub fn intersect(&self, other: &TimeRange) -> Option<TimeRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (end > start).then_some(Self { start, end })
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Free-function form of [`TimeRange::overlaps`]
pub fn ranges_overlap(a: &TimeRange, b: &TimeRange) -> bool {
    a.overlaps(b)
}
