use super::TimeRange;
use crate::core::{BookingError, BookingResult};
use chrono::{Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use shared::models::WorkingHours;
use shared::util::minutes_to_millis;

/// Lazy candidate-slot generator over one window
///
/// Yields consecutive `[t, t + duration)` ranges starting at the window
/// start and advancing by `step`. A candidate never extends past the
/// window end. Cloning restarts nothing: each clone continues from its own
/// position.
#[derive(Debug, Clone)]
pub struct SlotWindows {
    window: TimeRange,
    duration: i64,
    step: i64,
    next_start: Option<i64>,
}

impl SlotWindows {
    /// `granularity_minutes = None` steps by the duration itself (no overlap)
    pub fn new(
        window: TimeRange,
        duration_minutes: u32,
        granularity_minutes: Option<u32>,
    ) -> BookingResult<Self> {
        if duration_minutes == 0 {
            return Err(BookingError::validation("slot duration must be > 0"));
        }
        let step_minutes = granularity_minutes.unwrap_or(duration_minutes);
        if step_minutes == 0 {
            return Err(BookingError::validation("slot granularity must be > 0"));
        }
        Ok(Self {
            window,
            duration: minutes_to_millis(duration_minutes),
            step: minutes_to_millis(step_minutes),
            next_start: Some(window.start()),
        })
    }
}

impl Iterator for SlotWindows {
    type Item = TimeRange;

    fn next(&mut self) -> Option<TimeRange> {
        let start = self.next_start?;
        let end = start.checked_add(self.duration)?;
        if end > self.window.end() {
            self.next_start = None;
            return None;
        }
        self.next_start = start.checked_add(self.step);
        Some(TimeRange::from_bounds(start, end))
    }
}

/// Expand a weekly schedule into the UTC windows that overlap `day_range`
///
/// Windows are not clipped: slot generation stays anchored to the opening
/// time, and callers keep only the slots inside their range. Local dates are walked in the tenant's timezone. Ambiguous local times
/// (DST fall-back) resolve to the earliest instant; a window whose open or
/// close falls in a DST gap is skipped for that day. Overlapping or
/// adjacent windows are merged. Empty `hours` means open around the clock.
pub fn working_windows(day_range: TimeRange, hours: &[WorkingHours], tz: Tz) -> Vec<TimeRange> {
    if hours.is_empty() {
        return vec![day_range];
    }

    let (Some(first), Some(last)) = (
        local_date(day_range.start(), tz),
        local_date(day_range.end() - 1, tz),
    ) else {
        return Vec::new();
    };

    let mut windows = Vec::new();
    let mut date = first;
    while date <= last {
        for wh in hours
            .iter()
            .filter(|h| h.weekday == date.weekday() && h.open < h.close)
        {
            let (Some(open), Some(close)) =
                (localize(date, wh.open, tz), localize(date, wh.close, tz))
            else {
                tracing::debug!(%date, "Working hours fall in a DST gap, skipping");
                continue;
            };
            if close <= open {
                continue;
            }
            let window = TimeRange::from_bounds(open, close);
            if window.overlaps(&day_range) {
                windows.push(window);
            }
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    merge(windows)
}

fn local_date(millis: i64, tz: Tz) -> Option<NaiveDate> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.with_timezone(&tz).date_naive())
}

fn localize(date: NaiveDate, time: NaiveTime, tz: Tz) -> Option<i64> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.timestamp_millis())
}

fn merge(mut windows: Vec<TimeRange>) -> Vec<TimeRange> {
    windows.sort_by_key(|w| w.start());
    let mut merged: Vec<TimeRange> = Vec::with_capacity(windows.len());
    for window in windows {
        match merged.last_mut() {
            Some(last) if window.start() <= last.end() => {
                *last = TimeRange::from_bounds(last.start(), last.end().max(window.end()));
            }
            _ => merged.push(window),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
            .timestamp_millis()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_slots_step_by_duration_by_default() {
        let window = TimeRange::new(at(2026, 3, 2, 9, 0), at(2026, 3, 2, 10, 0)).unwrap();
        let slots: Vec<TimeRange> = SlotWindows::new(window, 30, None).unwrap().collect();
        assert_eq!(
            slots,
            vec![
                TimeRange::new(at(2026, 3, 2, 9, 0), at(2026, 3, 2, 9, 30)).unwrap(),
                TimeRange::new(at(2026, 3, 2, 9, 30), at(2026, 3, 2, 10, 0)).unwrap(),
            ]
        );
    }

    #[test]
    fn test_slots_with_finer_granularity_overlap() {
        let window = TimeRange::new(at(2026, 3, 2, 9, 0), at(2026, 3, 2, 10, 0)).unwrap();
        let starts: Vec<i64> = SlotWindows::new(window, 30, Some(15))
            .unwrap()
            .map(|r| r.start())
            .collect();
        assert_eq!(
            starts,
            vec![at(2026, 3, 2, 9, 0), at(2026, 3, 2, 9, 15), at(2026, 3, 2, 9, 30)]
        );
    }

    #[test]
    fn test_slot_never_exceeds_window() {
        let window = TimeRange::new(at(2026, 3, 2, 9, 0), at(2026, 3, 2, 9, 50)).unwrap();
        let slots: Vec<TimeRange> = SlotWindows::new(window, 30, None).unwrap().collect();
        assert_eq!(slots.len(), 1);
        assert!(slots.iter().all(|s| window.contains(s)));
    }

    #[test]
    fn test_rejects_zero_sizes() {
        let window = TimeRange::new(0, 1000).unwrap();
        assert!(SlotWindows::new(window, 0, None).is_err());
        assert!(SlotWindows::new(window, 30, Some(0)).is_err());
    }

    #[test]
    fn test_generator_is_restartable_via_clone() {
        let window = TimeRange::new(at(2026, 3, 2, 9, 0), at(2026, 3, 2, 12, 0)).unwrap();
        let slots = SlotWindows::new(window, 60, None).unwrap();
        let first: Vec<TimeRange> = slots.clone().collect();
        let second: Vec<TimeRange> = slots.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_working_windows_utc() {
        // 2026-03-02 is a Monday
        let day = TimeRange::new(at(2026, 3, 2, 0, 0), at(2026, 3, 3, 0, 0)).unwrap();
        let hours = vec![WorkingHours::new(Weekday::Mon, hm(9, 0), hm(10, 0))];
        let windows = working_windows(day, &hours, chrono_tz::UTC);
        assert_eq!(
            windows,
            vec![TimeRange::new(at(2026, 3, 2, 9, 0), at(2026, 3, 2, 10, 0)).unwrap()]
        );

        // Tuesday has no hours configured
        let tuesday = TimeRange::new(at(2026, 3, 3, 0, 0), at(2026, 3, 4, 0, 0)).unwrap();
        assert!(working_windows(tuesday, &hours, chrono_tz::UTC).is_empty());
    }

    #[test]
    fn test_working_windows_respect_tenant_timezone() {
        // Madrid is UTC+1 in early March
        let day = TimeRange::new(at(2026, 3, 1, 23, 0), at(2026, 3, 2, 23, 0)).unwrap();
        let hours = vec![WorkingHours::new(Weekday::Mon, hm(9, 0), hm(10, 0))];
        let windows = working_windows(day, &hours, chrono_tz::Europe::Madrid);
        assert_eq!(
            windows,
            vec![TimeRange::new(at(2026, 3, 2, 8, 0), at(2026, 3, 2, 9, 0)).unwrap()]
        );
    }

    #[test]
    fn test_working_windows_skip_dst_gap() {
        // 2026-03-29 (Sunday): Madrid clocks jump 02:00 -> 03:00
        let day = TimeRange::new(at(2026, 3, 28, 23, 0), at(2026, 3, 29, 22, 0)).unwrap();
        let hours = vec![
            WorkingHours::new(Weekday::Sun, hm(2, 30), hm(4, 0)),
            WorkingHours::new(Weekday::Sun, hm(10, 0), hm(11, 0)),
        ];
        let windows = working_windows(day, &hours, chrono_tz::Europe::Madrid);
        // 10:00 CEST = 08:00 UTC
        assert_eq!(
            windows,
            vec![TimeRange::new(at(2026, 3, 29, 8, 0), at(2026, 3, 29, 9, 0)).unwrap()]
        );
    }

    #[test]
    fn test_working_windows_merge_without_clipping() {
        let day = TimeRange::new(at(2026, 3, 2, 9, 30), at(2026, 3, 2, 18, 0)).unwrap();
        let hours = vec![
            WorkingHours::new(Weekday::Mon, hm(9, 0), hm(12, 0)),
            WorkingHours::new(Weekday::Mon, hm(11, 0), hm(13, 0)),
            WorkingHours::new(Weekday::Mon, hm(15, 0), hm(19, 0)),
        ];
        let windows = working_windows(day, &hours, chrono_tz::UTC);
        assert_eq!(
            windows,
            vec![
                TimeRange::new(at(2026, 3, 2, 9, 0), at(2026, 3, 2, 13, 0)).unwrap(),
                TimeRange::new(at(2026, 3, 2, 15, 0), at(2026, 3, 2, 19, 0)).unwrap(),
            ]
        );
    }

    #[test]
    fn test_empty_schedule_means_whole_range() {
        let day = TimeRange::new(at(2026, 3, 2, 0, 0), at(2026, 3, 3, 0, 0)).unwrap();
        assert_eq!(working_windows(day, &[], chrono_tz::UTC), vec![day]);
    }
}
