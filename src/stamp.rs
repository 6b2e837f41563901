//! Stamp authority: unique, totally ordered timestamps for texts and changes.
//!
//! A [`Stamp`] is a wall-clock second plus an index that disambiguates
//! stamps issued within the same second. The [`StampAuthority`] hands them
//! out and keeps a watermark so that every issued stamp is strictly after
//! any stamp it previously issued or read back from text.

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::{Mutex, OnceLock};
use tracing::warn;

use crate::error::StampError;

/// A point in the version history.
///
/// Orders by `seconds`, then by `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Stamp {
    seconds: i64,
    index: u32,
}

impl Stamp {
    /// Seconds outside chrono's representable range format as the earliest
    /// representable instant, which [`StampAuthority::parse`] refuses.
    pub const fn new(seconds: i64, index: u32) -> Self {
        Self { seconds, index }
    }

    /// Seconds since the Unix epoch.
    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    /// Disambiguator for stamps sharing the same second.
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let when = DateTime::<Utc>::from_timestamp(self.seconds, 0).unwrap_or(DateTime::<Utc>::MIN_UTC);
        write!(f, "{}", when.format("%Y-%m-%dT%H:%M:%SZ"))?;
        if self.index > 0 {
            write!(f, ".{}", self.index)?;
        }
        Ok(())
    }
}

impl Serialize for Stamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

static STAMP_REGEX: OnceLock<Regex> = OnceLock::new();

fn stamp_regex() -> &'static Regex {
    STAMP_REGEX.get_or_init(|| {
        Regex::new(r"^(\d{4})-(\d{2})-(\d{2})T(\d{2}):(\d{2}):(\d{2})Z(?:\.(\d+))?(?:\s.*)?$")
            .unwrap()
    })
}

type Clock = Box<dyn Fn() -> i64 + Send + Sync>;

/// Issues stamps and parses them back.
///
/// Shared by reference between everything that creates history. Callers
/// already serialise writers per project, the mutex only keeps the
/// watermark consistent.
pub struct StampAuthority {
    clock: Clock,
    last: Mutex<Stamp>,
}

impl StampAuthority {
    /// Authority driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(|| Utc::now().timestamp())
    }

    /// Authority driven by a custom seconds source.
    pub fn with_clock<F>(clock: F) -> Self
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        Self {
            clock: Box::new(clock),
            last: Mutex::new(Stamp::new(0, 0)),
        }
    }

    /// Issue a new stamp, strictly after every stamp issued or observed so far.
    pub fn now(&self) -> Stamp {
        let wall = (self.clock)();
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let next = if wall > last.seconds {
            Stamp::new(wall, 0)
        } else {
            match last.index.checked_add(1) {
                Some(index) => Stamp::new(last.seconds, index),
                None => Stamp::new(last.seconds.saturating_add(1), 0),
            }
        };
        *last = next;
        next
    }

    /// Fold an externally obtained stamp into the watermark.
    pub fn observe(&self, stamp: Stamp) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if stamp > *last {
            *last = stamp;
        }
    }

    /// Newest stamp issued or observed so far.
    pub fn watermark(&self) -> Stamp {
        *self.last.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Render a stamp in its textual form.
    pub fn format(&self, stamp: Stamp) -> String {
        stamp.to_string()
    }

    /// Read a stamp back from its textual form.
    ///
    /// Anything after the first whitespace following the stamp is treated
    /// as annotation and ignored. Stamps later than this authority's clock
    /// are refused.
    pub fn parse(&self, text: &str) -> Result<Stamp, StampError> {
        let result = self.parse_inner(text.trim());
        match &result {
            Ok(stamp) => self.observe(*stamp),
            Err(e) => warn!("Unreadable stamp: {}", e),
        }
        result
    }

    fn parse_inner(&self, text: &str) -> Result<Stamp, StampError> {
        let pattern = || StampError::Pattern {
            raw: text.to_string(),
        };
        let calendar = || StampError::Calendar {
            raw: text.to_string(),
        };

        let caps = stamp_regex().captures(text).ok_or_else(pattern)?;
        let field = |i: usize| -> Result<u32, StampError> {
            caps[i].parse::<u32>().map_err(|_| pattern())
        };

        let year = i32::try_from(field(1)?).map_err(|_| pattern())?;
        let datetime = NaiveDate::from_ymd_opt(year, field(2)?, field(3)?)
            .and_then(|date| date.and_hms_opt(field(4).ok()?, field(5).ok()?, field(6).ok()?))
            .ok_or_else(calendar)?;

        let index = match caps.get(7) {
            Some(m) => m.as_str().parse::<u32>().map_err(|_| pattern())?,
            None => 0,
        };

        let seconds = datetime.and_utc().timestamp();
        if seconds > (self.clock)() {
            return Err(StampError::Future {
                raw: text.to_string(),
            });
        }

        Ok(Stamp::new(seconds, index))
    }
}

impl Default for StampAuthority {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StampAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StampAuthority")
            .field("last", &self.watermark())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    // 2024-01-15T10:30:00Z
    const T0: i64 = 1_705_314_600;

    fn fixed(seconds: i64) -> StampAuthority {
        StampAuthority::with_clock(move || seconds)
    }

    // ==================== Issuing Tests ====================

    #[test]
    fn test_now_same_second_increments_index() {
        let authority = fixed(T0);
        assert_eq!(authority.now(), Stamp::new(T0, 0));
        assert_eq!(authority.now(), Stamp::new(T0, 1));
        assert_eq!(authority.now(), Stamp::new(T0, 2));
    }

    #[test]
    fn test_now_survives_clock_going_backwards() {
        let wall = Arc::new(AtomicI64::new(T0));
        let source = Arc::clone(&wall);
        let authority = StampAuthority::with_clock(move || source.load(Ordering::SeqCst));

        let first = authority.now();
        wall.store(T0 - 100, Ordering::SeqCst);
        let second = authority.now();

        assert!(second > first);
        assert_eq!(second, Stamp::new(T0, 1));
    }

    #[test]
    fn test_now_resets_index_when_second_advances() {
        let wall = Arc::new(AtomicI64::new(T0));
        let source = Arc::clone(&wall);
        let authority = StampAuthority::with_clock(move || source.load(Ordering::SeqCst));

        authority.now();
        authority.now();
        wall.store(T0 + 1, Ordering::SeqCst);
        assert_eq!(authority.now(), Stamp::new(T0 + 1, 0));
    }

    // ==================== Format Tests ====================

    #[test]
    fn test_format_without_index() {
        assert_eq!(Stamp::new(T0, 0).to_string(), "2024-01-15T10:30:00Z");
    }

    #[test]
    fn test_format_with_index() {
        assert_eq!(Stamp::new(T0, 3).to_string(), "2024-01-15T10:30:00Z.3");
    }

    #[test]
    fn test_serialize_as_text() {
        let json = serde_json::to_string(&Stamp::new(T0, 2)).unwrap();
        assert_eq!(json, "\"2024-01-15T10:30:00Z.2\"");
    }

    // ==================== Parse Tests ====================

    #[test]
    fn test_parse_plain() {
        let authority = fixed(T0 + 10);
        assert_eq!(authority.parse("2024-01-15T10:30:00Z"), Ok(Stamp::new(T0, 0)));
    }

    #[test]
    fn test_parse_with_index_and_annotation() {
        let authority = fixed(T0 + 10);
        assert_eq!(
            authority.parse("2024-01-15T10:30:00Z.7 imported by hand"),
            Ok(Stamp::new(T0, 7))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let authority = fixed(T0);
        assert!(matches!(
            authority.parse("yesterday"),
            Err(StampError::Pattern { .. })
        ));
        assert!(matches!(
            authority.parse("2024-01-15 10:30:00"),
            Err(StampError::Pattern { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_invalid_calendar() {
        let authority = fixed(T0);
        assert!(matches!(
            authority.parse("2023-02-30T10:30:00Z"),
            Err(StampError::Calendar { .. })
        ));
        assert!(matches!(
            authority.parse("2023-01-01T25:00:00Z"),
            Err(StampError::Calendar { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_future() {
        let authority = fixed(T0);
        assert!(matches!(
            authority.parse("2024-01-15T10:30:01Z"),
            Err(StampError::Future { .. })
        ));
    }

    #[test]
    fn test_parse_advances_watermark() {
        let authority = fixed(T0 - 50);
        let clock_ahead = fixed(T0 + 50);
        // A stamp read from history written by a faster clock.
        let read = clock_ahead.parse("2024-01-15T10:30:00Z.4").unwrap();
        authority.observe(read);

        let issued = authority.now();
        assert!(issued > read);
        assert_eq!(issued, Stamp::new(T0, 5));
    }

    #[test]
    fn test_now_after_exhausted_index_moves_to_next_second() {
        let authority = fixed(T0);
        let read = authority.parse(&authority.format(Stamp::new(T0, u32::MAX))).unwrap();

        let issued = authority.now();
        assert!(issued > read);
        assert_eq!(issued, Stamp::new(T0 + 1, 0));
    }

    #[test]
    fn test_out_of_range_stamp_does_not_parse_back() {
        let authority = fixed(T0);
        let text = authority.format(Stamp::new(i64::MAX, 0));
        assert!(authority.parse(&text).is_err());
    }

    #[test]
    fn test_parse_failure_leaves_watermark() {
        let authority = fixed(T0);
        let before = authority.watermark();
        let _ = authority.parse("not a stamp");
        assert_eq!(authority.watermark(), before);
    }

    // ==================== Property Tests ====================

    proptest! {
        #[test]
        fn prop_now_strictly_increasing(walls in prop::collection::vec(T0 - 5..T0 + 5, 1..40)) {
            let wall = Arc::new(AtomicI64::new(walls[0]));
            let source = Arc::clone(&wall);
            let authority = StampAuthority::with_clock(move || source.load(Ordering::SeqCst));

            let mut previous = None;
            for w in walls {
                wall.store(w, Ordering::SeqCst);
                let stamp = authority.now();
                if let Some(prev) = previous {
                    prop_assert!(stamp > prev);
                }
                previous = Some(stamp);
            }
        }

        #[test]
        fn prop_parse_inverts_format(seconds in 0i64..4_000_000_000, index in 0u32..10_000) {
            let authority = fixed(4_000_000_000);
            let stamp = Stamp::new(seconds, index);
            prop_assert_eq!(authority.parse(&authority.format(stamp)), Ok(stamp));
        }
    }
}
