//! The wall clock a radio station is scheduled against.
//!
//! A station plays its playlist back to back, starting over at local midnight
//! and wrapping whenever the playlist runs out. What is on air at any instant
//! is a pure function of the track lengths and the time of day.

use chrono::{DateTime, Local, Timelike as _};

/// What is on air at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSession {
    /// Position of the on-air track in the playlist.
    pub index: usize,
    /// Milliseconds left in the on-air track.
    pub remaining: u64,
    /// Milliseconds since the playlist last started over.
    pub elapsed: u64,
}
impl TimeSession {
    /// Milliseconds into the on-air track, given its length.
    pub fn offset(&self, duration: u64) -> u64 {
        duration.saturating_sub(self.remaining)
    }
}

/// Finds the on-air track for `elapsed_ms` since midnight.
///
/// The first track whose cumulative end time passes the elapsed time is on
/// air, so an instant on a boundary starts the next track from its beginning.
/// Returns `None` for an empty or zero-length playlist.
pub fn time_session(durations: &[u64], elapsed_ms: u64) -> Option<TimeSession> {
    let total: u64 = durations.iter().sum();
    if total == 0 {
        return None;
    }

    let elapsed = elapsed_ms % total;
    let mut accumulated = 0;
    for (index, &duration) in durations.iter().enumerate() {
        if duration == 0 {
            continue;
        }
        accumulated += duration;
        if accumulated > elapsed {
            return Some(TimeSession {
                index,
                remaining: accumulated - elapsed,
                elapsed,
            });
        }
    }
    None
}

/// Milliseconds since local midnight.
pub fn elapsed_since_midnight(now: DateTime<Local>) -> u64 {
    // Leap seconds are reported as nanoseconds past 1e9.
    let millis = (now.nanosecond() % 1_000_000_000) / 1_000_000;
    now.num_seconds_from_midnight() as u64 * 1000 + millis as u64
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    const A: u64 = 180_000;
    const B: u64 = 120_000;

    #[test]
    fn test_second_track_is_on_air() {
        let session = time_session(&[A, B], 200_000).unwrap();
        assert_eq!(session.index, 1);
        assert_eq!(session.remaining, 100_000);
        assert_eq!(session.offset(B), 20_000);
    }

    #[test]
    fn test_elapsed_wraps_around_the_playlist() {
        for x in [0, 1, 90_000, 179_999, 180_000, 200_000, 299_999] {
            assert_eq!(time_session(&[A, B], x), time_session(&[A, B], A + B + x));
            assert_eq!(time_session(&[A, B], x), time_session(&[A, B], 7 * (A + B) + x));
        }
    }

    #[test]
    fn test_start_of_day_is_start_of_playlist() {
        let session = time_session(&[A, B], 0).unwrap();
        assert_eq!(session.index, 0);
        assert_eq!(session.remaining, A);
        assert_eq!(session.offset(A), 0);
    }

    #[test]
    fn test_boundary_starts_the_next_track() {
        let session = time_session(&[A, B], A).unwrap();
        assert_eq!(session.index, 1);
        assert_eq!(session.remaining, B);
        assert_eq!(session.offset(B), 0);

        let session = time_session(&[A, 0, B], A).unwrap();
        assert_eq!(session.index, 2);
        assert_eq!(session.offset(B), 0);
    }

    #[test]
    fn test_zero_length_tracks_are_skipped() {
        let session = time_session(&[0, A, 0, B], 200_000).unwrap();
        assert_eq!(session.index, 3);
        assert_eq!(session.remaining, 100_000);
    }

    #[test]
    fn test_empty_playlist_has_no_session() {
        assert_eq!(time_session(&[], 1234), None);
        assert_eq!(time_session(&[0, 0], 1234), None);
    }

    #[test]
    fn test_elapsed_since_midnight() {
        let now = Local.with_ymd_and_hms(2024, 5, 1, 1, 2, 3).unwrap();
        assert_eq!(elapsed_since_midnight(now), 3_723_000);
    }

    #[test]
    fn test_same_instant_same_session() {
        let now = Local.with_ymd_and_hms(2024, 5, 1, 13, 37, 0).unwrap();
        let elapsed = elapsed_since_midnight(now);
        assert_eq!(time_session(&[A, B, A], elapsed), time_session(&[A, B, A], elapsed));
    }
}
