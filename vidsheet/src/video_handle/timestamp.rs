extern crate ffmpeg_next as ffmpeg;

use std::fmt;
use std::time::Duration;

use ffmpeg::{Rational, Rescale};

/// A presentation timestamp in some stream's timebase, relative to the first timestamp of
/// that stream.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Timestamp {
    timebase_numerator: i32,
    timebase_denominator: i32,
    timestamp: i64,
    first_timestamp: i64,
}

impl Timestamp {
    pub(super) fn new(ts: i64, timebase: Rational, first_timestamp: i64) -> Self {
        Self {
            timestamp: ts,
            first_timestamp,
            timebase_numerator: timebase.numerator(),
            timebase_denominator: timebase.denominator(),
        }
    }

    /// Millisecond precision, anything finer is truncated.
    pub fn from_duration(dur: Duration) -> Self {
        Self::new(
            dur.as_millis().try_into().unwrap_or(i64::MAX),
            Rational::new(1, 1000),
            0,
        )
    }

    fn timebase(&self) -> Rational {
        Rational::new(self.timebase_numerator, self.timebase_denominator)
    }

    /// The offset from the first timestamp, expressed in `timebase`.
    pub(super) fn offset_in(&self, timebase: Rational) -> i64 {
        (self.timestamp - self.first_timestamp).rescale(self.timebase(), timebase)
    }

    /// Negative offsets become zero.
    pub fn to_duration(&self) -> Duration {
        let millis = self.offset_in(Rational::new(1, 1000));
        Duration::from_millis(millis.try_into().unwrap_or(0))
    }
}

impl fmt::Display for Timestamp {
    /// `HH:MM:SS.mmm`, negative offsets get a leading minus.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.offset_in(Rational::new(1, 1000));
        let negative = if millis < 0 { "-" } else { "" };
        let millis = millis.unsigned_abs();

        let subsec = millis % 1000;
        let total = millis / 1000;
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;

        write!(
            f,
            "{}{:02}:{:02}:{:02}.{:03}",
            negative, hours, minutes, seconds, subsec
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn timestamp_to_string() {
        let ts = Timestamp::new(50, Rational::new(1, 1000), 0);
        assert_eq!("00:00:00.050", ts.to_string());

        let ts = Timestamp::new(1005, Rational::new(1, 1000), 0);
        assert_eq!("00:00:01.005", ts.to_string());

        let ts = Timestamp::from_duration(Duration::from_millis(3_723_042));
        assert_eq!("01:02:03.042", ts.to_string());
    }

    #[test]
    fn relative_to_first() {
        let ts = Timestamp::new(600, Rational::new(1, 25), 100);
        assert_eq!(Duration::from_secs(20), ts.to_duration());

        let ts = Timestamp::new(0, Rational::new(1, 25), 25);
        assert_eq!("-00:00:01.000", ts.to_string());
        assert_eq!(Duration::ZERO, ts.to_duration());
    }

    #[test]
    fn rescales_between_timebases() {
        let ts = Timestamp::from_duration(Duration::from_millis(2500));
        assert_eq!(2500 * 90, ts.offset_in(Rational::new(1, 90_000)));
        let ts = Timestamp::from_duration(Duration::from_millis(2520));
        assert_eq!(63, ts.offset_in(Rational::new(1, 25)));
    }
}
