use serde::{Deserialize, Serialize};

/// Seconds in one day, used by the ticker window and retention math.
pub const SECONDS_IN_A_DAY: i64 = 86_400;

/// How long the base builder waits after a minute boundary before it
/// processes that minute, so late block commits still land in their bucket.
pub const BASE_SETTLE_DELAY_SECS: i64 = 5;

/// Settle delay for the mergers and the 15-minute ticker buffer epoch.
/// Longer than the base delay so merged windows only ever see base candles
/// that have already been persisted.
pub const MERGE_SETTLE_DELAY_SECS: i64 = 35;

/// The twelve supported candle resolutions. Each variant carries its bucket
/// duration as data; there is no per-resolution table or type family.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resolution {
    #[serde(rename = "1min")]
    OneMinute,
    #[serde(rename = "3min")]
    ThreeMinutes,
    #[serde(rename = "5min")]
    FiveMinutes,
    #[serde(rename = "15min")]
    FifteenMinutes,
    #[serde(rename = "30min")]
    ThirtyMinutes,
    #[serde(rename = "1hr")]
    OneHour,
    #[serde(rename = "2hr")]
    TwoHours,
    #[serde(rename = "4hr")]
    FourHours,
    #[serde(rename = "6hr")]
    SixHours,
    #[serde(rename = "12hr")]
    TwelveHours,
    #[serde(rename = "1day")]
    OneDay,
    #[serde(rename = "1week")]
    OneWeek,
}

impl Resolution {
    /// Bucket duration in seconds.
    pub const fn seconds(self) -> i64 {
        match self {
            Resolution::OneMinute => 60,
            Resolution::ThreeMinutes => 180,
            Resolution::FiveMinutes => 300,
            Resolution::FifteenMinutes => 900,
            Resolution::ThirtyMinutes => 1800,
            Resolution::OneHour => 3600,
            Resolution::TwoHours => 7200,
            Resolution::FourHours => 14400,
            Resolution::SixHours => 21600,
            Resolution::TwelveHours => 43200,
            Resolution::OneDay => 86400,
            Resolution::OneWeek => 604800,
        }
    }

    /// All twelve resolutions, lowest first.
    pub fn all() -> &'static [Resolution; 12] {
        &[
            Resolution::OneMinute,
            Resolution::ThreeMinutes,
            Resolution::FiveMinutes,
            Resolution::FifteenMinutes,
            Resolution::ThirtyMinutes,
            Resolution::OneHour,
            Resolution::TwoHours,
            Resolution::FourHours,
            Resolution::SixHours,
            Resolution::TwelveHours,
            Resolution::OneDay,
            Resolution::OneWeek,
        ]
    }

    /// The eleven resolutions built by merging 1-minute candles.
    pub fn merged() -> &'static [Resolution; 11] {
        &[
            Resolution::ThreeMinutes,
            Resolution::FiveMinutes,
            Resolution::FifteenMinutes,
            Resolution::ThirtyMinutes,
            Resolution::OneHour,
            Resolution::TwoHours,
            Resolution::FourHours,
            Resolution::SixHours,
            Resolution::TwelveHours,
            Resolution::OneDay,
            Resolution::OneWeek,
        ]
    }

    /// Align a unix timestamp down to this resolution's bucket boundary.
    pub fn align(self, ts: i64) -> i64 {
        (ts / self.seconds()) * self.seconds()
    }

    pub fn from_seconds(secs: i64) -> Option<Resolution> {
        Resolution::all().iter().copied().find(|r| r.seconds() == secs)
    }

    /// Stable label used in config keys and log fields.
    pub fn label(self) -> &'static str {
        match self {
            Resolution::OneMinute => "1min",
            Resolution::ThreeMinutes => "3min",
            Resolution::FiveMinutes => "5min",
            Resolution::FifteenMinutes => "15min",
            Resolution::ThirtyMinutes => "30min",
            Resolution::OneHour => "1hr",
            Resolution::TwoHours => "2hr",
            Resolution::FourHours => "4hr",
            Resolution::SixHours => "6hr",
            Resolution::TwelveHours => "12hr",
            Resolution::OneDay => "1day",
            Resolution::OneWeek => "1week",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_cover_one_minute_to_one_week() {
        let secs: Vec<i64> = Resolution::all().iter().map(|r| r.seconds()).collect();
        assert_eq!(
            secs,
            vec![60, 180, 300, 900, 1800, 3600, 7200, 14400, 21600, 43200, 86400, 604800]
        );
    }

    #[test]
    fn merged_excludes_base_resolution() {
        assert!(!Resolution::merged().contains(&Resolution::OneMinute));
        assert_eq!(Resolution::merged().len(), 11);
    }

    #[test]
    fn align_floors_to_bucket_boundary() {
        // 2021-01-01T00:05:30Z
        let ts = 1_609_459_530;
        assert_eq!(Resolution::OneMinute.align(ts), 1_609_459_500);
        assert_eq!(Resolution::FiveMinutes.align(ts), 1_609_459_500);
        assert_eq!(Resolution::FifteenMinutes.align(ts), 1_609_459_200);
        assert_eq!(Resolution::OneMinute.align(1_609_459_500) % 60, 0);
    }

    #[test]
    fn from_seconds_round_trips() {
        for r in Resolution::all() {
            assert_eq!(Resolution::from_seconds(r.seconds()), Some(*r));
        }
        assert_eq!(Resolution::from_seconds(61), None);
    }
}
