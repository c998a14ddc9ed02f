//! Season derivation from a target datetime in JST (glossary: Season).

use chrono::{DateTime, Datelike, TimeZone, Utc};
use chrono_tz::Asia::Tokyo;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
    RainySeason,
    Typhoon,
}

impl Season {
    #[must_use]
    pub fn all() -> [Self; 6] {
        [
            Self::Spring,
            Self::Summer,
            Self::Autumn,
            Self::Winter,
            Self::RainySeason,
            Self::Typhoon,
        ]
    }

    #[must_use]
    pub fn corpus_file_stem(self) -> &'static str {
        match self {
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Autumn => "autumn",
            Self::Winter => "winter",
            Self::RainySeason => "rainy_season",
            Self::Typhoon => "typhoon",
        }
    }
}

/// Derive the season for `target_datetime` in the JST time zone. The
/// rainy season (June) and the typhoon window (Aug 20 - Sep 30) take
/// priority over the calendar season they overlap, per glossary.
#[must_use]
pub fn derive_season(target_datetime: DateTime<Utc>) -> Season {
    let jst = target_datetime.with_timezone(&Tokyo);
    let month = jst.month();
    let day = jst.day();

    if month == 6 {
        return Season::RainySeason;
    }
    if (month == 8 && day >= 20) || month == 9 {
        return Season::Typhoon;
    }

    match month {
        3..=5 => Season::Spring,
        7 | 8 => Season::Summer,
        10 | 11 => Season::Autumn,
        _ => Season::Winter,
    }
}

/// Default target datetime when the caller omits one: next day,
/// 09:00 JST (spec §4.2 Input node).
#[must_use]
pub fn default_target_datetime(now_utc: DateTime<Utc>) -> DateTime<Utc> {
    let jst_now = now_utc.with_timezone(&Tokyo);
    let next_day = jst_now.date_naive() + chrono::Duration::days(1);
    let naive = next_day.and_hms_opt(9, 0, 0).expect("valid time");
    Tokyo
        .from_local_datetime(&naive)
        .single()
        .expect("unambiguous JST datetime")
        .with_timezone(&Utc)
}
