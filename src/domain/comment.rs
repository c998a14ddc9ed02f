//! Corpus phrase types: `PastComment` and `CommentPair` (spec §3).

use serde::{Deserialize, Serialize};

use crate::domain::season::Season;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentType {
    Weather,
    Advice,
}

impl CommentType {
    #[must_use]
    pub fn corpus_file_stem(self) -> &'static str {
        match self {
            Self::Weather => "weather_comment",
            Self::Advice => "advice",
        }
    }
}

pub const PAST_COMMENT_MAX_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PastComment {
    pub text: String,
    pub comment_type: CommentType,
    pub season: Season,
    pub count: u32,
}

impl PastComment {
    /// Build a `PastComment` from a raw CSV row, applying spec §3's
    /// normalization: trim, drop empty, truncate at 200 chars with a
    /// warning, reject non-integer counts.
    pub fn from_row(
        raw_text: &str,
        raw_count: &str,
        comment_type: CommentType,
        season: Season,
    ) -> Option<Self> {
        let trimmed = raw_text.trim();
        if trimmed.is_empty() {
            return None;
        }
        let count: u32 = raw_count.trim().parse().ok()?;
        let text = if trimmed.chars().count() > PAST_COMMENT_MAX_LEN {
            tracing::warn!(
                original_len = trimmed.chars().count(),
                "past comment exceeded 200 chars, truncating"
            );
            trimmed.chars().take(PAST_COMMENT_MAX_LEN).collect()
        } else {
            trimmed.to_string()
        };
        Some(Self {
            text,
            comment_type,
            season,
            count,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentPair {
    pub weather: PastComment,
    pub advice: PastComment,
    pub similarity_score: Option<u32>,
    pub adaptation_score: Option<u32>,
}

impl CommentPair {
    /// A valid pair shares a season and its two members differ in type
    /// (spec §3 CommentPair invariant).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.weather.season == self.advice.season
            && self.weather.comment_type != self.advice.comment_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_row_drops_empty_text() {
        assert!(PastComment::from_row("   ", "3", CommentType::Weather, Season::Summer).is_none());
    }

    #[test]
    fn from_row_drops_non_integer_count() {
        assert!(PastComment::from_row("sunny", "abc", CommentType::Weather, Season::Summer).is_none());
    }

    #[test]
    fn from_row_truncates_overlong_text() {
        let long = "a".repeat(250);
        let comment =
            PastComment::from_row(&long, "1", CommentType::Weather, Season::Summer).unwrap();
        assert_eq!(comment.text.chars().count(), PAST_COMMENT_MAX_LEN);
    }

    #[test]
    fn from_row_trims_whitespace() {
        let comment =
            PastComment::from_row("  sunny day  ", "5", CommentType::Weather, Season::Summer)
                .unwrap();
        assert_eq!(comment.text, "sunny day");
        assert_eq!(comment.count, 5);
    }

    #[test]
    fn comment_pair_requires_matching_season_and_differing_type() {
        let weather =
            PastComment::from_row("sunny", "1", CommentType::Weather, Season::Summer).unwrap();
        let advice =
            PastComment::from_row("hydrate", "1", CommentType::Advice, Season::Summer).unwrap();
        let pair = CommentPair {
            weather: weather.clone(),
            advice: advice.clone(),
            similarity_score: None,
            adaptation_score: None,
        };
        assert!(pair.is_valid());

        let mismatched_season =
            PastComment::from_row("cold snap", "1", CommentType::Advice, Season::Winter).unwrap();
        let bad_pair = CommentPair {
            weather,
            advice: mismatched_season,
            similarity_score: None,
            adaptation_score: None,
        };
        assert!(!bad_pair.is_valid());
    }
}
