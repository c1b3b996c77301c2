use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum ParseTimepointError {
    #[error("expected {min} to 3 time components, found {found}")]
    ComponentCount { min: usize, found: usize },
    #[error("time component `{0}` is not a number")]
    NotNumeric(String),
}

/// A position on an episode timeline, normalized to whole seconds.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub(crate) struct Timepoint {
    seconds: u64,
}

impl Timepoint {
    pub(crate) const ZERO: Self = Self { seconds: 0 };

    pub(crate) fn from_secs(seconds: u64) -> Self {
        Self { seconds }
    }

    /// Rounds to the nearest second. Negative and non-finite input collapses to zero.
    pub(crate) fn from_secs_f64(seconds: f64) -> Self {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Self::ZERO;
        }
        Self {
            seconds: seconds.round() as u64,
        }
    }

    pub(crate) fn seconds(self) -> u64 {
        self.seconds
    }

    pub(crate) fn saturating_add(self, seconds: u64) -> Self {
        Self::from_secs(self.seconds.saturating_add(seconds))
    }

    /// Parses `H:MM:SS` or `MM:SS`. `min_components` may lower the floor to a
    /// bare seconds value.
    pub(crate) fn parse_formatted(
        text: &str,
        min_components: usize,
    ) -> Result<Self, ParseTimepointError> {
        let parts = text.trim().split(':').collect::<Vec<_>>();
        if parts.len() < min_components || parts.len() > 3 {
            return Err(ParseTimepointError::ComponentCount {
                min: min_components,
                found: parts.len(),
            });
        }
        parse_components(&parts)
    }

    /// Parses the share-link form `H-MM-SS`; hours and minutes may be omitted.
    pub(crate) fn parse_from_url_token(text: &str) -> Result<Self, ParseTimepointError> {
        let parts = text.trim().split('-').collect::<Vec<_>>();
        if parts.len() > 3 {
            return Err(ParseTimepointError::ComponentCount {
                min: 1,
                found: parts.len(),
            });
        }
        parse_components(&parts)
    }

    pub(crate) fn format(self) -> String {
        let (hours, minutes, seconds) = self.split_hms();
        if hours == 0 {
            format!("{minutes}:{seconds:02}")
        } else {
            format!("{hours}:{minutes:02}:{seconds:02}")
        }
    }

    pub(crate) fn format_full(self) -> String {
        let (hours, minutes, seconds) = self.split_hms();
        format!("{hours}:{minutes:02}:{seconds:02}")
    }

    pub(crate) fn format_url_token(self) -> String {
        let (hours, minutes, seconds) = self.split_hms();
        format!("{hours}-{minutes:02}-{seconds:02}")
    }

    fn split_hms(self) -> (u64, u64, u64) {
        (
            self.seconds / SECONDS_PER_HOUR,
            (self.seconds % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE,
            self.seconds % SECONDS_PER_MINUTE,
        )
    }
}

// Components are read right to left: seconds, minutes, hours.
fn parse_components(parts: &[&str]) -> Result<Timepoint, ParseTimepointError> {
    let mut total = 0.0;
    let mut scale = 1.0;
    for part in parts.iter().rev() {
        let trimmed = part.trim();
        let value = trimmed
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite() && *value >= 0.0)
            .ok_or_else(|| ParseTimepointError::NotNumeric(trimmed.to_string()))?;
        total += value * scale;
        scale *= SECONDS_PER_MINUTE as f64;
    }
    Ok(Timepoint::from_secs_f64(total))
}

impl fmt::Display for Timepoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl FromStr for Timepoint {
    type Err = ParseTimepointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_formatted(s, 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "0:00")]
    #[case(5, "0:05")]
    #[case(65, "1:05")]
    #[case(600, "10:00")]
    #[case(3665, "1:01:05")]
    #[case(36_000, "10:00:00")]
    fn format_drops_zero_hours(#[case] seconds: u64, #[case] expected: &str) {
        assert_eq!(Timepoint::from_secs(seconds).format(), expected);
    }

    #[test]
    fn format_full_and_url_token_keep_every_component() {
        let tp = Timepoint::from_secs(65);
        assert_eq!(tp.format_full(), "0:01:05");
        assert_eq!(tp.format_url_token(), "0-01-05");
        assert_eq!(Timepoint::from_secs(3665).format_url_token(), "1-01-05");
    }

    #[test]
    fn parse_formatted_round_trips_format() {
        for seconds in [0, 1, 59, 60, 61, 599, 3599, 3600, 3665, 86_399, 123_456] {
            let tp = Timepoint::from_secs(seconds);
            let parsed = Timepoint::parse_formatted(&tp.format(), 2).expect("formatted value parses");
            assert_eq!(parsed, tp, "round trip failed for {seconds}");
            let full = Timepoint::parse_formatted(&tp.format_full(), 2).expect("full form parses");
            assert_eq!(full, tp);
        }
    }

    #[test]
    fn parse_formatted_enforces_component_bounds() {
        assert_eq!(
            Timepoint::parse_formatted("42", 2),
            Err(ParseTimepointError::ComponentCount { min: 2, found: 1 })
        );
        assert_eq!(
            Timepoint::parse_formatted("1:2:3:4", 2),
            Err(ParseTimepointError::ComponentCount { min: 2, found: 4 })
        );
        assert_eq!(
            Timepoint::parse_formatted("42", 1),
            Ok(Timepoint::from_secs(42))
        );
    }

    #[test]
    fn parse_formatted_rejects_non_numeric_components() {
        assert_eq!(
            Timepoint::parse_formatted("1:xx", 2),
            Err(ParseTimepointError::NotNumeric("xx".to_string()))
        );
        assert!(Timepoint::parse_formatted("1:", 2).is_err());
        assert!(Timepoint::parse_formatted("-1:00", 2).is_err());
    }

    #[test]
    fn parse_rounds_fractional_seconds() {
        assert_eq!(
            Timepoint::parse_formatted("1:05.6", 2),
            Ok(Timepoint::from_secs(66))
        );
        assert_eq!(Timepoint::from_secs_f64(12.4).seconds(), 12);
        assert_eq!(Timepoint::from_secs_f64(-3.0).seconds(), 0);
        assert_eq!(Timepoint::from_secs_f64(f64::NAN).seconds(), 0);
    }

    #[rstest]
    #[case("5", 5)]
    #[case("2-05", 125)]
    #[case("1-01-05", 3665)]
    #[case("0-00-00", 0)]
    fn parse_from_url_token_defaults_missing_components(#[case] text: &str, #[case] expected: u64) {
        assert_eq!(
            Timepoint::parse_from_url_token(text),
            Ok(Timepoint::from_secs(expected))
        );
    }

    #[test]
    fn parse_from_url_token_rejects_bad_input() {
        assert!(Timepoint::parse_from_url_token("1-2-3-4").is_err());
        assert!(Timepoint::parse_from_url_token("a-10").is_err());
        assert!(Timepoint::parse_from_url_token("").is_err());
    }

    #[test]
    fn from_str_uses_two_component_floor() {
        assert_eq!("1:01:05".parse::<Timepoint>(), Ok(Timepoint::from_secs(3665)));
        assert!("65".parse::<Timepoint>().is_err());
    }
}
