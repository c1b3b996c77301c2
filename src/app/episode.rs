use chrono::{DateTime, Local, Utc};

use super::error::ValidationError;
use super::remote::EpisodeRecord;
use super::window::AudioFile;

pub(crate) type EpisodeId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Episode {
    pub(crate) id: EpisodeId,
    pub(crate) title: String,
    pub(crate) audio: AudioFile,
}

impl Episode {
    pub(crate) fn from_record(record: &EpisodeRecord) -> Result<Self, ValidationError> {
        if !record.duration.is_finite() || record.duration < 0.0 {
            return Err(ValidationError::InvalidRecord(format!(
                "episode {} has duration {}",
                record.id, record.duration
            )));
        }
        let title = record.title.trim();
        if title.is_empty() {
            return Err(ValidationError::InvalidRecord(format!(
                "episode {} has no title",
                record.id
            )));
        }
        Ok(Self {
            id: record.id,
            title: title.to_string(),
            audio: AudioFile {
                filepath: record.audio_url.trim().to_string(),
                duration: record.duration.round() as u64,
            },
        })
    }

    pub(crate) fn duration(&self) -> u64 {
        self.audio.duration
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}

pub(crate) fn format_local_date(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(duration: f64, title: &str) -> EpisodeRecord {
        EpisodeRecord {
            id: 9,
            title: title.to_string(),
            audio_url: " https://cdn.test/ep9.mp3 ".to_string(),
            duration,
        }
    }

    #[test]
    fn from_record_rounds_duration_and_trims_fields() {
        let episode = Episode::from_record(&record(599.6, " Pilot ")).expect("valid episode");
        assert_eq!(episode.title, "Pilot");
        assert_eq!(episode.duration(), 600);
        assert_eq!(episode.audio.filepath, "https://cdn.test/ep9.mp3");
    }

    #[test]
    fn from_record_rejects_bad_duration_and_blank_title() {
        assert!(Episode::from_record(&record(-1.0, "Pilot")).is_err());
        assert!(Episode::from_record(&record(f64::NAN, "Pilot")).is_err());
        assert!(Episode::from_record(&record(10.0, "   ")).is_err());
    }

    #[test]
    fn truncate_adds_ellipsis_past_limit() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a rather long title", 10), "a rathe...");
    }
}
