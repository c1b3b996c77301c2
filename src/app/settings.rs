use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use anyhow::Result;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::db::Database;

use super::episode::EpisodeId;
use super::error::ValidationError;
use super::timepoint::Timepoint;

const SETTINGS_KEY: &str = "settings";
const PROGRESS_KEY: &str = "playback_progress";

pub(crate) const TIMESLOT_COUNT_RANGE: RangeInclusive<u32> = 1..=5;
pub(crate) const WINDOW_DURATION_RANGE: RangeInclusive<u64> = 30..=300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSettings {
    timeslot_count: u32,
    window_duration: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredSettings", into = "StoredSettings")]
pub(crate) struct UserSettings {
    timeslot_count: u32,
    window_duration: u64,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            timeslot_count: 5,
            window_duration: 60,
        }
    }
}

impl UserSettings {
    pub(crate) fn new(timeslot_count: u32, window_duration: u64) -> Result<Self, ValidationError> {
        if !TIMESLOT_COUNT_RANGE.contains(&timeslot_count) {
            return Err(ValidationError::TimeslotCount(timeslot_count));
        }
        if !WINDOW_DURATION_RANGE.contains(&window_duration) {
            return Err(ValidationError::WindowDuration(window_duration));
        }
        Ok(Self {
            timeslot_count,
            window_duration,
        })
    }

    pub(crate) fn timeslot_count(&self) -> u32 {
        self.timeslot_count
    }

    pub(crate) fn window_duration(&self) -> u64 {
        self.window_duration
    }

    pub(crate) fn with_timeslot_count(self, timeslot_count: u32) -> Result<Self, ValidationError> {
        Self::new(timeslot_count, self.window_duration)
    }

    pub(crate) fn with_window_duration(self, window_duration: u64) -> Result<Self, ValidationError> {
        Self::new(self.timeslot_count, window_duration)
    }

    /// Falls back to defaults when nothing valid is stored.
    pub(crate) fn load(db: &Database) -> Result<Self> {
        let Some(raw) = db.get_raw(SETTINGS_KEY)? else {
            return Ok(Self::default());
        };
        match serde_json::from_str(&raw) {
            Ok(settings) => Ok(settings),
            Err(err) => {
                warn!("ignoring stored settings: {err}");
                Ok(Self::default())
            }
        }
    }

    pub(crate) fn save(&self, db: &Database) -> Result<()> {
        db.put_json(SETTINGS_KEY, self)
    }
}

impl TryFrom<StoredSettings> for UserSettings {
    type Error = ValidationError;

    fn try_from(stored: StoredSettings) -> Result<Self, Self::Error> {
        Self::new(stored.timeslot_count, stored.window_duration)
    }
}

impl From<UserSettings> for StoredSettings {
    fn from(settings: UserSettings) -> Self {
        Self {
            timeslot_count: settings.timeslot_count,
            window_duration: settings.window_duration,
        }
    }
}

/// Last known playback position per episode, in seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct PlaybackProgress {
    positions: BTreeMap<EpisodeId, u64>,
}

impl PlaybackProgress {
    pub(crate) fn load(db: &Database) -> Result<Self> {
        let Some(raw) = db.get_raw(PROGRESS_KEY)? else {
            return Ok(Self::default());
        };
        match serde_json::from_str(&raw) {
            Ok(progress) => Ok(progress),
            Err(err) => {
                warn!("ignoring stored playback progress: {err}");
                Ok(Self::default())
            }
        }
    }

    pub(crate) fn save(&self, db: &Database) -> Result<()> {
        db.put_json(PROGRESS_KEY, self)
    }

    pub(crate) fn record(&mut self, episode_id: EpisodeId, position: Timepoint) {
        self.positions.insert(episode_id, position.seconds());
    }

    pub(crate) fn position(&self, episode_id: EpisodeId) -> Option<Timepoint> {
        self.positions.get(&episode_id).copied().map(Timepoint::from_secs)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (EpisodeId, Timepoint)> + '_ {
        self.positions
            .iter()
            .map(|(&episode_id, &seconds)| (episode_id, Timepoint::from_secs(seconds)))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub(crate) fn clear(db: &Database) -> Result<bool> {
        db.delete(PROGRESS_KEY)
    }
}
