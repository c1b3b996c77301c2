use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use super::timepoint::Timepoint;

/// Fraction of the window kept before a followed timepoint.
const FOLLOW_LEAD_FRACTION: f64 = 0.1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct AudioFile {
    pub(crate) filepath: String,
    pub(crate) duration: u64,
}

/// Layout classes reported by the viewport classifier, each with a fixed slot count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DeviceClass {
    Wide,
    Standard,
    Tablet,
    Mobile,
}

impl DeviceClass {
    pub(crate) fn timeslot_count(self) -> u32 {
        match self {
            Self::Wide => 7,
            Self::Standard => 5,
            Self::Tablet => 3,
            Self::Mobile => 1,
        }
    }
}

/// The visible slice of an episode timeline.
///
/// `move_to` writes the start as given; callers keep
/// `start + duration <= audio_file.duration` by clamping first (see
/// [`AudioWindow::clamp_start`]). `resize` and `find_window_start_for_time`
/// clamp on their own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AudioWindow {
    pub(crate) audio_file: AudioFile,
    pub(crate) start: Timepoint,
    pub(crate) duration: u64,
    pub(crate) timeslot_count: u32,
}

impl AudioWindow {
    pub(crate) fn new(audio_file: AudioFile, duration: u64, timeslot_count: u32) -> Self {
        Self {
            duration: duration.min(audio_file.duration),
            audio_file,
            start: Timepoint::ZERO,
            timeslot_count: timeslot_count.max(1),
        }
    }

    pub(crate) fn end(&self) -> Timepoint {
        self.start.saturating_add(self.duration)
    }

    pub(crate) fn timeslot_duration(&self) -> u64 {
        self.duration / u64::from(self.timeslot_count.max(1))
    }

    /// Recomputes the slot count as `floor(duration / seconds)`, never below 1.
    /// A zero slot length is ignored.
    pub(crate) fn set_timeslot_duration(&mut self, seconds: u64) {
        if seconds == 0 {
            return;
        }
        self.timeslot_count = u32::try_from(self.duration / seconds)
            .unwrap_or(u32::MAX)
            .max(1);
    }

    pub(crate) fn move_to(&mut self, start_seconds: u64) {
        self.start = Timepoint::from_secs(start_seconds);
    }

    /// Grows or shrinks around the current midpoint, falling back to edge
    /// alignment when the recentred window would leave the file.
    pub(crate) fn resize(&mut self, new_duration: u64) {
        let old_duration = self.duration as f64;
        let recentred = self.start.seconds() as f64 - (new_duration as f64 - old_duration) / 2.0;
        self.duration = new_duration;
        self.start = Timepoint::from_secs(self.clamp_start_f64(recentred));
    }

    pub(crate) fn contains_timepoint(&self, timepoint: Timepoint) -> bool {
        self.start <= timepoint && timepoint <= self.end()
    }

    /// Start that puts `timepoint` a tenth of the way into the window.
    pub(crate) fn find_window_start_for_time(&self, timepoint: Timepoint) -> u64 {
        let lead = self.duration as f64 * FOLLOW_LEAD_FRACTION;
        self.clamp_start_f64(timepoint.seconds() as f64 - lead)
    }

    pub(crate) fn max_start(&self) -> u64 {
        self.audio_file.duration.saturating_sub(self.duration)
    }

    pub(crate) fn clamp_start(&self, start: i64) -> u64 {
        self.clamp_start_f64(start as f64)
    }

    fn clamp_start_f64(&self, start: f64) -> u64 {
        let max_start = self.max_start() as f64;
        start.clamp(0.0, max_start).round() as u64
    }

    /// Slot index for a timepoint inside the window. The inclusive end maps to the last slot.
    pub(crate) fn timeslot_index(&self, timepoint: Timepoint) -> Option<usize> {
        if !self.contains_timepoint(timepoint) {
            return None;
        }
        let slot_duration = self.timeslot_duration();
        let last = self.timeslot_count.max(1) as usize - 1;
        if slot_duration == 0 {
            return Some(last);
        }
        let offset = timepoint.seconds() - self.start.seconds();
        Some(((offset / slot_duration) as usize).min(last))
    }

    /// Slot ranges in order. The last one absorbs the remainder so it ends
    /// at the window end, matching [`AudioWindow::timeslot_index`].
    pub(crate) fn timeslots(&self) -> Vec<RangeInclusive<Timepoint>> {
        let slot_duration = self.timeslot_duration();
        let count = u64::from(self.timeslot_count.max(1));
        (0..count)
            .map(|slot| {
                let start = self.start.saturating_add(slot * slot_duration);
                let end = if slot + 1 == count {
                    self.end()
                } else {
                    start.saturating_add(slot_duration)
                };
                start..=end
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(file_duration: u64, start: u64, duration: u64) -> AudioWindow {
        let mut window = AudioWindow::new(
            AudioFile {
                filepath: "episode.mp3".to_string(),
                duration: file_duration,
            },
            duration,
            5,
        );
        window.move_to(start);
        window
    }

    #[test]
    fn resize_recentres_on_old_midpoint() {
        let mut w = window(1000, 100, 40);
        w.resize(80);
        assert_eq!(w.start.seconds(), 80);
        assert_eq!(w.duration, 80);
        assert_eq!(w.start.seconds() + w.duration / 2, 120);
    }

    #[test]
    fn resize_clamps_near_file_end() {
        let mut w = window(1000, 950, 40);
        w.resize(200);
        assert_eq!(w.start.seconds(), 800);
        assert_eq!(w.end().seconds(), 1000);
    }

    #[test]
    fn resize_clamps_near_file_start() {
        let mut w = window(1000, 10, 40);
        w.resize(100);
        assert_eq!(w.start.seconds(), 0);
    }

    #[test]
    fn move_to_does_not_clamp() {
        let mut w = window(100, 0, 40);
        w.move_to(90);
        assert_eq!(w.start.seconds(), 90);
        assert_eq!(w.clamp_start(90), 60);
        assert_eq!(w.clamp_start(-5), 0);
    }

    #[test]
    fn contains_timepoint_is_inclusive() {
        let w = window(1000, 100, 40);
        assert!(w.contains_timepoint(Timepoint::from_secs(100)));
        assert!(w.contains_timepoint(Timepoint::from_secs(140)));
        assert!(!w.contains_timepoint(Timepoint::from_secs(99)));
        assert!(!w.contains_timepoint(Timepoint::from_secs(141)));
    }

    #[test]
    fn find_window_start_keeps_ten_percent_lead() {
        let w = window(1000, 0, 100);
        assert_eq!(w.find_window_start_for_time(Timepoint::from_secs(500)), 490);
        assert_eq!(w.find_window_start_for_time(Timepoint::from_secs(5)), 0);
        assert_eq!(w.find_window_start_for_time(Timepoint::from_secs(990)), 900);
    }

    #[test]
    fn timeslot_duration_divides_window_evenly() {
        let mut w = window(1000, 0, 100);
        assert_eq!(w.timeslot_duration(), 20);
        w.timeslot_count = DeviceClass::Tablet.timeslot_count();
        assert_eq!(w.timeslot_duration(), 33);
        w.timeslot_count = DeviceClass::Mobile.timeslot_count();
        assert_eq!(w.timeslot_duration(), 100);
    }

    #[test]
    fn timeslot_index_maps_inclusive_end_to_last_slot() {
        let w = window(1000, 100, 100);
        assert_eq!(w.timeslot_index(Timepoint::from_secs(100)), Some(0));
        assert_eq!(w.timeslot_index(Timepoint::from_secs(139)), Some(1));
        assert_eq!(w.timeslot_index(Timepoint::from_secs(200)), Some(4));
        assert_eq!(w.timeslot_index(Timepoint::from_secs(201)), None);
        assert_eq!(w.timeslots().len(), 5);
    }

    #[test]
    fn slot_length_recomputes_slot_count() {
        let mut w = window(1000, 0, 100);
        w.set_timeslot_duration(30);
        assert_eq!(w.timeslot_count, 3);
        w.set_timeslot_duration(0);
        assert_eq!(w.timeslot_count, 3);
        w.set_timeslot_duration(250);
        assert_eq!(w.timeslot_count, 1);
        w.set_timeslot_duration(10);
        assert_eq!(w.timeslot_count, 10);
    }

    #[test]
    fn last_timeslot_reaches_window_end() {
        let mut w = window(1000, 0, 60);
        w.timeslot_count = DeviceClass::Wide.timeslot_count();
        let slots = w.timeslots();
        assert_eq!(slots.len(), 7);
        assert_eq!(*slots[5].end(), Timepoint::from_secs(48));
        assert_eq!(*slots[6].start(), Timepoint::from_secs(48));
        assert_eq!(*slots[6].end(), w.end());
        assert_eq!(w.timeslot_index(Timepoint::from_secs(59)), Some(6));
    }

    #[test]
    fn device_classes_use_fixed_slot_table() {
        assert_eq!(DeviceClass::Wide.timeslot_count(), 7);
        assert_eq!(DeviceClass::Standard.timeslot_count(), 5);
        assert_eq!(DeviceClass::Tablet.timeslot_count(), 3);
        assert_eq!(DeviceClass::Mobile.timeslot_count(), 1);
    }

    #[test]
    fn new_window_never_exceeds_file() {
        let w = AudioWindow::new(
            AudioFile {
                filepath: String::new(),
                duration: 20,
            },
            60,
            0,
        );
        assert_eq!(w.duration, 20);
        assert_eq!(w.timeslot_count, 1);
        assert_eq!(w.max_start(), 0);
    }
}
