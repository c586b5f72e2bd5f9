//! Weekly schedule registers
//!
//! Each day is stored as two 24-bit registers: `am` holds half-hour slots
//! 00:00-12:00 (bit 0 = 00:00-00:30), `pm` holds 12:00-24:00. A set bit is
//! an Active (comfort) slot, a clear bit an Eco slot.

use chrono::{NaiveTime, Weekday};
use serde::Serialize;

pub const SLOTS_PER_DAY: usize = 48;
const SLOTS_PER_HALF: usize = 24;
const SLOT_MINUTES: u32 = 30;

/// One contiguous run of equal slots, `end_slot` exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchedulePeriod {
    pub start_slot: usize,
    pub end_slot: usize,
    pub active: bool,
}

fn slot_time(slot: usize) -> Option<NaiveTime> {
    let minutes = slot as u32 * SLOT_MINUTES;
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
}

impl SchedulePeriod {
    pub fn start_time(&self) -> NaiveTime {
        slot_time(self.start_slot).unwrap_or(NaiveTime::MIN)
    }

    /// `None` means midnight at the end of the day (24:00)
    pub fn end_time(&self) -> Option<NaiveTime> {
        if self.end_slot >= SLOTS_PER_DAY {
            None
        } else {
            slot_time(self.end_slot)
        }
    }

    pub fn label(&self) -> &'static str {
        if self.active {
            "Active"
        } else {
            "Eco"
        }
    }
}

/// Decoded schedule of one day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySchedule {
    slots: [bool; SLOTS_PER_DAY],
}

impl DaySchedule {
    pub fn from_registers(am: u32, pm: u32) -> Self {
        let mut slots = [false; SLOTS_PER_DAY];
        for i in 0..SLOTS_PER_HALF {
            slots[i] = (am >> i) & 1 == 1;
            slots[SLOTS_PER_HALF + i] = (pm >> i) & 1 == 1;
        }
        Self { slots }
    }

    pub fn slots(&self) -> &[bool; SLOTS_PER_DAY] {
        &self.slots
    }

    /// Is the half hour containing `time` active
    pub fn is_active_at(&self, time: NaiveTime) -> bool {
        use chrono::Timelike;
        let slot = (time.hour() * 60 + time.minute()) / SLOT_MINUTES;
        self.slots[slot as usize]
    }

    /// Contiguous runs covering the whole day
    pub fn periods(&self) -> Vec<SchedulePeriod> {
        let mut periods = Vec::new();
        let mut start = 0;
        for i in 1..SLOTS_PER_DAY {
            if self.slots[i] != self.slots[start] {
                periods.push(SchedulePeriod {
                    start_slot: start,
                    end_slot: i,
                    active: self.slots[start],
                });
                start = i;
            }
        }
        periods.push(SchedulePeriod {
            start_slot: start,
            end_slot: SLOTS_PER_DAY,
            active: self.slots[start],
        });
        periods
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Register slugs for one day, e.g. `("circuit1mondayam", "circuit1mondaypm")`
pub fn schedule_slugs(prefix: &str, day: Weekday) -> (String, String) {
    let name = weekday_name(day);
    (format!("{prefix}{name}am"), format!("{prefix}{name}pm"))
}
