use chrono::{NaiveDate, NaiveTime, TimeDelta, Timelike};

use crate::model::VenueTime;

/// How the first same-day candidate is derived from the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameDayRounding {
    /// Top of the next full hour strictly after now (21:00 for now = 20:10,
    /// and also for now = 20:00 sharp).
    NextFullHour,
    /// Next slot-step boundary strictly after now (20:30 for now = 20:10).
    NextHalfHour,
}

/// Operating window of the club and the slot policy derived from it.
///
/// Defaults match the venue: open 10:00, close 22:00, starts offered every
/// 30 minutes, standard session one hour, bookings accepted a week ahead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClubHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
    /// Gap between offered start times.
    pub slot_step: TimeDelta,
    /// Standard booking length; the last offered start leaves room for it
    /// before close.
    pub session: TimeDelta,
    /// How many days ahead a date may be picked.
    pub horizon_days: i64,
    pub rounding: SameDayRounding,
}

impl Default for ClubHours {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            close: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
            slot_step: TimeDelta::minutes(30),
            session: TimeDelta::hours(1),
            horizon_days: 7,
            rounding: SameDayRounding::NextFullHour,
        }
    }
}

impl ClubHours {
    /// Candidate start times a picker may offer for `date`, as seen at `now`.
    ///
    /// A past date, or a date beyond the booking horizon, yields nothing.
    /// On the current date the first candidate is `now` rounded up by the
    /// configured policy (clamped to opening time); on a future date it is
    /// the opening time. The final candidate always leaves a full `session`
    /// before close — 21:00 for a 22:00 close, never 21:30.
    ///
    /// The result is a finite vector, recomputed per call: `now` advances
    /// between requests, so slot lists are never cached.
    pub fn enumerate_start_times(&self, date: NaiveDate, now: VenueTime) -> Vec<NaiveTime> {
        let today = now.date();
        if date < today || date > today + TimeDelta::days(self.horizon_days) {
            return Vec::new();
        }

        let open_min = minute_of_day(self.open);
        // May land past midnight (≥ 1440) late in the evening; the
        // first > last guard below then yields an empty list.
        let first_min = if date == today {
            round_up_minutes(now.time(), self.rounding).max(open_min)
        } else {
            open_min
        };
        let last_min = minute_of_day(self.close) - self.session.num_minutes();
        let step = self.slot_step.num_minutes().max(1);

        let mut slots = Vec::new();
        let mut m = first_min;
        while m <= last_min {
            slots.push(from_minute_of_day(m));
            m += step;
        }
        slots
    }
}

fn minute_of_day(t: NaiveTime) -> i64 {
    (t.num_seconds_from_midnight() / 60) as i64
}

fn from_minute_of_day(m: i64) -> NaiveTime {
    NaiveTime::from_num_seconds_from_midnight_opt((m * 60) as u32, 0)
        .expect("minute of day in range")
}

/// Minute-of-day of the first candidate strictly after `t` under `rounding`.
/// Returns 1440 or more when rounding crosses midnight.
fn round_up_minutes(t: NaiveTime, rounding: SameDayRounding) -> i64 {
    match rounding {
        SameDayRounding::NextFullHour => (t.hour() as i64 + 1) * 60,
        SameDayRounding::NextHalfHour => {
            let half_hours = t.num_seconds_from_midnight() as i64 / (30 * 60);
            (half_hours + 1) * 30
        }
    }
}
