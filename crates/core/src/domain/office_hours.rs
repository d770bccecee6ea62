use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;

use crate::errors::DomainError;

const TIME_FORMAT: &str = "%H:%M";

/// Staffed window for one day of the week, both ends exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DailyWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl DailyWindow {
    pub fn parse(start: &str, end: &str) -> Result<Self, DomainError> {
        let start = parse_time(start)?;
        let end = parse_time(end)?;
        if start >= end {
            return Err(DomainError::InvalidOfficeHours(format!(
                "window start {} must be before end {}",
                start.format(TIME_FORMAT),
                end.format(TIME_FORMAT)
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        time > self.start && time < self.end
    }

    pub fn render(&self) -> String {
        format!("{}-{}", self.start.format(TIME_FORMAT), self.end.format(TIME_FORMAT))
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, DomainError> {
    NaiveTime::parse_from_str(value.trim(), TIME_FORMAT).map_err(|_| {
        DomainError::InvalidOfficeHours(format!("`{value}` is not a HH:MM time of day"))
    })
}

/// Weekly office-hours table evaluated in a fixed timezone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OfficeHours {
    timezone: Tz,
    windows: [Option<DailyWindow>; 7],
}

impl Default for OfficeHours {
    fn default() -> Self {
        Self { timezone: Tz::UTC, windows: [None; 7] }
    }
}

impl OfficeHours {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone, windows: [None; 7] }
    }

    pub fn with_window(mut self, day: Weekday, window: DailyWindow) -> Self {
        self.set_window(day, Some(window));
        self
    }

    pub fn set_window(&mut self, day: Weekday, window: Option<DailyWindow>) {
        self.windows[day.num_days_from_monday() as usize] = window;
    }

    pub fn window(&self, day: Weekday) -> Option<DailyWindow> {
        self.windows[day.num_days_from_monday() as usize]
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn set_timezone(&mut self, timezone: Tz) {
        self.timezone = timezone;
    }

    /// Whether `now` falls inside the window configured for its local weekday.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.timezone);
        self.window(local.weekday()).is_some_and(|window| window.contains(local.time()))
    }

    pub fn summary(&self) -> String {
        let days = WEEKDAYS
            .iter()
            .filter_map(|day| self.window(*day).map(|window| format!("{day}={}", window.render())))
            .collect::<Vec<_>>();
        if days.is_empty() {
            return format!("none ({})", self.timezone.name());
        }
        format!("{} ({})", days.join(", "), self.timezone.name())
    }
}

pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];
