//! Analysis period resolution.
//!
//! Raw `periode` / `jours` values arrive as strings; anything that is not
//! an integer inside the configured bounds falls back to the default.

use chrono::{DateTime, Utc};
use idp_watch_database_models::{MonthWindow, TimeWindow};

use crate::config::PeriodBounds;

/// The `[now - months, now)` window a request is analysed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    /// Number of calendar months covered.
    pub months: u32,
    /// Request instant; exclusive end of the window.
    pub now: DateTime<Utc>,
    /// The window itself.
    pub window: TimeWindow,
}

impl Period {
    /// Period of `months` calendar months ending at `now`.
    #[must_use]
    pub fn new(months: u32, now: DateTime<Utc>) -> Self {
        Self {
            months,
            now,
            window: TimeWindow::trailing_months(now, months),
        }
    }

    /// `"<N> derniers mois"`.
    #[must_use]
    pub fn label(&self) -> String {
        label(self.months)
    }

    /// Calendar month buckets of the monthly series, oldest first.
    #[must_use]
    pub fn month_windows(&self) -> Vec<MonthWindow> {
        MonthWindow::trailing(self.now, self.months)
    }

    /// The `days` days before the request instant.
    #[must_use]
    pub fn trailing_days(&self, days: u32) -> TimeWindow {
        TimeWindow::trailing_days(self.now, days)
    }
}

/// `"<N> derniers mois"`.
#[must_use]
pub fn label(months: u32) -> String {
    format!("{months} derniers mois")
}

/// Resolves the raw `periode` parameter to a month count.
#[must_use]
pub fn resolve_months(raw: Option<&str>, bounds: &PeriodBounds) -> u32 {
    resolve(
        "periode",
        raw,
        bounds.min_months,
        bounds.max_months,
        bounds.default_months,
    )
}

/// Resolves the raw `jours` parameter to a day count.
#[must_use]
pub fn resolve_days(raw: Option<&str>, bounds: &PeriodBounds) -> u32 {
    resolve(
        "jours",
        raw,
        1,
        bounds.max_alert_days,
        bounds.default_alert_days,
    )
}

/// Keeps an already-parsed month count inside the configured bounds,
/// falling back to the default like [`resolve_months`] does.
#[must_use]
pub fn bounded_months(months: u32, bounds: &PeriodBounds) -> u32 {
    bounded(
        "months",
        months,
        bounds.min_months,
        bounds.max_months,
        bounds.default_months,
    )
}

/// Keeps an already-parsed day count inside the configured bounds,
/// falling back to the default like [`resolve_days`] does.
#[must_use]
pub fn bounded_days(days: u32, bounds: &PeriodBounds) -> u32 {
    bounded(
        "days",
        days,
        1,
        bounds.max_alert_days,
        bounds.default_alert_days,
    )
}

fn bounded(name: &str, value: u32, min: u32, max: u32, default: u32) -> u32 {
    if (min..=max).contains(&value) {
        value
    } else {
        log::debug!("Out-of-range {name}={value}, falling back to {default}");
        default
    }
}

fn resolve(name: &str, raw: Option<&str>, min: u32, max: u32, default: u32) -> u32 {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return default;
    };

    match raw.parse::<i64>() {
        Ok(value) if value >= i64::from(min) && value <= i64::from(max) => {
            u32::try_from(value).unwrap_or(default)
        }
        _ => {
            log::debug!("Invalid {name}={raw:?}, falling back to {default}");
            default
        }
    }
}
