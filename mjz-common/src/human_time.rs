//! Human-readable air-date formatting
//!
//! Playlist descriptions list every airing of an episode as, for example,
//! `Sat Jan 06 2024 at 08:00 PM`.

use chrono::NaiveDateTime;

/// strftime pattern for one airing
pub const AIR_DATE_FORMAT: &str = "%a %b %d %Y at %I:%M %p";

/// Format a broadcast timeslot for display
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use mjz_common::human_time::format_air_date;
///
/// let slot = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap().and_hms_opt(20, 0, 0).unwrap();
/// assert_eq!(format_air_date(&slot), "Sat Jan 06 2024 at 08:00 PM");
/// ```
pub fn format_air_date(timeslot: &NaiveDateTime) -> String {
    timeslot.format(AIR_DATE_FORMAT).to_string()
}

/// Comma-joined air dates, in the order given
pub fn join_air_dates<'a, I>(timeslots: I) -> String
where
    I: IntoIterator<Item = &'a NaiveDateTime>,
{
    timeslots
        .into_iter()
        .map(format_air_date)
        .collect::<Vec<_>>()
        .join(", ")
}
