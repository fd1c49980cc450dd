use chrono::{DateTime, Duration, NaiveDate, TimeZone};

/// Clock time for a message bubble, e.g. "09:05 PM"
pub fn format_time<Tz: TimeZone>(ts: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    ts.format("%I:%M %p").to_string()
}

/// Day label for the chatroom list: "Today", "Yesterday", or e.g. "Mar 4"
pub fn format_date<Tz: TimeZone>(ts: &DateTime<Tz>, today: NaiveDate) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let day = ts.date_naive();
    if day == today {
        "Today".to_string()
    } else if Some(day) == today.checked_sub_signed(Duration::days(1)) {
        "Yesterday".to_string()
    } else {
        ts.format("%b %-d").to_string()
    }
}
