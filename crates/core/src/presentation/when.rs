//! The "When" line of an announcement.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;

const RANGE_SEPARATOR: &str = "\u{2014}";

/// Format an event's time span for humans in `tz`.
///
/// All-day spans print dates only (the exclusive end date is shown one day
/// earlier), spans within one day print the date once, and seconds are only
/// shown when either bound has them.
pub fn format_when(
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    all_day: bool,
    tz: Tz,
) -> String {
    let start = start.with_timezone(&tz);
    let mut end = end.map(|e| e.with_timezone(&tz));

    let at_midnight = |t: &DateTime<Tz>| t.time() == NaiveTime::MIN;
    let all_day = all_day || (at_midnight(&start) && end.as_ref().map_or(true, at_midnight));
    let precise = start.second() > 0 || end.as_ref().is_some_and(|e| e.second() > 0);

    if all_day {
        end = end.map(|e| e - Duration::days(1));
    }

    match end {
        Some(end) if end != start => {
            if start.date_naive() == end.date_naive() {
                if all_day {
                    date(&start)
                } else {
                    format!(
                        "{} {}{RANGE_SEPARATOR}{}",
                        date(&start),
                        time(&start, precise),
                        time(&end, precise)
                    )
                }
            } else if all_day {
                format!("{}{RANGE_SEPARATOR}{}", date(&start), date(&end))
            } else {
                format!(
                    "{} {}{RANGE_SEPARATOR}{} {}",
                    date(&start),
                    time(&start, precise),
                    date(&end),
                    time(&end, precise)
                )
            }
        }
        _ if all_day => date(&start),
        _ => format!("{} {}", date(&start), time(&start, precise)),
    }
}

fn date(at: &DateTime<Tz>) -> String {
    let day = at.day();
    format!("{}, {} {day}{} {}", at.format("%A"), at.format("%B"), ordinal(day), at.year())
}

fn time(at: &DateTime<Tz>, precise: bool) -> String {
    if precise {
        at.format("%-I:%M:%S %P").to_string()
    } else {
        at.format("%-I:%M %P").to_string()
    }
}

fn ordinal(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}
