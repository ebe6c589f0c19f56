//! Relative-date bucketing for the `%ad`/`%cd`/`%rd` directives (`spec.md`
//! §4.G). A straight port of the `relative_date` rounding ladder from the
//! original `cov` tool's `formatter.cc`.

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// `now` and `then` are both Unix seconds. Buckets, in order: seconds,
/// minutes, hours, days, weeks, months, years(+months).
pub fn relative_date(now: i64, then: i64) -> String {
    if now < then {
        return "in the future".to_string();
    }

    let secs = now - then;
    if secs < 90 {
        return plural(secs, "second");
    }

    let mins = (secs + 30) / MINUTE;
    if mins < 90 {
        return plural(mins, "minute");
    }

    let hrs = (mins * MINUTE + 30 * MINUTE) / HOUR;
    if hrs < 36 {
        return plural(hrs, "hour");
    }

    let days = (hrs * HOUR + 12 * HOUR) / DAY;
    if days < 14 {
        return plural(days, "day");
    }
    if days < 70 {
        return plural((days + 3) / 7, "week");
    }
    if days < 365 {
        return plural((days + 15) / 30, "month");
    }

    if days < 1825 {
        let total_months = (days * 12 * 2 + 365) / (365 * 2);
        let years = total_months / 12;
        let months = total_months % 12;
        return if months != 0 {
            format!("{}, {}", plural(years, "year"), plural(months, "month"))
        } else {
            plural(years, "year")
        };
    }

    plural((days + 183) / 365, "year")
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("{count} {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn future_timestamp() {
        assert_eq!(relative_date(0, 10), "in the future");
    }

    #[test]
    fn seconds_bucket() {
        assert_eq!(relative_date(100, 30), "1 minute ago");
        assert_eq!(relative_date(89, 0), "89 seconds ago");
    }

    #[test]
    fn minutes_bucket_just_under_90() {
        let then = 0;
        let now = 89 * MINUTE;
        assert_eq!(relative_date(now, then), "89 minutes ago");
    }

    #[test]
    fn hours_bucket() {
        let then = 0;
        let now = 5 * HOUR;
        assert_eq!(relative_date(now, then), "5 hours ago");
    }

    #[test]
    fn days_bucket() {
        let then = 0;
        let now = 6 * DAY;
        assert_eq!(relative_date(now, then), "6 days ago");
    }

    #[test]
    fn weeks_bucket() {
        let then = 0;
        let now = 20 * DAY;
        assert_eq!(relative_date(now, then), "3 weeks ago");
    }

    #[test]
    fn months_bucket() {
        let then = 0;
        let now = 180 * DAY;
        assert_eq!(relative_date(now, then), "6 months ago");
    }

    #[test]
    fn years_and_months_bucket() {
        let then = 0;
        let now = 820 * DAY;
        assert_eq!(relative_date(now, then), "2 years, 3 months ago");
    }

    #[test]
    fn pure_years_bucket_beyond_1825_days() {
        let then = 0;
        let now = 2000 * DAY;
        assert_eq!(relative_date(now, then), "5 years ago");
    }

    #[test]
    fn exact_90_second_boundary_flips_to_minutes() {
        assert_eq!(relative_date(90, 0), "2 minutes ago");
    }
}
