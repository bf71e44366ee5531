use time::{Date, Month, OffsetDateTime};

/// Shift a timestamp by whole calendar months, keeping the time of day.
///
/// The day is clamped to the length of the target month, so Jan 31 + 1
/// month is Feb 28 (or 29). Returns `None` if the result leaves the range
/// `time` can represent.
pub fn add_months(at: OffsetDateTime, months: u32) -> Option<OffsetDateTime> {
    let zero_based = at.month() as i64 - 1 + i64::from(months);
    let year = i32::try_from(i64::from(at.year()) + zero_based.div_euclid(12)).ok()?;
    let month = Month::try_from(u8::try_from(zero_based.rem_euclid(12) + 1).ok()?).ok()?;
    let day = at.day().min(month.length(year));
    let date = Date::from_calendar_date(year, month, day).ok()?;
    Some(at.replace_date(date))
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn zero_months_is_identity() {
        let t = datetime!(2025-03-15 10:30 UTC);
        assert_eq!(add_months(t, 0), Some(t));
    }

    #[test]
    fn crosses_year_boundary() {
        let t = datetime!(2025-11-10 00:00 UTC);
        assert_eq!(add_months(t, 3), Some(datetime!(2026-02-10 00:00 UTC)));
    }

    #[test]
    fn clamps_to_end_of_month() {
        let t = datetime!(2025-01-31 12:00 UTC);
        assert_eq!(add_months(t, 1), Some(datetime!(2025-02-28 12:00 UTC)));
        let leap = datetime!(2024-01-31 12:00 UTC);
        assert_eq!(add_months(leap, 1), Some(datetime!(2024-02-29 12:00 UTC)));
    }

    #[test]
    fn whole_years() {
        let t = datetime!(2025-06-01 00:00 UTC);
        assert_eq!(add_months(t, 24), Some(datetime!(2027-06-01 00:00 UTC)));
    }
}
