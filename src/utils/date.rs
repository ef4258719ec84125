use chrono::{Datelike, NaiveDate};

use crate::consts::{DAY_FORMAT, MONTH_FORMAT};
use crate::core::Granularity;
use crate::error::AppError;

fn invalid(input: &str, granularity: Granularity) -> AppError {
    AppError::InvalidDate {
        input: input.to_string(),
        granularity,
        expected: match granularity {
            Granularity::Hourly => "YYYY-MM-DD",
            Granularity::Monthly => "YYYY-MM",
        },
    }
}

/// Parse a zero-padded `YYYY-MM-DD` day identifier
pub(crate) fn parse_day(s: &str) -> Result<NaiveDate, AppError> {
    let date = NaiveDate::parse_from_str(s, DAY_FORMAT)
        .map_err(|_| invalid(s, Granularity::Hourly))?;
    // chrono accepts unpadded fields; shard paths must not
    if date.format(DAY_FORMAT).to_string() != s {
        return Err(invalid(s, Granularity::Hourly));
    }
    Ok(date)
}

/// Parse a zero-padded `YYYY-MM` month identifier into the first day of that month
pub(crate) fn parse_month(s: &str) -> Result<NaiveDate, AppError> {
    let date = NaiveDate::parse_from_str(&format!("{s}-01"), DAY_FORMAT)
        .map_err(|_| invalid(s, Granularity::Monthly))?;
    if date.format(MONTH_FORMAT).to_string() != s {
        return Err(invalid(s, Granularity::Monthly));
    }
    Ok(date)
}

/// Validate a date identifier against the format its granularity expects
pub(crate) fn validate_identifier(granularity: Granularity, s: &str) -> Result<(), AppError> {
    match granularity {
        Granularity::Hourly => parse_day(s).map(|_| ()),
        Granularity::Monthly => parse_month(s).map(|_| ()),
    }
}

pub(crate) fn days_in_month(first: NaiveDate) -> u32 {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    match NaiveDate::from_ymd_opt(year, month, 1) {
        Some(next) => (next - first.with_day(1).unwrap_or(first)).num_days() as u32,
        None => 31,
    }
}

/// Every day identifier of a month, in calendar order
pub(crate) fn days_of_month(month: &str) -> Result<Vec<String>, AppError> {
    let first = parse_month(month)?;
    Ok((1..=days_in_month(first))
        .filter_map(|day| first.with_day(day))
        .map(|d| d.format(DAY_FORMAT).to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_day_requires_zero_padding() {
        assert!(parse_day("2019-09-01").is_ok());
        assert!(parse_day("2019-9-1").is_err());
        assert!(parse_day("2019-09-31").is_err());
        assert!(parse_day("2019-09").is_err());
        assert!(parse_day("20190901").is_err());
    }

    #[test]
    fn parse_month_requires_zero_padding() {
        assert_eq!(
            parse_month("2019-09").unwrap(),
            NaiveDate::from_ymd_opt(2019, 9, 1).unwrap()
        );
        assert!(parse_month("2019-9").is_err());
        assert!(parse_month("2019-13").is_err());
        assert!(parse_month("2019-09-01").is_err());
    }

    #[test]
    fn validate_identifier_by_granularity() {
        assert!(validate_identifier(Granularity::Hourly, "2019-09-02").is_ok());
        assert!(validate_identifier(Granularity::Hourly, "2019-09").is_err());
        assert!(validate_identifier(Granularity::Monthly, "2019-09").is_ok());
        assert!(validate_identifier(Granularity::Monthly, "2019-09-02").is_err());
    }

    #[test]
    fn days_in_month_handles_leap_years_and_december() {
        let feb_2020 = NaiveDate::from_ymd_opt(2020, 2, 1).unwrap();
        let feb_2019 = NaiveDate::from_ymd_opt(2019, 2, 1).unwrap();
        let dec = NaiveDate::from_ymd_opt(2018, 12, 1).unwrap();
        assert_eq!(days_in_month(feb_2020), 29);
        assert_eq!(days_in_month(feb_2019), 28);
        assert_eq!(days_in_month(dec), 31);
    }

    #[test]
    fn days_of_month_lists_padded_days() {
        let days = days_of_month("2019-09").unwrap();
        assert_eq!(days.len(), 30);
        assert_eq!(days[0], "2019-09-01");
        assert_eq!(days[29], "2019-09-30");
    }
}
