//! 5-field cron expressions (minute, hour, day-of-month, month, day-of-week).
//!
//! Expressions are evaluated in UTC. Day-of-week accepts `0-7` (both `0` and
//! `7` are Sunday) and the names `SUN`..`SAT`. Lists, ranges and steps work
//! in every field.
//!
//! The underlying `cron` crate wants a leading seconds field and numbers
//! weekdays from 1 = Sunday, so the weekday field is expanded to day names
//! before handing the expression over.

use crate::error::{ConveyorError, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// A parsed, validated 5-field cron expression.
#[derive(Debug, Clone)]
pub struct CronExpression {
    source: String,
    schedule: cron::Schedule,
}

impl CronExpression {
    pub fn parse(expression: &str) -> Result<Self> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(ConveyorError::CronParse(format!(
                "expected 5 fields (minute hour day month weekday), got {} in '{expression}'",
                fields.len()
            )));
        }

        let weekday = normalize_weekday(fields[4])?;
        let translated = format!(
            "0 {} {} {} {} {}",
            fields[0], fields[1], fields[2], fields[3], weekday
        );
        let schedule = cron::Schedule::from_str(&translated)
            .map_err(|e| ConveyorError::CronParse(format!("'{expression}': {e}")))?;

        Ok(Self {
            source: fields.join(" "),
            schedule,
        })
    }

    /// The expression as written (whitespace normalized).
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// First occurrence strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// The next `count` occurrences after `after`.
    pub fn upcoming(&self, after: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule.after(&after).take(count).collect()
    }
}

impl FromStr for CronExpression {
    type Err = ConveyorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Expand a day-of-week field into `*` or a list of day names.
fn normalize_weekday(field: &str) -> Result<String> {
    let mut days = [false; 7];

    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u8 = step
                    .parse()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or_else(|| weekday_error(field))?;
                (range, step)
            }
            None => (item, 1),
        };

        let (start, end) = if range == "*" {
            (0, 6)
        } else if let Some((a, b)) = range.split_once('-') {
            (weekday_value(a, field)?, weekday_value(b, field)?)
        } else {
            let start = weekday_value(range, field)?;
            // `a/n` runs from `a` to the end of the week.
            (start, if item.contains('/') { 6 } else { start })
        };
        if start > end {
            return Err(weekday_error(field));
        }

        let mut day = u16::from(start);
        while day <= u16::from(end) {
            days[usize::from(day % 7)] = true;
            day += u16::from(step);
        }
    }

    if days.iter().all(|d| *d) {
        return Ok("*".to_string());
    }
    let names: Vec<&str> = days
        .iter()
        .zip(DAY_NAMES)
        .filter(|(set, _)| **set)
        .map(|(_, name)| name)
        .collect();
    Ok(names.join(","))
}

fn weekday_value(token: &str, field: &str) -> Result<u8> {
    if let Ok(n) = token.parse::<u8>() {
        return if n <= 7 { Ok(n) } else { Err(weekday_error(field)) };
    }
    DAY_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(token))
        .map(|i| i as u8)
        .ok_or_else(|| weekday_error(field))
}

fn weekday_error(field: &str) -> ConveyorError {
    ConveyorError::CronParse(format!("invalid day-of-week field '{field}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike, Weekday};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_hourly() {
        let expr = CronExpression::parse("0 * * * *").unwrap();
        let next = expr.next_after(at(2024, 1, 1, 10, 15)).unwrap();
        assert_eq!(next, at(2024, 1, 1, 11, 0));
    }

    #[test]
    fn test_every_fifteen_minutes() {
        let expr = CronExpression::parse("*/15 * * * *").unwrap();
        let times = expr.upcoming(at(2024, 1, 1, 10, 1), 3);
        assert_eq!(
            times,
            vec![
                at(2024, 1, 1, 10, 15),
                at(2024, 1, 1, 10, 30),
                at(2024, 1, 1, 10, 45)
            ]
        );
    }

    #[test]
    fn test_next_is_strictly_after() {
        let expr = CronExpression::parse("30 6 * * *").unwrap();
        let next = expr.next_after(at(2024, 1, 1, 6, 30)).unwrap();
        assert_eq!(next, at(2024, 1, 2, 6, 30));
    }

    #[test]
    fn test_weekday_range_skips_weekend() {
        // 2024-01-05 is a Friday.
        let expr = CronExpression::parse("0 9 * * 1-5").unwrap();
        let next = expr.next_after(at(2024, 1, 5, 10, 0)).unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);
        assert_eq!(next, at(2024, 1, 8, 9, 0));
    }

    #[test]
    fn test_sunday_as_zero_or_seven() {
        let zero = CronExpression::parse("0 0 * * 0").unwrap();
        let seven = CronExpression::parse("0 0 * * 7").unwrap();
        let named = CronExpression::parse("0 0 * * sun").unwrap();
        let start = at(2024, 1, 1, 0, 0);
        let expected = at(2024, 1, 7, 0, 0);
        assert_eq!(zero.next_after(start).unwrap(), expected);
        assert_eq!(seven.next_after(start).unwrap(), expected);
        assert_eq!(named.next_after(start).unwrap(), expected);
    }

    #[test]
    fn test_weekday_normalization() {
        assert_eq!(normalize_weekday("*").unwrap(), "*");
        assert_eq!(normalize_weekday("0-7").unwrap(), "*");
        assert_eq!(normalize_weekday("1-5").unwrap(), "Mon,Tue,Wed,Thu,Fri");
        assert_eq!(normalize_weekday("*/2").unwrap(), "Sun,Tue,Thu,Sat");
        assert_eq!(normalize_weekday("5-7").unwrap(), "Sun,Fri,Sat");
        assert_eq!(normalize_weekday("MON,wed").unwrap(), "Mon,Wed");
        assert_eq!(normalize_weekday("3/2").unwrap(), "Wed,Fri");
    }

    #[test]
    fn test_daily_at_fixed_hour() {
        let expr = CronExpression::parse("0 3 * * *").unwrap();
        let next = expr.next_after(at(2024, 3, 10, 4, 0)).unwrap();
        assert_eq!((next.day(), next.hour(), next.minute()), (11, 3, 0));
    }

    #[test]
    fn test_rejects_wrong_field_count() {
        assert!(CronExpression::parse("0 0 0 * * *").is_err());
        assert!(CronExpression::parse("* * * *").is_err());
        assert!(CronExpression::parse("").is_err());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(CronExpression::parse("61 * * * *").is_err());
        assert!(CronExpression::parse("0 * * * 8").is_err());
        assert!(CronExpression::parse("0 * * * 5-1").is_err());
        assert!(CronExpression::parse("0 * * * */0").is_err());
        assert!(CronExpression::parse("0 * * * funday").is_err());
    }

    #[test]
    fn test_display_normalizes_whitespace() {
        let expr: CronExpression = "0   12 * *  *".parse().unwrap();
        assert_eq!(expr.to_string(), "0 12 * * *");
    }
}
