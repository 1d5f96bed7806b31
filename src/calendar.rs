//! CF time-coordinate decoding.
//!
//! Time coordinates are stored as counts of a unit since an origin date
//! (`days since 1850-01-01`). The exact window filter and the time
//! bounds checks need those counts turned into comparable calendar
//! stamps, respecting the model calendar.

use crate::error::{ClimopError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::str::FromStr;

/// Model calendar named by the CF `calendar` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calendar {
    /// `standard`, `gregorian`, `proleptic_gregorian`.
    Gregorian,
    /// `noleap`, `365_day`.
    NoLeap,
    /// `all_leap`, `366_day`.
    AllLeap,
    /// `360_day`.
    Day360,
}

impl FromStr for Calendar {
    type Err = ClimopError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "standard" | "gregorian" | "proleptic_gregorian" => Ok(Calendar::Gregorian),
            "noleap" | "365_day" => Ok(Calendar::NoLeap),
            "all_leap" | "366_day" => Ok(Calendar::AllLeap),
            "360_day" => Ok(Calendar::Day360),
            other => Err(ClimopError::TimeDecode(format!(
                "unsupported calendar: {other}"
            ))),
        }
    }
}

const DAYS_NOLEAP: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const DAYS_ALLLEAP: [u32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Parsed CF time units: a scale and an origin date-time.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeUnits {
    pub seconds_per_unit: f64,
    pub origin: (i32, u32, u32, u32, u32),
}

impl TimeUnits {
    /// Parse a units string such as `days since 1850-01-01 00:00:00`.
    pub fn parse(units: &str) -> Result<Self> {
        let mut parts = units.split_whitespace();
        let unit = parts
            .next()
            .ok_or_else(|| ClimopError::TimeDecode(format!("empty time units: '{units}'")))?;
        let seconds_per_unit = match unit.trim_end_matches('s') {
            "day" => 86400.0,
            "hour" | "hr" => 3600.0,
            "minute" | "min" => 60.0,
            "second" | "sec" => 1.0,
            other => {
                return Err(ClimopError::TimeDecode(format!(
                    "unsupported time unit: {other}"
                )))
            }
        };
        match parts.next() {
            Some("since") => {}
            _ => {
                return Err(ClimopError::TimeDecode(format!(
                    "missing 'since' in time units: '{units}'"
                )))
            }
        }
        let rest: Vec<&str> = parts.collect();
        let stamp = rest.join("T");
        let origin = parse_origin(&stamp)
            .ok_or_else(|| ClimopError::TimeDecode(format!("bad origin date in '{units}'")))?;
        Ok(Self {
            seconds_per_unit,
            origin,
        })
    }

    /// Day length of one unit, used for bounds span checks.
    pub fn days_per_unit(&self) -> f64 {
        self.seconds_per_unit / 86400.0
    }
}

fn parse_origin(stamp: &str) -> Option<(i32, u32, u32, u32, u32)> {
    let (date, time) = match stamp.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (stamp, None),
    };
    let mut it = date.split('-');
    let year: i32 = it.next()?.parse().ok()?;
    let month: u32 = it.next().unwrap_or("1").parse().ok()?;
    let day: u32 = it.next().unwrap_or("1").parse().ok()?;
    let (hour, minute) = match time {
        Some(t) => {
            let mut ht = t.split(':');
            let h: u32 = ht.next()?.parse().ok()?;
            let m: u32 = ht.next().unwrap_or("0").parse().ok()?;
            (h, m)
        }
        None => (0, 0),
    };
    if month == 0 || month > 12 || day == 0 {
        return None;
    }
    Some((year, month, day, hour, minute))
}

/// Decode one coordinate value into a fixed-width `YYYYMMDDhhmm` stamp.
pub fn decode_stamp(units: &TimeUnits, calendar: Calendar, value: f64) -> Result<String> {
    let (y, mo, d, h, mi) = decode_parts(units, calendar, value)?;
    Ok(format!("{y:04}{mo:02}{d:02}{h:02}{mi:02}"))
}

fn decode_parts(
    units: &TimeUnits,
    calendar: Calendar,
    value: f64,
) -> Result<(i32, u32, u32, u32, u32)> {
    let (oy, om, od, oh, omin) = units.origin;
    let offset_secs = (value * units.seconds_per_unit).round() as i64;
    match calendar {
        Calendar::Gregorian => {
            let origin = NaiveDate::from_ymd_opt(oy, om, od)
                .and_then(|d| d.and_hms_opt(oh, omin, 0))
                .ok_or_else(|| {
                    ClimopError::TimeDecode(format!("invalid origin {oy}-{om}-{od}"))
                })?;
            let t: NaiveDateTime = origin + Duration::seconds(offset_secs);
            use chrono::{Datelike, Timelike};
            Ok((t.year(), t.month(), t.day(), t.hour(), t.minute()))
        }
        Calendar::NoLeap => fixed_calendar(&DAYS_NOLEAP, 365, units.origin, offset_secs),
        Calendar::AllLeap => fixed_calendar(&DAYS_ALLLEAP, 366, units.origin, offset_secs),
        Calendar::Day360 => {
            let total = i64::from(oy) * 360 * 86400
                + i64::from(om - 1) * 30 * 86400
                + i64::from(od - 1) * 86400
                + i64::from(oh) * 3600
                + i64::from(omin) * 60
                + offset_secs;
            let days = total.div_euclid(86400);
            let secs = total.rem_euclid(86400);
            let year = days.div_euclid(360);
            let doy = days.rem_euclid(360);
            Ok((
                year as i32,
                (doy / 30 + 1) as u32,
                (doy % 30 + 1) as u32,
                (secs / 3600) as u32,
                (secs % 3600 / 60) as u32,
            ))
        }
    }
}

fn fixed_calendar(
    month_days: &[u32; 12],
    year_days: i64,
    origin: (i32, u32, u32, u32, u32),
    offset_secs: i64,
) -> Result<(i32, u32, u32, u32, u32)> {
    let (oy, om, od, oh, omin) = origin;
    let origin_doy: i64 = month_days[..(om as usize - 1)]
        .iter()
        .map(|&d| i64::from(d))
        .sum::<i64>()
        + i64::from(od - 1);
    let total = (i64::from(oy) * year_days + origin_doy) * 86400
        + i64::from(oh) * 3600
        + i64::from(omin) * 60
        + offset_secs;
    let days = total.div_euclid(86400);
    let secs = total.rem_euclid(86400);
    let year = days.div_euclid(year_days);
    let mut doy = days.rem_euclid(year_days) as u32;
    let mut month = 1u32;
    for &len in month_days {
        if doy < len {
            break;
        }
        doy -= len;
        month += 1;
    }
    Ok((
        year as i32,
        month,
        doy + 1,
        (secs / 3600) as u32,
        (secs % 3600 / 60) as u32,
    ))
}
