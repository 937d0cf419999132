//! Enumeration of cycle zero-hours and forecast lead hours for a cycling
//! forecast workflow.
//!
//! Every downloader and log scraper in this crate works through the same
//! request schedule: a range of forecast initialization times ("cycles") at a
//! fixed interval, each paired with the same ladder of forecast lead hours.
//! The enumeration here is pure; callers turn the resulting timestamps and
//! hour counts into URLs, directory names, or lookup keys themselves.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use itertools::iproduct;
use thiserror::Error;

/// Invalid schedule parameters. Each variant names the offending parameter so
/// a bad configuration aborts loudly instead of producing a partial schedule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleConfigError {
    #[error("end time {end} precedes start time {start}")]
    InvertedRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    #[error("cycle interval must be non-negative, got {0} hours")]
    NegativeCycleInterval(i64),
    #[error("forecast interval must be positive, got 0 hours")]
    ZeroForecastInterval,
    #[error("forecast interval must be positive, got {0} hours")]
    NegativeForecastInterval(i64),
    #[error("max forecast hours must be non-negative, got {0}")]
    NegativeMaxForecast(i64),
    #[error("end date {end} precedes start date {start}")]
    InvertedDateRange { start: NaiveDate, end: NaiveDate },
    #[error("date window length must be positive, got {0} days")]
    NonPositiveWindow(i64),
    #[error("first hour of the day must be in 0..=23, got {0}")]
    StartHourOutOfRange(i64),
    #[error("hour interval must be positive, got {0}")]
    NonPositiveHourInterval(i64),
}

/// Validated parameters for one cycling schedule.
///
/// Construction is the only fallible step; every enumeration method on a
/// validated spec is infallible. Scripts build one of these from their
/// command line arguments and pass it down, rather than threading five loose
/// integers around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSpec {
    start: NaiveDateTime,
    end: NaiveDateTime,
    cycle_interval: i64,
    forecast_interval: i64,
    max_forecast: i64,
}

impl CycleSpec {
    pub fn new(
        start: NaiveDateTime,
        end: NaiveDateTime,
        cycle_interval_hours: i64,
        forecast_interval_hours: i64,
        max_forecast_hours: i64,
    ) -> Result<Self, ScheduleConfigError> {
        check_cycle_range(start, end, cycle_interval_hours)?;
        check_leads(forecast_interval_hours, max_forecast_hours)?;

        Ok(CycleSpec {
            start,
            end,
            cycle_interval: cycle_interval_hours,
            forecast_interval: forecast_interval_hours,
            max_forecast: max_forecast_hours,
        })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// The cycle zero-hours, earliest first.
    pub fn cycles(&self) -> Vec<NaiveDateTime> {
        cycle_points(self.start, self.end, self.cycle_interval)
    }

    /// The forecast lead hours, ascending from zero. The same ladder applies
    /// to every cycle.
    pub fn leads(&self) -> Vec<i64> {
        lead_points(self.forecast_interval, self.max_forecast)
    }

    /// The complete request schedule: every cycle paired with every lead,
    /// ordered by cycle then lead.
    pub fn requests(&self) -> Vec<(NaiveDateTime, i64)> {
        iproduct!(self.cycles(), self.leads()).collect()
    }
}

/// Enumerate forecast cycle zero-hours from `start` through `end` at
/// `cycle_interval_hours` spacing.
///
/// A zero interval or a zero-width range collapses to the single cycle
/// `[start]`. Otherwise the count of cycles is
/// `floor(hours_between(start, end) / interval) + 1`; when the range is not
/// an exact multiple of the interval the last cycle falls short of `end`,
/// never past it. Sub-hour residue in the range is discarded by the
/// truncating step count.
pub fn cycles(
    start: NaiveDateTime,
    end: NaiveDateTime,
    cycle_interval_hours: i64,
) -> Result<Vec<NaiveDateTime>, ScheduleConfigError> {
    check_cycle_range(start, end, cycle_interval_hours)?;
    Ok(cycle_points(start, end, cycle_interval_hours))
}

/// Enumerate forecast lead hours `0, f, 2f, ..., floor(m/f) * f`.
///
/// The lead values stay numeric; rendering them as two- or three-digit
/// zero-padded strings (the remote archives changed width over time) is the
/// caller's business, and both widths must come from the same value.
pub fn leads(
    forecast_interval_hours: i64,
    max_forecast_hours: i64,
) -> Result<Vec<i64>, ScheduleConfigError> {
    check_leads(forecast_interval_hours, max_forecast_hours)?;
    Ok(lead_points(forecast_interval_hours, max_forecast_hours))
}

/// Partition the inclusive date range `start..=end` into consecutive windows
/// of `window_days` days for combined-file retrievals.
///
/// The final window truncates at `end`, covering whatever remainder is left.
/// Windows are `(first_day, last_day)` inclusive pairs with no gaps and no
/// overlap.
pub fn date_windows(
    start: NaiveDate,
    end: NaiveDate,
    window_days: i64,
) -> Result<Vec<(NaiveDate, NaiveDate)>, ScheduleConfigError> {
    if end < start {
        return Err(ScheduleConfigError::InvertedDateRange { start, end });
    }
    if window_days <= 0 {
        return Err(ScheduleConfigError::NonPositiveWindow(window_days));
    }

    let span_days = (end - start).num_days() + 1;
    let mut windows = vec![];
    let mut offset = 0;

    loop {
        let first = start + Duration::days(offset);
        if offset + window_days >= span_days {
            // last window, truncated at the end of the range
            windows.push((first, end));
            break;
        }
        windows.push((first, first + Duration::days(window_days - 1)));
        offset += window_days;
    }

    Ok(windows)
}

/// Enumerate the valid hours within one day starting at `start_hour` with
/// `hour_interval` spacing, stopping before hour 24.
pub fn daily_hours(start_hour: i64, hour_interval: i64) -> Result<Vec<u32>, ScheduleConfigError> {
    if !(0..24).contains(&start_hour) {
        return Err(ScheduleConfigError::StartHourOutOfRange(start_hour));
    }
    if hour_interval <= 0 {
        return Err(ScheduleConfigError::NonPositiveHourInterval(hour_interval));
    }

    let mut hours = vec![];
    let mut hour = start_hour;
    while hour < 24 {
        hours.push(hour as u32);
        hour += hour_interval;
    }

    Ok(hours)
}

fn check_cycle_range(
    start: NaiveDateTime,
    end: NaiveDateTime,
    cycle_interval_hours: i64,
) -> Result<(), ScheduleConfigError> {
    if end < start {
        return Err(ScheduleConfigError::InvertedRange { start, end });
    }
    if cycle_interval_hours < 0 {
        return Err(ScheduleConfigError::NegativeCycleInterval(
            cycle_interval_hours,
        ));
    }
    Ok(())
}

fn check_leads(
    forecast_interval_hours: i64,
    max_forecast_hours: i64,
) -> Result<(), ScheduleConfigError> {
    if forecast_interval_hours == 0 {
        return Err(ScheduleConfigError::ZeroForecastInterval);
    }
    if forecast_interval_hours < 0 {
        return Err(ScheduleConfigError::NegativeForecastInterval(
            forecast_interval_hours,
        ));
    }
    if max_forecast_hours < 0 {
        return Err(ScheduleConfigError::NegativeMaxForecast(max_forecast_hours));
    }
    Ok(())
}

fn cycle_points(start: NaiveDateTime, end: NaiveDateTime, interval: i64) -> Vec<NaiveDateTime> {
    if interval == 0 || start == end {
        return vec![start];
    }

    let total_hours = (end - start).num_hours();
    let steps = total_hours / interval;

    (0..=steps)
        .map(|k| start + Duration::hours(k * interval))
        .collect()
}

fn lead_points(interval: i64, max: i64) -> Vec<i64> {
    let steps = max / interval;
    (0..=steps).map(|k| k * interval).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, mo: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd(y, mo, d).and_hms(h, 0, 0)
    }

    #[test]
    fn zero_width_range_yields_the_start_cycle_only() {
        let s = dt(2019, 2, 8, 0);
        for interval in &[0, 1, 6, 24, 1000] {
            assert_eq!(cycles(s, s, *interval).unwrap(), vec![s]);
        }
    }

    #[test]
    fn zero_interval_yields_the_start_cycle_only() {
        let s = dt(2019, 2, 8, 0);
        let e = dt(2019, 2, 15, 0);
        assert_eq!(cycles(s, e, 0).unwrap(), vec![s]);
    }

    #[test]
    fn cycle_count_is_floor_of_elapsed_over_interval_plus_one() {
        let s = dt(2022, 12, 23, 0);
        let e = dt(2022, 12, 27, 0); // 96 hours
        assert_eq!(cycles(s, e, 24).unwrap().len(), 5);
        assert_eq!(cycles(s, e, 6).unwrap().len(), 17);
        assert_eq!(cycles(s, e, 7).unwrap().len(), 14); // 96 / 7 = 13
    }

    #[test]
    fn cycles_stay_in_range_and_are_evenly_spaced() {
        let s = dt(2019, 2, 9, 0);
        let e = dt(2019, 2, 15, 0);
        let cyc = cycles(s, e, 6).unwrap();

        assert_eq!(*cyc.first().unwrap(), s);
        for c in &cyc {
            assert!(*c >= s && *c <= e);
        }
        for pair in cyc.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::hours(6));
        }
    }

    #[test]
    fn last_cycle_falls_short_when_range_is_not_a_multiple() {
        let s = dt(2019, 2, 8, 0);
        let e = dt(2019, 2, 8, 7);
        let cyc = cycles(s, e, 3).unwrap();
        assert_eq!(cyc, vec![s, dt(2019, 2, 8, 3), dt(2019, 2, 8, 6)]);
    }

    #[test]
    fn single_cycle_interval_spanning_one_step() {
        let cyc = cycles(dt(2019, 2, 8, 0), dt(2019, 2, 8, 6), 6).unwrap();
        assert_eq!(cyc, vec![dt(2019, 2, 8, 0), dt(2019, 2, 8, 6)]);
    }

    #[test]
    fn inverted_range_is_rejected() {
        let s = dt(2019, 2, 9, 0);
        let e = dt(2019, 2, 8, 0);
        match cycles(s, e, 6) {
            Err(ScheduleConfigError::InvertedRange { .. }) => {}
            other => panic!("expected inverted range error, got {:?}", other),
        }
    }

    #[test]
    fn negative_cycle_interval_is_rejected() {
        let s = dt(2019, 2, 8, 0);
        let e = dt(2019, 2, 9, 0);
        assert_eq!(
            cycles(s, e, -6),
            Err(ScheduleConfigError::NegativeCycleInterval(-6))
        );
    }

    #[test]
    fn leads_run_from_zero_to_the_last_whole_step() {
        assert_eq!(leads(6, 18).unwrap(), vec![0, 6, 12, 18]);
        assert_eq!(leads(3, 6).unwrap(), vec![0, 3, 6]);
        assert_eq!(leads(3, 120).unwrap().len(), 41);

        // max not a multiple of the interval: stop at the last whole step
        let l = leads(6, 20).unwrap();
        assert_eq!(l, vec![0, 6, 12, 18]);
    }

    #[test]
    fn lead_spacing_is_the_forecast_interval() {
        let l = leads(3, 120).unwrap();
        assert_eq!(*l.first().unwrap(), 0);
        assert_eq!(*l.last().unwrap(), 120);
        for pair in l.windows(2) {
            assert_eq!(pair[1] - pair[0], 3);
        }
    }

    #[test]
    fn max_forecast_below_interval_yields_the_analysis_hour_only() {
        assert_eq!(leads(6, 5).unwrap(), vec![0]);
        assert_eq!(leads(6, 0).unwrap(), vec![0]);
    }

    #[test]
    fn zero_forecast_interval_is_rejected_not_a_division_fault() {
        for max in &[0, 6, 120] {
            assert_eq!(leads(0, *max), Err(ScheduleConfigError::ZeroForecastInterval));
        }
    }

    #[test]
    fn negative_forecast_parameters_are_rejected() {
        assert_eq!(
            leads(-3, 12),
            Err(ScheduleConfigError::NegativeForecastInterval(-3))
        );
        assert_eq!(leads(3, -12), Err(ScheduleConfigError::NegativeMaxForecast(-12)));
    }

    #[test]
    fn enumeration_is_repeatable() {
        let s = dt(2019, 2, 8, 0);
        let e = dt(2019, 2, 15, 0);
        assert_eq!(cycles(s, e, 6).unwrap(), cycles(s, e, 6).unwrap());
        assert_eq!(leads(3, 120).unwrap(), leads(3, 120).unwrap());
    }

    #[test]
    fn lead_hours_render_at_both_archive_widths() {
        let rendered_2: Vec<String> = leads(3, 6)
            .unwrap()
            .iter()
            .map(|l| format!("{:02}", l))
            .collect();
        let rendered_3: Vec<String> = leads(3, 6)
            .unwrap()
            .iter()
            .map(|l| format!("{:03}", l))
            .collect();

        assert_eq!(rendered_2, vec!["00", "03", "06"]);
        assert_eq!(rendered_3, vec!["000", "003", "006"]);
    }

    #[test]
    fn three_digit_leads_are_not_truncated_by_two_digit_padding() {
        let l = leads(6, 384).unwrap();
        assert_eq!(format!("{:02}", l.last().unwrap()), "384");
        assert_eq!(format!("{:03}", l.last().unwrap()), "384");
    }

    #[test]
    fn requests_are_the_product_of_cycles_and_leads_cycle_major() {
        let spec = CycleSpec::new(dt(2019, 2, 8, 0), dt(2019, 2, 8, 6), 6, 3, 6).unwrap();
        let reqs = spec.requests();

        assert_eq!(
            reqs,
            vec![
                (dt(2019, 2, 8, 0), 0),
                (dt(2019, 2, 8, 0), 3),
                (dt(2019, 2, 8, 0), 6),
                (dt(2019, 2, 8, 6), 0),
                (dt(2019, 2, 8, 6), 3),
                (dt(2019, 2, 8, 6), 6),
            ]
        );
    }

    #[test]
    fn cycle_spec_validates_every_parameter() {
        let s = dt(2019, 2, 8, 0);
        let e = dt(2019, 2, 9, 0);
        assert!(CycleSpec::new(s, e, 6, 3, 120).is_ok());
        assert!(CycleSpec::new(e, s, 6, 3, 120).is_err());
        assert!(CycleSpec::new(s, e, -6, 3, 120).is_err());
        assert!(CycleSpec::new(s, e, 6, 0, 120).is_err());
        assert!(CycleSpec::new(s, e, 6, 3, -1).is_err());
    }

    fn day(y: i32, mo: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd(y, mo, d)
    }

    #[test]
    fn date_windows_cover_the_range_without_gaps() {
        let w = date_windows(day(2019, 2, 1), day(2019, 2, 10), 4).unwrap();
        assert_eq!(
            w,
            vec![
                (day(2019, 2, 1), day(2019, 2, 4)),
                (day(2019, 2, 5), day(2019, 2, 8)),
                (day(2019, 2, 9), day(2019, 2, 10)),
            ]
        );
    }

    #[test]
    fn date_windows_exact_multiple_ends_on_a_full_window() {
        let w = date_windows(day(2019, 2, 1), day(2019, 2, 10), 5).unwrap();
        assert_eq!(
            w,
            vec![
                (day(2019, 2, 1), day(2019, 2, 5)),
                (day(2019, 2, 6), day(2019, 2, 10)),
            ]
        );
    }

    #[test]
    fn single_day_range_is_a_single_window() {
        let w = date_windows(day(2019, 2, 8), day(2019, 2, 8), 1).unwrap();
        assert_eq!(w, vec![(day(2019, 2, 8), day(2019, 2, 8))]);
    }

    #[test]
    fn date_window_parameters_are_validated() {
        assert!(date_windows(day(2019, 2, 9), day(2019, 2, 8), 1).is_err());
        assert_eq!(
            date_windows(day(2019, 2, 8), day(2019, 2, 9), 0),
            Err(ScheduleConfigError::NonPositiveWindow(0))
        );
    }

    #[test]
    fn daily_hours_stop_before_the_next_day() {
        assert_eq!(daily_hours(11, 1).unwrap(), (11..24).collect::<Vec<u32>>());
        assert_eq!(daily_hours(0, 6).unwrap(), vec![0, 6, 12, 18]);
        assert_eq!(daily_hours(23, 6).unwrap(), vec![23]);
    }

    #[test]
    fn daily_hour_parameters_are_validated() {
        assert_eq!(
            daily_hours(24, 1),
            Err(ScheduleConfigError::StartHourOutOfRange(24))
        );
        assert_eq!(
            daily_hours(0, 0),
            Err(ScheduleConfigError::NonPositiveHourInterval(0))
        );
    }
}
