use chrono::{NaiveDate, NaiveDateTime};

pub fn bail(msg: &str) -> ! {
    println!("{}", msg);
    ::std::process::exit(1);
}

/// Parse a cycle timestamp in either the ISO form the workflow configurations
/// use ("2019-02-08T00:00:00") or the short "2019-02-08-00" form.
pub fn parse_date_string(dt_str: &str) -> NaiveDateTime {
    if let Ok(dt) = NaiveDateTime::parse_from_str(dt_str, "%Y-%m-%dT%H:%M:%S") {
        return dt;
    }

    if dt_str.len() > 11 {
        let date = NaiveDate::parse_from_str(&dt_str[..10], "%Y-%m-%d");
        let hour = dt_str[11..].parse::<u32>();

        if let (Ok(date), Ok(hour)) = (date, hour) {
            if hour < 24 {
                return date.and_hms(hour, 0, 0);
            }
        }
    }

    bail(&format!("Could not parse date: {}", dt_str))
}

/// Parse a date with day precision, "2019-02-08".
pub fn parse_day_string(d_str: &str) -> NaiveDate {
    match NaiveDate::parse_from_str(d_str, "%Y-%m-%d") {
        Ok(date) => date,
        Err(_) => bail(&format!("Could not parse date: {}", d_str)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_and_short_forms_parse_to_the_same_cycle() {
        let iso = parse_date_string("2019-02-08T06:00:00");
        let short = parse_date_string("2019-02-08-06");
        assert_eq!(iso, short);
        assert_eq!(iso, NaiveDate::from_ymd(2019, 2, 8).and_hms(6, 0, 0));
    }

    #[test]
    fn day_strings_parse_at_day_precision() {
        assert_eq!(
            parse_day_string("2022-12-23"),
            NaiveDate::from_ymd(2022, 12, 23)
        );
    }
}
