//! Line parsers for the plain text diagnostic files a GSI analysis leaves
//! behind (`fort.220` minimization output, `fort.2xx` observation fit
//! tables).
//!
//! Parsing is total: every line classifies as a record, as unrelated log
//! content, or as a malformed candidate row. Malformed rows are tallied and
//! surfaced to the caller instead of being dropped on the floor.

use std::fmt;
use std::io::{self, BufRead};

/// One `cost,grad,step,b,step?` minimization line from fort.220.
#[derive(Debug, Clone, PartialEq)]
pub struct CostRecord {
    pub outer_loop: u32,
    pub iteration: u32,
    pub cost: f64,
    pub gradient: f64,
}

/// One `all`-type observation fit row from a fort.2xx file.
#[derive(Debug, Clone, PartialEq)]
pub struct ObsFitRecord {
    pub iteration: u32,
    pub use_flag: String,
    pub count: u64,
    pub bias: f64,
    pub rms: f64,
    pub cpen: f64,
    pub qcpen: f64,
}

/// Classification of a single input line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineResult<T> {
    Record(T),
    /// Unrelated log content, skipped without comment.
    Other,
    /// Looked like a diagnostic row but did not parse.
    Malformed,
}

/// Records scraped from one file plus the count of malformed candidate rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeTally<T> {
    pub records: Vec<T>,
    pub malformed: usize,
}

/// A model domain index, `d01`, `d02`, ... Formatting the directory key in
/// one place keeps every caller off hand-built string keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Domain(u32);

impl Domain {
    /// Domains `d01..=d<max_dom>`.
    pub fn list(max_dom: u32) -> Vec<Domain> {
        (1..=max_dom).map(Domain).collect()
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "d{:02}", self.0)
    }
}

/// Parse one fort.220 line. Cost lines look like
///
/// ```text
/// cost,grad,step,b,step? =   1   9  4.874513E+04  3.356470E+01  6.178E-01 good
/// ```
///
/// where the first two values after the `=` are the outer loop and the
/// iteration within it, followed by the cost function value and the gradient
/// norm.
pub fn parse_cost_line(line: &str) -> LineResult<CostRecord> {
    let mut sections = line.split(',');

    match sections.next() {
        Some("cost") => {}
        _ => return LineResult::Other,
    }

    let tail = match sections.last() {
        Some(tail) => tail,
        None => return LineResult::Malformed,
    };

    // tail is "step? = LOOP ITER COST GRAD ..." - values start at index 2
    let fields: Vec<&str> = tail.split_whitespace().collect();
    if fields.len() < 6 {
        return LineResult::Malformed;
    }

    let parsed = (
        fields[2].parse::<u32>(),
        fields[3].parse::<u32>(),
        fields[4].parse::<f64>(),
        fields[5].parse::<f64>(),
    );

    match parsed {
        (Ok(outer_loop), Ok(iteration), Ok(cost), Ok(gradient)) => LineResult::Record(CostRecord {
            outer_loop,
            iteration,
            cost,
            gradient,
        }),
        _ => LineResult::Malformed,
    }
}

/// Parse one fort.2xx observation fit line. The rows of interest carry `all`
/// in the observation-type column, with the fields
/// `iteration use-flag type count bias rms cpen qcpen`:
///
/// ```text
///  o-g 01 asm  all  226448     0.19       2.43     1.37     1.10
/// ```
pub fn parse_obs_fit_line(line: &str) -> LineResult<ObsFitRecord> {
    let fields: Vec<&str> = line.split_whitespace().collect();

    if fields.get(3) != Some(&"all") {
        return LineResult::Other;
    }
    if fields.len() < 9 {
        return LineResult::Malformed;
    }

    let parsed = (
        fields[1].parse::<u32>(),
        fields[4].parse::<u64>(),
        fields[5].parse::<f64>(),
        fields[6].parse::<f64>(),
        fields[7].parse::<f64>(),
        fields[8].parse::<f64>(),
    );

    match parsed {
        (Ok(iteration), Ok(count), Ok(bias), Ok(rms), Ok(cpen), Ok(qcpen)) => {
            LineResult::Record(ObsFitRecord {
                iteration,
                use_flag: fields[2].to_string(),
                count,
                bias,
                rms,
                cpen,
                qcpen,
            })
        }
        _ => LineResult::Malformed,
    }
}

/// Scrape every cost record out of a fort.220 stream.
pub fn scrape_cost<R: BufRead>(reader: R) -> io::Result<ScrapeTally<CostRecord>> {
    scrape(reader, parse_cost_line)
}

/// Scrape every `all`-type fit record out of a fort.2xx stream.
pub fn scrape_obs_fit<R: BufRead>(reader: R) -> io::Result<ScrapeTally<ObsFitRecord>> {
    scrape(reader, parse_obs_fit_line)
}

fn scrape<R, T, F>(reader: R, parse: F) -> io::Result<ScrapeTally<T>>
where
    R: BufRead,
    F: Fn(&str) -> LineResult<T>,
{
    let mut tally = ScrapeTally {
        records: vec![],
        malformed: 0,
    };

    for line in reader.lines() {
        match parse(&line?) {
            LineResult::Record(record) => tally.records.push(record),
            LineResult::Other => {}
            LineResult::Malformed => tally.malformed += 1,
        }
    }

    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORT_220: &str = "\
pcgsoi: gnorm(1:2)= 1.126312819570464E+03 1.126312819570464E+03
cost,grad,step,b,step? =   1   0  4.874513265845077E+04  3.356470591883441E+01  6.178E-01 good
cost,grad,step,b,step? =   1   1  4.861036804821869E+04  2.647252040041709E+01  5.923E-01 good
penalty and grad reduction WRT outer and initial iter=
cost,grad,step,b,step? =   2   0  4.701837352821981E+04  1.154736193120680E+01  4.871E-01 good
";

    const FORT_201: &str = "\
 ptop        1000.0   900.0   800.0
 it obs type styp  count    bias     rms    cpen   qcpen
 o-g 01 asm  all  226448    0.19    2.43    1.37    1.10
 o-g 01 rej  all     312    1.02    4.87    2.56    2.31
 o-g 03 asm  all  226501    0.04    2.21    1.12    0.98
";

    #[test]
    fn cost_lines_parse_loop_iter_cost_and_gradient() {
        let parsed = parse_cost_line(
            "cost,grad,step,b,step? =   1   9  4.874513E+04  3.356470E+01  6.178E-01 good",
        );

        assert_eq!(
            parsed,
            LineResult::Record(CostRecord {
                outer_loop: 1,
                iteration: 9,
                cost: 4.874513E+04,
                gradient: 3.356470E+01,
            })
        );
    }

    #[test]
    fn non_cost_lines_are_other_content() {
        assert_eq!(
            parse_cost_line("pcgsoi: gnorm(1:2)= 1.12E+03 1.12E+03"),
            LineResult::Other
        );
        assert_eq!(parse_cost_line(""), LineResult::Other);
    }

    #[test]
    fn truncated_cost_lines_are_malformed_not_dropped() {
        assert_eq!(
            parse_cost_line("cost,grad,step,b,step? =   1   9"),
            LineResult::Malformed
        );
        assert_eq!(
            parse_cost_line("cost,grad,step,b,step? =   1   x  4.8E+04  3.3E+01  0.6 good"),
            LineResult::Malformed
        );
    }

    #[test]
    fn fort_220_stream_scrapes_every_cost_row() {
        let tally = scrape_cost(FORT_220.as_bytes()).unwrap();

        assert_eq!(tally.records.len(), 3);
        assert_eq!(tally.malformed, 0);
        assert_eq!(tally.records[0].outer_loop, 1);
        assert_eq!(tally.records[0].iteration, 0);
        assert_eq!(tally.records[2].outer_loop, 2);
        assert!(tally.records[2].cost < tally.records[0].cost);
    }

    #[test]
    fn obs_fit_rows_keep_only_the_all_type() {
        let tally = scrape_obs_fit(FORT_201.as_bytes()).unwrap();

        assert_eq!(tally.records.len(), 3);
        assert_eq!(tally.malformed, 0);
        assert_eq!(tally.records[0].iteration, 1);
        assert_eq!(tally.records[0].use_flag, "asm");
        assert_eq!(tally.records[0].count, 226448);
        assert_eq!(tally.records[1].use_flag, "rej");
        assert_eq!(tally.records[2].iteration, 3);
    }

    #[test]
    fn malformed_all_rows_are_tallied() {
        let input = " o-g 01 asm  all  not-a-count  0.19  2.43  1.37  1.10\n\
                      o-g 01 asm  all  226448  0.19  2.43  1.37  1.10\n";
        let tally = scrape_obs_fit(input.as_bytes()).unwrap();

        assert_eq!(tally.records.len(), 1);
        assert_eq!(tally.malformed, 1);
    }

    #[test]
    fn domains_format_as_two_digit_keys() {
        let doms = Domain::list(2);
        assert_eq!(doms.len(), 2);
        assert_eq!(doms[0].to_string(), "d01");
        assert_eq!(doms[1].to_string(), "d02");
        assert_eq!(Domain::list(0), vec![]);
    }
}
