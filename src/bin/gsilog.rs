//! GSI diagnostic log scraper.
//!
//! Walks the analysis directories of a cycling experiment, scrapes the GSI
//! minimization diagnostics (fort.220) or an observation fit table
//! (fort.2xx) into CSV time series per domain, prints a per-cycle summary,
//! and optionally draws terminal charts of the cost function and gradient
//! norm.
use chrono::NaiveDateTime;
use clap::{crate_version, App, Arg, ArgMatches};
use cyckit::gsi::{scrape_cost, scrape_obs_fit, CostRecord, Domain, ObsFitRecord};
use cyckit::{bail, cycles, parse_date_string, TablePrinter};
use dirs::home_dir;
use std::{
    error::Error,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use textplots::{Chart, Plot, Shape};

fn main() {
    if let Err(e) = run() {
        println!("error: {}", e);

        let mut err = &*e;

        while let Some(cause) = err.source() {
            println!("caused by: {}", cause);
            err = cause;
        }

        ::std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args = parse_args()?;

    let analysis_cycles = cycles(args.start, args.end, args.cycle_int)?;

    for &domain in &args.domains {
        println!("Processing domain {}", domain);

        match args.kind {
            ScrapeKind::Cost => scrape_cost_series(&args, domain, &analysis_cycles)?,
            ScrapeKind::Fit => scrape_fit_series(&args, domain, &analysis_cycles)?,
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScrapeKind {
    Cost,
    Fit,
}

#[derive(Debug)]
struct CmdLineArgs {
    root: PathBuf,
    case: String,
    flow: String,
    start: NaiveDateTime,
    end: NaiveDateTime,
    cycle_int: i64,
    domains: Vec<Domain>,
    kind: ScrapeKind,
    fort_ext: String,
    save_dir: Option<PathBuf>,
    print: bool,
}

fn parse_args() -> Result<CmdLineArgs, Box<dyn Error>> {
    let matches = App::new("gsilog")
        .author("Colin <cgrudzien@users.noreply.github.com>")
        .version(crate_version!())
        .about("Scrape GSI diagnostic files into CSV time series.")
        .arg(
            Arg::with_name("kind")
                .index(1)
                .required(true)
                .possible_values(&["cost", "fit"])
                .help("Which diagnostic to scrape.")
                .long_help(concat!(
                    "Which diagnostic to scrape: 'cost' reads the fort.220 minimization",
                    " output, 'fit' reads an observation fit table selected with --fort."
                )),
        )
        .arg(
            Arg::with_name("case")
                .long("case")
                .takes_value(true)
                .required(true)
                .help("Case study sub directory (e.g. VD)."),
        )
        .arg(
            Arg::with_name("flow")
                .long("flow")
                .takes_value(true)
                .required(true)
                .help("Control flow to analyze (e.g. 3denvar_lag00_b0.00_v03_h0300)."),
        )
        .arg(
            Arg::with_name("start")
                .long("start")
                .takes_value(true)
                .required(true)
                .help("The first analysis cycle. YYYY-MM-DDTHH:MM:SS or YYYY-MM-DD-HH"),
        )
        .arg(
            Arg::with_name("end")
                .long("end")
                .takes_value(true)
                .required(true)
                .help("The last analysis cycle. YYYY-MM-DDTHH:MM:SS or YYYY-MM-DD-HH"),
        )
        .arg(
            Arg::with_name("cycle-int")
                .long("cycle-int")
                .takes_value(true)
                .default_value("6")
                .help("Hours between analysis cycles."),
        )
        .arg(
            Arg::with_name("max-dom")
                .long("max-dom")
                .takes_value(true)
                .default_value("1")
                .help("Number of model domains to process."),
        )
        .arg(
            Arg::with_name("fort")
                .long("fort")
                .takes_value(true)
                .default_value("201")
                .help("Extension of the observation fit file to scrape (fit kind only)."),
        )
        .arg(
            Arg::with_name("save-dir")
                .long("save-dir")
                .takes_value(true)
                .help("Directory to save .csv files to.")
                .long_help(concat!(
                    "Directory to save .csv files to. If this is specified then a file is",
                    " created for each domain with the scraped time series."
                )),
        )
        .arg(
            Arg::with_name("print")
                .long("print")
                .short("p")
                .possible_values(&["Y", "N", "y", "n"])
                .default_value("y")
                .takes_value(true)
                .help("Print summaries and charts to the terminal."),
        )
        .arg(
            Arg::with_name("root")
                .short("r")
                .long("root")
                .takes_value(true)
                .help("Root directory of the simulation I/O tree."),
        )
        .get_matches();

    let root = matches
        .value_of("root")
        .map(PathBuf::from)
        .or_else(|| home_dir().map(|hd| hd.join("cyckit").join("simulation_io")))
        .expect("Invalid root.");

    let kind = match matches.value_of("kind").unwrap() {
        "cost" => ScrapeKind::Cost,
        _ => ScrapeKind::Fit,
    };

    let max_dom: u32 = matches
        .value_of("max-dom")
        .unwrap()
        .parse()
        .unwrap_or_else(|_| bail("Could not parse --max-dom."));
    if max_dom == 0 {
        bail("--max-dom must be at least 1.");
    }

    let cycle_int: i64 = matches
        .value_of("cycle-int")
        .unwrap()
        .parse()
        .unwrap_or_else(|_| bail("Could not parse --cycle-int."));

    let save_dir: Option<PathBuf> = matches.value_of("save-dir").map(PathBuf::from);

    if let Some(ref save_dir) = save_dir {
        if !save_dir.is_dir() {
            bail(&format!(
                "save-dir path {} does not exist.",
                save_dir.display()
            ));
        }
    }

    let print = {
        let arg_val = matches.value_of("print").unwrap(); // Safe, this has a default.
        arg_val == "Y" || arg_val == "y"
    };

    Ok(CmdLineArgs {
        root,
        case: matches.value_of("case").unwrap().to_string(),
        flow: matches.value_of("flow").unwrap().to_string(),
        start: parse_date_string(matches.value_of("start").unwrap()),
        end: parse_date_string(matches.value_of("end").unwrap()),
        cycle_int,
        domains: Domain::list(max_dom),
        kind,
        fort_ext: matches.value_of("fort").unwrap().to_string(),
        save_dir,
        print,
    })
}

// <root>/<case>/<flow>/<YYYYMMDDHH>/gsiprd/<dNN>/fort.<ext>
fn fort_path(args: &CmdLineArgs, cycle: NaiveDateTime, domain: Domain, ext: &str) -> PathBuf {
    args.root
        .join(&args.case)
        .join(&args.flow)
        .join(cycle.format("%Y%m%d%H").to_string())
        .join("gsiprd")
        .join(domain.to_string())
        .join(format!("fort.{}", ext))
}

struct CycleSummary {
    cycle: NaiveDateTime,
    records: usize,
    missing: bool,
}

fn scrape_cost_series(
    args: &CmdLineArgs,
    domain: Domain,
    analysis_cycles: &[NaiveDateTime],
) -> Result<(), Box<dyn Error>> {
    let mut series: Vec<(NaiveDateTime, usize, CostRecord)> = vec![];
    let mut summaries: Vec<CycleSummary> = vec![];
    let mut malformed = 0;
    let mut step = 0;

    for &cycle in analysis_cycles {
        let path = fort_path(args, cycle, domain, "220");

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(_) => {
                println!("    No diagnostic file at {}", path.display());
                summaries.push(CycleSummary {
                    cycle,
                    records: 0,
                    missing: true,
                });
                continue;
            }
        };

        let tally = scrape_cost(BufReader::new(file))?;
        malformed += tally.malformed;
        summaries.push(CycleSummary {
            cycle,
            records: tally.records.len(),
            missing: false,
        });

        for record in tally.records {
            step += 1;
            series.push((cycle, step, record));
        }
    }

    if let Some(ref save_dir) = args.save_dir {
        let path = csv_path(save_dir, args, domain, "cost_grad");
        write_cost_csv(&path, &series)?;
        println!("    Wrote {}", path.display());
    }

    if args.print {
        print_summary_table(domain, &summaries, malformed);
        print_cost_charts(domain, &series);
    }

    Ok(())
}

fn scrape_fit_series(
    args: &CmdLineArgs,
    domain: Domain,
    analysis_cycles: &[NaiveDateTime],
) -> Result<(), Box<dyn Error>> {
    let mut series: Vec<(NaiveDateTime, usize, ObsFitRecord)> = vec![];
    let mut summaries: Vec<CycleSummary> = vec![];
    let mut malformed = 0;
    let mut step = 0;

    for &cycle in analysis_cycles {
        let path = fort_path(args, cycle, domain, &args.fort_ext);

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(_) => {
                println!("    No diagnostic file at {}", path.display());
                summaries.push(CycleSummary {
                    cycle,
                    records: 0,
                    missing: true,
                });
                continue;
            }
        };

        let tally = scrape_obs_fit(BufReader::new(file))?;
        malformed += tally.malformed;
        summaries.push(CycleSummary {
            cycle,
            records: tally.records.len(),
            missing: false,
        });

        for record in tally.records {
            step += 1;
            series.push((cycle, step, record));
        }
    }

    if let Some(ref save_dir) = args.save_dir {
        let path = csv_path(save_dir, args, domain, &format!("fort_{}", args.fort_ext));
        write_fit_csv(&path, &series)?;
        println!("    Wrote {}", path.display());
    }

    if args.print {
        print_summary_table(domain, &summaries, malformed);
    }

    Ok(())
}

fn csv_path(save_dir: &Path, args: &CmdLineArgs, domain: Domain, label: &str) -> PathBuf {
    let file_name = format!(
        "GSI_{}_{}_{}_{}_{}_to_{}.csv",
        label,
        args.case,
        args.flow,
        domain,
        args.start.format("%Y%m%d%H"),
        args.end.format("%Y%m%d%H")
    );

    save_dir.join(file_name)
}

fn write_cost_csv(
    path: &Path,
    series: &[(NaiveDateTime, usize, CostRecord)],
) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    let mut wtr = csv::Writer::from_writer(file);

    wtr.write_record(&["date", "loop", "iter", "cost", "grad", "step"])?;

    for (cycle, step, record) in series {
        wtr.write_record(&[
            format!("{}", cycle),
            format!("{}", record.outer_loop),
            format!("{}", record.iteration),
            format!("{}", record.cost),
            format!("{}", record.gradient),
            format!("{}", step),
        ])?;
    }

    Ok(())
}

fn write_fit_csv(
    path: &Path,
    series: &[(NaiveDateTime, usize, ObsFitRecord)],
) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    let mut wtr = csv::Writer::from_writer(file);

    wtr.write_record(&[
        "date", "iter", "use", "count", "bias", "rms", "cpen", "qcpen", "step",
    ])?;

    for (cycle, step, record) in series {
        wtr.write_record(&[
            format!("{}", cycle),
            format!("{}", record.iteration),
            record.use_flag.clone(),
            format!("{}", record.count),
            format!("{}", record.bias),
            format!("{}", record.rms),
            format!("{}", record.cpen),
            format!("{}", record.qcpen),
            format!("{}", step),
        ])?;
    }

    Ok(())
}

fn print_summary_table(domain: Domain, summaries: &[CycleSummary], malformed: usize) {
    let cycle_col: Vec<String> = summaries
        .iter()
        .map(|s| s.cycle.format("%Y-%m-%d %HZ").to_string())
        .collect();
    let record_col: Vec<String> = summaries
        .iter()
        .map(|s| {
            if s.missing {
                "missing".to_string()
            } else {
                format!("{}", s.records)
            }
        })
        .collect();

    TablePrinter::new()
        .with_title(format!("Scraped records for {}", domain))
        .with_footer(format!("{} malformed line(s) skipped.", malformed))
        .with_column("Cycle", &cycle_col)
        .with_column("Records", &record_col)
        .print();
}

fn print_cost_charts(domain: Domain, series: &[(NaiveDateTime, usize, CostRecord)]) {
    if series.is_empty() {
        return;
    }

    let max_step = series.last().map(|(_, step, _)| *step).unwrap_or(0) as f32;

    let cost_points: Vec<(f32, f32)> = series
        .iter()
        .map(|(_, step, record)| (*step as f32, record.cost as f32))
        .collect();
    let grad_points: Vec<(f32, f32)> = series
        .iter()
        .map(|(_, step, record)| (*step as f32, record.gradient as f32))
        .collect();

    println!("{:^78}", format!("{} cost function by iteration step", domain));
    Chart::new(160, 45, 0.0, max_step)
        .lineplot(&Shape::Lines(cost_points.as_slice()))
        .nice();

    println!("{:^78}", format!("{} gradient norm by iteration step", domain));
    Chart::new(160, 45, 0.0, max_step)
        .lineplot(&Shape::Lines(grad_points.as_slice()))
        .nice();
}
