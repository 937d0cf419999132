//! GEFS ensemble downloader.
//!
//! Downloads GEFS perturbation member files from the NOAA open data archive
//! on AWS for a range of forecast cycles and stores them in date stamped
//! directories under the download root.
use chrono::{Duration, NaiveDateTime, Timelike, Utc};
use clap::{crate_version, App, Arg, ArgMatches};
use crossbeam_channel as channel;
use cyckit::{bail, parse_date_string, CycleSpec};
use dirs::home_dir;
use pbr::ProgressBar;
use reqwest::StatusCode;
use std::{error::Error, path::PathBuf, str::FromStr};

mod download;
mod generator;
mod sources;
mod writer;

use crate::sources::GefsMember;

const DEFAULT_DAYS_BACK: i64 = 2;

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
    const CAPACITY: usize = 16;

    let matches = parse_args();

    let root = matches
        .value_of("root")
        .map(PathBuf::from)
        .or_else(|| home_dir().map(|hd| hd.join("cyckit").join("GEFS")))
        .expect("Invalid root.");

    let spec = build_spec(&matches)?;
    let members = parse_members(&matches);

    let (download_list, already_present) =
        generator::build_download_list(&spec, &members, &root);
    let total = download_list.len();

    println!(
        "Requesting {} files for cycles {} through {} ({} already on disk).",
        total,
        spec.start(),
        spec.end(),
        already_present
    );

    if download_list.is_empty() {
        return Ok(());
    }

    let (generator_tx, dl_rx) = channel::bounded::<StepResult>(CAPACITY);
    let (dl_tx, save_rx) = channel::bounded::<StepResult>(CAPACITY);
    let (save_tx, print_rx) = channel::bounded::<StepResult>(CAPACITY);

    generator::start_generator_thread(download_list, generator_tx);
    download::start_download_threads(dl_rx, dl_tx);
    writer::start_writer_thread(save_rx, save_tx);

    let mut pb = ProgressBar::new(total as u64);
    let mut successes = 0usize;

    for step_result in print_rx {
        use crate::StepResult::*;

        match step_result {
            Success(_) => successes += 1,
            URLNotFound(req) => {
                print!("\u{001b}[300D\u{001b}[K");
                println!("URL does not exist: {}", req.url);
            }
            OtherURLStatus(req, code) => {
                print!("\u{001b}[300D\u{001b}[K");
                println!("  HTTP error ({}): {}.", code, req.url);
            }
            OtherDownloadError(req, msg) | WriteError(req, msg) => {
                print!("\u{001b}[300D\u{001b}[K");
                println!("  {} ({} {} f{:03})", msg, req.member, req.cycle, req.lead);
            }
            _ => unreachable!(),
        }

        pb.inc();
    }
    pb.finish();

    println!("Downloaded {} of {} files into {}.", successes, total, root.display());

    Ok(())
}

fn parse_args() -> ArgMatches<'static> {
    App::new("gefsdn")
        .author("Colin <cgrudzien@users.noreply.github.com>")
        .version(crate_version!())
        .about("Download GEFS ensemble member files from the AWS open data archive.")
        .arg(
            Arg::with_name("start")
                .long("start")
                .takes_value(true)
                .help("The first cycle zero hour. YYYY-MM-DDTHH:MM:SS or YYYY-MM-DD-HH")
                .long_help(concat!(
                    "The zero hour of the first forecast cycle to download.",
                    " Format is YYYY-MM-DDTHH:MM:SS or YYYY-MM-DD-HH. If not specified the",
                    " range is derived from --days-back."
                )),
        )
        .arg(
            Arg::with_name("end")
                .long("end")
                .takes_value(true)
                .requires("start")
                .help("The last cycle zero hour. YYYY-MM-DDTHH:MM:SS or YYYY-MM-DD-HH")
                .long_help(concat!(
                    "The zero hour of the last forecast cycle to download.",
                    " This requires the --start option too."
                )),
        )
        .arg(
            Arg::with_name("days-back")
                .short("d")
                .long("days-back")
                .takes_value(true)
                .conflicts_with_all(&["start", "end"])
                .help("Number of days back to consider.")
                .long_help(concat!(
                    "The number of days back to consider. Cannot use --start or --end with this."
                )),
        )
        .arg(
            Arg::with_name("cycle-int")
                .long("cycle-int")
                .takes_value(true)
                .default_value("24")
                .help("Hours between cycle zero hours."),
        )
        .arg(
            Arg::with_name("fcst-int")
                .long("fcst-int")
                .takes_value(true)
                .default_value("3")
                .help("Hours between forecast outputs after the zero hour."),
        )
        .arg(
            Arg::with_name("max-fcst")
                .long("max-fcst")
                .takes_value(true)
                .default_value("120")
                .help("Max forecast length in hours."),
        )
        .arg(
            Arg::with_name("members")
                .multiple(true)
                .short("m")
                .long("members")
                .takes_value(true)
                .help("Ensemble members to download (e.g. gec00 gep01 gep17).")
                .long_help(concat!(
                    "Ensemble members to download (e.g. gec00 gep01 gep17).",
                    " If not specified, the control and all 20 perturbations are used."
                )),
        )
        .arg(
            Arg::with_name("root")
                .short("r")
                .long("root")
                .takes_value(true)
                .help("Root directory for date stamped download directories."),
        )
        .get_matches()
}

fn build_spec(matches: &ArgMatches) -> Result<CycleSpec, Box<dyn Error>> {
    let days_back = matches
        .value_of("days-back")
        .and_then(|val| val.parse::<i64>().ok())
        .unwrap_or(DEFAULT_DAYS_BACK);

    let mut end = last_synoptic_hour(Utc::now().naive_utc() - Duration::hours(6));
    let mut start = last_synoptic_hour(Utc::now().naive_utc() - Duration::days(days_back));

    if let Some(start_str) = matches.value_of("start") {
        start = parse_date_string(start_str);
    }

    if let Some(end_str) = matches.value_of("end") {
        end = parse_date_string(end_str);
    }

    let cycle_int = parse_hours(matches, "cycle-int");
    let fcst_int = parse_hours(matches, "fcst-int");
    let max_fcst = parse_hours(matches, "max-fcst");

    Ok(CycleSpec::new(start, end, cycle_int, fcst_int, max_fcst)?)
}

fn parse_hours(matches: &ArgMatches, name: &str) -> i64 {
    let val = matches.value_of(name).unwrap(); // Safe, all have defaults.

    val.parse::<i64>()
        .unwrap_or_else(|_| bail(&format!("Could not parse --{}: {}", name, val)))
}

fn parse_members(matches: &ArgMatches) -> Vec<GefsMember> {
    if matches.is_present("members") {
        matches
            .values_of("members")
            .into_iter()
            .flatten()
            .map(|s| {
                GefsMember::from_str(s).unwrap_or_else(|err| bail(&format!("error: {}", err)))
            })
            .collect()
    } else {
        GefsMember::all()
    }
}

// GEFS cycles run at the synoptic hours, snap default ranges down to one.
fn last_synoptic_hour(dt: NaiveDateTime) -> NaiveDateTime {
    let hour = dt.hour() - dt.hour() % 6;
    dt.date().and_hms(hour, 0, 0)
}

// Result from a single step in the processing chain
#[derive(Debug, Clone)]
pub enum StepResult {
    Request(ReqInfo),
    FileAsBytes(ReqInfo, Vec<u8>), // Data still in memory, not yet on disk
    Success(ReqInfo),

    // Errors
    URLNotFound(ReqInfo),
    OtherURLStatus(ReqInfo, StatusCode), // status code returned by reqwest
    OtherDownloadError(ReqInfo, String), // Any other error downloading, error converted to string.
    WriteError(ReqInfo, String),         // Error saving to the date directory
}

#[derive(Debug, Clone)]
pub struct ReqInfo {
    member: GefsMember,
    cycle: NaiveDateTime,
    lead: i64,
    url: String,
    path: PathBuf,
}
