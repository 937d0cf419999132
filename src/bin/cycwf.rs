//! Workflow manager wrapper.
//!
//! Issues commands to the rocoto workflow manager binaries for every
//! configured case and control flow: advancing workflows, capturing status
//! reports, and booting or rewinding tasks for specific cycles.
use clap::{crate_version, App, AppSettings, Arg, ArgMatches, SubCommand};
use cyckit::{bail, cycles, parse_date_string};
use dirs::home_dir;
use itertools::iproduct;
use std::{
    error::Error,
    fs,
    path::PathBuf,
    process::Command,
    thread,
    time::Duration,
};

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
    let matches = parse_args();

    let config = Config::from_matches(&matches);

    if config.cases.is_empty() || config.flows.is_empty() {
        bail("At least one --cases and one --flows value is required.");
    }

    match matches.subcommand() {
        ("run", Some(sub_args)) => run_workflows(&config, sub_args)?,
        ("stat", Some(_)) => update_statuses(&config)?,
        ("boot", Some(sub_args)) => boot_or_rewind(&config, sub_args, "rocotoboot")?,
        ("rewind", Some(sub_args)) => boot_or_rewind(&config, sub_args, "rocotorewind")?,
        _ => unreachable!(),
    }

    Ok(())
}

fn parse_args() -> ArgMatches<'static> {
    App::new("cycwf")
        .author("Colin <cgrudzien@users.noreply.github.com>")
        .version(crate_version!())
        .about("Drive the rocoto workflow manager for the configured control flows.")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("rocoto")
                .long("rocoto")
                .takes_value(true)
                .help("Root of the rocoto install (containing bin/).")
                .global(true),
        )
        .arg(
            Arg::with_name("settings")
                .long("settings")
                .takes_value(true)
                .help("Directory holding the .xml control flow definitions.")
                .global(true),
        )
        .arg(
            Arg::with_name("dbs")
                .long("dbs")
                .takes_value(true)
                .help("Directory holding the workflow state stores and status reports.")
                .global(true),
        )
        .arg(
            Arg::with_name("cases")
                .long("cases")
                .short("c")
                .takes_value(true)
                .multiple(true)
                .help("Case study sub directories (e.g. VD).")
                .global(true),
        )
        .arg(
            Arg::with_name("flows")
                .long("flows")
                .short("f")
                .takes_value(true)
                .multiple(true)
                .help("Control flow names, without the .xml extension.")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("run")
                .about("Advance every configured workflow, then refresh statuses.")
                .arg(
                    Arg::with_name("watch")
                        .long("watch")
                        .takes_value(true)
                        .help("Repeat forever, sleeping this many seconds between passes."),
                ),
        )
        .subcommand(
            SubCommand::with_name("stat")
                .about("Capture a status report for every configured workflow."),
        )
        .subcommand(
            SubCommand::with_name("boot")
                .about("Boot tasks for specific cycles in every configured workflow.")
                .arg(cycles_arg())
                .arg(range_arg("start", "The first cycle to boot."))
                .arg(range_arg("end", "The last cycle to boot."))
                .arg(cycle_int_arg())
                .arg(tasks_arg()),
        )
        .subcommand(
            SubCommand::with_name("rewind")
                .about("Rewind tasks for specific cycles in every configured workflow.")
                .arg(cycles_arg())
                .arg(range_arg("start", "The first cycle to rewind."))
                .arg(range_arg("end", "The last cycle to rewind."))
                .arg(cycle_int_arg())
                .arg(tasks_arg()),
        )
        .get_matches()
}

fn cycles_arg() -> Arg<'static, 'static> {
    Arg::with_name("cycles")
        .long("cycles")
        .takes_value(true)
        .multiple(true)
        .conflicts_with_all(&["start", "end"])
        .help("Explicit cycle timestamps. YYYY-MM-DDTHH:MM:SS or YYYY-MM-DD-HH")
}

fn range_arg(name: &'static str, help: &'static str) -> Arg<'static, 'static> {
    Arg::with_name(name).long(name).takes_value(true).help(help)
}

fn cycle_int_arg() -> Arg<'static, 'static> {
    Arg::with_name("cycle-int")
        .long("cycle-int")
        .takes_value(true)
        .default_value("6")
        .help("Hours between cycles when --start and --end are given.")
}

fn tasks_arg() -> Arg<'static, 'static> {
    Arg::with_name("tasks")
        .long("tasks")
        .short("t")
        .takes_value(true)
        .multiple(true)
        .required(true)
        .help("Task names to operate on (e.g. ungrib_ens_00 ungrib_ens_01).")
}

#[derive(Debug)]
struct Config {
    rocoto: PathBuf,
    settings: PathBuf,
    dbs: PathBuf,
    cases: Vec<String>,
    flows: Vec<String>,
}

impl Config {
    fn from_matches(matches: &ArgMatches) -> Config {
        let home_default = |sub: &str| {
            home_dir()
                .map(|hd| hd.join("cyckit").join(sub))
                .expect("Invalid home directory.")
        };

        Config {
            rocoto: matches
                .value_of("rocoto")
                .map(PathBuf::from)
                .unwrap_or_else(|| home_default("rocoto")),
            settings: matches
                .value_of("settings")
                .map(PathBuf::from)
                .unwrap_or_else(|| home_default("simulation_settings")),
            dbs: matches
                .value_of("dbs")
                .map(PathBuf::from)
                .unwrap_or_else(|| home_default("workflow_status")),
            cases: matches
                .values_of("cases")
                .into_iter()
                .flatten()
                .map(str::to_string)
                .collect(),
            flows: matches
                .values_of("flows")
                .into_iter()
                .flatten()
                .map(str::to_string)
                .collect(),
        }
    }

    fn workflow_xml(&self, case: &str, flow: &str) -> PathBuf {
        self.settings
            .join(case)
            .join(flow)
            .join(format!("{}.xml", flow))
    }

    fn store(&self, case: &str, flow: &str) -> PathBuf {
        self.dbs.join(format!("{}-{}.store", case, flow))
    }

    fn rocoto_bin(&self, name: &str) -> PathBuf {
        self.rocoto.join("bin").join(name)
    }
}

fn run_workflows(config: &Config, sub_args: &ArgMatches) -> Result<(), Box<dyn Error>> {
    let watch: Option<u64> = sub_args
        .value_of("watch")
        .map(|val| val.parse().unwrap_or_else(|_| bail("Could not parse --watch.")));

    loop {
        for (case, flow) in iproduct!(&config.cases, &config.flows) {
            let status = Command::new(config.rocoto_bin("rocotorun"))
                .arg("-w")
                .arg(config.workflow_xml(case, flow))
                .arg("-d")
                .arg(config.store(case, flow))
                .arg("-v")
                .arg("10")
                .status()?;

            if !status.success() {
                println!("rocotorun failed for {}/{}: {}", case, flow, status);
            }
        }

        // update workflow statuses after the pass
        update_statuses(config)?;

        match watch {
            Some(secs) => thread::sleep(Duration::from_secs(secs)),
            None => break,
        }
    }

    Ok(())
}

fn update_statuses(config: &Config) -> Result<(), Box<dyn Error>> {
    for (case, flow) in iproduct!(&config.cases, &config.flows) {
        let output = Command::new(config.rocoto_bin("rocotostat"))
            .arg("-w")
            .arg(config.workflow_xml(case, flow))
            .arg("-d")
            .arg(config.store(case, flow))
            .arg("-c")
            .arg("all")
            .output()?;

        if !output.status.success() {
            println!("rocotostat failed for {}/{}: {}", case, flow, output.status);
            continue;
        }

        let report = config
            .dbs
            .join(format!("{}-{}_workflow_status.txt", case, flow));
        fs::write(&report, &output.stdout)?;
    }

    Ok(())
}

fn boot_or_rewind(
    config: &Config,
    sub_args: &ArgMatches,
    rocoto_cmd: &str,
) -> Result<(), Box<dyn Error>> {
    let cycle_strings = cycle_arguments(sub_args)?;

    let tasks: Vec<&str> = sub_args.values_of("tasks").into_iter().flatten().collect();

    for (case, flow) in iproduct!(&config.cases, &config.flows) {
        for (cycle, task) in iproduct!(&cycle_strings, &tasks) {
            let status = Command::new(config.rocoto_bin(rocoto_cmd))
                .arg("-w")
                .arg(config.workflow_xml(case, flow))
                .arg("-d")
                .arg(config.store(case, flow))
                .arg("-c")
                .arg(cycle)
                .arg("-t")
                .arg(task)
                .status()?;

            if !status.success() {
                println!(
                    "{} failed for {}/{} at {} task {}: {}",
                    rocoto_cmd, case, flow, cycle, task, status
                );
            }
        }
    }

    update_statuses(config)
}

// rocoto takes cycle arguments in YYYYMMDDHHMM form
fn cycle_arguments(sub_args: &ArgMatches) -> Result<Vec<String>, Box<dyn Error>> {
    if sub_args.is_present("cycles") {
        return Ok(sub_args
            .values_of("cycles")
            .into_iter()
            .flatten()
            .map(|s| parse_date_string(s).format("%Y%m%d%H%M").to_string())
            .collect());
    }

    let start = match sub_args.value_of("start") {
        Some(start) => parse_date_string(start),
        None => bail("Either --cycles or --start and --end are required."),
    };
    let end = match sub_args.value_of("end") {
        Some(end) => parse_date_string(end),
        None => bail("Either --cycles or --start and --end are required."),
    };
    let cycle_int: i64 = sub_args
        .value_of("cycle-int")
        .unwrap() // Safe, this has a default.
        .parse()
        .unwrap_or_else(|_| bail("Could not parse --cycle-int."));

    let cycle_list = cycles(start, end, cycle_int)?;

    Ok(cycle_list
        .into_iter()
        .map(|c| c.format("%Y%m%d%H%M").to_string())
        .collect())
}
