//! Reanalysis batch downloader.
//!
//! Requests combined grib files from a CDS style reanalysis web API over a
//! range of dates, combining a window of days into each file. Downloads run
//! on a bounded worker pool with a fixed cooldown between submissions, and
//! requests rotate across the configured account credentials, waiting out the
//! queue when every account is saturated.
use chrono::NaiveDate;
use clap::{crate_version, App, Arg, ArgMatches};
use cyckit::{bail, daily_hours, date_windows, parse_day_string};
use dirs::home_dir;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use std::{
    error::Error,
    fs,
    fs::File,
    io,
    path::PathBuf,
    str::FromStr,
    thread,
    time::Duration,
};
use strum::IntoEnumIterator;
use strum_macros::{EnumIter, EnumString, IntoStaticStr};
use threadpool::ThreadPool;

const API_URL: &str = "https://cds.climate.copernicus.eu/api/v2";

const WORKERS: usize = 4;
const SUBMIT_COOLDOWN: Duration = Duration::from_secs(15);
const POLL_INTERVAL: Duration = Duration::from_secs(30);
const SATURATED_SLEEP: Duration = Duration::from_secs(60 * 60);

// An account with this many queued or running tasks is passed over.
const MAX_ACTIVE_TASKS: usize = 5;

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

    let levels = matches
        .value_of("levels")
        .map(|val| LevelSet::from_str(val).unwrap()) // Safe, clap checked it.
        .unwrap();

    let root = matches
        .value_of("root")
        .map(PathBuf::from)
        .or_else(|| {
            home_dir().map(|hd| hd.join("cyckit").join("ERA5").join(levels.as_str()))
        })
        .expect("Invalid root.");

    let start = parse_day_string(matches.value_of("start-date").unwrap());
    let end = parse_day_string(matches.value_of("end-date").unwrap());
    let days_per_file = parse_int(&matches, "days-per-file");
    let start_hour = parse_int(&matches, "start-hour");
    let hour_int = parse_int(&matches, "hour-int");

    let windows = date_windows(start, end, days_per_file)?;
    let hours = daily_hours(start_hour, hour_int)?;

    let auths = load_credentials(&matches)?;

    println!("Creating download directory {}", root.display());
    fs::create_dir_all(&root)?;

    println!("Download date range: {} -- {}", start, end);
    println!(
        "Download hours: {}",
        hours
            .iter()
            .map(|h| format!("{:02}:00:00", h))
            .collect::<Vec<String>>()
            .join("/")
    );

    // check for existing files corresponding to requests in case of restart
    let mut outstanding: Vec<RetrievalRequest> = vec![];
    for (first_day, last_day) in windows {
        let request = RetrievalRequest::new(&root, levels, first_day, last_day, hours.clone());

        if request.path.is_file() {
            println!("Skipping {}, file already found.", request.path.display());
        } else {
            outstanding.push(request);
        }
    }

    println!("+------------------------------------------+");
    for request in &outstanding {
        println!("Requesting download {}", request.path.display());
    }
    println!("+------------------------------------------+");

    let pool = ThreadPool::new(WORKERS);
    let status_client = Client::new();
    let mut rotation = 0usize;

    for request in outstanding {
        thread::sleep(SUBMIT_COOLDOWN);

        let auth = next_free_credential(&status_client, &auths, &mut rotation);
        println!(
            "Dispatching {} with account {}",
            request.path.display(),
            auth.uid
        );

        pool.execute(move || {
            match retrieve(&request, &auth) {
                Ok(()) => println!("Download complete: {}", request.path.display()),
                Err(err) => println!("Download failed for {}: {}", request.path.display(), err),
            }
        });
    }

    pool.join();

    Ok(())
}

fn parse_args() -> ArgMatches<'static> {
    App::new("eradn")
        .author("Colin <cgrudzien@users.noreply.github.com>")
        .version(crate_version!())
        .about("Download combined reanalysis grib files from the climate data store API.")
        .arg(
            Arg::with_name("levels")
                .index(1)
                .required(true)
                .possible_values(
                    &LevelSet::iter()
                        .map(<&'static str>::from)
                        .collect::<Vec<&str>>(),
                )
                .help("Which level set to download."),
        )
        .arg(
            Arg::with_name("start-date")
                .long("start-date")
                .takes_value(true)
                .required(true)
                .help("Beginning date for downloaded data. YYYY-MM-DD"),
        )
        .arg(
            Arg::with_name("end-date")
                .long("end-date")
                .takes_value(true)
                .required(true)
                .help("Inclusive end date for downloaded data. YYYY-MM-DD"),
        )
        .arg(
            Arg::with_name("days-per-file")
                .long("days-per-file")
                .takes_value(true)
                .default_value("1")
                .help("Maximum number of days combined into a single download file."),
        )
        .arg(
            Arg::with_name("start-hour")
                .long("start-hour")
                .takes_value(true)
                .default_value("0")
                .help("First hour in each day to pull data."),
        )
        .arg(
            Arg::with_name("hour-int")
                .long("hour-int")
                .takes_value(true)
                .default_value("1")
                .help("Interval on which to pull data throughout the day."),
        )
        .arg(
            Arg::with_name("auths")
                .long("auths")
                .takes_value(true)
                .help("Credentials file, one uid:key pair per line.")
                .long_help(concat!(
                    "Credentials file with one uid:key pair per line. Listing several",
                    " accounts allows more simultaneous downloads. Defaults to",
                    " ~/.cyckit_auths."
                )),
        )
        .arg(
            Arg::with_name("root")
                .short("r")
                .long("root")
                .takes_value(true)
                .help("Directory the combined grib files are downloaded to.")
                .long_help(concat!(
                    "Directory to which the combined grib files are downloaded. The",
                    " default is a directory under the home directory based on the",
                    " level set."
                )),
        )
        .get_matches()
}

fn parse_int(matches: &ArgMatches, name: &str) -> i64 {
    let val = matches.value_of(name).unwrap(); // Safe, all have defaults.

    val.parse::<i64>()
        .unwrap_or_else(|_| bail(&format!("Could not parse --{}: {}", name, val)))
}

#[derive(Debug, Clone)]
struct Credential {
    uid: String,
    key: String,
}

fn load_credentials(matches: &ArgMatches) -> Result<Vec<Credential>, Box<dyn Error>> {
    let path = matches
        .value_of("auths")
        .map(PathBuf::from)
        .or_else(|| home_dir().map(|hd| hd.join(".cyckit_auths")))
        .expect("Invalid credentials path.");

    let contents = fs::read_to_string(&path)
        .map_err(|err| format!("could not read credentials file {}: {}", path.display(), err))?;

    let mut auths = vec![];
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match line.find(':') {
            Some(pos) => auths.push(Credential {
                uid: line[..pos].to_string(),
                key: line[pos + 1..].to_string(),
            }),
            None => return Err(format!("malformed credentials line: {}", line).into()),
        }
    }

    if auths.is_empty() {
        return Err(format!("no credentials found in {}", path.display()).into());
    }

    Ok(auths)
}

/// Rotate through the accounts until one has queue room, sleeping an hour and
/// trying again whenever every account is saturated.
fn next_free_credential(
    client: &Client,
    auths: &[Credential],
    rotation: &mut usize,
) -> Credential {
    loop {
        for offset in 0..auths.len() {
            let auth = &auths[(*rotation + offset) % auths.len()];

            match active_task_count(client, auth) {
                Ok(count) if count < MAX_ACTIVE_TASKS => {
                    println!("Account {} has {} task(s) in process.", auth.uid, count);
                    *rotation = (*rotation + offset + 1) % auths.len();
                    return auth.clone();
                }
                Ok(count) => {
                    println!("Account {} saturated with {} task(s).", auth.uid, count);
                }
                Err(err) => {
                    println!("Could not poll tasks for account {}: {}", auth.uid, err);
                }
            }
        }

        println!("Did not get a free account, sleeping for an hour.");
        thread::sleep(SATURATED_SLEEP);
    }
}

#[derive(Debug, Deserialize)]
struct TaskInfo {
    state: String,
}

fn active_task_count(client: &Client, auth: &Credential) -> Result<usize, reqwest::Error> {
    let tasks: Vec<TaskInfo> = client
        .get(&format!("{}/tasks/", API_URL))
        .basic_auth(&auth.uid, Some(&auth.key))
        .send()?
        .error_for_status()?
        .json()?;

    Ok(tasks
        .iter()
        .filter(|task| task.state == "queued" || task.state == "running")
        .count())
}

/// Which reanalysis level set to download. Each maps to its own dataset and
/// request form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, EnumIter, IntoStaticStr)]
pub enum LevelSet {
    #[strum(serialize = "model_levels")]
    ModelLevels,
    #[strum(serialize = "pres_levels")]
    PressureLevels,
    #[strum(serialize = "surf_levels")]
    SurfaceLevels,
}

impl LevelSet {
    fn as_str(self) -> &'static str {
        self.into()
    }

    fn dataset(self) -> &'static str {
        match self {
            LevelSet::ModelLevels => "reanalysis-era5-complete",
            LevelSet::PressureLevels => "reanalysis-era5-pressure-levels",
            LevelSet::SurfaceLevels => "reanalysis-era5-single-levels",
        }
    }
}

#[derive(Debug, Clone)]
struct RetrievalRequest {
    levels: LevelSet,
    first_day: NaiveDate,
    last_day: NaiveDate,
    hours: Vec<u32>,
    path: PathBuf,
}

impl RetrievalRequest {
    fn new(
        root: &std::path::Path,
        levels: LevelSet,
        first_day: NaiveDate,
        last_day: NaiveDate,
        hours: Vec<u32>,
    ) -> Self {
        let file_name = format!("{}--{}_{}.grib", first_day, last_day, levels.as_str());

        RetrievalRequest {
            levels,
            first_day,
            last_day,
            hours,
            path: root.join(file_name),
        }
    }

    fn times(&self) -> Vec<String> {
        self.hours
            .iter()
            .map(|h| format!("{:02}:00:00", h))
            .collect()
    }

    fn body(&self) -> serde_json::Value {
        let times = self.times();

        match self.levels {
            LevelSet::ModelLevels => json!({
                "class": "ea",
                "date": format!("{}/to/{}", self.first_day, self.last_day),
                "expver": "1",
                "grid": "0.25/0.25",
                "format": "grib",
                "levelist": "1/to/137",
                "levtype": "ml",
                "param": "129/130/131/132/133/152",
                "stream": "oper",
                "time": times,
                "type": "an",
            }),
            LevelSet::PressureLevels => json!({
                "date": format!("{}/{}", self.first_day, self.last_day),
                "time": times,
                "product_type": "reanalysis",
                "format": "grib",
                "variable": [
                    "divergence", "fraction_of_cloud_cover",
                    "geopotential", "ozone_mass_mixing_ratio",
                    "potential_vorticity", "relative_humidity",
                    "specific_cloud_ice_water_content",
                    "specific_cloud_liquid_water_content",
                    "specific_humidity", "specific_rain_water_content",
                    "specific_snow_water_content",
                    "temperature", "u_component_of_wind",
                    "v_component_of_wind", "vertical_velocity",
                    "vorticity",
                ],
                "pressure_level": [
                    concat!(
                        "1/2/3/5/7/10/20/30/50/70/100/125/150/175/200/",
                        "225/250/300/350/400/450/500/550/600/650/700/",
                        "750/775/800/825/850/875/900/925/950/975/1000"
                    ),
                ],
            }),
            LevelSet::SurfaceLevels => json!({
                "date": format!("{}/{}", self.first_day, self.last_day),
                "time": times,
                "product_type": "reanalysis",
                "format": "grib",
                "grid": "0.25/0.25",
                "variable": [
                    "10m_u_component_of_wind", "10m_v_component_of_wind",
                    "2m_dewpoint_temperature", "2m_temperature",
                    "land_sea_mask", "mean_sea_level_pressure",
                    "sea_ice_cover", "sea_surface_temperature",
                    "skin_temperature", "snow_depth",
                    "soil_temperature_level_1", "soil_temperature_level_2",
                    "soil_temperature_level_3", "soil_temperature_level_4",
                    "surface_pressure",
                    "volumetric_soil_water_layer_1",
                    "volumetric_soil_water_layer_2",
                    "volumetric_soil_water_layer_3",
                    "volumetric_soil_water_layer_4",
                    "zero_degree_level",
                ],
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TaskReply {
    state: String,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

/// Submit one retrieval, poll it to completion, and download the result.
fn retrieve(request: &RetrievalRequest, auth: &Credential) -> Result<(), Box<dyn Error>> {
    // Result downloads can run long, no client side timeout.
    let client = Client::builder().timeout(None).build()?;

    let reply: TaskReply = client
        .post(&format!("{}/resources/{}", API_URL, request.levels.dataset()))
        .basic_auth(&auth.uid, Some(&auth.key))
        .json(&request.body())
        .send()?
        .error_for_status()?
        .json()?;

    let request_id = match reply.request_id {
        Some(ref request_id) => request_id.clone(),
        None => return Err("task reply carried no request id".into()),
    };

    let mut state = reply.state;
    let mut location = reply.location;

    while state == "queued" || state == "running" {
        thread::sleep(POLL_INTERVAL);

        let poll: TaskReply = client
            .get(&format!("{}/tasks/{}", API_URL, request_id))
            .basic_auth(&auth.uid, Some(&auth.key))
            .send()?
            .error_for_status()?
            .json()?;

        state = poll.state;
        location = poll.location.or(location);
    }

    if state != "completed" {
        return Err(format!("task {} ended in state {}", request_id, state).into());
    }

    let location = match location {
        Some(location) => location,
        None => return Err(format!("task {} completed without a result location", request_id).into()),
    };

    // Download to a partial file first so a restart never mistakes a torn
    // download for a finished one.
    let partial = request.path.with_extension("grib.part");

    let mut response = client
        .get(&location)
        .basic_auth(&auth.uid, Some(&auth.key))
        .send()?
        .error_for_status()?;

    let mut file = File::create(&partial)?;
    io::copy(&mut response, &mut file)?;
    fs::rename(&partial, &request.path)?;

    Ok(())
}
