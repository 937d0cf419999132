//! Remote object naming for the GEFS open data archive on AWS.
//!
//! The archive reorganized twice, so the key layout (and the width of the
//! forecast hour field) depends on the cycle date:
//!
//! ```text
//!     2017-01-01 .. 2018-07-26   files directly under the cycle prefix
//!     2018-07-27 .. 2020-09-22   per-product sub directories
//!     2020-09-23 .. present      atmos/ tree with 0p50 resolution names
//! ```
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const HOST_URL: &str = "https://noaa-gefs-pds.s3.amazonaws.com/";

/// How many numbered perturbation members the ensemble carries.
pub const PERTURBATION_COUNT: u8 = 20;

/// One member of the GEFS ensemble: the control run or a numbered
/// perturbation. The ensemble mean and spread products are not representable
/// here, downloads always want the raw members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GefsMember {
    Control,
    Perturbation(u8),
}

impl GefsMember {
    /// The control plus all numbered perturbations, in archive order.
    pub fn all() -> Vec<GefsMember> {
        let mut members = vec![GefsMember::Control];
        members.extend((1..=PERTURBATION_COUNT).map(GefsMember::Perturbation));
        members
    }
}

impl fmt::Display for GefsMember {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GefsMember::Control => write!(f, "gec00"),
            GefsMember::Perturbation(num) => write!(f, "gep{:02}", num),
        }
    }
}

impl FromStr for GefsMember {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_lowercase();

        if s == "gec00" {
            return Ok(GefsMember::Control);
        }

        if let Some(num_str) = s.strip_prefix("gep") {
            if let Ok(num) = num_str.parse::<u8>() {
                if (1..=PERTURBATION_COUNT).contains(&num) {
                    return Ok(GefsMember::Perturbation(num));
                }
            }
        }

        Err(format!("unknown GEFS member: {}", s))
    }
}

/// The archive layout in effect for a given cycle date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveEra {
    Flat,
    ProductDirs,
    AtmosDirs,
}

impl ArchiveEra {
    pub fn for_cycle(cycle: NaiveDateTime) -> ArchiveEra {
        let date = cycle.date();

        if date < NaiveDate::from_ymd(2018, 7, 27) {
            ArchiveEra::Flat
        } else if date < NaiveDate::from_ymd(2020, 9, 23) {
            ArchiveEra::ProductDirs
        } else {
            ArchiveEra::AtmosDirs
        }
    }
}

// The early archive wrote the forecast hour with two digits through 99 and
// three digits from 100 up. The modern tree is three digits everywhere.
fn lead_field(lead: i64) -> String {
    if lead < 100 {
        format!("{:02}", lead)
    } else {
        format!("{:03}", lead)
    }
}

/// The object base name for one member / cycle / forecast lead.
pub fn object_name(member: GefsMember, cycle: NaiveDateTime, lead: i64) -> String {
    match ArchiveEra::for_cycle(cycle) {
        ArchiveEra::Flat | ArchiveEra::ProductDirs => format!(
            "{}.t{:02}z.pgrb2af{}",
            member,
            cycle.hour(),
            lead_field(lead)
        ),
        ArchiveEra::AtmosDirs => format!(
            "{}.t{:02}z.pgrb2a.0p50.f{:03}",
            member,
            cycle.hour(),
            lead
        ),
    }
}

/// The full download URL for one member / cycle / forecast lead.
pub fn build_url(member: GefsMember, cycle: NaiveDateTime, lead: i64) -> String {
    let day = cycle.format("%Y%m%d");
    let hour = cycle.hour();

    let prefix = match ArchiveEra::for_cycle(cycle) {
        ArchiveEra::Flat => format!("gefs.{}/{:02}/", day, hour),
        ArchiveEra::ProductDirs => format!("gefs.{}/{:02}/pgrb2a/", day, hour),
        ArchiveEra::AtmosDirs => format!("gefs.{}/{:02}/atmos/pgrb2ap5/", day, hour),
    };

    format!("{}{}{}", HOST_URL, prefix, object_name(member, cycle, lead))
}

/// Where the object lands on disk: a date stamped directory under the
/// download root.
pub fn local_path(root: &Path, member: GefsMember, cycle: NaiveDateTime, lead: i64) -> PathBuf {
    root.join(cycle.format("%Y%m%d").to_string())
        .join(object_name(member, cycle, lead))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle(y: i32, mo: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd(y, mo, d).and_hms(h, 0, 0)
    }

    #[test]
    fn era_boundaries_follow_the_archive_reorganizations() {
        assert_eq!(
            ArchiveEra::for_cycle(cycle(2017, 2, 8, 0)),
            ArchiveEra::Flat
        );
        assert_eq!(
            ArchiveEra::for_cycle(cycle(2018, 7, 26, 18)),
            ArchiveEra::Flat
        );
        assert_eq!(
            ArchiveEra::for_cycle(cycle(2018, 7, 27, 0)),
            ArchiveEra::ProductDirs
        );
        assert_eq!(
            ArchiveEra::for_cycle(cycle(2020, 9, 22, 18)),
            ArchiveEra::ProductDirs
        );
        assert_eq!(
            ArchiveEra::for_cycle(cycle(2020, 9, 23, 0)),
            ArchiveEra::AtmosDirs
        );
    }

    #[test]
    fn member_names_round_trip() {
        for member in GefsMember::all() {
            let parsed: GefsMember = member.to_string().parse().unwrap();
            assert_eq!(parsed, member);
        }

        assert_eq!("gec00".parse::<GefsMember>(), Ok(GefsMember::Control));
        assert_eq!(
            "GEP07".parse::<GefsMember>(),
            Ok(GefsMember::Perturbation(7))
        );
        assert!("geavg".parse::<GefsMember>().is_err());
        assert!("gespr".parse::<GefsMember>().is_err());
        assert!("gep21".parse::<GefsMember>().is_err());
    }

    #[test]
    fn early_archive_uses_two_digit_hours_until_one_hundred() {
        let c = cycle(2017, 2, 8, 0);
        assert_eq!(
            object_name(GefsMember::Control, c, 6),
            "gec00.t00z.pgrb2af06"
        );
        assert_eq!(
            object_name(GefsMember::Control, c, 102),
            "gec00.t00z.pgrb2af102"
        );
    }

    #[test]
    fn modern_archive_pads_every_hour_to_three_digits() {
        let c = cycle(2022, 12, 23, 6);
        assert_eq!(
            object_name(GefsMember::Perturbation(1), c, 6),
            "gep01.t06z.pgrb2a.0p50.f006"
        );
    }

    #[test]
    fn urls_follow_the_era_layout() {
        assert_eq!(
            build_url(GefsMember::Perturbation(20), cycle(2017, 2, 8, 12), 0),
            "https://noaa-gefs-pds.s3.amazonaws.com/gefs.20170208/12/gep20.t12z.pgrb2af00"
        );
        assert_eq!(
            build_url(GefsMember::Control, cycle(2019, 2, 8, 0), 48),
            "https://noaa-gefs-pds.s3.amazonaws.com/gefs.20190208/00/pgrb2a/gec00.t00z.pgrb2af48"
        );
        assert_eq!(
            build_url(GefsMember::Control, cycle(2022, 12, 23, 0), 120),
            "https://noaa-gefs-pds.s3.amazonaws.com/gefs.20221223/00/atmos/pgrb2ap5/gec00.t00z.pgrb2a.0p50.f120"
        );
    }

    #[test]
    fn local_paths_land_in_date_stamped_directories() {
        let path = local_path(
            Path::new("/data/GEFS"),
            GefsMember::Control,
            cycle(2022, 12, 23, 0),
            3,
        );
        assert_eq!(
            path,
            Path::new("/data/GEFS/20221223/gec00.t00z.pgrb2a.0p50.f003")
        );
    }
}
