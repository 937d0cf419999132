//! Common code for the command line tools that manage an NWP cycling
//! workflow's data.

//
// Public API
//
pub use crate::schedule::{
    cycles, daily_hours, date_windows, leads, CycleSpec, ScheduleConfigError,
};
pub use crate::table_printer::TablePrinter;
pub use crate::util::{bail, parse_date_string, parse_day_string};

pub mod gsi;

//
// Internal only
//
mod schedule;
mod table_printer;
mod util;
