use super::sources::{self, GefsMember};
use super::{ReqInfo, StepResult};
use crossbeam_channel as channel;
use cyckit::CycleSpec;
use itertools::iproduct;
use std::{path::Path, thread::spawn};

/// Build the full request list for a schedule: one file per cycle x member x
/// forecast lead. Files already present under the root (from a previous,
/// interrupted run) are skipped. Returns the list and the skip count.
pub fn build_download_list(
    spec: &CycleSpec,
    members: &[GefsMember],
    root: &Path,
) -> (Vec<ReqInfo>, usize) {
    let leads = spec.leads();

    let mut requests = vec![];
    let mut skipped = 0;

    for (cycle, &member) in iproduct!(spec.cycles(), members) {
        for &lead in &leads {
            let path = sources::local_path(root, member, cycle, lead);

            if path.is_file() {
                skipped += 1;
                continue;
            }

            requests.push(ReqInfo {
                member,
                cycle,
                lead,
                url: sources::build_url(member, cycle, lead),
                path,
            });
        }
    }

    (requests, skipped)
}

pub fn start_generator_thread(requests: Vec<ReqInfo>, generator_tx: channel::Sender<StepResult>) {
    spawn(move || {
        requests
            .into_iter()
            .map(StepResult::Request)
            .for_each(move |request| {
                if generator_tx.send(request).is_err() {
                    return;
                }
            });
    });
}
