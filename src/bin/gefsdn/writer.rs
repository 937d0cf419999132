use super::{ReqInfo, StepResult};
use crossbeam_channel as channel;
use std::{fs, io, thread::spawn};

pub fn start_writer_thread(
    save_rx: channel::Receiver<StepResult>,
    save_tx: channel::Sender<StepResult>,
) {
    spawn(move || {
        for step_result in save_rx {
            let next_step = match step_result {
                StepResult::FileAsBytes(req_info, data) => {
                    match save_to_date_dir(&req_info, &data) {
                        Ok(()) => StepResult::Success(req_info),
                        Err(err) => StepResult::WriteError(req_info, err.to_string()),
                    }
                }
                _ => step_result,
            };

            save_tx.send(next_step).expect("save_tx error sending.");
        }
    });
}

// The date directory only exists once the first file of a cycle lands.
fn save_to_date_dir(req_info: &ReqInfo, data: &[u8]) -> io::Result<()> {
    if let Some(date_dir) = req_info.path.parent() {
        fs::create_dir_all(date_dir)?;
    }

    fs::write(&req_info.path, data)
}
