use super::{ReqInfo, StepResult};
use crossbeam_channel as channel;
use reqwest::{blocking::Client, StatusCode};
use std::{io::Read, thread::spawn};

pub fn start_download_threads(
    dl_rx: channel::Receiver<StepResult>,
    dl_tx: channel::Sender<StepResult>,
) {
    let make_download_thread = || {
        let dl_rx = dl_rx.clone();
        let dl_tx = dl_tx.clone();

        spawn(move || {
            let client = Client::new();

            for step_result in dl_rx {
                let next_step = match step_result {
                    StepResult::Request(req_info) => fetch(&client, req_info),
                    _ => step_result,
                };

                dl_tx.send(next_step).expect("dl_tx error sending.");
            }
        });
    };

    // The file download threads
    for _ in 0..3 {
        make_download_thread();
    }
}

fn fetch(client: &Client, req_info: ReqInfo) -> StepResult {
    let ReqInfo { ref url, .. } = req_info;

    let mut response = match client.get(url).send() {
        Ok(response) => response,
        Err(err) => return StepResult::OtherDownloadError(req_info, err.to_string()),
    };

    match response.status() {
        StatusCode::OK => {}
        StatusCode::NOT_FOUND => return StepResult::URLNotFound(req_info),
        code => return StepResult::OtherURLStatus(req_info, code),
    }

    let mut buffer = vec![];
    match response.read_to_end(&mut buffer) {
        Ok(_) => StepResult::FileAsBytes(req_info, buffer),
        Err(err) => StepResult::OtherDownloadError(req_info, err.to_string()),
    }
}
