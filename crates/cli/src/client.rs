use std::io::{BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use nixnav_protocol::Response;
use nixnav_protocol::codec::read_line;

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(65);

/// Sends one request line, prints the daemon's response as pretty JSON
/// and maps error responses to a non-zero exit.
pub fn run(socket: &Path, line: &str) -> ExitCode {
    match roundtrip(socket, line) {
        Ok(response) => {
            match serde_json::to_string_pretty(&response) {
                Ok(text) => println!("{text}"),
                Err(_) => println!("{response:?}"),
            }
            if matches!(response, Response::Error(_)) {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn roundtrip(socket: &Path, line: &str) -> anyhow::Result<Response> {
    let mut stream = UnixStream::connect(socket).with_context(|| {
        format!(
            "failed to connect to the daemon at {} (is nixnav-daemon running?)",
            socket.display()
        )
    })?;
    stream
        .set_read_timeout(Some(RESPONSE_TIMEOUT))
        .context("failed to arm response timeout")?;

    log::debug!("request: {line}");
    stream
        .write_all(format!("{line}\n").as_bytes())
        .context("failed to send request")?;

    let mut reader = BufReader::new(stream);
    let response = read_line(&mut reader)
        .context("failed to read response")?
        .context("daemon closed the connection without responding")?;

    serde_json::from_str(&response).context("failed to decode response")
}
