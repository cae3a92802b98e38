//! Interactive commands typed on stdin.
use log::{debug, error, warn};
use std::io::BufRead;
use std::thread;
use strum_macros::{Display, EnumString};
use tokio::sync::mpsc::UnboundedSender;

/// Command the user can type while the client runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Control {
    /// Stop publishing snapshots; the feed keeps moving underneath.
    #[strum(to_string = "pause", serialize = "p")]
    Pause,
    /// Publish snapshots again.
    #[strum(to_string = "resume", serialize = "r")]
    Resume,
    /// Re-subscribe after the stream ended or failed.
    #[strum(to_string = "retry")]
    Retry,
    /// Terminate the service and exit.
    #[strum(to_string = "quit", serialize = "q")]
    Quit,
}

/// Reads stdin line by line on a dedicated thread and forwards parsed commands to `tx`.
///
/// The thread stops at end of input or once the receiving side is gone.
pub fn spawn_reader(tx: UnboundedSender<Control>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            };
            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            match input.parse::<Control>() {
                Ok(control) => {
                    if tx.send(control).is_err() {
                        break;
                    }
                }
                Err(_) => warn!(
                    "Unknown command {:?}; expected one of: pause, resume, retry, quit",
                    input
                ),
            }
        }
        debug!("stdin reader stopping...");
    });
}
