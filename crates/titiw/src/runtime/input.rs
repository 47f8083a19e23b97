use std::io::{self, BufRead};

use tokio::sync::mpsc;
use tracing::warn;

/// Forwards stdin lines on a dedicated thread so the async loop never blocks
/// on terminal reads. The channel closes at end of input.
pub(crate) fn spawn_input_reader(input_tx: mpsc::UnboundedSender<String>) {
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if input_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(error) => {
                    warn!(%error, "stdin read failed");

                    break;
                }
            }
        }
    });
}
