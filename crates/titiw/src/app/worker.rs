//! Serialized turn execution.
//!
//! Submitted turns run one at a time, in submission order, on a single
//! background task. A turn's outcome is recorded before the next turn
//! snapshots the session, so every turn sees its predecessor's reply. The
//! reply text is then announced to the session loop as
//! [`AppEvent::TurnFinished`].

use tokio::sync::mpsc;
use tracing::debug;

use crate::app::AppEvent;
use crate::app::turn::TurnPipeline;

/// One queued user turn.
pub(super) struct TurnCommand {
    pub(super) text: String,
    pub(super) turn_id: String,
}

/// Spawns the turn worker and returns its queue.
///
/// The worker exits once the queue sender is dropped or the event bus
/// closes.
pub(super) fn spawn_turn_worker(
    pipeline: TurnPipeline,
    event_tx: mpsc::UnboundedSender<AppEvent>,
) -> mpsc::UnboundedSender<TurnCommand> {
    let (command_tx, mut command_rx) = mpsc::unbounded_channel::<TurnCommand>();

    tokio::spawn(async move {
        while let Some(command) = command_rx.recv().await {
            debug!(turn_id = command.turn_id.as_str(), "turn started");
            let reply = pipeline.run(&command.text).await;
            let event = AppEvent::TurnFinished {
                reply,
                turn_id: command.turn_id,
            };
            if event_tx.send(event).is_err() {
                break;
            }
        }
    });

    command_tx
}
