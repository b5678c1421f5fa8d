//! Central delay timer — one task tracking the nearest pending deadline.
//!
//! Schedules can sit in `TimeDelayed` or `Paused` for hours; keeping a
//! timer per schedule would leak idle timers. Instead a single task
//! holds the sorted deadline set and sleeps until the earliest one,
//! re-arming whenever a nearer deadline is registered or an existing
//! one is cancelled. Due schedule ids are emitted on an mpsc channel.

use std::collections::BTreeSet;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use cadence_domain::id::ScheduleId;
use cadence_domain::time::Timestamp;

enum Command {
    Wake { id: ScheduleId, at: Timestamp },
    Cancel { id: ScheduleId },
}

/// Handle to the timer task. Dropping the handle stops the task.
pub struct DelayTimer {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl DelayTimer {
    /// Spawn the timer task. Must be called within a tokio runtime.
    ///
    /// Returns the handle and the channel on which due schedule ids are
    /// delivered.
    #[must_use]
    pub fn spawn() -> (Self, mpsc::UnboundedReceiver<ScheduleId>) {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (due_tx, due_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(command_rx, due_tx));
        (Self { commands, task }, due_rx)
    }

    /// Register (or move) the wake time for a schedule.
    pub fn wake_at(&self, id: ScheduleId, at: Timestamp) {
        let _ = self.commands.send(Command::Wake { id, at });
    }

    /// Drop any pending wake for a schedule.
    pub fn cancel(&self, id: ScheduleId) {
        let _ = self.commands.send(Command::Cancel { id });
    }
}

impl Drop for DelayTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    mut commands: mpsc::UnboundedReceiver<Command>,
    due_tx: mpsc::UnboundedSender<ScheduleId>,
) {
    let mut deadlines: BTreeSet<(Timestamp, ScheduleId)> = BTreeSet::new();

    loop {
        let nearest = deadlines.iter().next().copied();
        let Some((at, id)) = nearest else {
            // Nothing pending; wait for the next command.
            match commands.recv().await {
                Some(command) => apply(&mut deadlines, command),
                None => return,
            }
            continue;
        };

        let wait = (at - cadence_domain::time::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);

        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => apply(&mut deadlines, command),
                None => return,
            },
            () = tokio::time::sleep(wait) => {
                deadlines.remove(&(at, id));
                let _ = due_tx.send(id);
            }
        }
    }
}

fn apply(deadlines: &mut BTreeSet<(Timestamp, ScheduleId)>, command: Command) {
    match command {
        Command::Wake { id, at } => {
            deadlines.retain(|&(_, existing)| existing != id);
            deadlines.insert((at, id));
        }
        Command::Cancel { id } => {
            deadlines.retain(|&(_, existing)| existing != id);
        }
    }
}
