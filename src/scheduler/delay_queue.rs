//! Default in-process scheduler backed by a `tokio-util` delay queue.

use std::{
    collections::HashMap,
    sync::Arc,
    task::Poll,
    time::Duration,
};

use futures::future::{self, BoxFuture};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio_util::time::{DelayQueue, delay_queue::Key};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    bus::{BusMessage, MessageBus, topics},
    scheduler::{JobKind, RoundScheduler, ScheduledJob, SchedulerError},
};

enum Command {
    Schedule(ScheduledJob),
    Cancel { guild_id: String, round_id: Uuid },
}

/// Scheduler whose jobs live in a background worker owning a
/// [`DelayQueue`]. Fired jobs are republished on the bus as timer events;
/// the engine's handlers pick them up like any other inbound message.
pub struct DelayQueueScheduler {
    tx: mpsc::UnboundedSender<Command>,
}

impl DelayQueueScheduler {
    /// Start the worker task and return a handle to it.
    pub fn spawn(bus: Arc<dyn MessageBus>) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(bus, rx));
        Arc::new(Self { tx })
    }

    fn send(&self, command: Command) -> BoxFuture<'static, Result<(), SchedulerError>> {
        let result = self
            .tx
            .send(command)
            .map_err(|_| SchedulerError::WorkerGone);
        Box::pin(future::ready(result))
    }
}

impl RoundScheduler for DelayQueueScheduler {
    fn cancel_round_jobs(
        &self,
        guild_id: &str,
        round_id: Uuid,
    ) -> BoxFuture<'static, Result<(), SchedulerError>> {
        self.send(Command::Cancel {
            guild_id: guild_id.to_owned(),
            round_id,
        })
    }

    fn schedule_reminder(
        &self,
        job: ScheduledJob,
    ) -> BoxFuture<'static, Result<(), SchedulerError>> {
        self.send(Command::Schedule(job))
    }

    fn schedule_round_start(
        &self,
        job: ScheduledJob,
    ) -> BoxFuture<'static, Result<(), SchedulerError>> {
        self.send(Command::Schedule(job))
    }
}

async fn run_worker(bus: Arc<dyn MessageBus>, mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut queue: DelayQueue<ScheduledJob> = DelayQueue::new();
    let mut keys: HashMap<(String, Uuid, JobKind), Key> = HashMap::new();

    loop {
        let next_expired = future::poll_fn(|cx| {
            if queue.is_empty() {
                Poll::Pending
            } else {
                queue.poll_expired(cx)
            }
        });

        tokio::select! {
            command = rx.recv() => match command {
                Some(Command::Schedule(job)) => {
                    let slot = (job.guild_id.clone(), job.round_id, job.kind);
                    // Re-scheduling replaces any pending job of the same kind.
                    if let Some(key) = keys.remove(&slot) {
                        queue.remove(&key);
                    }
                    let delay = (job.fire_at - OffsetDateTime::now_utc())
                        .try_into()
                        .unwrap_or(Duration::ZERO);
                    debug!(
                        round_id = %job.round_id,
                        kind = job.kind.as_str(),
                        delay_secs = delay.as_secs(),
                        "scheduled round job"
                    );
                    let key = queue.insert(job, delay);
                    keys.insert(slot, key);
                }
                Some(Command::Cancel { guild_id, round_id }) => {
                    for kind in [JobKind::Reminder, JobKind::RoundStart] {
                        if let Some(key) = keys.remove(&(guild_id.clone(), round_id, kind)) {
                            queue.remove(&key);
                            debug!(%round_id, kind = kind.as_str(), "cancelled round job");
                        }
                    }
                }
                // Every handle dropped; nothing can be scheduled anymore.
                None => break,
            },
            maybe_expired = next_expired => {
                let Some(expired) = maybe_expired else { continue };
                let job = expired.into_inner();
                keys.remove(&(job.guild_id.clone(), job.round_id, job.kind));
                fire(bus.as_ref(), job);
            }
        }
    }
}

fn fire(bus: &dyn MessageBus, job: ScheduledJob) {
    let topic = match job.kind {
        JobKind::Reminder => topics::TIMER_REMINDER_DUE,
        JobKind::RoundStart => topics::TIMER_START_DUE,
    };
    match BusMessage::new(topic, &job) {
        Ok(message) => {
            if let Err(err) = bus.publish(message) {
                warn!(error = %err, round_id = %job.round_id, "failed to publish timer event");
            }
        }
        Err(err) => warn!(error = %err, round_id = %job.round_id, "failed to encode timer event"),
    }
}
