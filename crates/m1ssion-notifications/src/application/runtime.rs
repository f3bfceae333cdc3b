//! Async driver for [`QueueService`].
//!
//! A single tokio task owns the service. Callers talk to it through a
//! cloneable [`QueueHandle`] that sends [`Message`]s over an mpsc channel;
//! between messages the task sleeps until the next timer deadline and then
//! fires whatever is due. The service is therefore only ever touched by one
//! task, one message at a time.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use m1ssion_core::clock::Clock;
use m1ssion_core::command::Command;
use m1ssion_core::error::DomainError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::dispatcher::{Subscriber, SubscriptionId};
use super::queue::{QueueService, QueueSnapshot};
use crate::domain::commands::{CancelAutoDismiss, ClearQueue, DismissCurrent, PublishEvent};
use crate::domain::events::{GameEventType, Payload};

/// Clock backed by tokio's time source, so `tokio::time::pause` and
/// `advance` move event timestamps and timer deadlines together.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
    origin_wall: DateTime<Utc>,
}

impl TokioClock {
    /// Anchors the clock at the current wall time.
    #[must_use]
    pub fn new() -> Self {
        Self::anchored_at(Utc::now())
    }

    /// Anchors the clock so that "now" reads as `origin_wall`.
    #[must_use]
    pub fn anchored_at(origin_wall: DateTime<Utc>) -> Self {
        Self {
            origin: Instant::now(),
            origin_wall,
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.origin.elapsed()).unwrap_or(TimeDelta::zero());
        self.origin_wall + elapsed
    }
}

/// Requests accepted by the runtime task.
pub enum Message {
    /// Publish a new event.
    Publish(PublishEvent),
    /// Dismiss the displayed event.
    Dismiss(DismissCurrent),
    /// Stop the auto-dismiss countdown.
    CancelAutoDismiss(CancelAutoDismiss),
    /// Reset the queue.
    Clear(ClearQueue),
    /// Register a subscriber.
    Subscribe {
        /// The subscriber to register.
        subscriber: Box<dyn Subscriber>,
        /// Receives the assigned id.
        response: oneshot::Sender<SubscriptionId>,
    },
    /// Remove a subscriber.
    Unsubscribe {
        /// The subscription to remove.
        id: SubscriptionId,
        /// Receives whether it existed.
        response: oneshot::Sender<bool>,
    },
    /// Copy the current state.
    Snapshot {
        /// Receives the snapshot.
        response: oneshot::Sender<QueueSnapshot>,
    },
    /// Stop the task and hand the service back.
    Shutdown,
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Publish(command) => f.debug_tuple("Publish").field(command).finish(),
            Self::Dismiss(command) => f.debug_tuple("Dismiss").field(command).finish(),
            Self::CancelAutoDismiss(command) => {
                f.debug_tuple("CancelAutoDismiss").field(command).finish()
            }
            Self::Clear(command) => f.debug_tuple("Clear").field(command).finish(),
            Self::Subscribe { .. } => f.write_str("Subscribe"),
            Self::Unsubscribe { id, .. } => f.debug_struct("Unsubscribe").field("id", id).finish(),
            Self::Snapshot { .. } => f.write_str("Snapshot"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Cloneable mailbox for the runtime task.
#[derive(Debug, Clone)]
pub struct QueueHandle {
    sender: mpsc::UnboundedSender<Message>,
}

impl QueueHandle {
    /// Publishes an event. Dropped with a warning if the runtime has stopped.
    pub fn publish(&self, event_type: GameEventType, payload: Payload) {
        self.send(Message::Publish(PublishEvent::new(event_type, payload)));
    }

    /// Dismisses the displayed event.
    pub fn dismiss(&self) {
        self.send(Message::Dismiss(DismissCurrent {
            correlation_id: Uuid::new_v4(),
        }));
    }

    /// Stops the auto-dismiss countdown of the displayed event.
    pub fn cancel_auto_dismiss(&self) {
        self.send(Message::CancelAutoDismiss(CancelAutoDismiss {
            correlation_id: Uuid::new_v4(),
        }));
    }

    /// Resets the queue.
    pub fn clear(&self) {
        self.send(Message::Clear(ClearQueue {
            correlation_id: Uuid::new_v4(),
        }));
    }

    /// Registers `subscriber`. It is called with the current event before
    /// this returns.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Unavailable` if the runtime has stopped.
    pub async fn subscribe(
        &self,
        subscriber: Box<dyn Subscriber>,
    ) -> Result<SubscriptionId, DomainError> {
        let (response, receiver) = oneshot::channel();
        self.request(Message::Subscribe {
            subscriber,
            response,
        })?;
        receiver.await.map_err(stopped)
    }

    /// Removes a subscriber. Returns whether it was registered.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Unavailable` if the runtime has stopped.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> Result<bool, DomainError> {
        let (response, receiver) = oneshot::channel();
        self.request(Message::Unsubscribe { id, response })?;
        receiver.await.map_err(stopped)
    }

    /// Copies the current queue state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Unavailable` if the runtime has stopped.
    pub async fn snapshot(&self) -> Result<QueueSnapshot, DomainError> {
        let (response, receiver) = oneshot::channel();
        self.request(Message::Snapshot { response })?;
        receiver.await.map_err(stopped)
    }

    /// Asks the runtime to stop after the messages already sent.
    pub fn shutdown(&self) {
        self.send(Message::Shutdown);
    }

    fn send(&self, message: Message) {
        if let Err(mpsc::error::SendError(message)) = self.sender.send(message) {
            warn!(?message, "notification queue runtime stopped; message dropped");
        }
    }

    fn request(&self, message: Message) -> Result<(), DomainError> {
        self.sender
            .send(message)
            .map_err(|_| DomainError::Unavailable("runtime task has stopped".to_owned()))
    }
}

fn stopped(_: oneshot::error::RecvError) -> DomainError {
    DomainError::Unavailable("runtime task dropped the reply".to_owned())
}

/// Spawns and runs the task that owns a [`QueueService`].
pub struct QueueRuntime {
    service: QueueService,
    receiver: mpsc::UnboundedReceiver<Message>,
}

impl QueueRuntime {
    /// Spawns the runtime on the current tokio runtime. The join handle
    /// yields the service back after shutdown.
    ///
    /// Deadlines are turned into tokio sleeps using the service's clock, so
    /// build the service with [`TokioClock`] (or `SystemClock`) rather than a
    /// clock that only moves by hand.
    #[must_use]
    pub fn spawn(service: QueueService) -> (QueueHandle, JoinHandle<QueueService>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let runtime = Self { service, receiver };
        let task = tokio::spawn(runtime.run());
        (QueueHandle { sender }, task)
    }

    #[instrument(name = "notification_queue", skip_all)]
    async fn run(mut self) -> QueueService {
        info!("notification queue runtime started");
        loop {
            let sleep = self.sleep_until_next_deadline();
            tokio::select! {
                biased;

                message = self.receiver.recv() => {
                    match message {
                        None | Some(Message::Shutdown) => break,
                        Some(message) => self.handle(message),
                    }
                }
                () = sleep => {
                    let fired = self.service.fire_due_timers();
                    if fired > 0 {
                        debug!(fired, "timers fired");
                    }
                }
            }
        }
        info!("notification queue runtime stopped");
        self.service
    }

    fn sleep_until_next_deadline(&self) -> impl Future<Output = ()> + use<> {
        let wait = self.service.next_deadline().map(|deadline| {
            (deadline - self.service.now())
                .to_std()
                .unwrap_or(Duration::ZERO)
        });
        async move {
            match wait {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        }
    }

    fn handle(&mut self, message: Message) {
        match message {
            Message::Publish(command) => {
                debug!(
                    command_type = command.command_type(),
                    correlation_id = %command.correlation_id(),
                    event_type = %command.event_type,
                    "handling command"
                );
                self.service.publish(command.event_type, command.payload);
            }
            Message::Dismiss(command) => {
                log_command(&command);
                self.service.dismiss_current();
            }
            Message::CancelAutoDismiss(command) => {
                log_command(&command);
                self.service.cancel_auto_dismiss();
            }
            Message::Clear(command) => {
                log_command(&command);
                self.service.clear();
            }
            Message::Subscribe {
                subscriber,
                response,
            } => {
                let id = self.service.subscribe(subscriber);
                let _ = response.send(id);
            }
            Message::Unsubscribe { id, response } => {
                let _ = response.send(self.service.unsubscribe(id));
            }
            Message::Snapshot { response } => {
                let _ = response.send(self.service.snapshot());
            }
            Message::Shutdown => {}
        }
    }
}

fn log_command(command: &dyn Command) {
    debug!(
        command_type = command.command_type(),
        correlation_id = %command.correlation_id(),
        origin = %command.origin(),
        "handling command"
    );
}
