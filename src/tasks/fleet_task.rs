//! Coordinating task that owns the fleet
//!
//! Operator commands and countdown events are both delivered to this one task,
//! which applies them in arrival order.

use std::ops::ControlFlow;

use tokio::{
    sync::{broadcast, mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    state::BatchPhase,
    timers::{
        FleetController, FleetSnapshot, LinkKey, ProgressEvent, StartOutcome, TimerError, TimerId,
    },
};

const COMMAND_CAPACITY: usize = 64;

type Reply<T> = oneshot::Sender<Result<T, TimerError>>;

/// Requests accepted by the fleet task.
#[derive(Debug)]
pub enum FleetCommand {
    Rebuild { count: usize, reply: Reply<()> },
    ConfigureDuration { id: TimerId, seconds: u64, reply: Reply<()> },
    Start { id: TimerId, reply: Reply<StartOutcome> },
    Stop { id: TimerId, reply: Reply<()> },
    SetLinkKey { id: TimerId, key: LinkKey, reply: Reply<()> },
    AddCommand { id: TimerId, label: String, reply: Reply<()> },
    RemoveCommand { id: TimerId, index: usize, reply: Reply<String> },
    BatchStart { reply: Reply<BatchPhase> },
    BatchStop { reply: Reply<()> },
    Snapshot { reply: oneshot::Sender<FleetSnapshot> },
    Shutdown { reply: oneshot::Sender<()> },
}

/// Cloneable entry point to a running fleet task.
#[derive(Clone)]
pub struct FleetHandle {
    commands: mpsc::Sender<FleetCommand>,
    updates: broadcast::Sender<ProgressEvent>,
    aggregate: watch::Receiver<u8>,
}

impl FleetHandle {
    /// Move the fleet onto its own task.
    pub fn spawn(
        fleet: FleetController,
        events: mpsc::UnboundedReceiver<ProgressEvent>,
    ) -> (Self, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let handle = Self {
            commands: commands_tx,
            updates: fleet.updates_sender(),
            aggregate: fleet.aggregate_watch(),
        };
        let join = tokio::spawn(fleet_task(fleet, events, commands_rx));
        (handle, join)
    }

    /// Every progress event the fleet accepts.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.updates.subscribe()
    }

    /// Aggregate progress, updated on every accepted event.
    pub fn aggregate(&self) -> watch::Receiver<u8> {
        self.aggregate.clone()
    }

    async fn send(&self, command: FleetCommand) -> Result<(), TimerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| TimerError::EngineUnavailable)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> FleetCommand,
    ) -> Result<T, TimerError> {
        let (reply, rx) = oneshot::channel();
        self.send(make(reply)).await?;
        rx.await.map_err(|_| TimerError::EngineUnavailable)?
    }

    pub async fn rebuild(&self, count: usize) -> Result<(), TimerError> {
        self.request(|reply| FleetCommand::Rebuild { count, reply }).await
    }

    pub async fn configure_duration(&self, id: TimerId, seconds: u64) -> Result<(), TimerError> {
        self.request(|reply| FleetCommand::ConfigureDuration { id, seconds, reply })
            .await
    }

    pub async fn start(&self, id: TimerId) -> Result<StartOutcome, TimerError> {
        self.request(|reply| FleetCommand::Start { id, reply }).await
    }

    pub async fn stop(&self, id: TimerId) -> Result<(), TimerError> {
        self.request(|reply| FleetCommand::Stop { id, reply }).await
    }

    pub async fn set_link_key(&self, id: TimerId, key: LinkKey) -> Result<(), TimerError> {
        self.request(|reply| FleetCommand::SetLinkKey { id, key, reply }).await
    }

    pub async fn add_command(&self, id: TimerId, label: String) -> Result<(), TimerError> {
        self.request(|reply| FleetCommand::AddCommand { id, label, reply }).await
    }

    pub async fn remove_command(&self, id: TimerId, index: usize) -> Result<String, TimerError> {
        self.request(|reply| FleetCommand::RemoveCommand { id, index, reply })
            .await
    }

    pub async fn batch_start(&self) -> Result<BatchPhase, TimerError> {
        self.request(|reply| FleetCommand::BatchStart { reply }).await
    }

    pub async fn batch_stop(&self) -> Result<(), TimerError> {
        self.request(|reply| FleetCommand::BatchStop { reply }).await
    }

    pub async fn snapshot(&self) -> Result<FleetSnapshot, TimerError> {
        let (reply, rx) = oneshot::channel();
        self.send(FleetCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| TimerError::EngineUnavailable)
    }

    /// Stop every timer and end the fleet task.
    pub async fn shutdown(&self) -> Result<(), TimerError> {
        let (reply, rx) = oneshot::channel();
        self.send(FleetCommand::Shutdown { reply }).await?;
        rx.await.map_err(|_| TimerError::EngineUnavailable)
    }
}

/// Run the fleet until shut down or every handle is dropped.
pub async fn fleet_task(
    mut fleet: FleetController,
    mut events: mpsc::UnboundedReceiver<ProgressEvent>,
    mut commands: mpsc::Receiver<FleetCommand>,
) {
    info!("Starting fleet task");

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                fleet.on_progress_event(event);
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    debug!("All fleet handles dropped");
                    fleet.shutdown().await;
                    break;
                };
                if execute(&mut fleet, command).await.is_break() {
                    break;
                }
            }
        }
    }

    info!("Fleet task finished");
}

async fn execute(fleet: &mut FleetController, command: FleetCommand) -> ControlFlow<()> {
    let delivered = match command {
        FleetCommand::Rebuild { count, reply } => reply.send(fleet.rebuild(count).await).is_ok(),
        FleetCommand::ConfigureDuration { id, seconds, reply } => {
            reply.send(fleet.configure_duration(&id, seconds)).is_ok()
        }
        FleetCommand::Start { id, reply } => reply.send(fleet.start(&id).await).is_ok(),
        FleetCommand::Stop { id, reply } => reply.send(fleet.stop(&id).await).is_ok(),
        FleetCommand::SetLinkKey { id, key, reply } => {
            reply.send(fleet.set_link_key(&id, key)).is_ok()
        }
        FleetCommand::AddCommand { id, label, reply } => {
            reply.send(fleet.add_command(&id, label)).is_ok()
        }
        FleetCommand::RemoveCommand { id, index, reply } => {
            reply.send(fleet.remove_command(&id, index)).is_ok()
        }
        FleetCommand::BatchStart { reply } => reply.send(fleet.batch_start().await).is_ok(),
        FleetCommand::BatchStop { reply } => reply.send(fleet.batch_stop().await).is_ok(),
        FleetCommand::Snapshot { reply } => reply.send(fleet.snapshot()).is_ok(),
        FleetCommand::Shutdown { reply } => {
            fleet.shutdown().await;
            if reply.send(()).is_err() {
                debug!("Shutdown requester went away");
            }
            return ControlFlow::Break(());
        }
    };

    if !delivered {
        warn!("Fleet command requester went away before the reply");
    }
    ControlFlow::Continue(())
}
