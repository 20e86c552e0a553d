//! Fleet of timers: aggregate progress, link groups and batch actions
//!
//! The fleet lives on a single coordinating task. Countdown tasks only talk to
//! it through the progress channel, so none of its bookkeeping needs a lock.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use super::{
    LinkChanged, LinkKey, ProgressEvent, StartOutcome, TaskTiming, TimerController, TimerError,
    TimerId, TimerSnapshot,
};
use crate::{
    services::{CommandCatalog, CommandLauncher},
    state::{BatchPhase, StateFlags, StateRegister},
};

/// Largest fleet a rebuild accepts.
pub const MAX_FLEET_SIZE: usize = 12;

const UPDATE_CAPACITY: usize = 256;

/// Engine settings shared by every timer in the fleet.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub timing: TaskTiming,
    pub catalog: CommandCatalog,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            timing: TaskTiming::default(),
            catalog: CommandCatalog::default(),
        }
    }
}

/// Point-in-time view of the whole fleet.
#[derive(Debug, Clone, Serialize)]
pub struct FleetSnapshot {
    pub aggregate_percent: u8,
    pub batch: BatchPhase,
    pub batch_flags: u8,
    pub groups: BTreeMap<LinkKey, Vec<TimerId>>,
    pub timers: Vec<TimerSnapshot>,
}

pub struct FleetController {
    config: FleetConfig,
    members: Vec<TimerController>,
    /// Group index: current link key per member.
    links: HashMap<TimerId, LinkKey>,
    /// Last reported ratio per member, for the aggregate.
    progress: HashMap<TimerId, u8>,
    batch_state: StateRegister,
    events_tx: mpsc::UnboundedSender<ProgressEvent>,
    updates_tx: broadcast::Sender<ProgressEvent>,
    aggregate_tx: watch::Sender<u8>,
    launcher: Arc<dyn CommandLauncher>,
}

impl FleetController {
    /// Create an empty fleet plus the receiver its countdown tasks report to.
    pub fn new(
        config: FleetConfig,
        launcher: Arc<dyn CommandLauncher>,
    ) -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (updates_tx, _) = broadcast::channel(UPDATE_CAPACITY);
        let (aggregate_tx, _) = watch::channel(0);

        let fleet = Self {
            config,
            members: Vec::new(),
            links: HashMap::new(),
            progress: HashMap::new(),
            batch_state: StateRegister::new(),
            events_tx,
            updates_tx,
            aggregate_tx,
            launcher,
        };
        (fleet, events_rx)
    }

    /// Member ids in creation order.
    pub fn ids(&self) -> Vec<TimerId> {
        self.members.iter().map(|m| m.id().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member(&self, id: &TimerId) -> Option<&TimerController> {
        self.members.iter().find(|m| m.id() == id)
    }

    fn member_mut(&mut self, id: &TimerId) -> Result<&mut TimerController, TimerError> {
        self.members
            .iter_mut()
            .find(|m| m.id() == id)
            .ok_or_else(|| TimerError::UnknownTimer { id: id.clone() })
    }

    /// Per-event fan-out for observers.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.updates_tx.subscribe()
    }

    pub fn updates_sender(&self) -> broadcast::Sender<ProgressEvent> {
        self.updates_tx.clone()
    }

    pub fn aggregate_watch(&self) -> watch::Receiver<u8> {
        self.aggregate_tx.subscribe()
    }

    /// Integer mean of every reported ratio; 0 before anything reported.
    pub fn aggregate(&self) -> u8 {
        if self.progress.is_empty() {
            return 0;
        }
        let sum: usize = self.progress.values().map(|r| usize::from(*r)).sum();
        u8::try_from(sum / self.progress.len()).unwrap_or(100)
    }

    pub fn batch_phase(&self) -> BatchPhase {
        BatchPhase::of(&self.batch_state)
    }

    /// Replace every member with `count` fresh, unconfigured timers.
    ///
    /// Refused while any member is still running.
    pub async fn rebuild(&mut self, count: usize) -> Result<(), TimerError> {
        if !(1..=MAX_FLEET_SIZE).contains(&count) {
            return Err(TimerError::InvalidFleetSize {
                requested: count,
                max: MAX_FLEET_SIZE,
            });
        }
        if let Some(busy) = self.members.iter().find(|m| m.is_running()) {
            warn!("Timer {} is running, refusing fleet rebuild", busy.id());
            return Err(TimerError::FleetBusy { id: busy.id().clone() });
        }

        for member in &mut self.members {
            member.stop().await?;
        }
        self.members.clear();
        self.links.clear();
        self.progress.clear();
        self.batch_state.clear();
        self.aggregate_tx.send_replace(0);

        for _ in 0..count {
            let id = TimerId::generate();
            let member = TimerController::new(id.clone(), self.config.timing, self.events_tx.clone());
            self.links.insert(id, member.link_key());
            self.members.push(member);
        }

        info!("Fleet rebuilt with {} timers", count);
        Ok(())
    }

    /// Members sharing `id`'s link key, excluding `id`; empty when unlinked.
    pub fn linked_siblings(&self, id: &TimerId) -> Vec<TimerId> {
        let Some(key) = self.links.get(id) else {
            return Vec::new();
        };
        self.members
            .iter()
            .map(|m| m.id())
            .filter(|other| *other != id && self.links.get(*other) == Some(key))
            .cloned()
            .collect()
    }

    /// Keys held by more than one member, with their members.
    pub fn active_groups(&self) -> BTreeMap<LinkKey, Vec<TimerId>> {
        let mut groups: BTreeMap<LinkKey, Vec<TimerId>> = BTreeMap::new();
        for member in &self.members {
            if let Some(key) = self.links.get(member.id()) {
                groups.entry(*key).or_default().push(member.id().clone());
            }
        }
        groups.retain(|_, members| members.len() > 1);
        groups
    }

    /// Set a member's duration and copy it to its linked siblings.
    pub fn configure_duration(&mut self, id: &TimerId, seconds: u64) -> Result<(), TimerError> {
        self.member_mut(id)?.configure_duration(seconds);
        for sibling in self.linked_siblings(id) {
            self.member_mut(&sibling)?.configure_duration(seconds);
            debug!("Timer {} duration linked from {}", sibling, id);
        }
        Ok(())
    }

    /// Operator start (or pause/resume) of one member, replicated to its group.
    pub async fn start(&mut self, id: &TimerId) -> Result<StartOutcome, TimerError> {
        let outcome = self.member_mut(id)?.start().await?;
        for sibling in self.linked_siblings(id) {
            match self.member_mut(&sibling)?.start().await {
                Ok(linked) => debug!("Timer {} {} via link from {}", sibling, linked, id),
                Err(e) => warn!("Linked start of {} failed: {}", sibling, e),
            }
        }
        Ok(outcome)
    }

    /// Operator stop of one member, replicated to its group.
    pub async fn stop(&mut self, id: &TimerId) -> Result<(), TimerError> {
        let result = self.member_mut(id)?.stop().await;
        for sibling in self.linked_siblings(id) {
            if let Err(e) = self.member_mut(&sibling)?.stop().await {
                warn!("Linked stop of {} failed: {}", sibling, e);
            }
        }
        result
    }

    pub fn set_link_key(&mut self, id: &TimerId, key: LinkKey) -> Result<(), TimerError> {
        let groups = self.members.len();
        if key.index() >= groups {
            return Err(TimerError::InvalidLinkKey { key, groups });
        }
        if let Some(change) = self.member_mut(id)?.set_link_key(key) {
            self.on_link_changed(change);
        }
        Ok(())
    }

    pub fn on_link_changed(&mut self, change: LinkChanged) {
        info!("Timer {} moved to link group {}", change.timer_id, change.key);
        self.links.insert(change.timer_id, change.key);
    }

    pub fn add_command(&mut self, id: &TimerId, label: String) -> Result<(), TimerError> {
        if !self.config.catalog.contains(&label) {
            return Err(TimerError::UnknownCommand { label });
        }
        self.member_mut(id)?.add_command(label);
        Ok(())
    }

    pub fn remove_command(&mut self, id: &TimerId, index: usize) -> Result<String, TimerError> {
        self.member_mut(id)?.remove_command(index)
    }

    /// Start, pause or resume every member together.
    ///
    /// Nothing changes unless every member has a duration.
    pub async fn batch_start(&mut self) -> Result<BatchPhase, TimerError> {
        if let Some(unset) = self.members.iter().find(|m| !m.is_configured()) {
            warn!("Timer {} has no duration, refusing batch start", unset.id());
            return Err(TimerError::NotConfigured { id: unset.id().clone() });
        }

        // A cycle whose members all ended on their own starts over.
        let in_cycle =
            !self.batch_state.is_empty() && self.members.iter().any(|m| m.is_running());
        if in_cycle {
            self.batch_state.toggle(StateFlags::STARTED | StateFlags::WAITING);
        } else {
            self.batch_state.clear();
            self.batch_state.activate(StateFlags::STARTED);
        }

        for member in &mut self.members {
            if let Err(e) = member.start().await {
                warn!("Batch start of {} failed: {}", member.id(), e);
            }
        }

        let phase = self.batch_phase();
        info!("Batch {} across {} timers", phase, self.members.len());
        Ok(phase)
    }

    /// Stop every member, then reset the batch cycle.
    pub async fn batch_stop(&mut self) -> Result<(), TimerError> {
        let mut first_error = None;
        for member in &mut self.members {
            if let Err(e) = member.stop().await {
                warn!("Batch stop of {} failed: {}", member.id(), e);
                first_error.get_or_insert(e);
            }
        }
        self.batch_state.clear();
        info!("Batch stop across {} timers", self.members.len());
        first_error.map_or(Ok(()), Err)
    }

    /// Fold one countdown event into member state and the aggregate.
    pub fn on_progress_event(&mut self, event: ProgressEvent) {
        let Some(member) = self.members.iter_mut().find(|m| *m.id() == event.timer_id) else {
            debug!("Dropping event for retired timer {}", event.timer_id);
            return;
        };
        let current = member.on_progress_event(&event);
        // An earlier run's completion still counts after a quick restart.
        let completed = member.is_natural_completion(&event);
        if !current && !completed {
            return;
        }
        let commands = if completed { member.commands().to_vec() } else { Vec::new() };

        self.progress.insert(event.timer_id.clone(), event.ratio_percent);
        let aggregate = self.aggregate();
        self.aggregate_tx.send_replace(aggregate);

        if completed {
            self.launch_commands(&event.timer_id, &commands);
        }
        // No subscribers is fine.
        let _ = self.updates_tx.send(event);
    }

    fn launch_commands(&self, id: &TimerId, labels: &[String]) {
        for label in labels {
            match self.config.catalog.resolve(label) {
                Some(path) => {
                    info!("Timer {} finished, running '{}'", id, label);
                    self.launcher.launch(label, path);
                }
                None => warn!("Timer {} command '{}' is no longer in the catalog", id, label),
            }
        }
    }

    pub fn snapshot(&self) -> FleetSnapshot {
        FleetSnapshot {
            aggregate_percent: self.aggregate(),
            batch: self.batch_phase(),
            batch_flags: self.batch_state.flags().bits(),
            groups: self.active_groups(),
            timers: self.members.iter().map(TimerController::snapshot).collect(),
        }
    }

    /// Stop every member before the process exits.
    pub async fn shutdown(&mut self) {
        for member in &mut self.members {
            if let Err(e) = member.stop().await {
                warn!("Timer {} did not shut down cleanly: {}", member.id(), e);
            }
        }
        info!("Fleet shut down");
    }
}
