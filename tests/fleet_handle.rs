use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use multi_timer::{
    services::CommandLauncher,
    state::{BatchPhase, TimerState},
    tasks::FleetHandle,
    timers::{FleetConfig, FleetController, LinkKey, StartOutcome, TimerError, TimerId},
};

#[derive(Default)]
struct RecordingLauncher {
    launched: Mutex<Vec<String>>,
}

impl CommandLauncher for RecordingLauncher {
    fn launch(&self, label: &str, _path: &Path) {
        self.launched.lock().unwrap().push(label.to_string());
    }
}

async fn spawn_fleet(count: usize) -> (FleetHandle, Vec<TimerId>, Arc<RecordingLauncher>) {
    let launcher = Arc::new(RecordingLauncher::default());
    let (fleet, events) = FleetController::new(FleetConfig::default(), launcher.clone());
    let (handle, _join) = FleetHandle::spawn(fleet, events);
    handle.rebuild(count).await.unwrap();
    let ids = handle
        .snapshot()
        .await
        .unwrap()
        .timers
        .into_iter()
        .map(|t| t.id)
        .collect();
    (handle, ids, launcher)
}

async fn state_of(handle: &FleetHandle, id: &TimerId) -> TimerState {
    let snapshot = handle.snapshot().await.unwrap();
    snapshot.timers.iter().find(|t| &t.id == id).unwrap().state
}

#[tokio::test(start_paused = true)]
async fn linked_timers_start_together() {
    let (handle, ids, _) = spawn_fleet(3).await;
    handle.set_link_key(ids[2].clone(), "B".parse().unwrap()).await.unwrap();
    handle.configure_duration(ids[0].clone(), 20).await.unwrap();
    handle.configure_duration(ids[2].clone(), 20).await.unwrap();

    assert_eq!(handle.start(ids[0].clone()).await, Ok(StartOutcome::Started));
    assert!(state_of(&handle, &ids[1]).await.is_active());
    assert_eq!(state_of(&handle, &ids[2]).await, TimerState::Idle);

    // Starting again pauses the whole group.
    assert_eq!(handle.start(ids[1].clone()).await, Ok(StartOutcome::Paused));
    assert_eq!(state_of(&handle, &ids[0]).await, TimerState::Paused);

    handle.batch_stop().await.unwrap();
    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn completion_reports_full_aggregate_and_launches() {
    let (handle, ids, launcher) = spawn_fleet(2).await;
    handle.configure_duration(ids[0].clone(), 3).await.unwrap();
    handle.add_command(ids[0].clone(), "Run File Browser".to_string()).await.unwrap();

    let mut updates = handle.subscribe();
    let mut aggregate = handle.aggregate();
    handle.batch_start().await.unwrap();

    let mut finished = 0;
    while finished < 2 {
        let event = updates.recv().await.unwrap();
        if event.state == TimerState::Finished {
            assert_eq!(event.ratio_percent, 100);
            finished += 1;
        }
    }

    aggregate.wait_for(|a| *a == 100).await.unwrap();
    assert_eq!(handle.snapshot().await.unwrap().aggregate_percent, 100);
    // One command on the first timer only.
    assert_eq!(*launcher.launched.lock().unwrap(), vec!["Run File Browser".to_string()]);
    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn batch_start_reports_the_unconfigured_timer() {
    let (handle, ids, _) = spawn_fleet(2).await;
    handle.set_link_key(ids[1].clone(), LinkKey::from_index(1).unwrap()).await.unwrap();
    handle.configure_duration(ids[0].clone(), 5).await.unwrap();

    assert_eq!(
        handle.batch_start().await,
        Err(TimerError::NotConfigured { id: ids[1].clone() })
    );
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.batch, BatchPhase::Idle);
    assert!(snapshot.timers.iter().all(|t| t.state == TimerState::Idle));
    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn rebuild_waits_for_a_quiet_fleet() {
    let (handle, ids, _) = spawn_fleet(2).await;
    handle.configure_duration(ids[0].clone(), 60).await.unwrap();
    handle.start(ids[0].clone()).await.unwrap();

    assert!(matches!(handle.rebuild(5).await, Err(TimerError::FleetBusy { .. })));
    assert_eq!(handle.snapshot().await.unwrap().timers.len(), 2);

    handle.stop(ids[0].clone()).await.unwrap();
    handle.rebuild(5).await.unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.timers.len(), 5);
    assert!(snapshot.timers.iter().all(|t| t.duration_seconds == 0 && t.state == TimerState::Idle));
    assert!(snapshot.timers.iter().all(|t| t.link_key == LinkKey::default()));
    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn handle_reports_engine_gone_after_shutdown() {
    let (handle, ids, _) = spawn_fleet(1).await;
    handle.shutdown().await.unwrap();
    assert_eq!(handle.start(ids[0].clone()).await, Err(TimerError::EngineUnavailable));
}
