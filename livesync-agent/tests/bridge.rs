mod support;

use std::time::Duration;

use livesync_agent::{AgentError, BridgeAgent, BridgeTimings};
use livesync_core::Archive;
use tokio::sync::broadcast;
use tokio::time::sleep;

use support::{project, MockEditor, MockHost};

const TIMINGS: BridgeTimings = BridgeTimings {
    save_debounce: Duration::from_millis(500),
    settle_grace: Duration::from_millis(1000),
};

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn inbound_load_with_synthetic_change_sends_nothing() {
    let editor = MockEditor::noisy();
    let (host, events) = MockHost::new(&project(&["Stage"]));
    let (shutdown_tx, _) = broadcast::channel(1);
    let agent = BridgeAgent::new(editor.clone(), host.clone(), TIMINGS);
    let task = tokio::spawn(agent.run(shutdown_tx.subscribe()));

    sleep(Duration::from_millis(10)).await;
    assert_eq!(editor.loads(), 1, "initial archive applied");

    events
        .send(project(&["Stage", "sprite-1"]).to_base64())
        .await
        .unwrap();
    sleep(Duration::from_millis(10)).await;
    editor.edit();

    sleep(Duration::from_secs(3)).await;
    assert_eq!(editor.loads(), 2);
    assert_eq!(host.attempts(), 0);

    shutdown_tx.send(()).unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn edits_after_settle_coalesce_into_one_save() {
    let editor = MockEditor::new();
    let initial = project(&["Stage", "sprite-1"]);
    let (host, _events) = MockHost::new(&initial);
    let (shutdown_tx, _) = broadcast::channel(1);
    let task = tokio::spawn(BridgeAgent::new(editor.clone(), host.clone(), TIMINGS).run(shutdown_tx.subscribe()));

    sleep(Duration::from_millis(1500)).await;
    for _ in 0..3 {
        editor.edit();
        sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(host.attempts(), 0, "still inside the debounce window");

    sleep(Duration::from_secs(2)).await;
    let saves = host.saves();
    assert_eq!(saves.len(), 1);
    assert_eq!(Archive::from_base64(&saves[0]).unwrap(), initial);

    shutdown_tx.send(()).unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn inbound_update_cancels_pending_save() {
    let editor = MockEditor::new();
    let (host, events) = MockHost::new(&project(&["Stage"]));
    let (shutdown_tx, _) = broadcast::channel(1);
    let task = tokio::spawn(BridgeAgent::new(editor.clone(), host.clone(), TIMINGS).run(shutdown_tx.subscribe()));

    sleep(Duration::from_millis(1500)).await;
    editor.edit();
    sleep(Duration::from_millis(200)).await;
    events.send(project(&["Stage", "sprite-2"]).to_base64()).await.unwrap();

    sleep(Duration::from_secs(3)).await;
    assert_eq!(host.attempts(), 0);
    assert_eq!(editor.loads(), 2);

    shutdown_tx.send(()).unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn failed_save_is_dropped_and_next_edit_retries() {
    let editor = MockEditor::new();
    let (host, _events) = MockHost::new(&project(&["Stage"]));
    host.fail_saves(true);
    let (shutdown_tx, _) = broadcast::channel(1);
    let task = tokio::spawn(BridgeAgent::new(editor.clone(), host.clone(), TIMINGS).run(shutdown_tx.subscribe()));

    sleep(Duration::from_millis(1500)).await;
    editor.edit();
    sleep(Duration::from_secs(2)).await;
    assert_eq!(host.attempts(), 1);
    assert!(host.saves().is_empty());

    host.fail_saves(false);
    sleep(Duration::from_secs(2)).await;
    assert_eq!(host.attempts(), 1, "no retry without a new edit");

    editor.edit();
    sleep(Duration::from_secs(2)).await;
    assert_eq!(host.saves().len(), 1);

    shutdown_tx.send(()).unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn undecodable_inbound_payload_is_ignored() {
    let editor = MockEditor::new();
    let (host, events) = MockHost::new(&project(&["Stage"]));
    let (shutdown_tx, _) = broadcast::channel(1);
    let task = tokio::spawn(BridgeAgent::new(editor.clone(), host.clone(), TIMINGS).run(shutdown_tx.subscribe()));

    events.send("%%% not base64".to_string()).await.unwrap();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(editor.loads(), 1);
    assert!(!task.is_finished());

    shutdown_tx.send(()).unwrap();
    task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn host_stream_end_stops_the_agent() {
    let editor = MockEditor::new();
    let (host, events) = MockHost::new(&project(&["Stage"]));
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let task = tokio::spawn(BridgeAgent::new(editor, host, TIMINGS).run(shutdown_tx.subscribe()));

    drop(events);
    let result = task.await.unwrap();
    assert!(matches!(result, Err(AgentError::TransportClosed)));
}
