//! Tests for the tokio driver.

use std::time::Duration;

use http_push::{
    Engine,
    EngineConfig,
    Route,
    RouteTable,
    RuntimeError,
    TokioClock,
    runtime::{self, EngineHandle},
};
use http_push_testing::{
    RecordingSink,
    SinkLog,
    frames::{begin, data, end, reply_begin, window},
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const POLL: &[(&str, &str)] = &[
    (":path", "/feed"),
    ("x-retry-after", "30"),
    ("x-poll-injected", "no-cache"),
];

struct Running {
    handle: EngineHandle,
    task: JoinHandle<Engine>,
    shutdown: CancellationToken,
    source: SinkLog,
    target: SinkLog,
}

fn start() -> Running {
    let mut routes = RouteTable::new();
    routes
        .add(Route::input("source", 1, "target", 2))
        .expect("add input route");
    let mut engine =
        Engine::new(EngineConfig::default(), routes, TokioClock::new()).expect("valid config");
    let (source, source_log) = RecordingSink::new("source");
    let (target, target_log) = RecordingSink::new("target");
    engine.register_sink(source).expect("register source");
    engine.register_sink(target).expect("register target");

    let shutdown = CancellationToken::new();
    let (handle, task) = runtime::spawn(engine, 8, shutdown.clone());
    Running {
        handle,
        task,
        shutdown,
        source: source_log,
        target: target_log,
    }
}

#[tokio::test]
async fn frames_flow_through_the_driver() {
    let running = start();
    running
        .handle
        .request("source", begin(1, 1, 7, &[(":path", "/")]))
        .await
        .expect("send begin");
    running
        .handle
        .throttle("target", window(1, 16))
        .await
        .expect("send window");
    running
        .handle
        .request("source", data(1, b"body"))
        .await
        .expect("send data");
    running
        .handle
        .reply("target", reply_begin(10, 1, &[(":status", "200")]))
        .await
        .expect("send reply");
    running.handle.flush().await.expect("flush");

    assert_eq!(running.target.begins().len(), 1);
    assert_eq!(running.target.payloads(1), [&b"body"[..]]);
    assert_eq!(running.source.windows(1), [16]);
    assert_eq!(running.source.begins().len(), 1);

    running.shutdown.cancel();
    let engine = running.task.await.expect("engine task");
    assert_eq!(engine.correlation_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn deferred_poll_fires_on_tokio_time() {
    let running = start();
    running
        .handle
        .request("source", begin(1, 1, 7, POLL))
        .await
        .expect("send begin");
    running.handle.flush().await.expect("flush");
    assert!(running.target.is_empty());

    tokio::time::advance(Duration::from_secs(29)).await;
    running.handle.flush().await.expect("flush");
    assert!(running.target.is_empty(), "begin deferred for the full interval");

    tokio::time::advance(Duration::from_secs(1)).await;
    running.handle.flush().await.expect("flush");
    assert_eq!(running.target.begins().len(), 1);

    running.shutdown.cancel();
    let engine = running.task.await.expect("engine task");
    assert_eq!(engine.pending_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn aborted_poll_never_fires() {
    let running = start();
    running
        .handle
        .request("source", begin(1, 1, 7, POLL))
        .await
        .expect("send begin");
    running
        .handle
        .request("source", end(1))
        .await
        .expect("send end");
    running.handle.abort("source", 1).await.expect("send abort");
    running.handle.flush().await.expect("flush");

    tokio::time::advance(Duration::from_secs(60)).await;
    running.handle.flush().await.expect("flush");
    assert!(running.target.is_empty());

    running.shutdown.cancel();
    let engine = running.task.await.expect("engine task");
    assert_eq!(engine.slab().free_slots(), engine.slab().slot_count());
}

#[tokio::test(start_paused = true)]
async fn idle_engine_reclaims_expired_correlations() {
    let running = start();
    running
        .handle
        .request("source", begin(1, 1, 7, &[(":path", "/")]))
        .await
        .expect("send begin");
    running.handle.flush().await.expect("flush");

    // No further events: the engine has to wake on the expiry by itself.
    tokio::time::advance(EngineConfig::default().correlation_timeout).await;
    tokio::time::sleep(Duration::from_millis(1)).await;

    running.shutdown.cancel();
    let engine = running.task.await.expect("engine task");
    assert_eq!(engine.correlation_count(), 0);
    assert_eq!(engine.slab().free_slots(), engine.slab().slot_count());
}

#[tokio::test]
async fn dropping_every_handle_stops_the_engine() {
    let running = start();
    drop(running.handle);
    let engine = running.task.await.expect("engine task");
    assert_eq!(engine.open_streams(), 0);
}

#[tokio::test]
async fn handle_reports_stopped_engine() {
    let running = start();
    running.shutdown.cancel();
    running.task.await.expect("engine task");

    assert_eq!(running.handle.flush().await, Err(RuntimeError::Closed));
}
