//! Queue ordering and admission behavior under concurrent submissions.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use common::{wait_for_terminal, HarnessOptions, StubEncoder, StubProber, TestHarness};
use streamforge::queue::TaskState;

/// Harness with one slot and a gated encoder so tasks stay in flight until
/// the test releases them. The low-resolution prober keeps each task at a
/// single rendition, one gate permit per task.
fn gated_harness(gate: Arc<Semaphore>) -> TestHarness {
    TestHarness::with_options(HarnessOptions {
        prober: StubProber::with_dimensions(426, 240),
        encoder: StubEncoder::gated(gate),
        ..Default::default()
    })
}

async fn wait_for_state(
    harness: &TestHarness,
    id: uuid::Uuid,
    state: TaskState,
) -> streamforge::queue::Task {
    for _ in 0..500 {
        if let Some(task) = harness.registry.get(id) {
            if task.state == state {
                return task;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {id} never reached {state:?}");
}

#[tokio::test]
async fn waiting_tasks_hold_fifo_positions() {
    let gate = Arc::new(Semaphore::new(0));
    let harness = gated_harness(Arc::clone(&gate));

    let mut ids = Vec::new();
    for key in ["videos/a.mp4", "videos/b.mp4", "videos/c.mp4"] {
        harness.store.put(key, b"bytes");
        let task = harness.registry.insert(key);
        harness.ctx.admission.on_enqueue();
        harness.ctx.workers.submit(task.id).unwrap();
        ids.push(task.id);
    }

    // The single worker picks up the first task and blocks on the gate.
    wait_for_state(&harness, ids[0], TaskState::Running).await;
    assert_eq!(harness.ctx.admission.active(), 1);

    let b = harness.registry.get(ids[1]).unwrap();
    let c = harness.registry.get(ids[2]).unwrap();
    assert_eq!(b.state, TaskState::Queued);
    assert_eq!(b.queue_position, 1);
    assert_eq!(c.queue_position, 2);

    // Release the first task; the second moves up and starts.
    gate.add_permits(1);
    wait_for_terminal(&harness.registry, ids[0]).await;
    wait_for_state(&harness, ids[1], TaskState::Running).await;
    assert_eq!(harness.registry.get(ids[2]).unwrap().queue_position, 1);

    // Drain the rest.
    gate.add_permits(2);
    let b = wait_for_terminal(&harness.registry, ids[1]).await;
    let c = wait_for_terminal(&harness.registry, ids[2]).await;
    assert_eq!(b.state, TaskState::Completed);
    assert_eq!(c.state, TaskState::Completed);
    assert_eq!(harness.ctx.admission.active(), 0);
}

#[tokio::test]
async fn running_task_reports_progress_message() {
    let gate = Arc::new(Semaphore::new(0));
    let harness = gated_harness(Arc::clone(&gate));

    harness.store.put("videos/a.mp4", b"bytes");
    let task = harness.registry.insert("videos/a.mp4");
    harness.ctx.admission.on_enqueue();
    harness.ctx.workers.submit(task.id).unwrap();

    let running = wait_for_state(&harness, task.id, TaskState::Running).await;
    assert_eq!(running.queue_position, 0);

    gate.add_permits(1);
    wait_for_terminal(&harness.registry, task.id).await;
}

#[tokio::test]
async fn two_slots_run_two_tasks_at_once() {
    let gate = Arc::new(Semaphore::new(0));
    let mut opts = HarnessOptions {
        prober: StubProber::with_dimensions(426, 240),
        encoder: StubEncoder::gated(Arc::clone(&gate)),
        ..Default::default()
    };
    opts.config.queue.max_concurrent_tasks = 2;
    let harness = TestHarness::with_options(opts);

    let mut ids = Vec::new();
    for key in ["videos/a.mp4", "videos/b.mp4", "videos/c.mp4"] {
        harness.store.put(key, b"bytes");
        let task = harness.registry.insert(key);
        harness.ctx.admission.on_enqueue();
        harness.ctx.workers.submit(task.id).unwrap();
        ids.push(task.id);
    }

    wait_for_state(&harness, ids[0], TaskState::Running).await;
    wait_for_state(&harness, ids[1], TaskState::Running).await;
    assert_eq!(harness.ctx.admission.active(), 2);
    assert_eq!(harness.registry.get(ids[2]).unwrap().queue_position, 1);

    gate.add_permits(3);
    for id in ids {
        let task = wait_for_terminal(&harness.registry, id).await;
        assert_eq!(task.state, TaskState::Completed);
    }
}

#[tokio::test]
async fn full_buffer_refuses_submissions() {
    // Capacity 1 slot with depth 1 gives a 1-deep channel; the worker takes
    // the first task immediately, so the third submission finds it full.
    let gate = Arc::new(Semaphore::new(0));
    let mut opts = HarnessOptions {
        prober: StubProber::with_dimensions(426, 240),
        encoder: StubEncoder::gated(Arc::clone(&gate)),
        ..Default::default()
    };
    opts.config.queue.queue_depth_per_slot = 1;
    let harness = TestHarness::with_options(opts);

    let first = harness.registry.insert("videos/a.mp4");
    harness.store.put("videos/a.mp4", b"bytes");
    harness.ctx.workers.submit(first.id).unwrap();
    wait_for_state(&harness, first.id, TaskState::Running).await;

    harness.store.put("videos/b.mp4", b"bytes");
    let second = harness.registry.insert("videos/b.mp4");
    harness.ctx.workers.submit(second.id).unwrap();

    let third = harness.registry.insert("videos/c.mp4");
    let err = harness.ctx.workers.submit(third.id).unwrap_err();
    assert!(matches!(err, streamforge::error::Error::QueueFull));

    gate.add_permits(2);
    wait_for_terminal(&harness.registry, first.id).await;
    wait_for_terminal(&harness.registry, second.id).await;
}
