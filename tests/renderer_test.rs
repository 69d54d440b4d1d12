mod common;

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;

use common::RecordingMesher;
use voxel_stream::{
    RendererHooks, StreamError, ThreadWorkerPool, WorldConfig, WorldRenderer, WorldRendererConfig,
};

fn thread_renderer(num_workers: usize, hooks: RendererHooks) -> WorldRenderer<ThreadWorkerPool> {
    WorldRenderer::new(
        WorldRendererConfig {
            num_workers,
            ..Default::default()
        },
        WorldConfig::default(),
        |n| ThreadWorkerPool::new(n, |_| Box::new(RecordingMesher::default())),
        hooks,
    )
}

#[test]
fn thread_pool_converges() {
    let geometry = Rc::new(Cell::new(0));
    let counter = geometry.clone();
    let hooks = RendererHooks {
        on_worker_message: Some(Box::new(move |_, _| counter.set(counter.get() + 1))),
        ..Default::default()
    };
    let mut renderer = thread_renderer(3, hooks);
    renderer.set_view_distance(2);
    renderer.set_version("1.20.4", serde_json::json!({})).unwrap();
    assert_eq!(renderer.worker_count(), 3);

    renderer.add_column(0, 0, Arc::from(vec![0u8; 256]), false).unwrap();
    renderer.add_column(16, 0, Arc::from(vec![0u8; 256]), false).unwrap();

    let mut waiter = renderer.wait_for_chunks_to_render();
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        renderer.process_tick().unwrap();
        if let Some(result) = (&mut waiter).now_or_never() {
            assert_eq!(result, Ok(()));
            break;
        }
        assert!(Instant::now() < deadline, "workers never converged");
        std::thread::sleep(Duration::from_millis(1));
    }

    assert!(renderer.all_chunks_finished());
    assert_eq!(renderer.tracker().finished_count(), 2);
    // Own sections of both columns, plus the seam sections each repaired in the other
    assert_eq!(geometry.get(), 64);
}

#[test]
fn reset_requires_a_new_version() {
    let mut renderer = thread_renderer(2, RendererHooks::default());
    renderer.set_view_distance(2);
    renderer.set_version("1.20.4", serde_json::json!({})).unwrap();
    renderer.add_column(0, 0, Arc::from(vec![]), false).unwrap();

    renderer.reset_world();
    assert_eq!(renderer.worker_count(), 0);
    assert_eq!(
        renderer.add_column(0, 0, Arc::from(vec![]), false),
        Err(StreamError::RendererInactive)
    );

    renderer.set_version("1.21", serde_json::json!({})).unwrap();
    assert_eq!(renderer.version(), Some("1.21"));
    assert_eq!(renderer.worker_count(), 2);
    assert_eq!(renderer.tracker().outstanding_sections(), 0);
    renderer.add_column(0, 0, Arc::from(vec![]), false).unwrap();
}
