mod common;

use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

use cgmath::Point3;
use futures::FutureExt;

use common::{apply_events, inline_renderer, FlatWorld};
use voxel_stream::{ChunkKey, RendererHooks, StreamerConfig, ViewportChunkStreamer};

fn streamer(view_distance: i32) -> ViewportChunkStreamer<FlatWorld> {
    ViewportChunkStreamer::new(
        FlatWorld { height: 70 },
        StreamerConfig {
            view_distance,
            ..Default::default()
        },
    )
}

#[test]
fn streamed_view_converges() {
    let converged = Rc::new(Cell::new(0));
    let counter = converged.clone();
    let hooks = RendererHooks {
        on_all_chunks_loaded: Some(Box::new(move || counter.set(counter.get() + 1))),
        ..Default::default()
    };
    let mut renderer = inline_renderer(4, hooks);
    let streamer = streamer(3);
    let events = streamer.subscribe();

    renderer.set_view_distance(3);
    renderer.set_version("1.20.4", serde_json::json!({})).unwrap();

    let loaded = pollster::block_on(streamer.init(Point3::new(8.0, 80.0, 8.0)));
    assert_eq!(loaded, 25);
    assert_eq!(apply_events(&events, &mut renderer).unwrap(), 25);
    assert!(!renderer.all_chunks_finished());

    renderer.process_tick().unwrap();
    assert!(renderer.all_chunks_finished());
    assert_eq!(renderer.tracker().loaded_count(), 25);
    assert_eq!(renderer.tracker().finished_count(), 25);
    assert_eq!(converged.get(), 1);
}

#[test]
fn renderer_follows_the_observer() {
    let mut renderer = inline_renderer(3, RendererHooks::default());
    let streamer = streamer(3);
    let events = streamer.subscribe();
    renderer.set_view_distance(3);
    renderer.set_version("1.20.4", serde_json::json!({})).unwrap();

    let mut position = Point3::new(8.0, 80.0, 8.0);
    pollster::block_on(streamer.init(position));
    apply_events(&events, &mut renderer).unwrap();
    renderer.process_tick().unwrap();

    for step in 0..6 {
        position.x += 20.0;
        position.z -= if step % 2 == 0 { 17.0 } else { 3.0 };
        renderer.update_viewer_position(position);
        pollster::block_on(streamer.update_position(position, false));
        apply_events(&events, &mut renderer).unwrap();
        renderer.process_tick().unwrap();

        let streamed: HashSet<ChunkKey> = streamer.loaded_chunks().into_iter().collect();
        let rendered: HashSet<ChunkKey> = renderer.tracker().loaded_chunks().collect();
        assert_eq!(streamed, rendered);
        assert!(renderer.all_chunks_finished());
        assert_eq!(renderer.tracker().outstanding_sections(), 0);
    }
}

#[test]
fn waiter_resolves_once_replies_are_processed() {
    let mut renderer = inline_renderer(2, RendererHooks::default());
    let streamer = streamer(2);
    let events = streamer.subscribe();
    renderer.set_view_distance(2);
    renderer.set_version("1.20.4", serde_json::json!({})).unwrap();

    pollster::block_on(streamer.init(Point3::new(0.0, 0.0, 0.0)));
    apply_events(&events, &mut renderer).unwrap();

    let mut waiter = renderer.wait_for_chunks_to_render();
    assert!((&mut waiter).now_or_never().is_none());

    renderer.process_tick().unwrap();
    assert_eq!(pollster::block_on(waiter), Ok(()));
}
