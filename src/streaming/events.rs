//! Events published by the streamer and the channel they travel on.

use std::cell::RefCell;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use cgmath::Point3;

use crate::voxels::coords::BlockPos;
use crate::voxels::world::{Block, BlockFace, Entity};

/// Entity changes, addressed by entity id.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityEvent {
    /// An entity came into range
    Spawned(Entity),
    /// An entity moved or turned
    Moved {
        /// Entity id
        id: u32,
        /// New position
        position: Point3<f64>,
        /// Head pitch in radians
        pitch: f32,
        /// Body yaw in radians
        yaw: f32,
    },
    /// An entity left range or was destroyed
    Removed {
        /// Entity id
        id: u32,
    },
}

/// Everything the streamer tells its owner about the world.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    /// Entity spawn, movement or removal
    Entity(EntityEvent),
    /// A single block changed
    BlockUpdate {
        /// Position of the block
        pos: BlockPos,
        /// New block state id
        state_id: u32,
    },
    /// A column entered the loaded set
    LoadChunk {
        /// Block x of the column origin
        x: i32,
        /// Block z of the column origin
        z: i32,
        /// Serialized column bytes
        chunk: Arc<[u8]>,
        /// Block entities embedded in the column
        block_entities: serde_json::Value,
    },
    /// A column left the loaded set
    UnloadChunk {
        /// Block x of the column origin
        x: i32,
        /// Block z of the column origin
        z: i32,
    },
    /// A mouse click hit a block
    BlockClicked {
        /// The block that was hit
        block: Block,
        /// The face that was hit
        face: BlockFace,
        /// Mouse button index
        button: u8,
    },
}

/// Single-threaded publish/subscribe channel.
///
/// Every subscriber gets its own receiver and sees every event emitted after
/// it subscribed. Dropping the receiver unsubscribes.
pub struct EventBus<T> {
    subscribers: RefCell<Vec<Sender<T>>>,
}

impl<T: Clone> EventBus<T> {
    /// Creates a bus without subscribers.
    pub fn new() -> Self {
        EventBus {
            subscribers: RefCell::new(Vec::new()),
        }
    }

    /// Registers a new subscriber.
    pub fn subscribe(&self) -> Receiver<T> {
        let (sender, receiver) = channel();
        self.subscribers.borrow_mut().push(sender);
        receiver
    }

    /// Sends `event` to every live subscriber and forgets the dropped ones.
    pub fn emit(&self, event: T) {
        self.subscribers
            .borrow_mut()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    /// Number of subscribers still registered.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_sees_later_events() {
        let bus = EventBus::new();
        let first = bus.subscribe();
        bus.emit(1);
        let second = bus.subscribe();
        bus.emit(2);

        assert_eq!(first.try_iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(second.try_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn dropped_receivers_are_pruned_on_emit() {
        let bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit("chunk");
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(kept.recv(), Ok("chunk"));
    }
}
