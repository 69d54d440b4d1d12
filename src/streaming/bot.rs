//! Per-session event feeds from a connected bot.
//!
//! A bot session hands the streamer a receiver of [`BotEvent`]s together with
//! the entities it already knows about. Sessions are keyed by username and
//! have to be removed explicitly when the session ends.

use std::sync::mpsc::Receiver;

use crate::voxels::coords::BlockPos;
use crate::voxels::world::{Block, Entity};

/// A change reported by a bot session.
#[derive(Debug, Clone, PartialEq)]
pub enum BotEvent {
    /// An entity came into range
    EntitySpawn(Entity),
    /// An entity moved
    EntityMoved(Entity),
    /// An entity left range
    EntityGone(Entity),
    /// The bot received a column; the position is any block inside it
    ChunkColumnLoad(BlockPos),
    /// A block changed to `new`
    BlockUpdate {
        /// The block before the change, if known
        old: Option<Block>,
        /// The block after the change
        new: Block,
    },
}

/// A bot session to attach to the streamer.
pub struct BotSession {
    /// Identity of the session
    pub username: String,
    /// Entity id of the bot itself
    pub entity_id: u32,
    /// Entities already known when the session attaches
    pub entities: Vec<Entity>,
    /// Feed of subsequent changes
    pub events: Receiver<BotEvent>,
}

/// A registered session, minus what was consumed on attach.
pub(crate) struct BotListener {
    pub(crate) entity_id: u32,
    pub(crate) events: Receiver<BotEvent>,
}

impl BotSession {
    pub(crate) fn into_listener(self) -> (String, Vec<Entity>, BotListener) {
        let listener = BotListener {
            entity_id: self.entity_id,
            events: self.events,
        };
        (self.username, self.entities, listener)
    }
}
