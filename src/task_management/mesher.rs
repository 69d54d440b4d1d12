//! # Section Mesher Interface
//!
//! The geometry algorithm that runs inside each worker is an external
//! collaborator. A worker only needs two capabilities from it: absorbing data
//! messages, and meshing one section on request. Everything else about the
//! worker loop (one `sectionFinished` per dirty request, forwarding of
//! geometry) lives in [`process_message`] so every pool implementation
//! answers the coordinator identically.

use super::messages::{DirtySection, WorkerMessage, WorkerReply};

/// Meshing state owned by a single worker.
///
/// Each worker gets its own instance and decides on its own which of the
/// broadcast columns it keeps.
pub trait SectionMesher: Send {
    /// Absorbs a data message: game data, atlas data, a column, a column
    /// unload or a block update. Never called with a dirty batch.
    fn apply(&mut self, message: &WorkerMessage);

    /// Builds the geometry of one section. Returned payloads are forwarded
    /// verbatim to the rendering owner, in order, before the section is
    /// reported finished.
    fn mesh_section(&mut self, section: &DirtySection) -> Vec<serde_json::Value>;
}

/// Runs one coordinator message through `mesher` and returns the replies the
/// worker sends back.
pub fn process_message(mesher: &mut dyn SectionMesher, message: WorkerMessage) -> Vec<WorkerReply> {
    match message {
        WorkerMessage::Dirty { sections } => {
            let mut replies = Vec::with_capacity(sections.len());
            for section in &sections {
                for payload in mesher.mesh_section(section) {
                    replies.push(WorkerReply::Output { payload });
                }
                replies.push(WorkerReply::SectionFinished { key: section.key() });
            }
            replies
        }
        other => {
            mesher.apply(&other);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::task_management::messages::MesherConfig;
    use crate::voxels::coords::SectionKey;

    struct EchoMesher {
        applied: usize,
    }

    impl SectionMesher for EchoMesher {
        fn apply(&mut self, _message: &WorkerMessage) {
            self.applied += 1;
        }

        fn mesh_section(&mut self, section: &DirtySection) -> Vec<serde_json::Value> {
            vec![serde_json::json!({ "y": section.y })]
        }
    }

    fn dirty(y: i32) -> DirtySection {
        DirtySection {
            x: 0,
            y,
            z: 0,
            value: true,
            config: Arc::new(MesherConfig::default()),
        }
    }

    #[test]
    fn every_dirty_entry_gets_one_finished_reply() {
        let mut mesher = EchoMesher { applied: 0 };
        let replies = process_message(
            &mut mesher,
            WorkerMessage::Dirty {
                sections: vec![dirty(0), dirty(0), dirty(16)],
            },
        );

        let finished: Vec<_> = replies
            .iter()
            .filter_map(|reply| match reply {
                WorkerReply::SectionFinished { key } => Some(*key),
                WorkerReply::Output { .. } => None,
            })
            .collect();
        assert_eq!(
            finished,
            vec![
                SectionKey { x: 0, y: 0, z: 0 },
                SectionKey { x: 0, y: 0, z: 0 },
                SectionKey { x: 0, y: 16, z: 0 },
            ]
        );
        assert_eq!(replies.len(), 6);
        assert!(matches!(replies[0], WorkerReply::Output { .. }));
    }

    #[test]
    fn data_messages_are_absorbed_without_reply() {
        let mut mesher = EchoMesher { applied: 0 };
        let replies = process_message(&mut mesher, WorkerMessage::UnloadChunk { x: 0, z: 16 });
        assert!(replies.is_empty());
        assert_eq!(mesher.applied, 1);
    }
}
