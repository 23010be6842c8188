//! World-state aggregator — the single source of truth for the snapshot.
//!
//! RULES:
//!   - Only this module knows the full snapshot shape.
//!   - Capture never aborts because one collaborator failed; that
//!     collaborator is recorded by identity only.
//!   - Load builds the complete merged tree before swapping it in, so a
//!     bad snapshot is never partially applied.
//!   - Load positions the scene cursor directly (no transition effects)
//!     but never touches the transcript surface. The loaded transcript is
//!     what capture reports until `present_transcript` replays it.

use crate::{
    error::{SaveError, SaveResult},
    merge::deep_merge,
    narrative::{SceneCursor, TranscriptSurface},
    snapshot::{validate_snapshot, PendingSceneData, Snapshot, SNAPSHOT_VERSION},
    state::WorldState,
    subsystem::{Snapshottable, StateProjection},
};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// A collaborator whose capture or restore failed.
#[derive(Debug, Clone, PartialEq)]
pub struct Degradation {
    pub key:    String,
    pub reason: String,
}

impl Degradation {
    fn from_error(key: &str, err: &SaveError) -> Self {
        Self { key: key.to_string(), reason: err.to_string() }
    }
}

/// Result of `get_full_snapshot`.
#[derive(Debug, Clone)]
pub struct Capture {
    pub snapshot: Snapshot,
    /// Collaborators that fell back to an identity-only blob.
    pub degraded: Vec<Degradation>,
}

pub struct WorldStateAggregator {
    state:              WorldState,
    /// Transcript from the last load, kept until a surface replaces it.
    transcript:         Option<String>,
    /// Set by a load, cleared once the surface has replayed it.
    transcript_pending: bool,
    collaborators:      Vec<Box<dyn Snapshottable>>,
    projections:        Vec<Box<dyn StateProjection>>,
    scene:              Option<Box<dyn SceneCursor>>,
    surface:            Option<Box<dyn TranscriptSurface>>,
}

impl Default for WorldStateAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldStateAggregator {
    pub fn new() -> Self {
        Self {
            state:              WorldState::default(),
            transcript:         None,
            transcript_pending: false,
            collaborators:      Vec::new(),
            projections:        Vec::new(),
            scene:              None,
            surface:            None,
        }
    }

    // ── Registration ───────────────────────────────────────────

    /// Register a collaborator. Keys must be non-empty and unique.
    pub fn register(&mut self, collaborator: Box<dyn Snapshottable>) -> SaveResult<()> {
        let key = collaborator.key();
        if key.trim().is_empty() {
            return Err(SaveError::InvalidCollaborator {
                reason: "empty key".into(),
            });
        }
        if self.collaborators.iter().any(|c| c.key() == key) {
            return Err(SaveError::DuplicateCollaborator { key: key.to_string() });
        }
        log::debug!("registered collaborator '{key}'");
        self.collaborators.push(collaborator);
        Ok(())
    }

    pub fn attach_projection(&mut self, mut projection: Box<dyn StateProjection>) {
        projection.rebind(&self.state);
        self.projections.push(projection);
    }

    pub fn attach_scene_cursor(&mut self, cursor: Box<dyn SceneCursor>) {
        self.scene = Some(cursor);
    }

    pub fn attach_surface(&mut self, surface: Box<dyn TranscriptSurface>) {
        self.surface = Some(surface);
    }

    // ── Live state access ──────────────────────────────────────

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    /// Gameplay mutation of the live tree.
    pub fn state_mut(&mut self) -> &mut WorldState {
        &mut self.state
    }

    pub fn collaborator<T: 'static>(&self) -> Option<&T> {
        self.collaborators
            .iter()
            .find_map(|c| c.as_any().downcast_ref::<T>())
    }

    pub fn collaborator_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.collaborators
            .iter_mut()
            .find_map(|c| c.as_any_mut().downcast_mut::<T>())
    }

    pub fn collaborator_keys(&self) -> Vec<&'static str> {
        self.collaborators.iter().map(|c| c.key()).collect()
    }

    pub fn projection<T: 'static>(&self) -> Option<&T> {
        self.projections
            .iter()
            .find_map(|p| p.as_any().downcast_ref::<T>())
    }

    pub fn scene_cursor(&self) -> Option<&dyn SceneCursor> {
        self.scene.as_deref()
    }

    pub fn scene_cursor_mut(&mut self) -> Option<&mut (dyn SceneCursor + 'static)> {
        self.scene.as_deref_mut()
    }

    pub fn scene_as<T: 'static>(&self) -> Option<&T> {
        self.scene.as_ref()?.as_any().downcast_ref::<T>()
    }

    pub fn scene_as_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.scene.as_mut()?.as_any_mut().downcast_mut::<T>()
    }

    pub fn surface_mut(&mut self) -> Option<&mut (dyn TranscriptSurface + 'static)> {
        self.surface.as_deref_mut()
    }

    pub fn surface_as<T: 'static>(&self) -> Option<&T> {
        self.surface.as_ref()?.as_any().downcast_ref::<T>()
    }

    pub fn surface_as_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.surface.as_mut()?.as_any_mut().downcast_mut::<T>()
    }

    /// Transcript blob the next capture will carry.
    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref()
    }

    // ── Capture ────────────────────────────────────────────────

    /// Build a full snapshot: a deep copy of the live tree, the current
    /// narrative position, the transcript, and every collaborator blob.
    pub fn get_full_snapshot(&self) -> Capture {
        let mut state = self.state.clone();

        if let Some(scene) = &self.scene {
            if let Some(node) = scene.current_node() {
                state.story.current_scene_id = Some(node.id.clone());
                state.story.pending_scene = Some(PendingSceneData {
                    scene:              node,
                    current_text_index: scene.text_index(),
                    is_in_choice:       scene.is_in_choice(),
                });
            }
        }

        let transcript = if self.transcript_pending {
            self.transcript.clone()
        } else {
            self.surface
                .as_ref()
                .and_then(|s| s.capture_markup())
                .or_else(|| self.transcript.clone())
        };

        let mut subsystems = BTreeMap::new();
        let mut degraded = Vec::new();
        for collaborator in &self.collaborators {
            let key = collaborator.key();
            let blob = match collaborator.capture() {
                Ok(blob) => blob,
                Err(e) => {
                    log::warn!("capture degraded for '{key}': {e}");
                    degraded.push(Degradation::from_error(key, &e));
                    degraded_blob(collaborator.as_ref())
                }
            };
            subsystems.insert(key.to_string(), blob);
        }

        Capture {
            snapshot: Snapshot {
                version: SNAPSHOT_VERSION,
                state,
                subsystems,
                transcript,
            },
            degraded,
        }
    }

    /// Convenience for callers that do not persist diagnostics.
    pub fn snapshot(&self) -> Snapshot {
        self.get_full_snapshot().snapshot
    }

    // ── Load ───────────────────────────────────────────────────

    /// Merge `data` onto the default template and make it the live state,
    /// position the scene cursor on the saved node, then restore
    /// collaborators and re-bind projections.
    ///
    /// Fails without touching anything if `data` is not a valid snapshot
    /// or cannot be reconciled with the template. Collaborator restore
    /// failures do not fail the load; they are returned.
    pub fn load_full_snapshot(&mut self, data: &Value) -> SaveResult<Vec<Degradation>> {
        validate_snapshot(data).map_err(|reason| SaveError::CorruptRecord { id: 0, reason })?;

        let merged = deep_merge(default_template()?, data.clone());
        let loaded: Snapshot = serde_json::from_value(merged)?;
        if loaded.version < SNAPSHOT_VERSION {
            log::info!(
                "upgrading snapshot v{} -> v{SNAPSHOT_VERSION} via template merge",
                loaded.version
            );
        }

        self.state = loaded.state;
        self.transcript = loaded.transcript;
        self.transcript_pending = true;

        if let Some(cursor) = self.scene.as_deref_mut() {
            match &self.state.story.pending_scene {
                Some(pending) => cursor.load_node_directly(
                    pending.scene.clone(),
                    pending.current_text_index,
                    pending.is_in_choice,
                ),
                None => cursor.unload(),
            }
        }

        let mut degraded = Vec::new();
        for collaborator in &mut self.collaborators {
            let key = collaborator.key();
            collaborator.reset();
            if let Err(e) = collaborator.restore(loaded.subsystems.get(key)) {
                log::warn!("restore failed for '{key}', keeping defaults: {e}");
                degraded.push(Degradation::from_error(key, &e));
            }
        }

        self.rebind_projections();
        log::debug!(
            "snapshot loaded: day={} scene={:?}",
            self.state.time.day,
            self.state.story.current_scene_id
        );
        Ok(degraded)
    }

    /// Replay the loaded transcript into the surface and re-attach its
    /// choice handlers. Returns the handler count, or `None` without a
    /// surface. From here on capture reads the surface again.
    pub fn present_transcript(&mut self) -> Option<usize> {
        self.transcript_pending = false;
        let surface = self.surface.as_deref_mut()?;
        if let Some(markup) = &self.transcript {
            surface.replay(markup);
        }
        Some(surface.reattach_choice_handlers())
    }

    /// Fresh game: default tree, default collaborators, no transcript,
    /// no scene.
    pub fn reset(&mut self) {
        self.state = WorldState::default();
        self.transcript = None;
        self.transcript_pending = false;
        if let Some(cursor) = self.scene.as_deref_mut() {
            cursor.unload();
        }
        for collaborator in &mut self.collaborators {
            collaborator.reset();
        }
        self.rebind_projections();
    }

    fn rebind_projections(&mut self) {
        for projection in &mut self.projections {
            projection.rebind(&self.state);
        }
    }
}

/// The default snapshot as JSON; the base every load is merged onto.
pub fn default_template() -> SaveResult<Value> {
    let template = Snapshot {
        version:    SNAPSHOT_VERSION,
        state:      WorldState::default(),
        subsystems: BTreeMap::new(),
        transcript: None,
    };
    Ok(serde_json::to_value(template)?)
}

fn degraded_blob(collaborator: &dyn Snapshottable) -> Value {
    let mut identity = collaborator.identity();
    match identity.as_object_mut() {
        Some(map) => {
            map.insert("degraded".into(), Value::Bool(true));
            identity
        }
        None => json!({ "key": collaborator.key(), "degraded": true }),
    }
}
