//! Narrative-side contracts consumed by the resume controller, plus the
//! reference scene engine and display surface used by the runner and tests.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{any::Any, collections::HashMap};

/// A narrative node as plain data. Fields this crate does not model are
/// kept in `extra` so a restored node is the exact node that was captured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SceneNode {
    pub id:        String,
    #[serde(default)]
    pub text:      Vec<String>,
    #[serde(default)]
    pub choices:   Vec<SceneChoice>,
    /// Produced at runtime (e.g. by a text generator); not in the static graph.
    #[serde(default)]
    pub generated: bool,
    #[serde(flatten)]
    pub extra:     Map<String, Value>,
}

impl SceneNode {
    pub fn new(id: impl Into<String>, text: Vec<String>) -> Self {
        Self {
            id: id.into(),
            text,
            choices: Vec::new(),
            generated: false,
            extra: Map::new(),
        }
    }

    pub fn with_choice(mut self, id: &str, label: &str, next: Option<&str>) -> Self {
        self.choices.push(SceneChoice {
            id:    id.to_string(),
            label: label.to_string(),
            next:  next.map(str::to_string),
        });
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SceneChoice {
    pub id:    String,
    pub label: String,
    #[serde(default)]
    pub next:  Option<String>,
}

/// The narrative engine's view as seen by the persistence core.
pub trait SceneCursor {
    /// Owned copy of the active node, never a reference into the engine.
    fn current_node(&self) -> Option<SceneNode>;

    fn text_index(&self) -> usize;

    fn is_in_choice(&self) -> bool;

    /// Put the cursor on `node` without running the normal transition
    /// pipeline. Restore-time only.
    fn load_node_directly(&mut self, node: SceneNode, text_index: usize, in_choice: bool);

    /// Drop the current node without running exit effects.
    fn unload(&mut self);

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// The display surface holding the rendered transcript.
pub trait TranscriptSurface {
    /// Current rendered markup, if anything has been rendered.
    fn capture_markup(&self) -> Option<String>;

    /// Replace the display contents with `markup`, verbatim.
    fn replay(&mut self, markup: &str);

    /// Re-bind interaction handlers to choice elements in the current
    /// markup. Returns how many were bound.
    fn reattach_choice_handlers(&mut self) -> usize;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Outcome of a normal scene transition. The host forwards it to the
/// session so the auto-save pipeline can run.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneTransition {
    pub from: Option<String>,
    pub to:   String,
}

/// Minimal scene engine: a static graph plus runtime-generated nodes.
#[derive(Debug, Default)]
pub struct ScriptedNarrative {
    graph:       HashMap<String, SceneNode>,
    current:     Option<SceneNode>,
    text_index:  usize,
    in_choice:   bool,
    /// Count of normal-pipeline transitions. Direct loads do not count.
    pub transitions: u64,
}

impl ScriptedNarrative {
    pub fn new(nodes: impl IntoIterator<Item = SceneNode>) -> Self {
        Self {
            graph: nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
            ..Self::default()
        }
    }

    pub fn lookup(&self, id: &str) -> Option<&SceneNode> {
        self.graph.get(id)
    }

    pub fn current(&self) -> Option<&SceneNode> {
        self.current.as_ref()
    }

    /// Normal transition to a node in the static graph.
    pub fn transition_to(&mut self, id: &str) -> Option<SceneTransition> {
        let node = self.graph.get(id)?.clone();
        Some(self.enter(node))
    }

    /// Normal transition to a node built at runtime. The node is not added
    /// to the graph.
    pub fn enter_generated(&mut self, mut node: SceneNode) -> SceneTransition {
        node.generated = true;
        self.enter(node)
    }

    /// Advance one line. Reaching the last line of a node with choices
    /// puts the cursor into choice mode.
    pub fn advance_text(&mut self) {
        let Some(node) = &self.current else { return };
        if self.text_index + 1 < node.text.len() {
            self.text_index += 1;
        } else if !node.choices.is_empty() {
            self.in_choice = true;
        }
    }

    fn enter(&mut self, node: SceneNode) -> SceneTransition {
        let from = self.current.as_ref().map(|n| n.id.clone());
        let to = node.id.clone();
        self.current = Some(node);
        self.text_index = 0;
        self.in_choice = false;
        self.transitions += 1;
        log::debug!("scene transition {from:?} -> {to}");
        SceneTransition { from, to }
    }
}

impl SceneCursor for ScriptedNarrative {
    fn current_node(&self) -> Option<SceneNode> {
        self.current.clone()
    }

    fn text_index(&self) -> usize {
        self.text_index
    }

    fn is_in_choice(&self) -> bool {
        self.in_choice
    }

    fn load_node_directly(&mut self, node: SceneNode, text_index: usize, in_choice: bool) {
        self.current = Some(node);
        self.text_index = text_index;
        self.in_choice = in_choice;
    }

    fn unload(&mut self) {
        self.current = None;
        self.text_index = 0;
        self.in_choice = false;
    }

    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}

/// Marker attribute identifying a choice element in transcript markup.
pub const CHOICE_MARKER: &str = "data-choice=";

/// Append-only markup buffer standing in for a display surface.
#[derive(Debug, Default)]
pub struct BufferedTranscript {
    markup:            String,
    /// Choice elements with a live handler. Reset on every replay.
    pub bound_choices: usize,
    pub replays:       u64,
}

impl BufferedTranscript {
    pub fn push_line(&mut self, speaker: &str, text: &str) {
        self.markup.push_str(&format!("<p class=\"line\"><b>{speaker}</b> {text}</p>"));
    }

    pub fn push_choices(&mut self, node: &SceneNode) {
        for choice in &node.choices {
            self.markup.push_str(&format!(
                "<button {CHOICE_MARKER}\"{}\">{}</button>",
                choice.id, choice.label
            ));
            self.bound_choices += 1;
        }
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }
}

impl TranscriptSurface for BufferedTranscript {
    fn capture_markup(&self) -> Option<String> {
        (!self.markup.is_empty()).then(|| self.markup.clone())
    }

    fn replay(&mut self, markup: &str) {
        self.markup = markup.to_string();
        self.bound_choices = 0;
        self.replays += 1;
    }

    fn reattach_choice_handlers(&mut self) -> usize {
        self.bound_choices = self.markup.matches(CHOICE_MARKER).count();
        self.bound_choices
    }

    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }
}
