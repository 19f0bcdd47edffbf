use crate::graph::NodeId;
use crate::query::Colour;
use serde::Serialize;
use std::collections::HashMap;

/// How one annotation is rendered: a flat colour, or a rainbow gradient
/// positioned by where the annotated stretch falls within its query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum AnnotationView {
    Solid {
        colour: Colour,
    },
    Rainbow {
        start_fraction: f64,
        end_fraction: f64,
    },
}

/// A labelled stretch of one node, 1-based and inclusive, carrying every
/// view a renderer may draw it with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotation {
    pub start: usize,
    pub end: usize,
    pub label: String,
    pub views: Vec<AnnotationView>,
}

/// All annotations produced by one source, keyed by node.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotationGroup {
    name: String,
    annotations: HashMap<NodeId, Vec<Annotation>>,
}

impl AnnotationGroup {
    pub fn new(name: &str) -> Self {
        AnnotationGroup {
            name: name.to_string(),
            annotations: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add(&mut self, node: NodeId, annotation: Annotation) {
        self.annotations.entry(node).or_default().push(annotation);
    }

    pub fn annotations_for(&self, node: NodeId) -> &[Annotation] {
        self.annotations.get(&node).map_or(&[], Vec::as_slice)
    }

    pub fn annotated_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.annotations.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }
}

/// The set of annotation groups currently attached to the graph. Group
/// names are unique; replacing a group drops every older group of the
/// same name first.
#[derive(Debug, Default)]
pub struct AnnotationStore {
    groups: Vec<AnnotationGroup>,
}

impl AnnotationStore {
    pub fn new() -> Self {
        AnnotationStore::default()
    }

    pub fn groups(&self) -> &[AnnotationGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&AnnotationGroup> {
        self.groups.iter().find(|g| g.name() == name)
    }

    pub fn remove_group(&mut self, name: &str) {
        self.groups.retain(|g| g.name() != name);
    }

    pub fn replace_group(&mut self, group: AnnotationGroup) {
        self.remove_group(group.name());
        self.groups.push(group);
    }
}
