//! Graph fixtures implementing [`GraphSource`].

use modelsync_core::scanner::FOLDER_OPTION_PREFIX;
use modelsync_core::{GraphSource, ModelDescriptor, NodeMetadata, NodeView, WidgetSlot};

/// Fixed graph snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticGraph {
    /// Nodes of the primary graph.
    pub nodes: Vec<NodeView>,
    /// Subgraph node lists.
    pub subgraphs: Vec<Vec<NodeView>>,
}

impl StaticGraph {
    /// Graph holding only `nodes`.
    #[must_use]
    pub const fn new(nodes: Vec<NodeView>) -> Self {
        Self {
            nodes,
            subgraphs: Vec::new(),
        }
    }

    /// Register one more subgraph.
    #[must_use]
    pub fn with_subgraph(mut self, nodes: Vec<NodeView>) -> Self {
        self.subgraphs.push(nodes);
        self
    }
}

impl GraphSource for StaticGraph {
    fn list_nodes(&self) -> Vec<NodeView> {
        self.nodes.clone()
    }

    fn list_subgraphs(&self) -> Vec<Vec<NodeView>> {
        self.subgraphs.clone()
    }
}

/// Descriptor with a URL and a declared directory.
#[must_use]
pub fn descriptor(name: &str, url: Option<&str>, directory: Option<&str>) -> ModelDescriptor {
    ModelDescriptor {
        name: name.to_owned(),
        url: url.map(str::to_owned),
        directory: directory.map(str::to_owned),
        model_type: None,
    }
}

/// Node carrying author-supplied descriptors.
#[must_use]
pub fn descriptor_node(node_type: &str, descriptors: Vec<ModelDescriptor>) -> NodeView {
    NodeView {
        node_type: node_type.to_owned(),
        title: None,
        metadata: NodeMetadata::Descriptors(descriptors),
    }
}

/// Loader node whose first slot selects `value`, offered under `folder`.
#[must_use]
pub fn loader_node(node_type: &str, value: &str, folder: Option<&str>) -> NodeView {
    let mut options = Vec::new();
    if let Some(folder) = folder {
        options.push(format!("{FOLDER_OPTION_PREFIX}{folder}"));
    }
    options.push(value.to_owned());
    NodeView {
        node_type: node_type.to_owned(),
        title: None,
        metadata: NodeMetadata::Widgets(vec![WidgetSlot {
            name: None,
            value: Some(value.to_owned()),
            options,
        }]),
    }
}
