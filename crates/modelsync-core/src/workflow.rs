//! Graph adapter over the editor's saved workflow JSON.
//!
//! Saved workflows do not carry widget option lists, so loader nodes with a
//! well-known folder get a synthetic folder option the way the live editor
//! would present it.

use serde::Deserialize;
use serde_json::Value;

use crate::model::{ModelDescriptor, NodeMetadata, NodeView, WidgetSlot};
use crate::scanner::{FOLDER_OPTION_PREFIX, GraphSource};

/// Parsed workflow file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowDocument {
    #[serde(default)]
    nodes: Vec<WorkflowNode>,
    #[serde(default)]
    definitions: Definitions,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Definitions {
    #[serde(default)]
    subgraphs: Vec<Subgraph>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Subgraph {
    #[serde(default)]
    nodes: Vec<WorkflowNode>,
}

#[derive(Debug, Clone, Deserialize)]
struct WorkflowNode {
    #[serde(rename = "type", default)]
    node_type: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    properties: NodeProperties,
    #[serde(default)]
    widgets_values: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct NodeProperties {
    #[serde(default)]
    models: Vec<SavedModel>,
}

#[derive(Debug, Clone, Deserialize)]
struct SavedModel {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    directory: Option<String>,
    #[serde(default, rename = "type")]
    model_type: Option<String>,
}

impl WorkflowDocument {
    /// Parse a workflow from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns the decoder error when the text is not a workflow object.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Number of nodes across the primary graph and its subgraphs.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
            + self
                .definitions
                .subgraphs
                .iter()
                .map(|subgraph| subgraph.nodes.len())
                .sum::<usize>()
    }
}

impl GraphSource for WorkflowDocument {
    fn list_nodes(&self) -> Vec<NodeView> {
        self.nodes.iter().map(WorkflowNode::view).collect()
    }

    fn list_subgraphs(&self) -> Vec<Vec<NodeView>> {
        self.definitions
            .subgraphs
            .iter()
            .map(|subgraph| subgraph.nodes.iter().map(WorkflowNode::view).collect())
            .collect()
    }
}

impl WorkflowNode {
    fn view(&self) -> NodeView {
        let metadata = if self.properties.models.is_empty() {
            NodeMetadata::Widgets(self.widget_slots())
        } else {
            NodeMetadata::Descriptors(
                self.properties
                    .models
                    .iter()
                    .map(|model| ModelDescriptor {
                        name: model.name.clone(),
                        url: model.url.clone(),
                        directory: model.directory.clone(),
                        model_type: model.model_type.clone(),
                    })
                    .collect(),
            )
        };
        NodeView {
            node_type: self.node_type.clone(),
            title: self.title.clone(),
            metadata,
        }
    }

    fn widget_slots(&self) -> Vec<WidgetSlot> {
        let options: Vec<String> = loader_folder(&self.node_type)
            .map(|folder| vec![format!("{FOLDER_OPTION_PREFIX}{folder}")])
            .unwrap_or_default();
        let slot = |name: Option<&str>, value: &Value| WidgetSlot {
            name: name.map(str::to_owned),
            value: value.as_str().map(str::to_owned),
            options: options.clone(),
        };
        match &self.widgets_values {
            Some(Value::Array(values)) => values.iter().map(|value| slot(None, value)).collect(),
            Some(Value::Object(values)) => values
                .iter()
                .map(|(name, value)| slot(Some(name), value))
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn loader_folder(node_type: &str) -> Option<&'static str> {
    let folder = match node_type {
        "CheckpointLoaderSimple" | "CheckpointLoader" | "ImageOnlyCheckpointLoader" => {
            "checkpoints"
        }
        "LoraLoader" | "LoraLoaderModelOnly" => "loras",
        "VAELoader" => "vae",
        "ControlNetLoader" | "DiffControlNetLoader" => "controlnet",
        "UNETLoader" => "diffusion_models",
        "CLIPLoader" | "DualCLIPLoader" | "TripleCLIPLoader" => "text_encoders",
        "CLIPVisionLoader" => "clip_vision",
        "UpscaleModelLoader" => "upscale_models",
        "StyleModelLoader" => "style_models",
        "GLIGENLoader" => "gligen",
        "PhotoMakerLoader" => "photomaker",
        "HypernetworkLoader" => "hypernetworks",
        _ => return None,
    };
    Some(folder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FolderSet;
    use crate::scanner::{ScanContext, scan};

    const WORKFLOW: &str = r#"{
        "nodes": [
            {
                "id": 4,
                "type": "CheckpointLoaderSimple",
                "title": "Base",
                "properties": {
                    "models": [
                        {"name": "sd_xl_base_1.0.safetensors", "url": "https://host/base", "directory": "checkpoints"}
                    ]
                },
                "widgets_values": ["sd_xl_base_1.0.safetensors"]
            },
            {
                "id": 7,
                "type": "LoraLoader",
                "widgets_values": ["style\\ink.safetensors", 1.0, 1.0]
            },
            {
                "id": 9,
                "type": "CustomUpscaler",
                "widgets_values": {"model": "4x.pth", "scale": 2}
            }
        ],
        "definitions": {
            "subgraphs": [
                {"nodes": [{"type": "VAELoader", "widgets_values": ["ae.safetensors"]}]}
            ]
        }
    }"#;

    fn context() -> ScanContext {
        let folders: FolderSet = ["checkpoints", "loras", "vae", "upscale_models"]
            .into_iter()
            .map(str::to_string)
            .collect();
        ScanContext::new([".safetensors", ".pth"], folders, None)
    }

    #[test]
    fn nodes_map_to_views() {
        let document = WorkflowDocument::from_json(WORKFLOW).expect("parse");
        assert_eq!(document.node_count(), 4);
        let nodes = document.list_nodes();
        assert!(matches!(nodes[0].metadata, NodeMetadata::Descriptors(_)));
        let NodeMetadata::Widgets(slots) = &nodes[1].metadata else {
            panic!("expected widgets");
        };
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].options, vec!["__folder__path__loras".to_string()]);
        assert!(slots[1].value.is_none());
        let NodeMetadata::Widgets(named) = &nodes[2].metadata else {
            panic!("expected widgets");
        };
        assert!(named.iter().any(|slot| slot.name.as_deref() == Some("model")));
    }

    #[test]
    fn scanning_a_document_finds_every_model() {
        let document = WorkflowDocument::from_json(WORKFLOW).expect("parse");
        let refs = scan(&document, &context());
        let summary: Vec<_> = refs
            .iter()
            .map(|r| (r.relative_path.as_str(), r.destination_folder.as_deref()))
            .collect();
        assert_eq!(
            summary,
            [
                ("sd_xl_base_1.0.safetensors", Some("checkpoints")),
                ("style/ink.safetensors", Some("loras")),
                ("4x.pth", None),
                ("ae.safetensors", Some("vae")),
            ]
        );
    }

    #[test]
    fn loader_folders_unknown_to_the_server_are_not_assigned() {
        let document = WorkflowDocument::from_json(
            r#"{"nodes": [{"type": "UNETLoader", "widgets_values": ["flux1-dev.safetensors"]}]}"#,
        )
        .expect("parse");
        let folders: FolderSet = ["unet", "checkpoints"]
            .into_iter()
            .map(str::to_string)
            .collect();
        let refs = scan(&document, &ScanContext::new([".safetensors"], folders, None));
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].filename, "flux1-dev.safetensors");
        assert_eq!(refs[0].destination_folder, None);
    }

    #[test]
    fn empty_document_is_accepted() {
        let document = WorkflowDocument::from_json("{}").expect("parse");
        assert!(document.list_nodes().is_empty());
        assert!(document.list_subgraphs().is_empty());
        assert!(WorkflowDocument::from_json("[]").is_err());
    }
}
