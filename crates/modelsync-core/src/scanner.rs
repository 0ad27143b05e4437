//! Graph scanning: turn a workflow graph into the list of model files it needs.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::model::{
    Catalog, CatalogEntry, FolderSet, ModelDescriptor, ModelReference, NodeMetadata, NodeView,
    WidgetSlot,
};
use crate::resolver;

/// Option-list prefix marking the entry that names a slot's destination folder.
pub const FOLDER_OPTION_PREFIX: &str = "__folder__path__";

/// Read-only view over a workflow graph.
pub trait GraphSource: Send + Sync {
    /// Nodes of the primary graph.
    fn list_nodes(&self) -> Vec<NodeView>;

    /// Node lists of every registered subgraph, one level deep.
    fn list_subgraphs(&self) -> Vec<Vec<NodeView>> {
        Vec::new()
    }
}

/// Lookup state a scan depends on.
#[derive(Debug, Clone, Default)]
pub struct ScanContext {
    extensions: BTreeSet<String>,
    folders: FolderSet,
    catalog: Option<Catalog>,
}

impl ScanContext {
    /// Build a context from supported extensions, valid folders and the catalog.
    ///
    /// Extensions are stored lowercase and dot-prefixed.
    #[must_use]
    pub fn new<I, S>(extensions: I, folders: FolderSet, catalog: Option<Catalog>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .filter_map(|ext| {
                let ext = ext.as_ref().trim().to_ascii_lowercase();
                match ext.as_str() {
                    "" | "." => None,
                    _ if ext.starts_with('.') => Some(ext),
                    _ => Some(format!(".{ext}")),
                }
            })
            .collect();
        Self {
            extensions,
            folders,
            catalog,
        }
    }

    /// Whether `extension` is a supported model extension.
    #[must_use]
    pub fn supports(&self, extension: &str) -> bool {
        !extension.is_empty() && self.extensions.contains(extension)
    }

    /// Valid destination folders.
    #[must_use]
    pub const fn folders(&self) -> &FolderSet {
        &self.folders
    }
}

/// Scan every node of `graph` and its subgraphs.
///
/// Output keeps first-occurrence order and holds one reference per filename.
#[must_use]
pub fn scan(graph: &dyn GraphSource, ctx: &ScanContext) -> Vec<ModelReference> {
    let mut merged = Merged::default();
    let subgraphs = graph.list_subgraphs();
    let nodes = graph.list_nodes();
    for node in nodes.iter().chain(subgraphs.iter().flatten()) {
        for reference in extract(node, ctx) {
            merged.push(reference);
        }
    }

    let mut references = merged.into_vec();
    if let Some(catalog) = &ctx.catalog {
        let index = catalog.index();
        for reference in references.iter_mut().filter(|r| r.is_incomplete()) {
            if let Some(entry) = index.get(reference.filename.as_str()) {
                enrich_from_catalog(reference, entry, ctx.folders());
            }
        }
    }
    debug!(
        nodes = nodes.len(),
        subgraphs = subgraphs.len(),
        references = references.len(),
        "graph scanned"
    );
    references
}

fn extract(node: &NodeView, ctx: &ScanContext) -> Vec<ModelReference> {
    match &node.metadata {
        NodeMetadata::Descriptors(descriptors) => descriptors
            .iter()
            .filter_map(|descriptor| from_descriptor(node, descriptor, ctx))
            .collect(),
        NodeMetadata::Widgets(slots) => slots
            .iter()
            .filter_map(|slot| from_widget(node, slot, ctx))
            .collect(),
    }
}

fn from_descriptor(
    node: &NodeView,
    descriptor: &ModelDescriptor,
    ctx: &ScanContext,
) -> Option<ModelReference> {
    let mut reference = ModelReference::from_path(&descriptor.name, node.origin())?;
    let folder = resolver::resolve(
        descriptor.directory.as_deref(),
        descriptor.model_type.as_deref(),
        Some(ctx.folders()),
    );
    if folder.is_some()
        && let Some(directory) = descriptor.directory.as_deref()
    {
        reference.relative_path =
            resolver::relative_path_from_save_path(directory, &reference.relative_path);
    }
    Some(
        reference
            .with_source_url(descriptor.url.as_deref())
            .with_destination_folder(folder.as_deref()),
    )
}

fn from_widget(node: &NodeView, slot: &WidgetSlot, ctx: &ScanContext) -> Option<ModelReference> {
    let value = slot.value.as_deref()?;
    let reference = ModelReference::from_path(value, node.origin())?;
    if !ctx.supports(&reference.extension) {
        return None;
    }
    let folder = slot
        .options
        .iter()
        .find_map(|option| option.strip_prefix(FOLDER_OPTION_PREFIX))
        .filter(|folder| ctx.folders().contains(*folder));
    Some(reference.with_destination_folder(folder))
}

fn enrich_from_catalog(reference: &mut ModelReference, entry: &CatalogEntry, folders: &FolderSet) {
    if reference.source_url.is_none() {
        reference.source_url = entry
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_owned);
    }
    let catalog_folder = resolver::resolve(
        entry.save_path.as_deref(),
        entry.model_type.as_deref(),
        Some(folders),
    );
    if reference.destination_folder.is_none() {
        reference.destination_folder.clone_from(&catalog_folder);
    }
    if let (Some(save_path), Some(folder)) = (entry.save_path.as_deref(), catalog_folder)
        && reference.destination_folder.as_deref() == Some(folder.as_str())
    {
        reference.relative_path =
            resolver::relative_path_from_save_path(save_path, &reference.relative_path);
    }
}

#[derive(Default)]
struct Merged {
    order: Vec<ModelReference>,
    by_filename: HashMap<String, usize>,
}

impl Merged {
    fn push(&mut self, reference: ModelReference) {
        if let Some(&slot) = self.by_filename.get(&reference.filename) {
            if let Some(existing) = self.order.get_mut(slot) {
                existing.fill_forward(&reference);
            }
            return;
        }
        self.by_filename
            .insert(reference.filename.clone(), self.order.len());
        self.order.push(reference);
    }

    fn into_vec(self) -> Vec<ModelReference> {
        self.order
    }
}

/// Drop references whose filename is already held by `manual`, then prepend `manual`.
#[must_use]
pub fn prepend_manual(
    manual: &[ModelReference],
    scanned: Vec<ModelReference>,
) -> Vec<ModelReference> {
    let manual_names: BTreeSet<&str> = manual.iter().map(|r| r.filename.as_str()).collect();
    let mut combined = manual.to_vec();
    combined.extend(
        scanned
            .into_iter()
            .filter(|reference| !manual_names.contains(reference.filename.as_str())),
    );
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeOrigin;

    struct StaticGraph {
        nodes: Vec<NodeView>,
        subgraphs: Vec<Vec<NodeView>>,
    }

    impl GraphSource for StaticGraph {
        fn list_nodes(&self) -> Vec<NodeView> {
            self.nodes.clone()
        }

        fn list_subgraphs(&self) -> Vec<Vec<NodeView>> {
            self.subgraphs.clone()
        }
    }

    fn widget_node(value: &str, folder: Option<&str>) -> NodeView {
        let options = folder
            .map(|folder| vec![format!("{FOLDER_OPTION_PREFIX}{folder}"), value.to_string()])
            .unwrap_or_default();
        NodeView {
            node_type: "LoraLoader".into(),
            title: None,
            metadata: NodeMetadata::Widgets(vec![
                WidgetSlot {
                    name: Some("lora_name".into()),
                    value: Some(value.into()),
                    options,
                },
                WidgetSlot {
                    name: Some("strength".into()),
                    value: None,
                    options: Vec::new(),
                },
            ]),
        }
    }

    fn descriptor_node(descriptors: Vec<ModelDescriptor>) -> NodeView {
        NodeView {
            node_type: "CheckpointLoaderSimple".into(),
            title: Some("Base".into()),
            metadata: NodeMetadata::Descriptors(descriptors),
        }
    }

    fn context(catalog: Option<Catalog>) -> ScanContext {
        ScanContext::new(
            ["safetensors", ".CKPT", ""],
            ["checkpoints", "loras", "vae"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            catalog,
        )
    }

    #[test]
    fn context_normalises_extensions() {
        let ctx = context(None);
        assert!(ctx.supports(".safetensors"));
        assert!(ctx.supports(".ckpt"));
        assert!(!ctx.supports(""));
        assert!(!ctx.supports(".txt"));
    }

    #[test]
    fn descriptors_resolve_folders_and_splice_subfolders() {
        let graph = StaticGraph {
            nodes: vec![descriptor_node(vec![
                ModelDescriptor {
                    name: "base.safetensors".into(),
                    url: Some("https://host/base".into()),
                    directory: Some("checkpoints/sdxl".into()),
                    model_type: None,
                },
                ModelDescriptor {
                    name: "fix.safetensors".into(),
                    url: None,
                    directory: Some("default".into()),
                    model_type: Some("VAE".into()),
                },
                ModelDescriptor {
                    name: "odd.safetensors".into(),
                    url: None,
                    directory: Some("textures".into()),
                    model_type: None,
                },
            ])],
            subgraphs: Vec::new(),
        };
        let refs = scan(&graph, &context(None));
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].relative_path, "sdxl/base.safetensors");
        assert_eq!(refs[0].destination_folder.as_deref(), Some("checkpoints"));
        assert_eq!(refs[1].destination_folder.as_deref(), Some("vae"));
        assert_eq!(refs[1].relative_path, "fix.safetensors");
        assert!(refs[2].destination_folder.is_none());
        assert_eq!(refs[2].relative_path, "odd.safetensors");
    }

    #[test]
    fn widgets_use_folder_sentinel_and_supported_extensions() {
        let graph = StaticGraph {
            nodes: vec![
                widget_node("style\\ink.safetensors", Some("loras")),
                widget_node("notes.txt", Some("loras")),
                widget_node("plain.ckpt", None),
            ],
            subgraphs: Vec::new(),
        };
        let refs = scan(&graph, &context(None));
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].relative_path, "style/ink.safetensors");
        assert_eq!(refs[0].destination_folder.as_deref(), Some("loras"));
        assert_eq!(refs[1].filename, "plain.ckpt");
        assert!(refs[1].destination_folder.is_none());
    }

    #[test]
    fn sentinel_folder_outside_the_folder_set_is_dropped() {
        let graph = StaticGraph {
            nodes: vec![
                widget_node("flux.safetensors", Some("diffusion_models")),
                widget_node("empty.safetensors", Some("")),
            ],
            subgraphs: Vec::new(),
        };
        let refs = scan(&graph, &context(None));
        assert_eq!(refs.len(), 2);
        assert!(refs.iter().all(|r| r.destination_folder.is_none()));
    }

    #[test]
    fn subgraph_duplicates_fill_forward_once() {
        let graph = StaticGraph {
            nodes: vec![widget_node("ink.safetensors", None)],
            subgraphs: vec![vec![
                descriptor_node(vec![ModelDescriptor {
                    name: "ink.safetensors".into(),
                    url: Some("https://host/ink".into()),
                    directory: Some("loras".into()),
                    model_type: None,
                }]),
                descriptor_node(vec![ModelDescriptor {
                    name: "ink.safetensors".into(),
                    url: Some("https://mirror/ink".into()),
                    directory: Some("checkpoints".into()),
                    model_type: None,
                }]),
            ]],
        };
        let refs = scan(&graph, &context(None));
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].origin.node_type, "LoraLoader");
        assert_eq!(refs[0].source_url.as_deref(), Some("https://host/ink"));
        assert_eq!(refs[0].destination_folder.as_deref(), Some("loras"));
    }

    #[test]
    fn catalog_fills_missing_fields_and_splices_save_path() {
        let catalog = Catalog {
            models: vec![CatalogEntry {
                filename: "plain.ckpt".into(),
                url: Some("https://catalog/plain".into()),
                save_path: Some("checkpoints/legacy".into()),
                model_type: None,
            }],
        };
        let graph = StaticGraph {
            nodes: vec![widget_node("plain.ckpt", None)],
            subgraphs: Vec::new(),
        };
        let refs = scan(&graph, &context(Some(catalog)));
        assert_eq!(refs[0].source_url.as_deref(), Some("https://catalog/plain"));
        assert_eq!(refs[0].destination_folder.as_deref(), Some("checkpoints"));
        assert_eq!(refs[0].relative_path, "legacy/plain.ckpt");
    }

    #[test]
    fn catalog_never_overrides_known_folder() {
        let catalog = Catalog {
            models: vec![CatalogEntry {
                filename: "ink.safetensors".into(),
                url: Some("https://catalog/ink".into()),
                save_path: Some("checkpoints/sub".into()),
                model_type: None,
            }],
        };
        let graph = StaticGraph {
            nodes: vec![widget_node("ink.safetensors", Some("loras"))],
            subgraphs: Vec::new(),
        };
        let refs = scan(&graph, &context(Some(catalog)));
        assert_eq!(refs[0].destination_folder.as_deref(), Some("loras"));
        assert_eq!(refs[0].relative_path, "ink.safetensors");
        assert_eq!(refs[0].source_url.as_deref(), Some("https://catalog/ink"));
    }

    #[test]
    fn scanning_is_deterministic() {
        let graph = StaticGraph {
            nodes: vec![
                widget_node("b.safetensors", Some("loras")),
                widget_node("a.safetensors", Some("loras")),
            ],
            subgraphs: vec![vec![widget_node("c.ckpt", None)]],
        };
        let ctx = context(None);
        let first = scan(&graph, &ctx);
        let second = scan(&graph, &ctx);
        assert_eq!(first, second);
        let names: Vec<_> = first.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, ["b.safetensors", "a.safetensors", "c.ckpt"]);
    }

    #[test]
    fn manual_entries_shadow_scanned_duplicates() {
        let graph = StaticGraph {
            nodes: vec![
                widget_node("a.safetensors", Some("loras")),
                widget_node("b.safetensors", Some("loras")),
            ],
            subgraphs: Vec::new(),
        };
        let scanned = scan(&graph, &context(None));
        let manual = vec![
            ModelReference::from_path("b.safetensors", NodeOrigin::default())
                .expect("reference")
                .with_destination_folder(Some("checkpoints")),
        ];
        let combined = prepend_manual(&manual, scanned);
        let names: Vec<_> = combined.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(names, ["b.safetensors", "a.safetensors"]);
        assert_eq!(combined[0].destination_folder.as_deref(), Some("checkpoints"));
    }
}
