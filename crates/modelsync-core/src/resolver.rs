//! Directory resolution for model references.
//!
//! A reference may declare a save path, a model type, both, or neither. The
//! resolver picks a destination folder by priority and then checks the result
//! against the folders the backend actually reports.

use crate::model::FolderSet;
use crate::paths;

/// Save-path value meaning "use the folder of the declared type".
pub const TYPE_DEFAULT_SENTINEL: &str = "default";

/// Map a declared model type to its destination folder.
///
/// Matching is case-insensitive; unknown types return `None`.
#[must_use]
pub fn folder_for_type(model_type: &str) -> Option<&'static str> {
    let folder = match model_type.trim().to_ascii_lowercase().as_str() {
        "checkpoint" | "checkpoints" | "ckpt" | "sd" | "sdxl" => "checkpoints",
        "lora" | "loras" | "lycoris" | "locon" => "loras",
        "vae" => "vae",
        "vae_approx" | "taesd" => "vae_approx",
        "controlnet" | "control_net" | "controlnets" | "t2i_adapter" | "t2i-adapter"
        | "adapter" => "controlnet",
        "unet" | "diffusion_model" | "diffusion_models" | "diffusion" => "diffusion_models",
        "clip" | "text_encoder" | "text_encoders" | "t5" => "text_encoders",
        "clip_vision" => "clip_vision",
        "upscale" | "upscaler" | "upscale_model" | "upscale_models" | "esrgan" => {
            "upscale_models"
        }
        "embedding" | "embeddings" | "textual_inversion" => "embeddings",
        "hypernetwork" | "hypernetworks" => "hypernetworks",
        "style_model" | "style_models" => "style_models",
        "gligen" => "gligen",
        "photomaker" => "photomaker",
        _ => return None,
    };
    Some(folder)
}

/// Resolve the destination folder for a declared save path and type.
///
/// Priority: the `default` sentinel maps the type; any other non-empty path
/// contributes its first segment; a bare type maps through the table. When
/// `valid_folders` is supplied, results outside it are discarded.
#[must_use]
pub fn resolve(
    declared_path: Option<&str>,
    declared_type: Option<&str>,
    valid_folders: Option<&FolderSet>,
) -> Option<String> {
    let declared_path = declared_path.map(str::trim).filter(|path| !path.is_empty());
    let declared_type = declared_type.map(str::trim).filter(|kind| !kind.is_empty());

    let candidate = match declared_path {
        Some(path) if path.eq_ignore_ascii_case(TYPE_DEFAULT_SENTINEL) => {
            declared_type.and_then(folder_for_type).map(str::to_owned)
        }
        Some(path) => {
            let normalized = paths::normalize_separators(path);
            paths::first_segment(&normalized).map(str::to_owned)
        }
        None => declared_type.and_then(folder_for_type).map(str::to_owned),
    }?;

    match valid_folders {
        Some(folders) if !folders.contains(&candidate) => None,
        _ => Some(candidate),
    }
}

/// Relative path for `filename` under a possibly multi-segment save path.
///
/// The folder segment is dropped; deeper segments prefix a bare filename.
#[must_use]
pub fn relative_path_from_save_path(save_path: &str, filename: &str) -> String {
    if save_path.trim().eq_ignore_ascii_case(TYPE_DEFAULT_SENTINEL) {
        return filename.to_owned();
    }
    paths::splice_save_path(save_path, filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folders(names: &[&str]) -> FolderSet {
        names.iter().map(|name| (*name).to_string()).collect()
    }

    #[test]
    fn default_sentinel_uses_type_table() {
        let valid = folders(&["loras", "checkpoints"]);
        assert_eq!(
            resolve(Some("default"), Some("lora"), Some(&valid)),
            Some("loras".to_string())
        );
        assert_eq!(
            resolve(Some("default"), Some("LyCORIS"), Some(&valid)),
            Some("loras".to_string())
        );
        assert_eq!(resolve(Some("default"), Some("mystery"), Some(&valid)), None);
        assert_eq!(resolve(Some("default"), None, Some(&valid)), None);
    }

    #[test]
    fn declared_path_contributes_first_segment() {
        assert_eq!(
            resolve(Some("\\checkpoints\\sdxl"), Some("vae"), None),
            Some("checkpoints".to_string())
        );
        assert_eq!(
            resolve(Some("sdxl/custom"), None, Some(&folders(&["checkpoints"]))),
            None
        );
    }

    #[test]
    fn type_alone_falls_back_to_table() {
        assert_eq!(
            resolve(None, Some("T2I-Adapter"), None),
            Some("controlnet".to_string())
        );
        assert_eq!(
            resolve(Some("  "), Some("t5"), None),
            Some("text_encoders".to_string())
        );
        assert_eq!(resolve(None, None, None), None);
    }

    #[test]
    fn unknown_type_is_unresolved() {
        assert_eq!(folder_for_type("upscaler"), Some("upscale_models"));
        assert_eq!(folder_for_type("Photomaker"), Some("photomaker"));
        assert_eq!(folder_for_type("textures"), None);
    }

    #[test]
    fn relative_path_splices_subfolders() {
        assert_eq!(
            relative_path_from_save_path("loras/style", "ink.safetensors"),
            "style/ink.safetensors"
        );
        assert_eq!(
            relative_path_from_save_path("default", "ink.safetensors"),
            "ink.safetensors"
        );
    }
}
