use serde::{Serialize, Deserialize};
use serde_with::skip_serializing_none;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationStyle {
    #[default]
    Figure,
    ThreeView,
    AcrylicStand,
    LineArt,
    Free,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait3x4,
    #[serde(rename = "4:3")]
    Landscape4x3,
    #[serde(rename = "9:16")]
    Portrait9x16,
    #[serde(rename = "16:9")]
    Landscape16x9,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Auto => "auto",
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Landscape4x3 => "4:3",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Landscape16x9 => "16:9",
        }
    }
}

// --- Style-specific options ---

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThreeViewOptions {
    #[serde(default)]
    pub figurize: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct AcrylicStandOptions {
    #[serde(default)]
    pub has_outline: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LineThickness {
    Thin,
    #[default]
    Medium,
    Thick,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineArtOptions {
    #[serde(default)]
    pub thickness: LineThickness,
}

// --- Presentation options ---

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PackagePosition {
    #[default]
    None,
    Beside,
    Inside,
}

/// `logo_image` is carried for the UI only and never reaches the prompt.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PackageOptions {
    #[serde(default)]
    pub position: PackagePosition,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub logo_text: Option<String>,
    #[serde(default)]
    pub logo_image: Option<String>,
    #[serde(default)]
    pub has_texture: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayStandShape {
    #[default]
    Circle,
    Square,
    Hexagon,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayStandMaterial {
    #[default]
    Gaming,
    Wood,
    Metal,
    Mineral,
    Custom,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum WoodType { Oak, DarkOak, Walnut, Maple, Cherry, Mahogany }

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum MetalType { Gold, Silver, Copper, Chrome, Hairline, RustyIron }

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum MineralType { Marble, Granite, Obsidian, Crystal, Ruby, Emerald, Sapphire }

/// Only the sub-field matching `material` is consulted; the rest are dead.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DisplayStandOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub shape: DisplayStandShape,
    #[serde(default)]
    pub material: DisplayStandMaterial,
    #[serde(default)]
    pub is_rainbow: Option<bool>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub wood_type: Option<WoodType>,
    #[serde(default)]
    pub metal_type: Option<MetalType>,
    #[serde(default)]
    pub mineral_type: Option<MineralType>,
    #[serde(default)]
    pub custom_description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackgroundType {
    #[default]
    None,
    Studio,
    Shop,
    Desktop,
    Diorama,
    Custom,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundOptions {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "type")]
    pub kind: BackgroundType,
    #[serde(default)]
    pub custom_description: Option<String>,
}

/// Everything the prompt builder looks at. Built fresh for every call.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub style: GenerationStyle,
    #[serde(default)]
    pub custom_prompt: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<AspectRatio>,
    #[serde(default)]
    pub package_options: Option<PackageOptions>,
    #[serde(default)]
    pub display_stand_options: Option<DisplayStandOptions>,
    #[serde(default)]
    pub background_options: Option<BackgroundOptions>,
    #[serde(default)]
    pub three_view_options: Option<ThreeViewOptions>,
    #[serde(default)]
    pub acrylic_stand_options: Option<AcrylicStandOptions>,
    #[serde(default)]
    pub line_art_options: Option<LineArtOptions>,
}

impl GenerationRequest {
    pub fn new(style: GenerationStyle) -> Self {
        Self { style, ..Default::default() }
    }
}

/// Option objects the caller accumulates across the style and presentation pickers.
#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StyleOptionSet {
    #[serde(default)]
    pub package_options: Option<PackageOptions>,
    #[serde(default)]
    pub display_stand_options: Option<DisplayStandOptions>,
    #[serde(default)]
    pub background_options: Option<BackgroundOptions>,
    #[serde(default)]
    pub three_view_options: Option<ThreeViewOptions>,
    #[serde(default)]
    pub acrylic_stand_options: Option<AcrylicStandOptions>,
    #[serde(default)]
    pub line_art_options: Option<LineArtOptions>,
}

// --- Images ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub id: String,
    pub name: String,
    /// Data URL (`data:<mime>;base64,<payload>`).
    pub base64: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub id: String,
    /// Data URL, always `data:image/png;base64,...`.
    pub base64: String,
    pub created_at: DateTime<Utc>,
    pub is_downloaded: bool,
    pub is_selected: bool,
}

impl GeneratedImage {
    pub fn from_payload(payload: &str) -> Self {
        Self {
            id: generate_id("gen"),
            base64: format!("data:image/png;base64,{payload}"),
            created_at: Utc::now(),
            is_downloaded: false,
            is_selected: false,
        }
    }
}

pub fn generate_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

/// Drops a `data:...;base64,` prefix if one is present.
pub fn strip_data_url(data: &str) -> &str {
    match data.split_once(',') {
        Some((_, payload)) => payload,
        None => data,
    }
}

// --- Wire types of the generation and translation endpoints ---

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageRequest {
    #[serde(default)]
    pub api_key: String,
    /// Raw base64, no data-URL prefix.
    #[serde(default)]
    pub image_base64: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub style: GenerationStyle,
    #[serde(default)]
    pub custom_prompt: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<AspectRatio>,
    /// Fully built prompt. When absent the endpoint builds one from the fields above.
    #[serde(default)]
    pub prompt: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageResponse {
    pub success: bool,
    #[serde(default)]
    pub image_base64: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl GenerateImageResponse {
    pub fn image(image_base64: String) -> Self {
        Self { success: true, image_base64: Some(image_base64), error: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: false, image_base64: None, error: Some(message.into()) }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TranslateResponse {
    #[serde(default)]
    pub translated_text: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn style_and_ratio_use_wire_names() {
        let req: GenerationRequest = serde_json::from_str(
            r#"{"style":"three-view","aspectRatio":"16:9","lineArtOptions":{"thickness":"thick"}}"#,
        )
        .unwrap();
        assert_eq!(req.style, GenerationStyle::ThreeView);
        assert_eq!(req.aspect_ratio, Some(AspectRatio::Landscape16x9));
        assert_eq!(req.line_art_options.unwrap().thickness, LineThickness::Thick);
    }

    #[test]
    fn background_type_field_is_named_type() {
        let bg: BackgroundOptions =
            serde_json::from_str(r#"{"enabled":true,"type":"diorama"}"#).unwrap();
        assert_eq!(bg.kind, BackgroundType::Diorama);
    }

    #[test]
    fn strip_data_url_keeps_raw_payload() {
        assert_eq!(strip_data_url("data:image/png;base64,AAAA"), "AAAA");
        assert_eq!(strip_data_url("AAAA"), "AAAA");
    }

    #[test]
    fn generated_image_starts_unselected_and_not_downloaded() {
        let img = GeneratedImage::from_payload("iVBORw0KGgo");
        assert_eq!(img.base64, "data:image/png;base64,iVBORw0KGgo");
        assert!(!img.is_selected);
        assert!(!img.is_downloaded);
        assert!(img.id.starts_with("gen-"));
    }

    #[test]
    fn failure_response_omits_image_field() {
        let json = serde_json::to_value(GenerateImageResponse::failure("boom")).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "error": "boom"}));
    }
}
