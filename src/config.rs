use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_MAX_UPLOAD_IMAGES: usize = 3;
pub const DEFAULT_MAX_GENERATION_COUNT: u32 = 8;
pub const MIN_GENERATION_COUNT: u32 = 1;

/// Runtime settings, read from the process environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub gemini_api_base: String,
    pub image_model: String,
    pub text_model: String,
    /// Where the credential and download-history files live. `None` disables persistence.
    pub data_dir: Option<PathBuf>,
    pub max_upload_images: usize,
    pub max_generation_count: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            data_dir: None,
            max_upload_images: DEFAULT_MAX_UPLOAD_IMAGES,
            max_generation_count: DEFAULT_MAX_GENERATION_COUNT,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; unparsable numbers fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            port: non_empty("PORT").and_then(|v| v.parse().ok()).unwrap_or(defaults.port),
            gemini_api_base: non_empty("GEMINI_API_BASE").unwrap_or(defaults.gemini_api_base),
            image_model: non_empty("GEMINI_IMAGE_MODEL").unwrap_or(defaults.image_model),
            text_model: non_empty("GEMINI_TEXT_MODEL").unwrap_or(defaults.text_model),
            data_dir: non_empty("FIGURE_STUDIO_DATA_DIR").map(PathBuf::from),
            max_upload_images: non_empty("MAX_UPLOAD_IMAGES")
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_upload_images),
            max_generation_count: non_empty("MAX_GENERATION_COUNT")
                .and_then(|v| v.parse().ok())
                .filter(|n: &u32| *n >= MIN_GENERATION_COUNT)
                .unwrap_or(defaults.max_generation_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = AppConfig::from_lookup(lookup(&[]));
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.image_model, DEFAULT_IMAGE_MODEL);
        assert_eq!(cfg.max_upload_images, 3);
        assert_eq!(cfg.max_generation_count, 8);
        assert!(cfg.data_dir.is_none());
    }

    #[test]
    fn overrides_and_bad_numbers() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("PORT", "not-a-port"),
            ("GEMINI_API_BASE", "http://localhost:9999"),
            ("FIGURE_STUDIO_DATA_DIR", "/tmp/fs"),
            ("MAX_GENERATION_COUNT", "0"),
            ("MAX_UPLOAD_IMAGES", "5"),
        ]));
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.gemini_api_base, "http://localhost:9999");
        assert_eq!(cfg.data_dir, Some(PathBuf::from("/tmp/fs")));
        assert_eq!(cfg.max_generation_count, 8);
        assert_eq!(cfg.max_upload_images, 5);
    }
}
