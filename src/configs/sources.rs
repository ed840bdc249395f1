use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SourcesConfig {
    pub deezer: bool,
    pub deezer_api_base: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            deezer: true,
            deezer_api_base: "https://api.deezer.com".to_string(),
        }
    }
}
