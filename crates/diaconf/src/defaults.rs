//! Generation presets - seed the UI form, the server never enforces them.

use serde::{Deserialize, Serialize};

/// Initial values offered to the user for each generation parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationDefaults {
    #[serde(default = "GenerationDefaults::default_text")]
    pub text: String,

    #[serde(default = "GenerationDefaults::default_max_new_tokens")]
    pub max_new_tokens: i64,

    #[serde(default = "GenerationDefaults::default_cfg_scale")]
    pub cfg_scale: f64,

    #[serde(default = "GenerationDefaults::default_temperature")]
    pub temperature: f64,

    #[serde(default = "GenerationDefaults::default_top_p")]
    pub top_p: f64,

    #[serde(default = "GenerationDefaults::default_cfg_filter_top_k")]
    pub cfg_filter_top_k: i64,

    #[serde(default = "GenerationDefaults::default_speed_factor")]
    pub speed_factor: f64,
}

impl GenerationDefaults {
    fn default_text() -> String {
        "[S1] Dia is an open weights text to dialogue model. [S2] You get full control over scripts and voices. [S1] Wow. Amazing. (laughs) [S2] Try it now on Git hub or Hugging Face.".to_string()
    }

    fn default_max_new_tokens() -> i64 {
        860
    }

    fn default_cfg_scale() -> f64 {
        1.0
    }

    fn default_temperature() -> f64 {
        1.0
    }

    fn default_top_p() -> f64 {
        0.8
    }

    fn default_cfg_filter_top_k() -> i64 {
        15
    }

    fn default_speed_factor() -> f64 {
        0.8
    }
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            text: Self::default_text(),
            max_new_tokens: Self::default_max_new_tokens(),
            cfg_scale: Self::default_cfg_scale(),
            temperature: Self::default_temperature(),
            top_p: Self::default_top_p(),
            cfg_filter_top_k: Self::default_cfg_filter_top_k(),
            speed_factor: Self::default_speed_factor(),
        }
    }
}
