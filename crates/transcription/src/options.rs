use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Temperatures the engine falls back through when a decode is low-confidence.
pub const DEFAULT_TEMPERATURES: [f32; 6] = [0.0, 0.2, 0.4, 0.6, 0.8, 1.0];

/// Decoder knobs threaded unchanged from the submitter to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeOptions {
    pub beam_size: usize,
    /// Candidates sampled per temperature when not using beam search.
    pub best_of: usize,
    /// Beam search patience factor.
    pub patience: f32,
    /// Bias prompt, typically a glossary of expected terms.
    pub initial_prompt: Option<String>,
    pub temperatures: Vec<f32>,
    pub condition_on_previous_text: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeProfile::default().options()
    }
}

impl DecodeOptions {
    /// Attaches a glossary prompt built from comma-separated keywords.
    pub fn with_glossary(mut self, keywords: &str) -> Self {
        if let Some(prompt) = glossary_prompt(keywords) {
            self.initial_prompt = Some(prompt);
        }
        self
    }
}

/// Named decoder presets trading speed for accuracy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeProfile {
    Fast,
    #[default]
    Balanced,
    Accurate,
}

impl DecodeProfile {
    pub fn options(self) -> DecodeOptions {
        let (beam_size, best_of, patience) = match self {
            DecodeProfile::Fast => (1, 1, 1.0),
            DecodeProfile::Balanced => (5, 5, 1.0),
            DecodeProfile::Accurate => (8, 5, 1.5),
        };
        DecodeOptions {
            beam_size,
            best_of,
            patience,
            initial_prompt: None,
            temperatures: DEFAULT_TEMPERATURES.to_vec(),
            condition_on_previous_text: false,
        }
    }
}

impl fmt::Display for DecodeProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecodeProfile::Fast => "fast",
            DecodeProfile::Balanced => "balanced",
            DecodeProfile::Accurate => "accurate",
        };
        f.write_str(name)
    }
}

impl FromStr for DecodeProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(DecodeProfile::Fast),
            "balanced" => Ok(DecodeProfile::Balanced),
            "accurate" => Ok(DecodeProfile::Accurate),
            other => Err(format!("Unknown decode profile: {}", other)),
        }
    }
}

/// Builds "Glossary: a,b,c." from a comma-separated keyword list.
pub fn glossary_prompt(keywords: &str) -> Option<String> {
    let terms: Vec<&str> = keywords
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .collect();

    if terms.is_empty() {
        return None;
    }
    Some(format!("Glossary: {}.", terms.join(",")))
}

/// Maps a requested language onto an engine hint. `None` means auto-detect.
pub fn normalize_language(raw: Option<&str>) -> Option<String> {
    let lang = raw?.trim().to_ascii_lowercase();
    if lang.is_empty() || lang == "auto" {
        None
    } else {
        Some(lang)
    }
}
