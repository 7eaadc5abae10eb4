use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Identity of a loaded inference engine.
///
/// Two configs that compare equal describe the same engine, so loading one
/// while the other is active is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Model size, e.g. "tiny", "base", "small", "large-v3".
    pub model_size: String,
    /// Compute device ("cpu", "cuda").
    pub device: String,
    /// Numeric profile ("int8", "float16", ...).
    pub compute_type: String,
    pub cpu_threads: usize,
    /// Directory holding model weights.
    pub model_dir: String,
}

impl EngineConfig {
    pub fn new(model_size: impl Into<String>) -> Self {
        Self {
            model_size: model_size.into(),
            device: "cpu".to_string(),
            compute_type: "int8".to_string(),
            cpu_threads: 1,
            model_dir: "models".to_string(),
        }
    }

    /// Path to the GGML weights for this model size.
    pub fn model_path(&self) -> PathBuf {
        PathBuf::from(&self.model_dir).join(format!("ggml-{}.bin", self.model_size))
    }
}
