use serde::{Deserialize, Serialize};

/// Canonical input/output modalities for one model.
///
/// Tokens are drawn from the closed set {Text, Image, Audio, Video, PDF,
/// Text Embeddings}, deduplicated, and ordered by the configured priority.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModalityFact {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

impl ModalityFact {
    pub fn new(inputs: Vec<String>, outputs: Vec<String>) -> Self {
        Self { inputs, outputs }
    }

    /// Comma-space rendering used in database rows; part of the comparison
    /// contract, not just presentation.
    pub fn inputs_string(&self) -> String {
        self.inputs.join(", ")
    }

    pub fn outputs_string(&self) -> String {
        self.outputs.join(", ")
    }
}
