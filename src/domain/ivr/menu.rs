/// Main menu of the IVR flow
use crate::domain::call::value_object::Prompt;

/// Prompt that answers a main-menu selection.
///
/// Exact match on the collected tones: anything other than a single `1` or
/// `2` (several tones, no tone, other keys) is invalid input.
pub fn response_prompt(tones: &str) -> Prompt {
    match tones {
        "1" => Prompt::Confirmed,
        "2" => Prompt::Goodbye,
        _ => Prompt::Invalid,
    }
}

/// Resolves prompts to the public URIs the provider fetches them from
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    base_uri: String,
}

impl PromptCatalog {
    /// `callback_base` is the publicly reachable base URL of this service
    pub fn new(callback_base: &str) -> Self {
        Self {
            base_uri: format!("{}/audio", callback_base.trim_end_matches('/')),
        }
    }

    pub fn uri(&self, prompt: Prompt) -> String {
        format!("{}/{}", self.base_uri, prompt.file_name())
    }
}
