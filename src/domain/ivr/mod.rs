/// Interactive Voice Response (IVR) flow
pub mod dtmf;
pub mod machine;
pub mod menu;

pub use dtmf::{tones_to_string, DtmfTone};
pub use machine::{plan, Command, IvrStateMachine, Outcome, RecognitionSettings, Step, Transition};
pub use menu::{response_prompt, PromptCatalog};
