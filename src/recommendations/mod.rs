mod service;

pub use service::{
    build_prompt, PromptInputs, RecommendationError, RecommendationService, SYSTEM_INSTRUCTION,
};
