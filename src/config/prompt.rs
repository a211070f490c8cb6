use serde::Deserialize;
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use log::info;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a dedicated Customer Support Intelligence Bot.
Your ONLY goal is to solve the user's technical issues efficiently.
- If an image is provided, analyze the error message in it and provide a step-by-step fix.
- If no image is provided, ask clarifying questions to identify the problem.
- Be polite, professional, and solution-oriented. Do not waste time with small talk.";

#[derive(Debug)]
pub enum PromptError {
    EmptyPrompt,
    IoError(std::io::Error),
    JsonError(serde_json::Error),
}

impl fmt::Display for PromptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromptError::EmptyPrompt => write!(f, "Prompt file has an empty system_prompt"),
            PromptError::IoError(e) => write!(f, "Prompt file IO error: {}", e),
            PromptError::JsonError(e) => write!(f, "Prompt JSON parsing error: {}", e),
        }
    }
}

impl Error for PromptError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PromptError::IoError(e) => Some(e),
            PromptError::JsonError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PromptError {
    fn from(err: std::io::Error) -> Self {
        PromptError::IoError(err)
    }
}

impl From<serde_json::Error> for PromptError {
    fn from(err: serde_json::Error) -> Self {
        PromptError::JsonError(err)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PromptConfig {
    pub system_prompt: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self { system_prompt: DEFAULT_SYSTEM_PROMPT.to_string() }
    }
}

impl PromptConfig {
    fn validate(&self) -> Result<(), PromptError> {
        if self.system_prompt.trim().is_empty() {
            return Err(PromptError::EmptyPrompt);
        }
        Ok(())
    }
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<Arc<PromptConfig>, PromptError> {
    let file_content = fs::read_to_string(&path)?;
    let config: PromptConfig = serde_json::from_str(&file_content)?;
    config.validate()?;
    info!("Loaded system prompt from {}", path.as_ref().display());
    Ok(Arc::new(config))
}

/// Loads the prompt file when one is configured, otherwise the built-in persona.
pub fn load_or_default(path: Option<&str>) -> Result<Arc<PromptConfig>, PromptError> {
    match path {
        Some(p) if !p.trim().is_empty() => load_prompts(p),
        _ => {
            info!("No prompts file configured, using the built-in support persona");
            Ok(Arc::new(PromptConfig::default()))
        }
    }
}
