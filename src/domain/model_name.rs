use std::fmt;
use std::str::FromStr;

const MAX_LEN: usize = 64;

/// Transcription model requested for one job, e.g. `whisper-1` or `large-v3`.
/// Passed through to the engine untouched once validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelName(String);

impl ModelName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ModelName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name.is_empty() {
            return Err("model name must not be empty".to_string());
        }
        if name.len() > MAX_LEN {
            return Err(format!("model name longer than {} characters", MAX_LEN));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':'))
        {
            return Err(format!("invalid model name: {}", name));
        }
        Ok(Self(name.to_string()))
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
