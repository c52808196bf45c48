//! Session and history persistence.
//!
//! Three on-disk artifacts: per-session transcripts (`sessions/<name>.json`),
//! a capped command-history file (`<HOME>/.multi_agent_coder/history`), and
//! the Pattern Learner's export/import document. Each is a plain serde
//! struct read and written directly through `std::fs`.

use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::provider::ProviderId;
use crate::task::TimestampMs;

const HISTORY_RETENTION: usize = 1000;

/// One saved session transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub prompt: String,
    pub responses: HashMap<ProviderId, String>,
    pub providers: Vec<ProviderId>,
    pub timestamp: TimestampMs,
}

impl Session {
    pub fn new(prompt: impl Into<String>, providers: Vec<ProviderId>) -> Self {
        Self {
            prompt: prompt.into(),
            responses: HashMap::new(),
            providers,
            timestamp: crate::task::now_ms(),
        }
    }

    pub fn with_response(mut self, provider: ProviderId, content: impl Into<String>) -> Self {
        self.responses.insert(provider, content.into());
        self
    }

    /// Save to `<sessions_dir>/<name>.json`, creating the directory if needed.
    pub fn save(&self, sessions_dir: &Path, name: &str) -> Result<PathBuf> {
        fs::create_dir_all(sessions_dir).map_err(|e| PipelineError::Other(e.to_string()))?;
        let path = sessions_dir.join(format!("{}.json", name));
        let json = serde_json::to_string_pretty(self).map_err(PipelineError::Json)?;
        fs::write(&path, json).map_err(|e| PipelineError::Other(e.to_string()))?;
        Ok(path)
    }

    /// Load from `<sessions_dir>/<name>.json`.
    pub fn load(sessions_dir: &Path, name: &str) -> Result<Self> {
        let path = sessions_dir.join(format!("{}.json", name));
        let text = fs::read_to_string(&path).map_err(|e| PipelineError::Other(e.to_string()))?;
        serde_json::from_str(&text).map_err(PipelineError::Json)
    }
}

/// Append-only, capped command history: one command per line, oldest
/// trimmed beyond [`HISTORY_RETENTION`].
pub struct CommandHistory {
    path: PathBuf,
}

impl CommandHistory {
    /// History file at `<HOME>/.multi_agent_coder/history`.
    pub fn default_path() -> PathBuf {
        dirs_home().join(".multi_agent_coder").join("history")
    }

    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn append(&self, command: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::Other(e.to_string()))?;
        }

        let mut lines = self.read_lines()?;
        lines.push(command.to_string());
        if lines.len() > HISTORY_RETENTION {
            let overflow = lines.len() - HISTORY_RETENTION;
            lines.drain(0..overflow);
        }

        let mut file = fs::File::create(&self.path).map_err(|e| PipelineError::Other(e.to_string()))?;
        for line in &lines {
            writeln!(file, "{}", line).map_err(|e| PipelineError::Other(e.to_string()))?;
        }
        Ok(())
    }

    pub fn read_lines(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&self.path).map_err(|e| PipelineError::Other(e.to_string()))?;
        BufReader::new(file)
            .lines()
            .map(|l| l.map_err(|e| PipelineError::Other(e.to_string())))
            .collect()
    }
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_session_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let session = Session::new("write hello world", vec![ProviderId::OpenAi])
            .with_response(ProviderId::OpenAi, "print('hi')");
        session.save(dir.path(), "my-session").unwrap();

        let loaded = Session::load(dir.path(), "my-session").unwrap();
        assert_eq!(loaded.prompt, "write hello world");
        assert_eq!(loaded.responses[&ProviderId::OpenAi], "print('hi')");
    }

    #[test]
    fn test_history_caps_at_retention() {
        let dir = TempDir::new().unwrap();
        let history = CommandHistory::at(dir.path().join("history"));
        for i in 0..(HISTORY_RETENTION + 10) {
            history.append(&format!("cmd {}", i)).unwrap();
        }
        let lines = history.read_lines().unwrap();
        assert_eq!(lines.len(), HISTORY_RETENTION);
        assert_eq!(lines[0], "cmd 10");
    }

}
