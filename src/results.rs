// Local match result store
// Finished matches are kept in a JSON file until a reporting step reconciles
// them with the ledger. One entry per match id; saving again replaces it.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::ledger::{MatchRecord, MatchReport};
use crate::network::protocol::unix_millis;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub match_id: String,
    pub side_a: String,
    pub side_b: String,
    pub score_a: u32,
    pub score_b: u32,
    pub winner: String,
    pub timestamp: u64,
}

impl GameResult {
    pub fn from_report(record: &MatchRecord, report: &MatchReport) -> Self {
        Self {
            match_id: report.match_id.clone(),
            side_a: record.side_a.clone(),
            side_b: record.side_b.clone(),
            score_a: report.final_score_a,
            score_b: report.final_score_b,
            winner: report.winner_identity(record).to_string(),
            timestamp: unix_millis(),
        }
    }
}

pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the user data directory
    pub fn open_default() -> Self {
        let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("p2pong-sync");
        path.push("results.json");
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored results; an unreadable store reads as empty
    pub fn load(&self) -> Vec<GameResult> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Error reading game results from {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        serde_json::from_str(&contents).unwrap_or_else(|e| {
            warn!("Error parsing game results from {}: {}", self.path.display(), e);
            Vec::new()
        })
    }

    pub fn get(&self, match_id: &str) -> Option<GameResult> {
        self.load().into_iter().find(|r| r.match_id == match_id)
    }

    /// Insert, or replace the entry with the same match id
    pub fn upsert(&self, result: GameResult) -> io::Result<()> {
        let mut results = self.load();
        match results.iter_mut().find(|r| r.match_id == result.match_id) {
            Some(existing) => *existing = result.clone(),
            None => results.push(result.clone()),
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&results).map_err(io::Error::other)?;
        fs::write(&self.path, json)?;
        info!("Game result saved for match {}", result.match_id);
        Ok(())
    }

    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}
