//! Results ledger
//!
//! One JSON file per sport and week holding a row per completed game. Rows
//! are keyed by home team: a home team already present is never processed
//! again. The file is rewritten after every appended row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{PicksError, Result};

/// One completed game with every intermediate artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub home: String,
    pub away: String,
    pub kickoff: String,
    /// Evidence channel to text
    pub evidence: BTreeMap<String, String>,
    /// Expert id to opinion text
    pub expert_panel: BTreeMap<String, String>,
    pub consensus: serde_json::Value,
    pub message: String,
    pub ml_pick: String,
    pub spread_pick: String,
    pub total_pick: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ResultsLedger {
    path: PathBuf,
    rows: Vec<LedgerRow>,
}

impl ResultsLedger {
    /// Open the ledger at `path`; a missing file is an empty ledger.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let rows = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => Vec::new(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| {
                PicksError::Ledger(format!("{} is not a ledger: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no ledger yet");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, rows })
    }

    /// In-memory ledger that is never written
    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::new(),
            rows: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> &[LedgerRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains_home(&self, home: &str) -> bool {
        self.rows.iter().any(|row| row.home == home)
    }

    /// Append and persist. Returns `false` (and writes nothing) for a known home team.
    /// A row whose write fails is not kept in memory either.
    pub fn append(&mut self, row: LedgerRow) -> Result<bool> {
        if self.contains_home(&row.home) {
            debug!(home = %row.home, "ledger already has this game");
            return Ok(false);
        }
        let label = format!("{} at {}", row.away, row.home);
        self.rows.push(row);
        if let Err(e) = self.persist() {
            self.rows.pop();
            return Err(e);
        }
        info!(game = %label, rows = self.rows.len(), "ledger row recorded");
        Ok(true)
    }

    /// Write the whole ledger via a temp file and rename
    pub fn persist(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&self.rows)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(home: &str) -> LedgerRow {
        LedgerRow {
            home: home.to_string(),
            away: "Michigan".to_string(),
            kickoff: "12:00 PM EST".to_string(),
            evidence: BTreeMap::from([("Game Odds".to_string(), "N/A".to_string())]),
            expert_panel: BTreeMap::from([("Expert 1".to_string(), "{}".to_string())]),
            consensus: serde_json::json!({"official_picks": {}}),
            message: "🚨".to_string(),
            ml_pick: "Michigan ML (2 units)".to_string(),
            spread_pick: "No Bet (0 units)".to_string(),
            total_pick: "No Bet (0 units)".to_string(),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfb").join("week_13_picks.json");

        let mut ledger = ResultsLedger::load(&path).unwrap();
        assert!(ledger.is_empty());
        assert!(ledger.append(row("Ohio State")).unwrap());
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let mut reloaded = ResultsLedger::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.contains_home("Ohio State"));
        assert!(!reloaded.append(row("Ohio State")).unwrap());
        assert_eq!(ResultsLedger::load(&path).unwrap().len(), 1);
    }

    #[test]
    fn test_failed_write_leaves_ledger_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfb").join("week_1_picks.json");
        let mut ledger = ResultsLedger::load(&path).unwrap();

        // a plain file where the week directory should be
        std::fs::write(dir.path().join("cfb"), "").unwrap();

        assert!(ledger.append(row("Ohio State")).is_err());
        assert!(ledger.is_empty());
        assert!(!ledger.contains_home("Ohio State"));

        std::fs::remove_file(dir.path().join("cfb")).unwrap();
        assert!(ledger.append(row("Alabama")).unwrap());
        let reloaded = ResultsLedger::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(!reloaded.contains_home("Ohio State"));
    }

    #[test]
    fn test_corrupt_file_is_ledger_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("week_1_picks.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(ResultsLedger::load(&path), Err(PicksError::Ledger(_))));
    }
}
