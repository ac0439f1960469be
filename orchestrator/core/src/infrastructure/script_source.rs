// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Loads `dance_<id>.txt` from the configured script directory.

use std::path::PathBuf;
use tracing::info;

use crate::domain::collaborators::ScriptSource;
use crate::domain::node_config::ChoreographyConfig;
use crate::domain::script::{DanceScript, ScriptLoadError};
use crate::infrastructure::script_parser::ScriptParser;

pub const SHARED_SCRIPT_ID: i32 = 0;

pub fn script_file_name(drone_id: i32) -> String {
    format!("dance_{}.txt", drone_id)
}

pub struct FileScriptSource {
    dir: PathBuf,
    practice_run: bool,
}

impl FileScriptSource {
    pub fn new(dir: impl Into<PathBuf>, practice_run: bool) -> Self {
        Self {
            dir: dir.into(),
            practice_run,
        }
    }

    pub fn from_config(config: &ChoreographyConfig) -> Self {
        Self::new(config.script_dir.clone(), config.practice_run)
    }

    /// The drone's own script, else the shared `dance_0.txt`.
    pub fn script_path(&self, drone_id: i32) -> Result<PathBuf, ScriptLoadError> {
        let id = if self.practice_run { SHARED_SCRIPT_ID } else { drone_id };
        let own = self.dir.join(script_file_name(id));
        if own.is_file() {
            return Ok(own);
        }

        let shared = self.dir.join(script_file_name(SHARED_SCRIPT_ID));
        if shared.is_file() {
            info!("{} not found, falling back to {}", own.display(), shared.display());
            return Ok(shared);
        }

        Err(ScriptLoadError::NotFound {
            drone_id,
            dir: self.dir.clone(),
        })
    }
}

impl ScriptSource for FileScriptSource {
    fn load_scripts(&self, drone_id: i32) -> Result<Vec<DanceScript>, ScriptLoadError> {
        let path = self.script_path(drone_id)?;
        info!("Looking for dance config in {}", path.display());
        Ok(ScriptParser::parse_file(&path)?.performances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_PERFORMANCE: &str = "number_of_performances = 1\n0 LEDS ON\n100 END\n";
    const TWO_PERFORMANCES: &str =
        "number_of_performances = 2\n0 LEDS ON\n100 END\n0 LEDS OFF\n200 END\n";

    #[test]
    fn test_prefers_own_script() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dance_0.txt"), ONE_PERFORMANCE).unwrap();
        std::fs::write(dir.path().join("dance_3.txt"), TWO_PERFORMANCES).unwrap();

        let source = FileScriptSource::new(dir.path(), false);
        assert_eq!(source.load_scripts(3).unwrap().len(), 2);
    }

    #[test]
    fn test_falls_back_to_shared_script() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dance_0.txt"), ONE_PERFORMANCE).unwrap();

        let source = FileScriptSource::new(dir.path(), false);
        assert_eq!(source.script_path(5).unwrap(), dir.path().join("dance_0.txt"));
        assert_eq!(source.load_scripts(5).unwrap().len(), 1);
    }

    #[test]
    fn test_practice_run_uses_shared_script() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dance_0.txt"), ONE_PERFORMANCE).unwrap();
        std::fs::write(dir.path().join("dance_2.txt"), TWO_PERFORMANCES).unwrap();

        let source = FileScriptSource::new(dir.path(), true);
        assert_eq!(source.load_scripts(2).unwrap().len(), 1);
    }

    #[test]
    fn test_missing_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileScriptSource::new(dir.path(), false);
        assert!(matches!(
            source.load_scripts(1),
            Err(ScriptLoadError::NotFound { drone_id: 1, .. })
        ));
    }
}
