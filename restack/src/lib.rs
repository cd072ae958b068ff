pub mod config;
pub mod error;
pub mod game;
pub mod net;
pub mod players;
pub mod poker;
pub mod resolver;
pub mod state;
pub mod subtree;

use std::path::Path;

use rand::SeedableRng;
use wyhash::WyRng;

use crate::{
    config::Config,
    error::Result,
    net::NetManager,
    poker::{
        evaluator::HandEvaluator,
        oracle::CheatSheet,
        tables::EvalTables,
    },
    state::manager::StateManager,
};

/// Process-wide read-only assets: evaluator tables, value networks and the
/// pre-flop cheat sheet, initialised once at startup and shared by every
/// player through an `Rc`.
pub struct Assets {
    pub config: Config,
    pub evaluator: HandEvaluator,
    pub nets: NetManager,
    pub cheat_sheet: CheatSheet,
}

impl Assets {
    pub fn load(
        config: Config,
        table_dir: &Path,
        network_dir: &Path,
        cheat_sheet_path: &Path,
    ) -> Result<Assets> {
        let evaluator = HandEvaluator::new(EvalTables::load_or_generate(table_dir));
        let nets = NetManager::load(network_dir);
        let mut rng = WyRng::from_entropy();
        let cheat_sheet =
            CheatSheet::load_or_generate(&evaluator, &mut rng, cheat_sheet_path, 1000)?;
        Ok(Assets {
            config,
            evaluator,
            nets,
            cheat_sheet,
        })
    }

    pub fn state_manager(&self) -> StateManager {
        StateManager::new(self.config.poker.clone())
    }
}
