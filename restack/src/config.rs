use std::{
    fs::File,
    io::{
        BufRead,
        BufReader,
    },
    path::Path,
};

use log::info;

/// Table rules consumed by the state manager and the value scaling.
#[derive(Debug, Clone)]
pub struct PokerConfig {
    pub small_blind: i32,
    pub big_blind: i32,
    /// Raises/all-ins allowed per stage before betting is capped.
    pub bet_per_stage_limit: u32,
    /// Divisor normalising counterfactual values into roughly [-1, 1].
    pub avg_pot_size: i32,
    pub starting_chips: i32,
    pub redistribute_chips: bool,
}

impl Default for PokerConfig {
    fn default() -> PokerConfig {
        PokerConfig {
            small_blind: 10,
            big_blind: 20,
            bet_per_stage_limit: 2,
            avg_pot_size: 400,
            starting_chips: 1000,
            redistribute_chips: true,
        }
    }
}

impl PokerConfig {
    /// The two fixed raise amounts exposed to agents.
    pub fn allowed_raises(&self) -> [i32; 2] {
        [self.small_blind, self.big_blind]
    }
}

/// Knobs of the re-solver itself.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Width of chance-node sampling.
    pub nbr_random_events: usize,
    /// Player-node actions expanded per rollout.
    pub nbr_actions_in_rollout: usize,
    /// Traversal + update iterations per resolve.
    pub nbr_rollouts: u32,
}

impl Default for ResolverConfig {
    fn default() -> ResolverConfig {
        ResolverConfig {
            nbr_random_events: 4,
            nbr_actions_in_rollout: 3,
            nbr_rollouts: 20,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub poker: PokerConfig,
    pub resolver: ResolverConfig,
}

impl Config {
    /// Reads `KEY = value` lines, one setting per line. `#` starts a comment.
    /// Unknown keys and unparsable values are configuration bugs and panic
    /// with the offending line.
    pub fn from_file(path: &Path) -> Config {
        info!("Reading config file: {}", path.display());
        let f = File::open(path)
            .unwrap_or_else(|e| panic!("Failed to open config file {}: {}", path.display(), e));
        let reader = BufReader::new(f);

        let mut config = Config::default();
        for l in reader.lines() {
            let line = l.unwrap_or_else(|e| panic!("Failed to read a line: {}", e));
            let line = line.split('#').next().unwrap().trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .unwrap_or_else(|| panic!("Expected 'KEY = value' but got '{}'", line));
            config.set(key.trim(), value.trim());
        }
        config
    }

    fn set(&mut self, key: &str, value: &str) {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> T
        where
            T::Err: std::fmt::Display,
        {
            value
                .parse()
                .unwrap_or_else(|e| panic!("Bad value '{}' for {}: {}", value, key, e))
        }

        match key {
            "SMALL_BLIND" => self.poker.small_blind = parse(key, value),
            "BIG_BLIND" => self.poker.big_blind = parse(key, value),
            "BET_PER_STAGE_LIMIT" => self.poker.bet_per_stage_limit = parse(key, value),
            "AVG_POT_SIZE" => self.poker.avg_pot_size = parse(key, value),
            "STARTING_CHIPS" => self.poker.starting_chips = parse(key, value),
            "REDISTRIBUTE_CHIPS" => self.poker.redistribute_chips = parse(key, value),
            "NBR_RANDOM_EVENTS" => self.resolver.nbr_random_events = parse(key, value),
            "NBR_ACTIONS_IN_ROLLOUT" => self.resolver.nbr_actions_in_rollout = parse(key, value),
            "NBR_ROLLOUTS" => self.resolver.nbr_rollouts = parse(key, value),
            _ => panic!("Unknown config key: {}", key),
        }
    }
}
