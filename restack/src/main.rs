use std::{
    path::PathBuf,
    rc::Rc,
};

use clap::{
    Parser,
    Subcommand,
    ValueHint,
};
use rand::SeedableRng;
use wyhash::WyRng;

use restack::{
    config::Config,
    error::Result,
    game::Table,
    players::{
        HumanPlayer,
        HybridPlayer,
        Player,
        ResolvePlayer,
    },
    poker::{
        card::parse_cards,
        evaluator::HandEvaluator,
        oracle::CheatSheet,
        tables::EvalTables,
    },
    Assets,
};

#[derive(Parser)]
pub struct AppArgs {
    #[clap(long, short, value_parser, value_hint(ValueHint::FilePath))]
    config: Option<PathBuf>,

    #[clap(long, value_parser, default_value = "lookup_tables", value_hint(ValueHint::DirPath))]
    table_dir: PathBuf,

    #[clap(long, value_parser, default_value = "networks", value_hint(ValueHint::DirPath))]
    network_dir: PathBuf,

    #[clap(long, value_parser, default_value = "lookup_tables/preflop.bin", value_hint(ValueHint::FilePath))]
    cheat_sheet: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play rounds of heads-up limit hold'em.
    Play {
        /// Dash-separated seats: human, resolve, hybrid or rollout.
        #[clap(long, default_value = "human-resolve")]
        lineup: String,

        #[clap(long, short, value_parser, default_value_t = 10)]
        rounds: u32,

        /// Show every hand face-up.
        #[clap(long)]
        show_private_info: bool,

        #[clap(long, value_parser, default_value_t = 42)]
        seed: u64,
    },
    /// Generate the hand-evaluator tables and persist them.
    GenTables,
    /// Roll out and persist the pre-flop cheat sheet.
    GenCheatSheet {
        #[clap(long, value_parser, default_value_t = 1000)]
        rollouts: u32,
    },
    /// Print cheat-sheet win probabilities for a hand.
    ShowCheatSheet {
        #[clap(default_value = "AhAs")]
        hand: String,
    },
}

fn build_players(lineup: &str, assets: &Rc<Assets>, seed: u64) -> Vec<Box<dyn Player>> {
    let mut players: Vec<Box<dyn Player>> = vec![];
    for (seat, kind) in lineup.split('-').enumerate() {
        let name = format!("{} {}", kind, seat + 1);
        let player_seed = seed.wrapping_add(seat as u64 + 1);
        let player: Box<dyn Player> = match kind {
            "human" => Box::new(HumanPlayer::new(&name)),
            "resolve" => Box::new(ResolvePlayer::new(&name, seat, Rc::clone(assets), player_seed)),
            "hybrid" => {
                Box::new(HybridPlayer::new(&name, seat, Rc::clone(assets), 0.5, player_seed))
            }
            "rollout" => {
                Box::new(HybridPlayer::rollout_only(&name, seat, Rc::clone(assets), player_seed))
            }
            other => panic!("Unknown player kind '{}' in lineup", other),
        };
        players.push(player);
    }
    players
}

fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = AppArgs::parse();
    let config = match &args.config {
        Some(path) => Config::from_file(path),
        None => Config::default(),
    };

    match args.command {
        Command::Play {
            lineup,
            rounds,
            show_private_info,
            seed,
        } => {
            let assets =
                Rc::new(Assets::load(config, &args.table_dir, &args.network_dir, &args.cheat_sheet)?);
            let players = build_players(&lineup, &assets, seed);
            Table::new(assets, players, show_private_info, seed).play(rounds)?;
        }
        Command::GenTables => {
            EvalTables::generate().save(&args.table_dir)?;
        }
        Command::GenCheatSheet {
            rollouts,
        } => {
            let evaluator = HandEvaluator::new(EvalTables::load_or_generate(&args.table_dir));
            let mut rng = WyRng::from_entropy();
            CheatSheet::generate(&evaluator, &mut rng, rollouts)?.save(&args.cheat_sheet)?;
        }
        Command::ShowCheatSheet {
            hand,
        } => {
            let assets =
                Assets::load(config, &args.table_dir, &args.network_dir, &args.cheat_sheet)?;
            let cards = parse_cards(&hand);
            println!("Win probabilities for {}:", hand);
            for num_players in 2..=6 {
                println!("  {} players: {:.3}", num_players, assets.cheat_sheet.get(&cards, num_players));
            }
        }
    }
    Ok(())
}
