use std::{collections::HashMap, path::PathBuf};

use clap::{Parser, Subcommand};
use database::SqliteStore;
use itertools::Itertools;
use session::{AccessCode, AccessPolicy, AppConfig, AssassinService, SessionError};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "assassin", about = "Scorekeeper for assassination card games")]
struct Params {
    /// YAML settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    database_url: Option<String>,

    /// Access code for commands that change data
    #[arg(long)]
    code: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Player {
        #[command(subcommand)]
        action: RosterAction,
    },
    Deck {
        #[command(subcommand)]
        action: RosterAction,
    },
    Game {
        #[command(subcommand)]
        action: GameAction,
    },
    Leaderboard,
}

#[derive(Subcommand, Debug)]
enum RosterAction {
    Add { name: String },
    List,
    Archive { id: Uuid },
    Delete { id: Uuid },
}

#[derive(Subcommand, Debug)]
enum GameAction {
    New {
        #[arg(short, long = "player", required = true)]
        players: Vec<Uuid>,
        /// PLAYER_ID=DECK_ID
        #[arg(short, long = "deck", value_parser = parse_deck_assignment)]
        decks: Vec<(Uuid, Uuid)>,
    },
    Show {
        id: Uuid,
    },
    Kill {
        id: Uuid,
        #[arg(long)]
        killer: Uuid,
        #[arg(long)]
        victim: Uuid,
        /// Target revealed by the killer
        #[arg(long)]
        target: Uuid,
    },
    Undo {
        id: Uuid,
    },
    Finish {
        id: Uuid,
    },
    Active,
    History {
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn parse_deck_assignment(s: &str) -> Result<(Uuid, Uuid), String> {
    let (player, deck) = s
        .split_once('=')
        .ok_or_else(|| format!("expected PLAYER_ID=DECK_ID, got {s:?}"))?;
    let player = Uuid::parse_str(player.trim()).map_err(|e| e.to_string())?;
    let deck = Uuid::parse_str(deck.trim()).map_err(|e| e.to_string())?;
    Ok((player, deck))
}

async fn run_player(
    service: &AssassinService<SqliteStore>,
    code: &AccessCode,
    action: RosterAction,
) -> Result<(), SessionError> {
    match action {
        RosterAction::Add { name } => {
            let player = service.register_player(code, &name).await?;
            println!("{} {}", player.id, player.name);
        }
        RosterAction::List => {
            for player in service.list_players().await? {
                println!("{} {}", player.id, player.name);
            }
        }
        RosterAction::Archive { id } => {
            let player = service.archive_player(code, id).await?;
            println!("Archived {}", player.name);
        }
        RosterAction::Delete { id } => service.delete_player(code, id).await?,
    }
    Ok(())
}

async fn run_deck(
    service: &AssassinService<SqliteStore>,
    code: &AccessCode,
    action: RosterAction,
) -> Result<(), SessionError> {
    match action {
        RosterAction::Add { name } => {
            let deck = service.register_deck(code, &name).await?;
            println!("{} {}", deck.id, deck.name);
        }
        RosterAction::List => {
            for deck in service.list_decks().await? {
                println!("{} {}", deck.id, deck.name);
            }
        }
        RosterAction::Archive { id } => {
            let deck = service.archive_deck(code, id).await?;
            println!("Archived {}", deck.name);
        }
        RosterAction::Delete { id } => service.delete_deck(code, id).await?,
    }
    Ok(())
}

async fn run_game(
    service: &AssassinService<SqliteStore>,
    code: &AccessCode,
    action: GameAction,
) -> Result<(), SessionError> {
    match action {
        GameAction::New { players, decks } => {
            let decks: HashMap<_, _> = decks.into_iter().collect();
            let game = service.create_game(code, players, decks).await?;
            println!("{}", game.id);
        }
        GameAction::Show { id } => println!("{}", service.game_view(id).await?),
        GameAction::Kill {
            id,
            killer,
            victim,
            target,
        } => {
            service.add_kill(code, id, killer, victim, target).await?;
            println!("{}", service.game_view(id).await?);
        }
        GameAction::Undo { id } => {
            let (_, removed) = service.undo_last_kill(code, id).await?;
            if removed.is_none() {
                println!("No kill to undo");
            }
            println!("{}", service.game_view(id).await?);
        }
        GameAction::Finish { id } => {
            service.finalize(code, id).await?;
            println!("{}", service.game_view(id).await?);
        }
        GameAction::Active => {
            for summary in service.list_active_games().await? {
                println!("{summary}");
            }
        }
        GameAction::History { limit } => {
            for summary in service.list_finished_games(limit).await? {
                println!("{summary}");
            }
        }
    }
    Ok(())
}

async fn run(params: Params) -> Result<(), SessionError> {
    let config = AppConfig::load(params.config.as_deref())?;
    let store = SqliteStore::connect(&config.database_config(params.database_url)).await?;
    let service = AssassinService::new(store, AccessPolicy::new(config.app_code.clone()))
        .with_history_limit(config.history_limit);
    let code = AccessCode::from(params.code);

    match params.command {
        Command::Player { action } => run_player(&service, &code, action).await,
        Command::Deck { action } => run_deck(&service, &code, action).await,
        Command::Game { action } => run_game(&service, &code, action).await,
        Command::Leaderboard => {
            let board = service.leaderboard().await?;
            println!(
                "{}",
                board
                    .iter()
                    .enumerate()
                    .map(|(idx, entry)| format!("{}. {entry}", idx + 1))
                    .join("\n")
            );
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let params = Params::parse();
    log::debug!("args: {params:?}");
    if let Err(e) = run(params).await {
        log::error!("{e}");
        eprintln!("{e}");
        std::process::exit(1);
    }
}
