//! Player commands and the per-state handlers that route them

use crate::game::{Game, GameError};
use crate::state::AppState;
use log::{debug, info};
use shared::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Steer(Direction),
    TogglePause,
    Multiplayer,
    Host,
    List,
    /// Zero-based index into the last session listing
    Join(usize),
    Start,
    Back,
    Quit,
}

impl Command {
    /// Parses one shell line: `w a s d p m h l j<N> start back quit`.
    /// `j<N>` counts from 1.
    pub fn parse(line: &str) -> Option<Command> {
        let word = line.trim().to_ascii_lowercase();
        let command = match word.as_str() {
            "w" | "up" => Command::Steer(Direction::Up),
            "a" | "left" => Command::Steer(Direction::Left),
            "s" | "down" => Command::Steer(Direction::Down),
            "d" | "right" => Command::Steer(Direction::Right),
            "p" | "pause" => Command::TogglePause,
            "m" | "multiplayer" => Command::Multiplayer,
            "h" | "host" => Command::Host,
            "l" | "list" => Command::List,
            "start" => Command::Start,
            "b" | "back" => Command::Back,
            "q" | "quit" => Command::Quit,
            other => {
                let number = other.strip_prefix('j')?.trim().parse::<usize>().ok()?;
                Command::Join(number.checked_sub(1)?)
            }
        };
        Some(command)
    }
}

pub trait InputHandler: Sync {
    fn handle(&self, game: &mut Game, command: Command, now: u64) -> Result<(), GameError>;
}

struct MenuInput;
struct MultiplayerInput;
struct LobbyInput;
struct PlayingInput;
struct PausedInput;
struct MatchEndInput;

fn list_sessions(game: &mut Game) -> Result<(), GameError> {
    let sessions = game.refresh_sessions()?;
    if sessions.is_empty() {
        info!("No open sessions");
    }
    for (index, session) in sessions.iter().enumerate() {
        info!("  j{} -> {}", index + 1, session);
    }
    Ok(())
}

impl InputHandler for MenuInput {
    fn handle(&self, game: &mut Game, command: Command, now: u64) -> Result<(), GameError> {
        match command {
            Command::Start => game.start_singleplayer(now),
            Command::Multiplayer => game.open_multiplayer(now),
            Command::Host => {
                game.open_multiplayer(now)?;
                game.host_session(now)
            }
            Command::List => {
                game.open_multiplayer(now)?;
                list_sessions(game)
            }
            _ => Ok(()),
        }
    }
}

impl InputHandler for MultiplayerInput {
    fn handle(&self, game: &mut Game, command: Command, now: u64) -> Result<(), GameError> {
        match command {
            Command::Host => game.host_session(now),
            Command::List => list_sessions(game),
            Command::Join(index) => game.join_listed(index, now),
            Command::Back | Command::Quit => game.back_to_menu(now),
            _ => Ok(()),
        }
    }
}

impl InputHandler for LobbyInput {
    fn handle(&self, game: &mut Game, command: Command, now: u64) -> Result<(), GameError> {
        match command {
            Command::Start => game.start_match(now),
            Command::Back | Command::Quit => game.back_to_menu(now),
            _ => Ok(()),
        }
    }
}

impl InputHandler for PlayingInput {
    fn handle(&self, game: &mut Game, command: Command, now: u64) -> Result<(), GameError> {
        match command {
            Command::Steer(direction) => {
                game.steer(direction, now);
                Ok(())
            }
            Command::TogglePause => game.toggle_pause(now),
            Command::Back | Command::Quit => game.back_to_menu(now),
            _ => Ok(()),
        }
    }
}

impl InputHandler for PausedInput {
    fn handle(&self, game: &mut Game, command: Command, now: u64) -> Result<(), GameError> {
        match command {
            Command::TogglePause => game.toggle_pause(now),
            Command::Back | Command::Quit => game.back_to_menu(now),
            Command::Steer(_) => {
                debug!("Ignoring steering while paused");
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl InputHandler for MatchEndInput {
    fn handle(&self, game: &mut Game, command: Command, now: u64) -> Result<(), GameError> {
        match command {
            Command::Start if game.context().singleplayer => {
                game.back_to_menu(now)?;
                game.start_singleplayer(now)
            }
            Command::Start => game.start_match(now),
            Command::Back | Command::Quit => game.back_to_menu(now),
            _ => Ok(()),
        }
    }
}

/// Handler for the commands accepted in `state`
pub fn handler_for(state: AppState) -> &'static dyn InputHandler {
    match state {
        AppState::Menu => &MenuInput,
        // Singleplayer moves straight on to PLAYING
        AppState::Singleplayer | AppState::Playing => &PlayingInput,
        AppState::Multiplayer => &MultiplayerInput,
        AppState::Lobby => &LobbyInput,
        AppState::Paused => &PausedInput,
        AppState::MatchEnd => &MatchEndInput,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::loopback::LoopbackHub;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("w"), Some(Command::Steer(Direction::Up)));
        assert_eq!(Command::parse(" D \n"), Some(Command::Steer(Direction::Right)));
        assert_eq!(Command::parse("start"), Some(Command::Start));
        assert_eq!(Command::parse("j1"), Some(Command::Join(0)));
        assert_eq!(Command::parse("j 3"), Some(Command::Join(2)));
        assert_eq!(Command::parse("j0"), None);
        assert_eq!(Command::parse("jx"), None);
        assert_eq!(Command::parse("x"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_commands_route_by_state() {
        let hub = LoopbackHub::new();
        let mut game = Game::with_seed(GameConfig::default(), Box::new(hub.connector()), 9);

        // Steering means nothing in the menu
        game.handle_command(Command::Steer(Direction::Up), 0).unwrap();
        assert_eq!(game.state(), AppState::Menu);

        game.handle_command(Command::Start, 0).unwrap();
        assert_eq!(game.state(), AppState::Playing);

        game.handle_command(Command::TogglePause, 10).unwrap();
        assert_eq!(game.state(), AppState::Paused);

        game.handle_command(Command::Back, 20).unwrap();
        assert_eq!(game.state(), AppState::Menu);
    }

    #[test]
    fn test_menu_host_opens_lobby() {
        let hub = LoopbackHub::new();
        let mut game = Game::with_seed(GameConfig::default(), Box::new(hub.connector()), 9);

        game.handle_command(Command::Host, 0).unwrap();
        assert_eq!(game.state(), AppState::Lobby);
        assert!(game.context().network.is_host());

        game.handle_command(Command::Start, 5).unwrap();
        assert_eq!(game.state(), AppState::Playing);
    }

    #[test]
    fn test_join_unknown_listing_fails() {
        let hub = LoopbackHub::new();
        let mut game = Game::with_seed(GameConfig::default(), Box::new(hub.connector()), 9);
        game.handle_command(Command::List, 0).unwrap();
        assert_eq!(game.state(), AppState::Multiplayer);

        let result = game.handle_command(Command::Join(0), 0);
        assert!(matches!(result, Err(GameError::UnknownSession(1))));
        assert_eq!(game.state(), AppState::Multiplayer);
    }
}
