//! Application states and the legal transitions between them

use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppState {
    Menu,
    Singleplayer,
    /// Browsing, hosting or joining sessions
    Multiplayer,
    Lobby,
    Playing,
    Paused,
    MatchEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal transition {from} -> {to}")]
pub struct TransitionError {
    pub from: AppState,
    pub to: AppState,
}

const ALL: [AppState; 7] = [
    AppState::Menu,
    AppState::Singleplayer,
    AppState::Multiplayer,
    AppState::Lobby,
    AppState::Playing,
    AppState::Paused,
    AppState::MatchEnd,
];

impl AppState {
    pub fn successors(self) -> &'static [AppState] {
        use AppState::*;
        match self {
            Menu => &[Singleplayer, Multiplayer],
            Singleplayer => &[Playing, Menu],
            Multiplayer => &[Lobby, Menu],
            Lobby => &[Playing, Menu],
            Playing => &[Paused, MatchEnd, Menu],
            Paused => &[Playing, Menu],
            MatchEnd => &[Menu, Lobby],
        }
    }

    pub fn can_transition(self, to: AppState) -> bool {
        self.successors().contains(&to)
    }

    pub fn check_transition(self, to: AppState) -> Result<(), TransitionError> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(TransitionError { from: self, to })
        }
    }

    /// True for the states a session's match can be in
    pub fn is_in_match(self) -> bool {
        matches!(
            self,
            AppState::Lobby | AppState::Playing | AppState::Paused | AppState::MatchEnd
        )
    }

    /// Shortest legal route to `target` through match states only, so
    /// following the host never passes through the menu. Excludes `self`.
    pub fn route_to(self, target: AppState) -> Option<Vec<AppState>> {
        if self == target {
            return Some(Vec::new());
        }

        let index = |state: AppState| ALL.iter().position(|s| *s == state).unwrap_or(0);
        let mut previous: [Option<AppState>; 7] = [None; 7];
        let mut seen = [false; 7];
        let mut frontier = VecDeque::from([self]);
        seen[index(self)] = true;

        while let Some(state) = frontier.pop_front() {
            for &next in state.successors() {
                if seen[index(next)] || (!next.is_in_match() && next != target) {
                    continue;
                }
                seen[index(next)] = true;
                previous[index(next)] = Some(state);
                if next == target {
                    let mut route = vec![next];
                    let mut cursor = state;
                    while cursor != self {
                        route.push(cursor);
                        cursor = previous[index(cursor)]?;
                    }
                    route.reverse();
                    return Some(route);
                }
                frontier.push_back(next);
            }
        }
        None
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppState::Menu => "MENU",
            AppState::Singleplayer => "SINGLEPLAYER",
            AppState::Multiplayer => "MULTIPLAYER",
            AppState::Lobby => "LOBBY",
            AppState::Playing => "PLAYING",
            AppState::Paused => "PAUSED",
            AppState::MatchEnd => "MATCH_END",
        };
        f.write_str(name)
    }
}
