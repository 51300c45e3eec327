//! Integration tests for the networked snake game
//!
//! These tests drive whole `Game` instances against each other, over the
//! in-process loopback relay and over a real UDP relay.

use game::config::GameConfig;
use game::game::Game;
use game::input::Command;
use game::loopback::LoopbackHub;
use game::queue::{MessageKind, MessageQueue};
use game::state::AppState;
use game::transport::{TransportEvent, EVENT_GAME, EVENT_JOINED};
use game::udp_transport::UdpConnector;
use game::utils::get_timestamp;
use relay::network::Server;
use shared::{Direction, GameMessage, Position};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// LOOPBACK SESSION TESTS
mod loopback_tests {
    use super::*;

    fn host_and_client() -> (LoopbackHub, Game, Game) {
        let hub = LoopbackHub::new();
        let mut host = Game::with_seed(GameConfig::default(), Box::new(hub.connector()), 11);
        let mut client = Game::with_seed(GameConfig::default(), Box::new(hub.connector()), 12);

        host.handle_command(Command::Host, 0).unwrap();
        client.handle_command(Command::List, 0).unwrap();
        client.handle_command(Command::Join(0), 0).unwrap();

        // Host seats the joiner and broadcasts the roster
        host.update(10);
        client.update(10);
        (hub, host, client)
    }

    #[test]
    fn test_client_takes_second_slot() {
        let (hub, host, client) = host_and_client();

        assert_eq!(host.state(), AppState::Lobby);
        assert_eq!(client.state(), AppState::Lobby);
        assert_eq!(host.context().roster.occupied_count(), 2);
        assert_eq!(client.context().roster.my_index(), Some(1));
        assert_eq!(
            client.context().network.host_peer_id(),
            host.context().network.my_peer_id()
        );

        let session = host.context().network.session_id().unwrap();
        assert_eq!(hub.members(session).len(), 2);
    }

    #[test]
    fn test_match_start_and_steering() {
        let (_hub, mut host, mut client) = host_and_client();

        host.start_match(20).unwrap();
        assert_eq!(host.state(), AppState::Playing);
        client.update(30);
        assert_eq!(client.state(), AppState::Playing);

        client.handle_command(Command::Steer(Direction::Down), 40).unwrap();
        host.update(40);
        host.update(120);

        let spawn = Position::new(30, 7);
        let host_view = host.context().roster.slot(1).unwrap().snake.as_ref().unwrap();
        assert_eq!(host_view.head(), Position::new(spawn.x, spawn.y + 1));

        // The snapshot overrides whatever the client had
        client.update(125);
        let own = client.context().roster.my_snake().unwrap();
        assert_eq!(own.head(), Position::new(spawn.x, spawn.y + 1));
        assert_eq!(client.context().food.position(), host.context().food.position());
    }

    #[test]
    fn test_client_pause_reaches_host() {
        let (_hub, mut host, mut client) = host_and_client();
        host.start_match(20).unwrap();
        client.update(30);

        client.handle_command(Command::TogglePause, 200).unwrap();
        assert_eq!(client.state(), AppState::Paused);
        host.update(210);
        assert_eq!(host.state(), AppState::Paused);

        let client_peer = client.context().network.my_peer_id().map(str::to_string);
        assert_eq!(
            host.snapshot(210).paused_by,
            client_peer
        );

        host.handle_command(Command::TogglePause, 300).unwrap();
        assert_eq!(host.state(), AppState::Playing);
        client.update(310);
        assert_eq!(client.state(), AppState::Playing);
        assert!(!client.context().match_state.is_paused());
        assert_eq!(
            client.context().match_state.total_paused(),
            host.context().match_state.total_paused()
        );
    }

    #[test]
    fn test_host_leaving_returns_client_to_menu() {
        let (hub, mut host, mut client) = host_and_client();
        host.start_match(20).unwrap();
        client.update(30);

        host.handle_command(Command::Back, 400).unwrap();
        host.update(410);
        assert_eq!(hub.session_count(), 0);

        client.update(420);
        assert_eq!(client.state(), AppState::Menu);
        assert!(client.is_teardown_pending());

        client.update(430);
        assert!(client.context().network.session_id().is_none());
        assert!(!client.context().network.is_initialized());
    }

    #[test]
    fn test_silent_host_times_out_client() {
        let (_hub, _host, mut client) = host_and_client();
        assert!(client.context().network.is_in_session());

        client.update(40_000);
        assert_eq!(client.state(), AppState::Menu);
        assert!(client.is_teardown_pending());
        assert!(client.context().network.is_connection_lost());

        client.update(40_010);
        assert!(!client.is_teardown_pending());
        assert!(!client.context().network.is_initialized());
    }

    #[test]
    fn test_match_end_reaches_client() {
        let hub = LoopbackHub::new();
        let config = GameConfig {
            match_duration_secs: 1,
            ..GameConfig::default()
        };
        let mut host = Game::with_seed(config.clone(), Box::new(hub.connector()), 5);
        let mut client = Game::with_seed(config, Box::new(hub.connector()), 6);
        host.handle_command(Command::Host, 0).unwrap();
        client.handle_command(Command::List, 0).unwrap();
        client.handle_command(Command::Join(0), 0).unwrap();
        host.update(0);
        host.start_match(0).unwrap();
        client.update(0);

        host.update(1_000);
        assert_eq!(host.state(), AppState::MatchEnd);
        client.update(1_010);
        assert_eq!(client.state(), AppState::MatchEnd);
        assert_eq!(
            client.context().match_state.winner(),
            host.context().match_state.winner()
        );

        // A rematch goes back through the lobby
        host.handle_command(Command::Start, 2_000).unwrap();
        assert_eq!(host.state(), AppState::Playing);
        client.update(2_010);
        assert_eq!(client.state(), AppState::Playing);
    }
}

/// MESSAGE QUEUE TESTS
mod queue_tests {
    use super::*;

    #[test]
    fn test_events_from_many_threads_keep_per_thread_order() {
        let queue = MessageQueue::new();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let callback = queue.callback();
                thread::spawn(move || {
                    for i in 0..100 {
                        callback(TransportEvent {
                            event: EVENT_GAME.to_string(),
                            message_id: i,
                            peer_id: Some(format!("peer-{}", t)),
                            payload: Some(i.to_string()),
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let drained = queue.drain();
        assert_eq!(drained.len(), 400);
        for t in 0..4 {
            let peer = format!("peer-{}", t);
            let ids: Vec<i64> = drained
                .iter()
                .filter(|m| m.peer_id == peer)
                .map(|m| m.message_id)
                .collect();
            assert_eq!(ids, (0..100).collect::<Vec<_>>());
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_join_event_becomes_player_joined() {
        let queue = MessageQueue::new();
        queue.ingest(TransportEvent {
            event: EVENT_JOINED.to_string(),
            message_id: 1,
            peer_id: Some("p2".to_string()),
            payload: None,
        });
        let drained = queue.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].kind, MessageKind::PlayerJoined);
    }

    #[test]
    fn test_queued_payload_decodes() {
        let message = GameMessage::PlayerInput {
            direction: Direction::Left,
        };
        let encoded = message.encode().unwrap();
        let decoded = GameMessage::decode(&encoded).unwrap();
        assert_eq!(decoded, message);
    }
}

/// UDP RELAY TESTS
mod relay_tests {
    use super::*;

    fn spawn_relay() -> u16 {
        let (addr_tx, addr_rx) = mpsc::channel();
        thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async move {
                let mut server = tokio_test::assert_ok!(
                    Server::new("127.0.0.1:0", 16, Duration::from_secs(10)).await
                );
                addr_tx.send(tokio_test::assert_ok!(server.local_addr())).unwrap();
                let _ = server.run().await;
            });
        });
        addr_rx.recv_timeout(Duration::from_secs(5)).unwrap().port()
    }

    fn pump_until(games: &mut [&mut Game], done: impl Fn(&[&mut Game]) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            let now = get_timestamp();
            for game in games.iter_mut() {
                game.update(now);
            }
            if done(games) {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_host_and_join_over_relay() {
        let port = spawn_relay();
        let config = GameConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..GameConfig::default()
        };

        let mut host = Game::with_seed(config.clone(), Box::new(UdpConnector), 1);
        let mut client = Game::with_seed(config, Box::new(UdpConnector), 2);

        let now = get_timestamp();
        host.handle_command(Command::Host, now).unwrap();
        let session = host.context().network.session_id().unwrap().to_string();

        client.handle_command(Command::Multiplayer, now).unwrap();
        let sessions = client.refresh_sessions().unwrap();
        assert!(sessions.contains(&session));
        client.join_session(&session, now).unwrap();

        let seated = pump_until(&mut [&mut host, &mut client], |games| {
            games[0].context().roster.occupied_count() == 2
                && games[1].context().roster.my_index() == Some(1)
        });
        assert!(seated, "client was never seated by the host");

        host.back_to_menu(get_timestamp()).unwrap();
        host.update(get_timestamp());
        assert!(!host.context().network.is_initialized());

        let dropped = pump_until(&mut [&mut client], |games| games[0].state() == AppState::Menu);
        assert!(dropped, "client did not notice the host leaving");
    }
}
