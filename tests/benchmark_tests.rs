//! Performance benchmarks for critical game systems

use client::game::lerp_state;
use client::interpolation::InterpolationBuffer;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use server::generator::generate_platforms;
use server::room::Room;
use shared::{
    check_overlap, GameEvent, Inputs, Player, PlayerState, Request, XDirection, YDirection,
    MAP_HEIGHT, MAP_WIDTH,
};
use std::time::Instant;

/// Benchmarks overlap checks between bounding boxes
#[test]
fn benchmark_overlap_detection() {
    let player1 = Player::new(1, 100.0, 100.0);
    let player2 = Player::new(2, 110.0, 110.0);

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = check_overlap(player1.get_bounds(), player2.get_bounds());
    }

    let duration = start.elapsed();
    println!(
        "Overlap detection: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 100ms for 100k iterations
    assert!(duration.as_millis() < 100);
}

/// Benchmarks platform generation for fresh rounds
#[test]
fn benchmark_platform_generation() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let platforms = generate_platforms(MAP_WIDTH, MAP_HEIGHT, &mut rng);
        assert_eq!(platforms.len(), 8);
    }

    let duration = start.elapsed();
    println!(
        "Platform generation: {} rounds in {:?} ({:.2} μs/round)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 1000);
}

/// Benchmarks room ticks with a full lobby of moving players
#[test]
fn benchmark_room_tick_with_many_players() {
    let mut room = Room::new(1, 11);
    let player_count = 32;

    for id in 1..=player_count {
        room.add_member(id);
        room.handle_request(id, Request::JoinGame, 0).unwrap();
        let inputs = Inputs {
            horizontal: if id % 2 == 0 {
                XDirection::Left
            } else {
                XDirection::Right
            },
            vertical: YDirection::Up,
        };
        room.handle_request(id, Request::SetInputs { inputs }, 0)
            .unwrap();
    }
    room.handle_request(1, Request::StartGame, 0).unwrap();

    let ticks = 1_000u64;
    let dt = 1.0 / 30.0;
    let start = Instant::now();

    for tick in 0..ticks {
        room.tick(tick * 33, dt);
        for id in 1..=player_count {
            let _ = room.snapshot_for(id);
        }
    }

    let duration = start.elapsed();
    println!(
        "Room simulation: {} ticks with {} players in {:?} ({:.2} μs/tick)",
        ticks,
        player_count,
        duration,
        duration.as_micros() as f64 / ticks as f64
    );

    assert_eq!(room.state().player_count(), player_count as usize);
    // 1000 ticks is about 33 seconds of game time
    assert!(duration.as_secs() < 5);
}

/// Benchmarks interpolation queries against a steady snapshot stream
#[test]
fn benchmark_interpolation_queries() {
    let mut buffer: InterpolationBuffer<PlayerState, GameEvent> =
        InterpolationBuffer::new(PlayerState::default(), 100, lerp_state);

    let players: Vec<Player> = (1..=16).map(|id| Player::new(id, 0.0, 0.0)).collect();
    let snapshots = 10_000u64;
    let start = Instant::now();

    for i in 0..snapshots {
        let state = PlayerState {
            players: players
                .iter()
                .map(|p| Player::new(p.id, i as f32, i as f32 * 0.5))
                .collect(),
            ..PlayerState::default()
        };
        buffer.enqueue(state, vec![], i * 33);
        let _ = buffer.get_interpolated_state(i * 33 + 50);
    }

    let duration = start.elapsed();
    println!(
        "Interpolation: {} snapshots in {:?} ({:.2} μs/query)",
        snapshots,
        duration,
        duration.as_micros() as f64 / snapshots as f64
    );

    // Pruning keeps the buffer bounded by the delay window
    assert!(buffer.len() <= 6);
    assert!(duration.as_millis() < 2000);
}
