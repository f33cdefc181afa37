use clap::Parser;
use client::game::ClientGameState;
use client::input::InputManager;
use client::network::NetworkHandle;
use client::rendering::{Renderer, UiConfig};
use log::{error, info};
use macroquad::prelude::*;
use shared::{unix_millis, Packet};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Room to join; a new room is created when omitted
    #[arg(short = 'r', long)]
    room: Option<u32>,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Interpolation delay in milliseconds
    #[arg(short = 'd', long, default_value = "50")]
    delay: u64,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: usize,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Star Jump".to_string(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        window_resizable: true,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }
    info!("Controls: A/D to move, W to jump, S to drop, Space to freeze, Enter to start");

    if let Err(e) = run(args).await {
        error!("Client error: {}", e);
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut network = NetworkHandle::spawn(&args.server, args.room, args.fake_ping)?;
    let mut game = ClientGameState::new(args.delay);
    let mut input = InputManager::new();
    let mut renderer = Renderer::new(args.width, args.height);

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        while let Some(packet) = network.try_recv() {
            if let Some(reply) = game.handle_packet(packet, unix_millis()) {
                network.send_request(reply);
            }
        }

        let requests = input.update();
        if game.connected {
            for request in requests {
                network.send_request(request);
            }
        }

        let now = unix_millis();
        game.update(now);

        let state = game.current_state();
        let config = UiConfig {
            client_id: game.client_id,
            room_id: game.room_id,
            connected: game.connected,
            round_clock: game.round_clock(now),
            round_finished: state.finish_time.is_some(),
            last_error: game.last_error.clone(),
            fake_ping_ms: args.fake_ping,
        };
        renderer.render(state, config);

        next_frame().await;
    }

    if game.connected {
        network.send(Packet::Disconnect);
    }

    Ok(())
}
