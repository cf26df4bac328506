// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use easel_kernel::proxy::SharedFactory;
use easel_kernel::raster::BitmapFactory;
use easel_kernel::snapshot::hash::to_hex;
use easel_kernel::state::command::{Command, DrawCommand};
use easel_kernel::types::geometry::{Color, Position};
use easel_kernel::types::id::{LayerId, UserId};
use easel_node::client::{ClientHandle, ClientInput, ClientSession};
use easel_node::config::NodeConfig;
use easel_node::errors::NodeError;
use easel_node::render::{spawn_render_loop, PreviewStroke};
use easel_node::room::Room;
use easel_node::telemetry::{get_metrics, init_telemetry};

/// Runs a simulated drawing session against one in-process room.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of simulated participants
    #[arg(long, default_value_t = 3)]
    clients: usize,

    /// Actions per participant
    #[arg(long, default_value_t = 40)]
    actions: usize,

    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Write the room's final sync state here (readable by easel-verify)
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Print Prometheus metrics before exiting
    #[arg(long)]
    metrics: bool,
}

/// Small LCG so runs are reproducible per seed.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) as u32
    }

    fn below(&mut self, n: u32) -> u32 {
        self.next() % n.max(1)
    }
}

async fn drive(client: ClientHandle, seed: u64, actions: usize, width: u32, height: u32, layers: u32) {
    let mut rng = Lcg(seed);
    for _ in 0..actions {
        let input = match rng.below(10) {
            0 => ClientInput::Undo,
            1 => ClientInput::Redo,
            _ => {
                let at = |rng: &mut Lcg| Position::new(rng.below(width) as i32, rng.below(height) as i32);
                ClientInput::Command(Command::DrawLayer {
                    layer: LayerId(rng.below(layers)),
                    draw: DrawCommand::Stroke {
                        positions: vec![at(&mut rng), at(&mut rng), at(&mut rng)],
                        color: Color::rgba(rng.below(256) as u8, rng.below(256) as u8, rng.below(256) as u8, 255),
                        width: 1 + rng.below(6),
                    },
                })
            }
        };
        if let Err(e) = client.send(input).await {
            tracing::debug!("{}: input refused: {}", client.user(), e);
        }
        tokio::time::sleep(Duration::from_millis(rng.below(3) as u64)).await;
    }
    if let Err(e) = client.settle().await {
        tracing::warn!("{}: settle failed: {}", client.user(), e);
    }
}

async fn wait_for_hash(client: &ClientHandle, target: [u8; 32]) -> bool {
    let mut frames = client.frames();
    let converged = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if frames.borrow_and_update().hash == target {
                return true;
            }
            if frames.changed().await.is_err() {
                return false;
            }
        }
    })
    .await;
    converged.unwrap_or(false)
}

#[tokio::main]
async fn main() -> Result<(), NodeError> {
    init_telemetry();
    let args = Args::parse();
    let cfg = NodeConfig::load()?;
    tracing::info!("Starting easel node with config: {:?}", cfg);

    let factory: SharedFactory = Arc::new(BitmapFactory);
    let room = Room::new(cfg.clone(), factory.clone())?.spawn();

    let mut clients = Vec::new();
    for i in 0..args.clients.max(1) {
        let user = UserId::from(format!("user-{}", i));
        let client = ClientSession::connect(user, room.clone(), &cfg, factory.clone()).await?;
        client.settle().await?;
        clients.push(client);
    }

    // The first participant also renders, with a preview stroke in flight.
    let (preview_tx, preview_rx) = watch::channel(None);
    let (_output, render) = spawn_render_loop(
        clients[0].frames(),
        preview_rx,
        Duration::from_millis(cfg.render_interval_ms.max(1)),
    );
    if cfg.initial_layers > 0 {
        preview_tx.send_replace(Some(PreviewStroke {
            layer: LayerId(0),
            draw: DrawCommand::Stroke {
                positions: vec![Position::new(0, 0), Position::new(cfg.width as i32 - 1, cfg.height as i32 - 1)],
                color: Color::BLACK,
                width: 3,
            },
        }));
    }

    let layers = cfg.initial_layers.max(1);
    let mut tasks = Vec::new();
    for (i, client) in clients.iter().enumerate() {
        let seed = args.seed.wrapping_add(i as u64 * 7919);
        tasks.push(tokio::spawn(drive(client.clone(), seed, args.actions, cfg.width, cfg.height, layers)));
    }
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!("Participant task failed: {}", e);
        }
    }

    let status = room.status().await?;
    println!("room  {} ({} retained, next {})", to_hex(&status.hash), status.retained, status.next_event_id);
    for client in &clients {
        let ok = wait_for_hash(client, status.hash).await;
        println!("{:<6} {}", client.user().as_str(), if ok { "converged" } else { "DIVERGED" });
    }

    if let Some(path) = args.dump.or(cfg.dump_path.clone()) {
        let bytes = room.dump().await?;
        tokio::fs::write(&path, &bytes).await?;
        println!("dumped {} bytes to {}", bytes.len(), path.display());
    }

    drop(preview_tx);
    drop(clients);
    render.abort();

    if args.metrics {
        println!("{}", get_metrics());
    }
    Ok(())
}
