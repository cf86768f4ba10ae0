use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, Result, ensure};
use clap::{Parser, ValueEnum};
use glam::{Quat, Vec3};

use tether::{
    ConsumptionMode, InterpolationConfig, InterpolationMethod, ManualClock, NetworkEntityId,
    NetworkSimulator, PacketLossSimulation, PlayerId, SendPolicy, StateConfig, SyncConfig,
    SyncFields, SyncSession,
};

const HOST: PlayerId = PlayerId(1);
const VIEWER: PlayerId = PlayerId(2);
const AVATAR: NetworkEntityId = NetworkEntityId(1);

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Method {
    Linear,
    Hermite,
    CatmullRom,
}

impl From<Method> for InterpolationMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Linear => Self::Linear,
            Method::Hermite => Self::Hermite,
            Method::CatmullRom => Self::CatmullRom,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Direct,
    Buffered,
}

impl From<Mode> for ConsumptionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Direct => Self::Direct,
            Mode::Buffered => Self::Buffered,
        }
    }
}

#[derive(Parser)]
#[command(name = "tether-demo")]
#[command(about = "Two peers synchronizing an orbiting avatar over a simulated network")]
struct Args {
    #[arg(short, long, default_value_t = 10.0, help = "Simulated seconds")]
    duration: f64,

    #[arg(short, long, default_value_t = 60)]
    frame_rate: u32,

    #[arg(short, long, default_value_t = 20)]
    send_rate: u32,

    #[arg(long, value_enum, default_value_t = Method::Linear)]
    method: Method,

    #[arg(long, value_enum, default_value_t = Mode::Buffered)]
    mode: Mode,

    #[arg(long, default_value_t = 100.0, help = "Render delay in ms")]
    buffer_time: f64,

    #[arg(long, default_value_t = 200.0, help = "Extrapolation window in ms")]
    max_extrapolation: f64,

    #[arg(long, default_value_t = 0.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, default_value_t = 0, help = "Minimum latency in ms")]
    min_latency: u32,

    #[arg(long, default_value_t = 0, help = "Maximum latency in ms")]
    max_latency: u32,

    #[arg(long, default_value_t = 0, help = "Jitter in ms")]
    jitter: u32,

    #[arg(long, default_value_t = 7)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    ensure!(args.frame_rate > 0, "frame rate must be positive");
    ensure!(args.duration > 0.0, "duration must be positive");

    let clock = ManualClock::new(0.0);
    let network = Rc::new(RefCell::new(NetworkSimulator::new(
        Rc::new(clock.clone()),
        args.seed,
    )));
    network.borrow_mut().set_config(
        VIEWER,
        PacketLossSimulation {
            enabled: true,
            loss_percent: args.loss_percent,
            min_latency_ms: args.min_latency,
            max_latency_ms: args.max_latency.max(args.min_latency),
            jitter_ms: args.jitter,
        },
    );

    let state_config = StateConfig::with_policy(SendPolicy::Delta)
        .with_default("health", 100)
        .with_default("score", 0);

    let mut host = SyncSession::new(
        HOST,
        state_config.clone(),
        Rc::new(clock.clone()),
        Rc::new(NetworkSimulator::connect(&network, HOST)),
    );
    let mut viewer = SyncSession::new(
        VIEWER,
        state_config,
        Rc::new(clock.clone()),
        Rc::new(NetworkSimulator::connect(&network, VIEWER)),
    );

    let sync_config = SyncConfig {
        fields: SyncFields {
            velocity: matches!(args.method, Method::Hermite),
            ..Default::default()
        },
        send_rate: args.send_rate,
        mode: args.mode.into(),
        interpolation: InterpolationConfig {
            method: args.method.into(),
            buffer_time_ms: args.buffer_time,
            max_extrapolation_ms: args.max_extrapolation,
            ..Default::default()
        },
        ..Default::default()
    };
    host.spawn_local(AVATAR, sync_config.clone())
        .context("invalid sync configuration")?;
    viewer
        .spawn_remote(AVATAR, sync_config)
        .context("invalid sync configuration")?;

    viewer.state_mut().subscribe(
        "score",
        Box::new(|player, key, new, old| {
            let old = old.map_or_else(|| "-".to_string(), ToString::to_string);
            log::info!("{player} {key}: {old} -> {new}");
        }),
    );

    let frame_ms = 1000.0 / args.frame_rate as f64;
    let frames = (args.duration * 1000.0 / frame_ms).ceil() as u64;
    let mut error_sum = 0.0f64;
    let mut error_max = 0.0f32;
    let mut samples = 0u64;

    for frame in 0..frames {
        clock.advance(frame_ms);
        let seconds = clock_seconds(&clock);

        host.poll();
        viewer.poll();

        let truth = orbit(seconds);
        if let Some(avatar) = host.entity_mut(AVATAR) {
            avatar.transform_mut().position = truth;
            avatar.transform_mut().rotation = Quat::from_rotation_y(seconds as f32);
        }
        if frame % (args.frame_rate as u64) == 0 {
            host.state_mut().set("score", (seconds as i64) * 10);
        }

        host.update((frame_ms / 1000.0) as f32);
        viewer.update((frame_ms / 1000.0) as f32);

        // Compare against where the host was one render delay ago.
        let reference = orbit(seconds - args.buffer_time / 1000.0);
        if let Some(remote) = viewer.entity(AVATAR) {
            let error = (remote.transform().position - reference).length();
            error_sum += error as f64;
            error_max = error_max.max(error);
            samples += 1;

            if frame % (args.frame_rate as u64) == 0 {
                let interpolation = remote.interpolator().stats();
                log::info!(
                    "t={:>5.2}s remote={:?} estimate={:?} buffered={} error={:.3}",
                    seconds,
                    remote.transform().position,
                    interpolation.last_estimate,
                    interpolation.buffer_len,
                    error
                );
            }
        }
    }

    let stats = network.borrow().stats().clone();
    log::info!(
        "sent {} delivered {} dropped {} ({:.1}% loss), {} bytes",
        stats.messages_sent,
        stats.messages_delivered,
        stats.messages_dropped,
        stats.loss_percent(),
        stats.bytes_sent
    );
    if samples > 0 {
        log::info!(
            "mean error {:.3}, max error {:.3} over {} frames",
            error_sum / samples as f64,
            error_max,
            samples
        );
    }

    Ok(())
}

fn clock_seconds(clock: &ManualClock) -> f64 {
    use tether::Clock;
    clock.now_ms() / 1000.0
}

/// Radius 5 circle, one lap every 2π seconds.
fn orbit(seconds: f64) -> Vec3 {
    let angle = seconds as f32;
    Vec3::new(angle.cos() * 5.0, 0.0, angle.sin() * 5.0)
}
