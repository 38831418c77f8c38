use anyhow::{Context, Result};
use aura_core::{
    Analyzer, Choreography, Controller, FrameSource, Session, SessionError, SessionEvent,
    SessionState,
};
use aura_gateway::GeminiGateway;
use clap::Parser;
use std::future::Future;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

mod config;
mod engine;
mod ui;

use config::Config;
use ui::Command;

#[derive(Parser)]
#[command(name = "aura", about = "AURA Secure biometric login terminal")]
struct Cli {
    /// Camera device (overrides AURA_CAMERA_DEVICE)
    #[arg(short, long)]
    device: Option<String>,
    /// Skip the scan animation holds
    #[arg(long)]
    instant: bool,
    /// List V4L2 capture devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.list_devices {
        let devices = aura_hw::Camera::list_devices();
        if devices.is_empty() {
            println!("no video capture devices found");
        }
        for dev in devices {
            println!("{}  {} ({}, {})", dev.path, dev.name, dev.driver, dev.bus);
        }
        return Ok(());
    }

    let mut config = Config::from_env();
    if let Some(device) = cli.device {
        config.camera_device = device;
    }

    let gateway = GeminiGateway::new(config.gateway_config())
        .context("analysis gateway unavailable (set GEMINI_API_KEY)")?;
    let camera = engine::spawn_camera_engine(config.engine_settings())
        .context("failed to start camera engine")?;
    let choreography = if cli.instant {
        Choreography::instant()
    } else {
        config.choreography()
    };

    tracing::info!(
        device = %config.camera_device,
        model = %config.model,
        "aura terminal starting"
    );

    let mut controller = Controller::new(camera, gateway, choreography);
    let mut events = controller.subscribe();
    let renderer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Phase(view) => println!("\n{}", ui::render(&view)),
                SessionEvent::CaptureSkipped { reason } => println!("{}", ui::render_skip(&reason)),
            }
        }
    });

    let mut session = Session::new();
    println!("{}\n", ui::banner());
    println!("{}", ui::render(&session.view()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                None
            }
        };
        let Some(line) = line else { break };

        let enrolling = session.state() == SessionState::Enrolling;
        let command = match Command::parse(&line, enrolling) {
            Ok(command) => command,
            Err(msg) => {
                if !msg.is_empty() {
                    println!("{msg}");
                }
                continue;
            }
        };

        if command == Command::Quit {
            break;
        }

        let interrupt = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        match dispatch_until(&mut controller, &mut session, &command, interrupt).await {
            Some(Ok(())) => {}
            Some(Err(err)) => println!("{}", ui::render_rejection(&err)),
            None => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    controller.shutdown().await;
    drop(controller);
    renderer.await.context("renderer task failed")?;
    tracing::info!("aura terminal stopped");

    Ok(())
}

/// Run one command unless `interrupt` fires first. `None` means the command
/// was abandoned mid-flight; the session is then left as it was and must be
/// discarded.
async fn dispatch_until<F: FrameSource, A: Analyzer>(
    controller: &mut Controller<F, A>,
    session: &mut Session,
    command: &Command,
    interrupt: impl Future<Output = ()>,
) -> Option<Result<(), SessionError>> {
    tokio::select! {
        result = dispatch(controller, session, command) => Some(result),
        () = interrupt => None,
    }
}

async fn dispatch<F: FrameSource, A: Analyzer>(
    controller: &mut Controller<F, A>,
    session: &mut Session,
    command: &Command,
) -> Result<(), SessionError> {
    match command {
        Command::Enroll => controller.begin_enrollment(session).await,
        Command::Reenroll => controller.reenroll(session).await,
        Command::Forget => controller.discard_profile(session),
        Command::Capture => controller.capture_enrollment(session).await.map(|_| ()),
        Command::Cancel => controller.cancel_enrollment(session).await,
        Command::Login { .. } => match command.credentials() {
            Some(credentials) => controller
                .submit(session, &credentials)
                .await
                .map(|outcome| tracing::debug!(?outcome, "login finished")),
            None => Ok(()),
        },
        Command::SignOut => controller.sign_out(session).await,
        Command::Status => {
            println!("{}", ui::render(&session.view()));
            Ok(())
        }
        Command::Help => {
            println!("{}", ui::help());
            Ok(())
        }
        Command::Quit => Ok(()),
    }
}
