//! Runs the hub: binds the broadcast and ingest endpoints, sends the panel's
//! starting cursor state, then drives everything from the terminal panel (or
//! from stdin with `--headless`) until the operator quits.

use clap::Parser;
use hub::{
    args::CoordinatorArgs, coordinator::Coordinator, error::HubError, gui::run_control_panel,
    logging::init_logger, panel::PanelEvent, transport::Publisher,
};
use log::{error, info, warn};
use std::{
    io::{self, BufRead},
    process::ExitCode,
    sync::mpsc,
    thread,
    time::Duration,
};

/// Longest the headless loop sleeps before checking stdin again.
const HEADLESS_FRAME: Duration = Duration::from_millis(20);

fn main() -> ExitCode {
    let args = CoordinatorArgs::parse();

    let config = match args.hub_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Could not load config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.print_config {
        return match config.to_ron() {
            Ok(ron) => {
                println!("{}", ron);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}", e);
                ExitCode::FAILURE
            }
        };
    }

    let log_file = (!args.headless).then_some(args.log_file.as_path());
    if let Err(e) = init_logger(log_file) {
        eprintln!("Could not open log file {}: {}", args.log_file.display(), e);
        return ExitCode::FAILURE;
    }

    let mut hub = match Coordinator::start(&config) {
        Ok(hub) => hub,
        Err(e) => {
            error!("Startup failed: {}", e);
            eprintln!("Startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(
        "hub up, broadcasting on {} and listening on {}",
        config.broadcast_endpoint(),
        config.ingest_endpoint()
    );

    if config.send_initial_state {
        hub.send_initial_state();
    }

    let res = if args.headless {
        run_headless(&mut hub)
    } else {
        run_control_panel(&mut hub)
    };

    let shutdown = hub.shutdown();
    match res.and(shutdown) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

enum Input {
    Event(PanelEvent),
    Quit,
}

/// Reads panel actions from stdin, one per line, until `q` or end of input.
fn run_headless<P: Publisher>(hub: &mut Coordinator<P>) -> Result<(), HubError> {
    let (tx, rx) = mpsc::channel::<Input>();

    // Blocks on stdin, so it is never joined; it goes away with the process
    thread::Builder::new()
        .name("hub-stdin".to_owned())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Could not read stdin: {}", e);
                        break;
                    }
                };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed == "q" || trimmed == "quit" {
                    break;
                }
                match trimmed.parse::<PanelEvent>() {
                    Ok(event) => {
                        if tx.send(Input::Event(event)).is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!("Did not understand {:?}: {:?}", trimmed, e.code),
                }
            }
            let _ = tx.send(Input::Quit);
        })?;

    loop {
        loop {
            match rx.try_recv() {
                Ok(Input::Event(event)) => {
                    if let Err(e) = hub.handle(event) {
                        warn!("{}", e);
                    }
                }
                Ok(Input::Quit) | Err(mpsc::TryRecvError::Disconnected) => return Ok(()),
                Err(mpsc::TryRecvError::Empty) => break,
            }
        }

        hub.poll_telemetry();
        spin_sleep::sleep(hub.until_next_tick().min(HEADLESS_FRAME));
    }
}
