//! Subscribes to the coordinator's broadcast and logs everything it sends.
//! With `--dummies` it also runs that many simulated headsets against the
//! coordinator's ingest port, so the whole loop can be watched without
//! hardware.

use clap::Parser;
use hub::{
    args::MonitorArgs, dummy_client::DummyClient, error::HubError, logging::init_logger,
    message::Command,
};
use log::{error, info};
use std::{process::ExitCode, time::Duration};

fn main() -> ExitCode {
    let args = MonitorArgs::parse();
    if let Err(e) = init_logger(None) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match monitor(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn monitor(args: &MonitorArgs) -> Result<(), HubError> {
    let _dummies = (0..args.dummies)
        .map(|i| {
            DummyClient::builder(args.ingest_endpoint())
                .identity(format!("dummy-{}", i))
                .build_number(args.build)
                .period(Duration::from_millis(args.period_ms))
                .spawn()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let context = zmq::Context::new();
    let socket = context.socket(zmq::SUB)?;
    socket.set_subscribe(b"")?;
    socket.set_rcvtimeo(1000)?;
    socket.connect(&args.broadcast_endpoint())?;
    info!("watching {}", args.broadcast_endpoint());

    let mut seen = 0;
    while args.limit.map_or(true, |limit| seen < limit) {
        let msg = match socket.recv_string(0) {
            Ok(Ok(msg)) => msg,
            Ok(Err(bytes)) => {
                info!("non-utf8 message: {:?}", bytes);
                continue;
            }
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) => return Err(e.into()),
        };
        seen += 1;

        match msg.parse::<Command>() {
            Ok(Command::Gaze(_)) if args.quiet_gaze => {}
            Ok(Command::Gaze(entries)) => {
                let clients: Vec<&str> = entries.iter().map(|e| e.identity.as_str()).collect();
                info!("gaze from {} client(s): {}", entries.len(), clients.join(", "));
            }
            Ok(command) => info!("{:?}", command),
            Err(_) => info!("unrecognised: {:?}", msg),
        }
    }
    Ok(())
}
