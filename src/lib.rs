//! The coordinator's side of a multi-user HoloLens study. One operator
//! drives recording, named operations, and the shared cursor look from a
//! control panel; every command goes out to all headsets on a broadcast
//! endpoint. The headsets report their gaze and their build number back on
//! an ingest endpoint, and the coordinator republishes everyone's latest
//! gaze on a fixed period so each headset can render the others.
//!
//! The `coordinator` binary runs the hub with a terminal panel (or headless,
//! reading panel actions from stdin). The `monitor` binary prints what the
//! hub broadcasts and can run simulated headsets against it.

#![warn(missing_docs)]
pub mod args;
pub mod broadcast;
pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod dummy_client;
pub mod error;
pub mod gui;
pub mod identity;
pub mod listener;
pub mod logging;
pub mod message;
pub mod panel;
pub mod reconciler;
pub mod state;
pub mod telemetry;
pub mod transport;
