//! The hub as one object. It lives on the thread that drives the UI: that
//! thread issues commands, fires telemetry ticks, and reads the shared state,
//! while the [`Listener`] writes that state from its own thread.

use crate::{
    broadcast::{BindPolicy, BroadcastChannel},
    config::HubConfig,
    dispatcher::{CommandDispatcher, RetryPolicy},
    error::HubError,
    listener::Listener,
    panel::{ControlPanel, PanelEvent},
    state::SharedState,
    telemetry::TelemetryAggregator,
    transport::{Publisher, ZmqPublisher},
};
use log::{info, warn};
use std::{collections::VecDeque, time::Duration};

/// How many outbound commands [`Coordinator::history`] remembers.
const HISTORY_LEN: usize = 16;

/// One command as it went out, and whether the dispatcher managed to send it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentCommand {
    /// The command as it went out on the wire.
    pub text: String,
    /// Whether any send attempt went through.
    pub delivered: bool,
}

/// The hub: control panel, command dispatcher, telemetry aggregator and
/// listener, owned by the thread that drives the UI.
pub struct Coordinator<P: Publisher> {
    panel: ControlPanel,
    dispatcher: CommandDispatcher<P>,
    aggregator: TelemetryAggregator,
    state: SharedState,
    listener: Option<Listener>,
    history: VecDeque<SentCommand>,
}

impl Coordinator<ZmqPublisher> {
    /// Binds both endpoints and starts listening. The broadcast bind retries
    /// per the config's bind policy; an ingest bind failure ends startup.
    pub fn start(config: &HubConfig) -> Result<Self, HubError> {
        let channel = BroadcastChannel::open(
            ZmqPublisher::new(config.broadcast_endpoint()),
            &BindPolicy::from_config(config),
        )?;
        let state = SharedState::new();
        let listener = Listener::start(
            &config.ingest_endpoint(),
            state.clone(),
            config.poll_timeout(),
        )?;
        Ok(Self::new(config, channel, state, Some(listener)))
    }
}

impl<P: Publisher> Coordinator<P> {
    /// Assembles a coordinator from an already open channel. `listener`
    /// should be writing into `state`.
    pub fn new(
        config: &HubConfig,
        channel: BroadcastChannel<P>,
        state: SharedState,
        listener: Option<Listener>,
    ) -> Self {
        Self {
            panel: ControlPanel::new(config),
            dispatcher: CommandDispatcher::new(channel, RetryPolicy::from_config(config)),
            aggregator: TelemetryAggregator::new(state.clone(), config.telemetry_period()),
            state,
            listener,
            history: VecDeque::with_capacity(HISTORY_LEN),
        }
    }

    /// Broadcasts the panel's starting cursor state.
    pub fn send_initial_state(&mut self) {
        for command in self.panel.initial_commands() {
            let delivered = self.dispatcher.dispatch(&command);
            self.remember(command.to_string(), delivered);
        }
    }

    /// Applies a UI action and broadcasts its command. Returns whether the
    /// send went through; the panel has been updated either way.
    pub fn handle(&mut self, event: PanelEvent) -> Result<bool, HubError> {
        let command = self.panel.handle(event)?;
        let delivered = self.dispatcher.dispatch(&command);
        if !delivered {
            warn!("{:?} was not delivered", command.to_string());
        }
        self.remember(command.to_string(), delivered);
        Ok(delivered)
    }

    /// Sends a telemetry tick if one is due. Returns whether it fired.
    pub fn poll_telemetry(&mut self) -> bool {
        self.aggregator.poll(&mut self.dispatcher)
    }

    /// Time until the next telemetry tick.
    pub fn until_next_tick(&self) -> Duration {
        self.aggregator.remaining()
    }

    /// The panel's labels and selections.
    pub fn panel(&self) -> &ControlPanel {
        &self.panel
    }

    /// The state the listener writes into.
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// The telemetry aggregator, for its tick counts.
    pub fn aggregator(&self) -> &TelemetryAggregator {
        &self.aggregator
    }

    /// Recent outbound commands, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &SentCommand> {
        self.history.iter()
    }

    /// Whether the listener thread is still alive.
    pub fn listener_running(&self) -> bool {
        self.listener.as_ref().is_some_and(Listener::is_running)
    }

    /// Stops the listener, waiting until the ingest endpoint is released,
    /// then closes the broadcast endpoint.
    pub fn shutdown(&mut self) -> Result<(), HubError> {
        if let Some(mut listener) = self.listener.take() {
            listener.stop()?;
        }
        self.dispatcher.close();
        info!("hub shut down");
        Ok(())
    }

    fn remember(&mut self, text: String, delivered: bool) {
        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(SentCommand { text, delivered });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{free_port, MockPublisher, ScriptedIngest};
    use std::{thread, time::Instant};

    fn config() -> HubConfig {
        HubConfig {
            operations: vec!["Suturing".to_owned()],
            send_retries: 2,
            send_retry_delay_ms: 0,
            bind_retry_delay_ms: 0,
            telemetry_period_ms: 0,
            ..HubConfig::default()
        }
    }

    fn coordinator(
        publisher: &MockPublisher,
        listener: Option<Listener>,
        state: SharedState,
    ) -> Coordinator<MockPublisher> {
        let cfg = config();
        let channel = BroadcastChannel::open(publisher.clone(), &BindPolicy::from_config(&cfg))
            .unwrap();
        Coordinator::new(&cfg, channel, state, listener)
    }

    #[test]
    fn every_ui_action_sends_one_command() {
        let publisher = MockPublisher::default();
        let mut hub = coordinator(&publisher, None, SharedState::new());

        for event in [
            PanelEvent::StartRecordingClicked,
            PanelEvent::ToggleOperation("Suturing".to_owned()),
            PanelEvent::CursorVisualChanged {
                dropdown: 2,
                style: 3,
            },
            PanelEvent::CursorSizeChanged(0.5),
            PanelEvent::StopRecordingClicked,
        ] {
            assert!(hub.handle(event).unwrap());
        }

        assert_eq!(
            publisher.sent(),
            vec![
                "DataCollection: Start Recording",
                "Suturing: Start",
                "User1/OtherCursorVisual: 4",
                "CursorSize: 0.5",
                "DataCollection: Stop Recording",
            ]
        );
        assert_eq!(hub.history().count(), 5);
    }

    #[test]
    fn labels_change_even_when_sends_fail() {
        let publisher = MockPublisher::failing_sends();
        let mut hub = coordinator(&publisher, None, SharedState::new());

        assert!(!hub.handle(PanelEvent::StartRecordingClicked).unwrap());
        assert_eq!(hub.panel().start_label(), "Recording Sent!");
        assert!(!hub.history().last().unwrap().delivered);
    }

    #[test]
    fn invalid_actions_send_nothing() {
        let publisher = MockPublisher::default();
        let mut hub = coordinator(&publisher, None, SharedState::new());

        assert!(hub
            .handle(PanelEvent::ToggleOperation("Unknown".to_owned()))
            .is_err());
        assert!(hub.handle(PanelEvent::CursorSizeChanged(f64::NAN)).is_err());
        assert!(hub
            .handle(PanelEvent::CursorVisualChanged {
                dropdown: 0,
                style: 200
            })
            .is_err());
        assert!(publisher.sent().is_empty());
        assert_eq!(hub.history().count(), 0);
    }

    #[test]
    fn initial_state_goes_out_once() {
        let publisher = MockPublisher::default();
        let mut hub = coordinator(&publisher, None, SharedState::new());
        hub.send_initial_state();
        assert_eq!(publisher.sent().len(), 5);
        assert_eq!(publisher.sent()[3], "User2/OtherCursorVisual: 2");
    }

    #[test]
    fn ingested_gaze_is_republished() {
        let publisher = MockPublisher::default();
        let state = SharedState::new();
        let ingest = ScriptedIngest::new(vec![vec!["clientA", "BUILD: 2"], vec!["clientA", "1,2,3"]]);
        let listener =
            Listener::spawn(ingest, state.clone(), Duration::from_millis(20)).unwrap();
        let mut hub = coordinator(&publisher, Some(listener), state);
        assert!(hub.listener_running());

        let start = Instant::now();
        while hub.state().lock().client_count() == 0 && start.elapsed() < Duration::from_secs(1) {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(hub.poll_telemetry());
        assert_eq!(publisher.sent(), vec!["Gaze: clientA/1,2,3;"]);
        assert_eq!(hub.state().lock().build(), Some(2));

        hub.shutdown().unwrap();
        assert!(!hub.listener_running());
        assert_eq!(publisher.calls.lock().unwrap().closes, 1);
    }

    #[test]
    fn start_binds_both_ports_and_shuts_down_cleanly() {
        let cfg = HubConfig {
            bind_host: "127.0.0.1".to_owned(),
            broadcast_port: free_port(),
            ingest_port: free_port(),
            ..config()
        };
        let mut hub = Coordinator::start(&cfg).unwrap();
        assert!(hub.listener_running());
        assert!(hub.handle(PanelEvent::CursorSizeChanged(0.3)).unwrap());
        hub.shutdown().unwrap();

        // Both ports are free again
        let mut again = Coordinator::start(&cfg).unwrap();
        again.shutdown().unwrap();
    }

    #[test]
    fn start_fails_when_ingest_port_is_taken() {
        let cfg = HubConfig {
            bind_host: "127.0.0.1".to_owned(),
            broadcast_port: free_port(),
            ingest_port: free_port(),
            ..config()
        };
        let _squatter = crate::transport::ZmqIngest::bind(cfg.ingest_endpoint()).unwrap();
        assert!(matches!(
            Coordinator::start(&cfg),
            Err(HubError::IngestBind { .. })
        ));
    }
}
