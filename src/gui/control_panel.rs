//! The ratatui panel: buttons, cursor dropdowns, the client table, and the
//! last few commands sent.

use std::{io::stdout, time::Duration};

use crate::{
    config::CURSOR_STYLES,
    coordinator::Coordinator,
    error::HubError,
    message::CursorSlot,
    panel::{ControlPanel, PanelEvent, CURSOR_SIZE_STEP},
    transport::Publisher,
};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use log::warn;
use ratatui::{
    prelude::*,
    widgets::{
        block::{Position, Title},
        *,
    },
    Terminal,
};

const STYLE_NAMES: [&str; CURSOR_STYLES as usize] = ["Hide", "Style1", "Style2", "Style3"];

/// The longest the panel waits for a key before checking the telemetry timer
/// and redrawing.
const MAX_FRAME: Duration = Duration::from_millis(50);

/// Which cursor dropdown the arrow keys act on.
#[derive(Debug, Default)]
struct View {
    dropdown: usize,
}

/// Runs the terminal control panel until the user quits. The panel's loop is
/// also what fires the hub's telemetry ticks.
pub fn run_control_panel<P: Publisher>(hub: &mut Coordinator<P>) -> Result<(), HubError> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let res = panel_loop(&mut terminal, hub);

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    res
}

fn panel_loop<B: Backend, P: Publisher>(
    terminal: &mut Terminal<B>,
    hub: &mut Coordinator<P>,
) -> Result<(), HubError> {
    let mut view = View::default();
    loop {
        terminal.draw(|frame| ui(frame, hub, &view))?;

        let timeout = hub.until_next_tick().min(MAX_FRAME);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if key.code == KeyCode::Char('q') || key.code == KeyCode::Esc {
                        return Ok(());
                    }
                    if let Some(action) = action_for(key.code, hub.panel(), &mut view) {
                        if let Err(e) = hub.handle(action) {
                            warn!("{}", e);
                        }
                    }
                }
            }
        }

        hub.poll_telemetry();
    }
}

/// Maps a key to a UI action. Disabled buttons map to nothing.
fn action_for(code: KeyCode, panel: &ControlPanel, view: &mut View) -> Option<PanelEvent> {
    let n_slots = CursorSlot::ALL.len();
    match code {
        KeyCode::Char('r') if panel.start_enabled() => Some(PanelEvent::StartRecordingClicked),
        KeyCode::Char('s') if panel.stop_enabled() => Some(PanelEvent::StopRecordingClicked),
        KeyCode::Char(c @ '1'..='9') => {
            let index = c as usize - '1' as usize;
            panel
                .operations()
                .name(index)
                .map(|name| PanelEvent::ToggleOperation(name.to_owned()))
        }
        KeyCode::Up | KeyCode::BackTab => {
            view.dropdown = (view.dropdown + n_slots - 1) % n_slots;
            None
        }
        KeyCode::Down | KeyCode::Tab => {
            view.dropdown = (view.dropdown + 1) % n_slots;
            None
        }
        KeyCode::Left | KeyCode::Right => {
            let current = panel.cursor_style(view.dropdown)? % CURSOR_STYLES;
            let style = if code == KeyCode::Right {
                (current + 1) % CURSOR_STYLES
            } else {
                (current + CURSOR_STYLES - 1) % CURSOR_STYLES
            };
            Some(PanelEvent::CursorVisualChanged {
                dropdown: view.dropdown,
                style,
            })
        }
        KeyCode::Char('+') | KeyCode::Char('=') => Some(PanelEvent::CursorSizeChanged(
            panel.cursor_size() + CURSOR_SIZE_STEP,
        )),
        KeyCode::Char('-') => Some(PanelEvent::CursorSizeChanged(
            panel.cursor_size() - CURSOR_SIZE_STEP,
        )),
        _ => None,
    }
}

fn button<'a>(key: &'a str, label: String, enabled: bool) -> Line<'a> {
    let label = if enabled {
        label.white()
    } else {
        label.dark_gray()
    };
    Line::from(vec![format!(" [{}] ", key).magenta().bold(), label])
}

fn ui<P: Publisher>(frame: &mut Frame, hub: &Coordinator<P>, view: &View) {
    let panel = hub.panel();

    let title = Title::from(" HoloLens Coordinator ".magenta().bold());
    let instructions = Title::from(Line::from(vec![
        " Record ".into(),
        "<R>/<S>".magenta().bold(),
        " Operations ".into(),
        "<1-9>".magenta().bold(),
        " Cursor ".into(),
        "<Up>/<Down> <Left>/<Right>".magenta().bold(),
        " Size ".into(),
        "<+>/<->".magenta().bold(),
        " Quit ".into(),
        "<Q> ".magenta().bold(),
    ]));
    let outer = Block::default()
        .title(title.alignment(Alignment::Center))
        .title(
            instructions
                .alignment(Alignment::Center)
                .position(Position::Bottom),
        )
        .borders(Borders::ALL);
    let area = outer.inner(frame.size());
    frame.render_widget(outer, frame.size());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4 + panel.operations().len() as u16),
            Constraint::Length(2 + CursorSlot::ALL.len() as u16),
            Constraint::Min(3),
        ])
        .split(columns[0]);
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(10)])
        .split(columns[1]);

    // Buttons
    let mut lines = vec![
        button("R", panel.start_label().to_owned(), panel.start_enabled()),
        button("S", "Stop Recording".to_owned(), panel.stop_enabled()),
    ];
    for (i, (name, active)) in panel.operations().iter().enumerate() {
        let key = (i + 1).to_string();
        let label = crate::panel::OperationToggles::label(name, active);
        lines.push(Line::from(vec![
            format!(" [{}] ", key).magenta().bold(),
            if active { label.green() } else { label.white() },
        ]));
    }
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().title(" Controls ").borders(Borders::ALL)),
        left[0],
    );

    // Cursor dropdowns
    let items: Vec<ListItem> = CursorSlot::ALL
        .iter()
        .enumerate()
        .map(|(i, slot)| {
            let style = panel.cursor_style(i).unwrap_or(0) as usize;
            let name = STYLE_NAMES.get(style).copied().unwrap_or("?");
            ListItem::new(format!("{}: {}", slot.label(), name))
        })
        .collect();
    let mut list_state = ListState::default().with_selected(Some(view.dropdown));
    frame.render_stateful_widget(
        List::new(items)
            .highlight_symbol(">>")
            .highlight_style(Style::default().fg(Color::Magenta))
            .block(Block::default().title(" Cursors ").borders(Borders::ALL)),
        left[1],
        &mut list_state,
    );

    // Session
    let state = hub.state().lock();
    let (ticks, dropped) = hub.aggregator().counts();
    let recording = match panel.recording().started() {
        Some(start) if panel.recording().is_recording() => {
            format!("since {}", start.format("%H:%M:%S"))
        }
        _ => "idle".to_owned(),
    };
    let session = vec![
        Line::from(format!(" Cursor size: {:.2}", panel.cursor_size())),
        Line::from(format!(" Recording: {}", recording)),
        Line::from(match state.build() {
            Some(build) => format!(" Build: {} ({} mismatches)", build, state.mismatches()),
            None => " Build: no handshake yet".to_owned(),
        }),
        Line::from(format!(" Gaze ticks: {} sent, {} dropped", ticks, dropped)),
        Line::from(if hub.listener_running() {
            " Listener: running".green()
        } else {
            " Listener: stopped".red()
        }),
    ];
    frame.render_widget(
        Paragraph::new(session).block(Block::default().title(" Session ").borders(Borders::ALL)),
        left[2],
    );

    // Clients
    let rows: Vec<Row> = state
        .snapshot()
        .into_iter()
        .map(|entry| Row::new(vec![entry.identity, entry.value]))
        .collect();
    drop(state);
    frame.render_widget(
        Table::new(rows, [Constraint::Percentage(35), Constraint::Percentage(65)])
            .header(Row::new(vec!["Client", "Gaze"]).style(Style::default().bold()))
            .block(Block::default().title(" Clients ").borders(Borders::ALL)),
        right[0],
    );

    // Outbound
    let sent: Vec<ListItem> = hub
        .history()
        .map(|cmd| {
            let text = cmd.text.clone();
            ListItem::new(if cmd.delivered {
                text.white()
            } else {
                text.red()
            })
        })
        .collect();
    frame.render_widget(
        List::new(sent).block(Block::default().title(" Sent ").borders(Borders::ALL)),
        right[1],
    );
}
