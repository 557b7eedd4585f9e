use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use stones_inventory::{
    DatasetState, Error, InventoryController, ItemKind, RefreshOutcome, ScanMode, ScanOutcome,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Code,
    Quantity,
}

pub fn mode_title(mode: ScanMode) -> &'static str {
    match mode {
        ScanMode::Manual => "Manual",
        ScanMode::Camera => "Scanner",
        ScanMode::CustomInput => "Custom Input",
    }
}

fn next_mode(mode: ScanMode) -> ScanMode {
    match mode {
        ScanMode::Manual => ScanMode::Camera,
        ScanMode::Camera => ScanMode::CustomInput,
        ScanMode::CustomInput => ScanMode::Manual,
    }
}

fn kind_title(kind: ItemKind) -> &'static str {
    match kind {
        ItemKind::Slabs => "Slabs",
        ItemKind::Tiles => "Tiles",
    }
}

pub struct App {
    pub controller: Arc<InventoryController>,
    pub code_input: String,
    pub quantity_input: String,
    pub focus: Focus,
    pub mode: ScanMode,
    pub kind: ItemKind,
    pub state: TableState,
    pub message: Option<(String, Color)>,
    refresh_job: Option<JoinHandle<RefreshOutcome>>,
}

impl App {
    pub fn new(controller: Arc<InventoryController>) -> Self {
        Self {
            controller,
            code_input: String::new(),
            quantity_input: String::new(),
            focus: Focus::Code,
            mode: ScanMode::Manual,
            kind: ItemKind::Slabs,
            state: TableState::default(),
            message: None,
            refresh_job: None,
        }
    }

    fn focused_input(&mut self) -> &mut String {
        match self.focus {
            Focus::Code => &mut self.code_input,
            Focus::Quantity => &mut self.quantity_input,
        }
    }

    pub fn type_char(&mut self, c: char) {
        if self.focus == Focus::Quantity && !c.is_ascii_digit() && c != '-' {
            return;
        }
        self.focused_input().push(c);
    }

    pub fn backspace(&mut self) {
        self.focused_input().pop();
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Code => Focus::Quantity,
            Focus::Quantity => Focus::Code,
        };
    }

    pub fn cycle_mode(&mut self) {
        self.mode = next_mode(self.mode);
    }

    pub fn toggle_kind(&mut self) {
        self.kind = match self.kind {
            ItemKind::Slabs => ItemKind::Tiles,
            ItemKind::Tiles => ItemKind::Slabs,
        };
    }

    /// Scan the typed code with the current mode and item kind
    pub fn submit(&mut self) {
        let code = self.code_input.trim().to_string();
        if code.is_empty() {
            return;
        }

        let result = self
            .controller
            .scan(&code, self.mode, self.kind, &self.quantity_input);

        self.message = Some(match result {
            Ok(ScanOutcome::Matched(record)) => (
                format!("✓ {} · {} · qty {}", record.barcode, record.product_name, record.quantity),
                Color::Green,
            ),
            Ok(ScanOutcome::Custom(record)) => (
                format!("➕ {} added as custom entry, qty {}", record.barcode, record.quantity),
                Color::Yellow,
            ),
            Ok(ScanOutcome::NotFound) => (format!("No match found for '{}'", code), Color::Red),
            Err(Error::InvalidQuantity(text)) => (
                format!("Enter a whole-number quantity (got '{}')", text),
                Color::Red,
            ),
            Err(e) => (e.to_string(), Color::Red),
        });

        self.code_input.clear();
        self.focus = Focus::Code;
        self.select_last();
    }

    fn select_last(&mut self) {
        let len = self.controller.selection().len();
        self.state.select(len.checked_sub(1));
    }

    pub fn remove_selected(&mut self) {
        if let Some(index) = self.state.selected() {
            if self.controller.remove_at(index) {
                let len = self.controller.selection().len();
                self.state.select(if len == 0 { None } else { Some(index.min(len - 1)) });
                self.message = Some((format!("Removed entry {}", index + 1), Color::Yellow));
            }
        }
    }

    pub fn clear_selection(&mut self) {
        self.controller.clear_selection();
        self.controller.clear_last_match();
        self.state.select(None);
        self.message = Some(("Selection cleared".to_string(), Color::Yellow));
    }

    pub fn start_refresh(&mut self) {
        if self.refresh_job.is_some() || self.controller.is_refreshing() {
            self.message = Some(("Refresh already running".to_string(), Color::Yellow));
            return;
        }
        self.refresh_job = Some(self.controller.refresh_in_background());
        self.message = Some(("Refreshing batch data...".to_string(), Color::Cyan));
    }

    /// Collect a finished background refresh, if any
    pub fn poll_refresh(&mut self) {
        let finished = self
            .refresh_job
            .as_ref()
            .map(|job| job.is_finished())
            .unwrap_or(false);
        if !finished {
            return;
        }

        if let Some(job) = self.refresh_job.take() {
            self.message = Some(match job.join() {
                Ok(RefreshOutcome::Loaded(count)) => (format!("✓ Loaded {} records", count), Color::Green),
                Ok(RefreshOutcome::Failed(message)) => (message, Color::Red),
                Ok(RefreshOutcome::AlreadyInFlight) => ("Refresh already running".to_string(), Color::Yellow),
                Err(_) => ("Refresh worker panicked".to_string(), Color::Red),
            });
        }
    }

    pub fn export(&mut self) {
        if self.controller.selection().is_empty() {
            self.message = Some(("Nothing to export".to_string(), Color::Yellow));
            return;
        }

        self.message = Some(match self.controller.export_and_upload() {
            Ok(receipt) => (format!("📤 Uploaded {}", receipt.remote_id), Color::Green),
            Err(e) => (format!("Export failed: {}", e), Color::Red),
        });
    }

    pub fn next(&mut self) {
        let len = self.controller.selection().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.controller.selection().len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    /// Returns false when the app should quit
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => return false,
            KeyCode::Char('c') if ctrl => return false,
            KeyCode::Char('e') if ctrl => self.export(),
            KeyCode::Char('l') if ctrl => self.clear_selection(),
            KeyCode::Char(c) => self.type_char(c),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Enter => self.submit(),
            KeyCode::Tab => self.toggle_focus(),
            KeyCode::F(2) => self.cycle_mode(),
            KeyCode::F(3) => self.toggle_kind(),
            KeyCode::F(5) => self.start_refresh(),
            KeyCode::Delete => self.remove_selected(),
            KeyCode::Down => self.next(),
            KeyCode::Up => self.previous(),
            _ => {}
        }
        true
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        app.poll_refresh();
        terminal.draw(|f| ui(f, app))?;

        // Poll so background refreshes repaint without a keypress
        if !event::poll(Duration::from_millis(200))? {
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if !app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with dataset state
            Constraint::Length(3), // Inputs
            Constraint::Length(4), // Last match
            Constraint::Min(0),    // Selection
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);
    render_inputs(f, chunks[1], app);
    render_last_match(f, chunks[2], app);
    render_selection(f, chunks[3], app);
    render_status_bar(f, chunks[4], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let dataset = app.controller.dataset();
    let (label, color) = match &*dataset {
        DatasetState::Idle => ("Idle".to_string(), Color::DarkGray),
        DatasetState::Loading => ("Loading...".to_string(), Color::Cyan),
        DatasetState::Success(records) => (format!("{} records", records.len()), Color::Green),
        DatasetState::Error(message) => (truncate(message, 60), Color::Red),
    };

    let spans = vec![
        Span::styled(
            "Stones Inventory",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(label, Style::default().fg(color)),
        Span::raw("  |  "),
        Span::styled(
            format!("Mode: {}", mode_title(app.mode)),
            Style::default().fg(Color::White),
        ),
        Span::raw("  "),
        Span::styled(
            format!("Item: {}", kind_title(app.kind)),
            Style::default().fg(Color::White),
        ),
    ];

    let header = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_inputs(f: &mut Frame, area: Rect, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(area);

    let border = |focus: Focus| {
        if app.focus == focus {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        }
    };

    let code = Paragraph::new(app.code_input.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border(Focus::Code))
            .title(" Batch code "),
    );
    let quantity = Paragraph::new(app.quantity_input.as_str()).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border(Focus::Quantity))
            .title(" Quantity "),
    );

    f.render_widget(code, columns[0]);
    f.render_widget(quantity, columns[1]);
}

fn render_last_match(f: &mut Frame, area: Rect, app: &App) {
    let last = app.controller.last_match();
    let lines = match &*last {
        Some(record) => vec![
            Line::from(vec![
                Span::styled("Item: ", Style::default().fg(Color::DarkGray)),
                Span::styled(record.product_name.clone(), Style::default().add_modifier(Modifier::BOLD)),
            ]),
            Line::from(format!(
                "Barcode {}  ·  {} x {}  ·  qty {}  ·  {} m²",
                record.barcode, record.height, record.width, record.quantity, record.area_square_meters
            )),
        ],
        None => vec![Line::from(Span::styled(
            "No batch scanned yet",
            Style::default().fg(Color::DarkGray),
        ))],
    };

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" Last match "),
    );

    f.render_widget(panel, area);
}

fn render_selection(f: &mut Frame, area: Rect, app: &mut App) {
    let selection = app.controller.selection();
    let totals = selection.totals();

    let header_cells = ["#", "Barcode", "Item", "Qty", "Height", "Width", "m²"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = selection.entries().iter().enumerate().map(|(i, record)| {
        let color = if record.product_name == stones_inventory::CUSTOM_PRODUCT_NAME {
            Color::Yellow
        } else {
            Color::White
        };

        let cells = vec![
            Cell::from(format!("{}", i + 1)),
            Cell::from(record.barcode.clone()),
            Cell::from(truncate(&record.product_name, 28)).style(Style::default().fg(color)),
            Cell::from(format!("{}", record.quantity)),
            Cell::from(format!("{}", record.height)),
            Cell::from(format!("{}", record.width)),
            Cell::from(format!("{:.2}", record.area_square_meters)),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Length(16),
            Constraint::Length(30),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(
                " Selection · {} entries · qty {} · {} m² ",
                totals.count,
                totals.total_quantity,
                totals.display_area()
            )),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = Vec::new();

    if let Some((message, color)) = &app.message {
        status_spans.push(Span::styled(format!(" {} ", message), Style::default().fg(*color)));
        status_spans.push(Span::raw(" | "));
    }

    for (key, label) in [
        ("Enter", " Scan | "),
        ("Tab", " Field | "),
        ("F2", " Mode | "),
        ("F3", " Item | "),
        ("Del", " Remove | "),
        ("F5", " Refresh | "),
        ("^E", " Export | "),
        ("^L", " Clear | "),
    ] {
        status_spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(label));
    }
    status_spans.push(Span::styled("Esc", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
