// 🖥️ Terminal UI - amount entry, PIN pad and transfer result

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame, Terminal,
};
use secure_remit::{
    AppConfig, Capabilities, ConfirmScreen, ConfirmStep, PinFlow, PinFlowController,
    PinFlowOutcome, PinKey, PinService, RateSource, RemitError, TransferCategory, TransferKind,
    TransferQuote, TransferReceipt, TransferService,
};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Amount,
    PinSetupPrompt { title: String, message: String },
    Pin,
    Done { message: String },
    Failed { message: String, suggestions: Vec<String> },
    /// Navigates back once `until` passes
    Locked { message: String, until: Instant },
}

/// What the session ended with; main turns this into notifications
#[derive(Debug, Clone)]
pub enum AppOutcome {
    Cancelled,
    Sent {
        receipt: TransferReceipt,
        quote: TransferQuote,
        recipient: String,
    },
    TransferFailed {
        recipient: String,
        message: String,
    },
    PinSaved,
}

pub struct App<B> {
    backend: Arc<B>,
    confirm: Option<ConfirmScreen<B>>,
    pin: Option<PinFlowController<Arc<B>>>,
    pub screen: Screen,
    caps: Capabilities,
    max_attempts: u32,
    back_delay: Duration,
    notice: Option<String>,
    outcome: AppOutcome,
    should_quit: bool,
}

impl<B> App<B>
where
    B: PinService + TransferService + RateSource + 'static,
{
    /// Amount → confirm → PIN → transfer
    pub fn transfer(confirm: ConfirmScreen<B>, backend: Arc<B>, caps: Capabilities, config: &AppConfig) -> Self {
        App {
            backend,
            confirm: Some(confirm),
            pin: None,
            screen: Screen::Amount,
            caps,
            max_attempts: config.max_pin_attempts,
            back_delay: config.lockout_back_delay(),
            notice: None,
            outcome: AppOutcome::Cancelled,
            should_quit: false,
        }
    }

    /// Standalone PIN setup or change
    pub fn pin_only(flow: PinFlow, backend: Arc<B>, caps: Capabilities, config: &AppConfig) -> Self {
        let mut app = App {
            backend,
            confirm: None,
            pin: None,
            screen: Screen::Pin,
            caps,
            max_attempts: config.max_pin_attempts,
            back_delay: config.lockout_back_delay(),
            notice: None,
            outcome: AppOutcome::Cancelled,
            should_quit: false,
        };
        app.pin = Some(app.controller(flow, None));
        app
    }

    pub fn outcome(&self) -> &AppOutcome {
        &self.outcome
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    fn controller(&self, flow: PinFlow, subtitle: Option<&str>) -> PinFlowController<Arc<B>> {
        let controller = PinFlowController::new(flow, self.backend.clone())
            .with_max_attempts(self.max_attempts)
            .with_back_delay(self.back_delay)
            .with_haptics(self.caps.haptics.clone());
        match subtitle {
            Some(subtitle) => controller.with_subtitle(subtitle),
            None => controller,
        }
    }

    /// Leave the PIN pad: back to the amount, or out if there is nothing to go back to
    fn back(&mut self) {
        self.pin = None;
        if self.confirm.is_some() {
            self.screen = Screen::Amount;
        } else {
            self.should_quit = true;
        }
    }

    /// Timer-driven updates between key presses
    pub fn tick(&mut self) {
        if let Some(confirm) = self.confirm.as_mut() {
            confirm.refresh_rate();
        }
        if let Screen::Locked { until, .. } = &self.screen {
            if Instant::now() >= *until {
                info!("lockout elapsed, leaving PIN pad");
                self.back();
            }
        }
    }

    pub async fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }

        match self.screen.clone() {
            Screen::Amount => self.handle_amount_key(key).await,
            Screen::PinSetupPrompt { .. } => match key.code {
                KeyCode::Char('y') | KeyCode::Enter => {
                    self.pin = Some(self.controller(PinFlow::Setup, None));
                    self.screen = Screen::Pin;
                }
                KeyCode::Char('n') | KeyCode::Esc => self.screen = Screen::Amount,
                _ => {}
            },
            Screen::Pin => self.handle_pin_key(key).await,
            Screen::Done { .. } => {
                if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char('q')) {
                    self.should_quit = true;
                }
            }
            Screen::Failed { .. } => match key.code {
                KeyCode::Enter | KeyCode::Esc => self.back(),
                KeyCode::Char('q') => self.should_quit = true,
                _ => {}
            },
            Screen::Locked { .. } => {
                if key.code == KeyCode::Char('q') {
                    self.should_quit = true;
                }
            }
        }
    }

    async fn handle_amount_key(&mut self, key: KeyEvent) {
        let Some(confirm) = self.confirm.as_mut() else {
            return;
        };

        match key.code {
            KeyCode::Char(c) if c.is_ascii_digit() || c == '.' || c == ',' => {
                let amount = format!("{}{}", confirm.draft().amount, c);
                confirm.set_amount(amount);
                self.notice = None;
            }
            KeyCode::Backspace => {
                let mut amount = confirm.draft().amount.clone();
                amount.pop();
                confirm.set_amount(amount);
            }
            KeyCode::Tab => {
                let next = next_category(confirm.draft().category);
                confirm.set_category(next);
            }
            KeyCode::Enter => match confirm.confirm().await {
                Ok(ConfirmStep::VerifyPin { subtitle }) => {
                    self.pin = Some(self.controller(PinFlow::Verify, Some(&subtitle)));
                    self.screen = Screen::Pin;
                }
                Ok(ConfirmStep::PinSetupRequired { title, message }) => {
                    self.screen = Screen::PinSetupPrompt { title, message };
                }
                Err(RemitError::Remote(err)) => {
                    self.screen = Screen::Failed {
                        message: err.message,
                        suggestions: err.suggestions,
                    };
                }
                Err(err) => self.notice = Some(err.to_string()),
            },
            KeyCode::Esc | KeyCode::Char('q') => self.should_quit = true,
            _ => {}
        }
    }

    async fn handle_pin_key(&mut self, key: KeyEvent) {
        let Some(pin) = self.pin.as_mut() else {
            return;
        };

        let outcome = match key.code {
            KeyCode::Char('v') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                match self.caps.clipboard.read_text() {
                    Some(text) => pin.paste(&text).await,
                    None => None,
                }
            }
            KeyCode::Char(c) if c.is_ascii_digit() => pin.enter(PinKey::Digit(c)).await,
            KeyCode::Backspace => pin.enter(PinKey::Backspace).await,
            KeyCode::Left => pin.enter(PinKey::Left).await,
            KeyCode::Right => pin.enter(PinKey::Right).await,
            KeyCode::Esc => {
                self.back();
                None
            }
            _ => None,
        };

        if let Some(outcome) = outcome {
            self.on_pin_outcome(outcome).await;
        }
    }

    async fn on_pin_outcome(&mut self, outcome: PinFlowOutcome) {
        let flow = match self.pin.as_ref() {
            Some(pin) => pin.flow(),
            None => return,
        };

        match outcome {
            PinFlowOutcome::Completed(pin) if flow == PinFlow::Verify => {
                self.pin = None;
                self.execute(pin).await;
            }
            PinFlowOutcome::Completed(_) => {
                self.pin = None;
                if self.confirm.is_some() {
                    self.notice = Some("PIN set up. Press Enter to confirm.".to_string());
                    self.screen = Screen::Amount;
                } else {
                    self.outcome = AppOutcome::PinSaved;
                    self.screen = Screen::Done {
                        message: "Your PIN has been saved.".to_string(),
                    };
                }
            }
            PinFlowOutcome::Locked {
                message,
                back_after,
            } => {
                self.screen = Screen::Locked {
                    message,
                    until: Instant::now() + back_after,
                };
            }
            // Other outcomes are rendered from the controller's own state
            _ => {}
        }
    }

    async fn execute(&mut self, pin: secure_remit::Pin) {
        let Some(confirm) = self.confirm.as_mut() else {
            return;
        };
        let recipient = confirm.draft().recipient.name.clone();
        let quote = confirm.quote().ok();

        match confirm.execute(pin).await {
            Ok(receipt) => {
                self.screen = Screen::Done {
                    message: format!("Transfer submitted. Reference {}", receipt.transaction_id),
                };
                if let Some(quote) = quote {
                    self.outcome = AppOutcome::Sent {
                        receipt,
                        quote,
                        recipient,
                    };
                }
            }
            Err(err) => {
                let (message, suggestions) = match err {
                    RemitError::Remote(classified) => (classified.message, classified.suggestions),
                    other => (other.to_string(), Vec::new()),
                };
                self.outcome = AppOutcome::TransferFailed {
                    recipient,
                    message: message.clone(),
                };
                self.screen = Screen::Failed {
                    message,
                    suggestions,
                };
            }
        }
    }
}

fn next_category(current: Option<TransferCategory>) -> Option<TransferCategory> {
    let all = TransferCategory::ALL;
    match current {
        None => all.first().copied(),
        Some(category) => {
            let index = all.iter().position(|c| *c == category)?;
            all.get(index + 1).copied()
        }
    }
}

// ============================================================================
// EVENT LOOP
// ============================================================================

pub fn run_ui<B>(app: &mut App<B>, rt: &Runtime) -> Result<()>
where
    B: PinService + TransferService + RateSource + 'static,
{
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app, rt);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<T, B>(terminal: &mut Terminal<T>, app: &mut App<B>, rt: &Runtime) -> Result<()>
where
    T: ratatui::backend::Backend,
    B: PinService + TransferService + RateSource + 'static,
{
    loop {
        terminal.draw(|f| ui(f, app))?;

        if event::poll(Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    rt.block_on(app.handle_key(key));
                }
            }
        }
        app.tick();

        if app.should_quit() {
            return Ok(());
        }
    }
}

// ============================================================================
// RENDERING
// ============================================================================

fn ui<B>(f: &mut Frame, app: &App<B>)
where
    B: PinService + TransferService + RateSource + 'static,
{
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Key hints
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match &app.screen {
        Screen::Amount => render_amount(f, chunks[1], app),
        Screen::PinSetupPrompt { title, message } => render_message(
            f,
            chunks[1],
            title,
            vec![message.clone(), String::new(), "[y] Set up PIN   [n] Back".to_string()],
            Color::Yellow,
        ),
        Screen::Pin => render_pin(f, chunks[1], app),
        Screen::Done { message } => {
            render_message(f, chunks[1], "Done", vec![message.clone()], Color::Green)
        }
        Screen::Failed {
            message,
            suggestions,
        } => {
            let mut lines = vec![message.clone(), String::new()];
            lines.extend(suggestions.iter().map(|s| format!("• {}", s)));
            render_message(f, chunks[1], "Transfer failed", lines, Color::Red)
        }
        Screen::Locked { message, .. } => {
            render_message(f, chunks[1], "Locked", vec![message.clone()], Color::Red)
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header<B>(f: &mut Frame, area: Rect, app: &App<B>)
where
    B: PinService + TransferService + RateSource + 'static,
{
    let mode = match app.confirm.as_ref().map(|c| c.draft().kind) {
        Some(TransferKind::AppTransfer) => "Send money",
        Some(TransferKind::BankWithdrawal) => "Withdraw to bank",
        None => "Transaction PIN",
    };

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "🔐 Secure Remit",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(mode, Style::default().fg(Color::White)),
    ]))
    .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_amount<B>(f: &mut Frame, area: Rect, app: &App<B>)
where
    B: PinService + TransferService + RateSource + 'static,
{
    let Some(confirm) = app.confirm.as_ref() else {
        return;
    };
    let draft = confirm.draft();
    let label = Style::default().fg(Color::DarkGray);

    let mut lines = vec![
        Line::from(vec![
            Span::styled("To:        ", label),
            Span::raw(draft.recipient.name.clone()),
            Span::raw(" "),
            Span::styled(
                draft.recipient.masked_account().or_else(|| draft.recipient.phone.clone()).unwrap_or_default(),
                label,
            ),
        ]),
        Line::from(vec![
            Span::styled("Amount:    ", label),
            Span::styled(
                format!("{} {}▏", confirm.limits().input_currency, draft.amount),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("Category:  ", label),
            Span::raw(draft.category.map(|c| c.label()).unwrap_or("None")),
        ]),
        Line::from(""),
    ];

    match confirm.quote() {
        Ok(quote) => {
            lines.push(Line::from(vec![
                Span::styled("Fee:       ", label),
                Span::raw(format!("{} {}", quote.input_currency, quote.fee_display())),
            ]));
            lines.push(Line::from(vec![
                Span::styled("Total:     ", label),
                Span::styled(
                    format!("{} {}", quote.input_currency, quote.total_display()),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
            ]));
            if confirm.needs_conversion() {
                let converted = match (quote.exchange_rate, quote.converted_display()) {
                    (Some(rate), Some(value)) => {
                        format!("{} {} (rate {:.4})", quote.recipient_currency, value, rate)
                    }
                    _ => "fetching rate…".to_string(),
                };
                lines.push(Line::from(vec![
                    Span::styled("They get:  ", label),
                    Span::styled(converted, Style::default().fg(Color::Green)),
                ]));
            }
        }
        Err(err) if !draft.amount.is_empty() => {
            lines.push(Line::from(Span::styled(err.to_string(), Style::default().fg(Color::Red))));
        }
        Err(_) => {}
    }

    if let Some(notice) = &app.notice {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(notice.clone(), Style::default().fg(Color::Yellow))));
    }

    let panel = Paragraph::new(lines).block(
        Block::default()
            .title(" Confirm transfer ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );
    f.render_widget(panel, area);
}

/// Filled slots show as dots; digits are never drawn
fn pin_dots(indicators: [bool; 4]) -> String {
    indicators
        .iter()
        .map(|filled| if *filled { "●" } else { "○" })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_pin<B>(f: &mut Frame, area: Rect, app: &App<B>)
where
    B: PinService + TransferService + RateSource + 'static,
{
    let Some(pin) = app.pin.as_ref() else {
        return;
    };

    let mut lines = vec![
        Line::from(Span::styled(pin.title(), Style::default().add_modifier(Modifier::BOLD))),
    ];
    if let Some(subtitle) = pin.subtitle() {
        lines.push(Line::from(Span::styled(subtitle.to_string(), Style::default().fg(Color::DarkGray))));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        pin_dots(pin.entry().indicators()),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(""));

    if let Some(error) = pin.error() {
        lines.push(Line::from(Span::styled(error.to_string(), Style::default().fg(Color::Red))));
    }
    if pin.attempt_count() > 0 {
        lines.push(Line::from(Span::styled(
            format!("Failed attempts: {}", pin.attempt_count()),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let panel = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(panel, area);
}

fn render_message(f: &mut Frame, area: Rect, title: &str, lines: Vec<String>, color: Color) {
    let lines: Vec<Line> = lines.into_iter().map(Line::from).collect();
    let panel = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title(format!(" {} ", title))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        );
    f.render_widget(panel, area);
}

fn render_status_bar<B>(f: &mut Frame, area: Rect, app: &App<B>)
where
    B: PinService + TransferService + RateSource + 'static,
{
    let hints: &[(&str, &str)] = match app.screen {
        Screen::Amount => &[("0-9", "Amount"), ("Tab", "Category"), ("Enter", "Confirm"), ("q", "Quit")],
        Screen::PinSetupPrompt { .. } => &[("y", "Set up"), ("n", "Back")],
        Screen::Pin => &[("0-9", "Digit"), ("←/→", "Move"), ("Ctrl+V", "Paste"), ("Esc", "Back")],
        Screen::Done { .. } => &[("Enter", "Close")],
        Screen::Failed { .. } => &[("Enter", "Back"), ("q", "Quit")],
        Screen::Locked { .. } => &[("q", "Quit")],
    };

    let mut spans = Vec::new();
    for (i, (key, action)) in hints.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" | "));
        }
        spans.push(Span::styled(*key, Style::default().fg(Color::Yellow)));
        spans.push(Span::raw(format!(" {}", action)));
    }

    let status_bar = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );
    f.render_widget(status_bar, area);
}

// ============================================================================
// TESTS
// ============================================================================
