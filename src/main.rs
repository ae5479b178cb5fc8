// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use secure_remit::{
    AppConfig, Capabilities, HttpBackend, NotificationService, PinFlow, PinService, Recipient,
    SessionCache, SimulationConfig, SqliteStore, TransferKind,
};
use std::env;
use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "REMIT_LOG";
const LOCAL_USER: &str = "local";

type Storage = Arc<SqliteStore>;

/// Everything a command needs, wired once from config
struct AppContext<'a> {
    config: AppConfig,
    rt: &'a Runtime,
    backend: Arc<HttpBackend>,
    caps: Capabilities,
    session: SessionCache<Storage>,
    notifications: NotificationService<Storage>,
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");

    if matches!(command, "help" | "-h" | "--help") {
        print_usage();
        return Ok(());
    }

    let config = AppConfig::load()?;
    init_logging(&config)?;
    let rt = Runtime::new().context("Failed to start async runtime")?;
    let _guard = rt.enter();
    let mut ctx = build_context(config, &rt)?;

    let result = match command {
        "send" => run_send(&mut ctx, &args[2..]),
        "withdraw" => run_withdraw(&mut ctx, &args[2..]),
        "pin" => run_pin(&mut ctx, args.get(2).map(String::as_str)),
        "notifications" => run_notifications(&ctx, &args[2..]),
        other => {
            print_usage();
            Err(anyhow::anyhow!("Unknown command: {}", other))
        }
    };

    ctx.notifications.dispose();
    result
}

fn print_usage() {
    println!("🔐 Secure Remit");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Usage:");
    println!("  secure-remit send <phone> <name> <currency> [amount]");
    println!("  secure-remit withdraw <account> <bank_code> <name> <currency> [amount]");
    println!("  secure-remit pin setup|change");
    println!("  secure-remit notifications [list|read <id>|mark-all|delete <id>|clear]");
    println!();
    println!("Environment: REMIT_CONFIG, REMIT_API_URL, REMIT_DB_PATH, REMIT_TOKEN, REMIT_LOG");
}

/// Logs go to a file so the TUI owns the terminal
fn init_logging(config: &AppConfig) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
        .with_context(|| format!("Failed to open log file: {:?}", config.log_path))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}

fn build_context(config: AppConfig, rt: &Runtime) -> Result<AppContext<'_>> {
    let storage: Storage = Arc::new(SqliteStore::open(&config.database_path)?);
    let session = SessionCache::new(storage.clone());

    let user_id = session
        .user()?
        .map(|user| user.id)
        .unwrap_or_else(|| LOCAL_USER.to_string());
    let token = match &config.api_token {
        Some(token) => Some(token.clone()),
        None => session.token()?,
    };

    let mut backend = HttpBackend::from_config(&config)?;
    if let Some(token) = token {
        backend = backend.with_token(&token);
    }
    info!(api = backend.base_url(), user_id = %user_id, "client configured");

    let caps = Capabilities::default();
    let notifications = NotificationService::init(&user_id, storage, caps.notifier.clone())?;

    Ok(AppContext {
        config,
        rt,
        backend: Arc::new(backend),
        caps,
        session,
        notifications,
    })
}

// ============================================================================
// TRANSFERS
// ============================================================================

fn run_send(ctx: &mut AppContext, args: &[String]) -> Result<()> {
    let [phone, name, currency, rest @ ..] = args else {
        bail!("Usage: secure-remit send <phone> <name> <currency> [amount]");
    };
    let recipient = Recipient::app_user(name, phone, currency);
    run_transfer(ctx, recipient, TransferKind::AppTransfer, rest.first())
}

fn run_withdraw(ctx: &mut AppContext, args: &[String]) -> Result<()> {
    let [account, bank_code, name, currency, rest @ ..] = args else {
        bail!("Usage: secure-remit withdraw <account> <bank_code> <name> <currency> [amount]");
    };
    let recipient = Recipient::bank_account(name, account, bank_code, currency);
    run_transfer(ctx, recipient, TransferKind::BankWithdrawal, rest.first())
}

#[cfg(feature = "tui")]
fn run_transfer(
    ctx: &mut AppContext,
    recipient: Recipient,
    kind: TransferKind,
    amount: Option<&String>,
) -> Result<()> {
    use secure_remit::ConfirmScreen;
    use ui::AppOutcome;

    let mut confirm = ConfirmScreen::new(
        ctx.backend.clone(),
        recipient,
        kind,
        ctx.config.transfer.clone(),
    );
    if let Some(amount) = amount {
        confirm.set_amount(amount.as_str());
    }
    confirm.start_rate_updates(ctx.config.rate_refresh_interval());
    start_simulation(ctx);

    let mut app = ui::App::transfer(confirm, ctx.backend.clone(), ctx.caps.clone(), &ctx.config);
    ui::run_ui(&mut app, ctx.rt)?;

    match app.outcome() {
        AppOutcome::Sent {
            receipt,
            quote,
            recipient,
        } => {
            ctx.session.set_pin_enabled(true)?;
            ctx.notifications.notify_transaction_succeeded(
                quote.amount,
                &quote.input_currency,
                recipient,
            )?;
            println!("✅ Transfer submitted: {}", receipt.transaction_id);
        }
        AppOutcome::TransferFailed { recipient, message } => {
            ctx.notifications
                .notify_transaction_failed(recipient, message)?;
            println!("❌ Transfer failed: {}", message);
        }
        AppOutcome::PinSaved => ctx.session.set_pin_enabled(true)?,
        AppOutcome::Cancelled => println!("Transfer cancelled"),
    }

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_transfer(
    _ctx: &mut AppContext,
    _recipient: Recipient,
    _kind: TransferKind,
    _amount: Option<&String>,
) -> Result<()> {
    tui_unavailable()
}

#[cfg(feature = "tui")]
fn start_simulation(ctx: &mut AppContext) {
    ctx.notifications.start_simulation(SimulationConfig {
        interval: ctx.config.notification_check_interval(),
        probability: ctx.config.notification_probability,
    });
}

// ============================================================================
// PIN
// ============================================================================

fn run_pin(ctx: &mut AppContext, action: Option<&str>) -> Result<()> {
    let status = ctx.rt.block_on(ctx.backend.pin_status())?;
    ctx.session.set_pin_enabled(status.enabled)?;

    let flow = match (action, status.enabled) {
        (Some("setup"), false) => PinFlow::Setup,
        (Some("setup"), true) => {
            println!("A PIN is already set up. Use: secure-remit pin change");
            return Ok(());
        }
        (Some("change"), true) => PinFlow::Change {
            require_current_pin: true,
        },
        (Some("change"), false) => {
            println!("No PIN yet. Use: secure-remit pin setup");
            return Ok(());
        }
        _ => bail!("Usage: secure-remit pin setup|change"),
    };

    run_pin_flow(ctx, flow)
}

#[cfg(feature = "tui")]
fn run_pin_flow(ctx: &mut AppContext, flow: PinFlow) -> Result<()> {
    start_simulation(ctx);

    let mut app = ui::App::pin_only(flow, ctx.backend.clone(), ctx.caps.clone(), &ctx.config);
    ui::run_ui(&mut app, ctx.rt)?;

    if let ui::AppOutcome::PinSaved = app.outcome() {
        ctx.session.set_pin_enabled(true)?;
        println!("✅ PIN saved");
    }
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_pin_flow(_ctx: &mut AppContext, _flow: PinFlow) -> Result<()> {
    tui_unavailable()
}

#[cfg(not(feature = "tui"))]
fn tui_unavailable() -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    std::process::exit(1);
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

fn run_notifications(ctx: &AppContext, args: &[String]) -> Result<()> {
    let service = &ctx.notifications;

    match args.first().map(String::as_str) {
        None | Some("list") => {}
        Some("mark-all") => {
            let count = service.mark_all_as_read()?;
            println!("✓ Marked {} notifications as read", count);
        }
        Some("clear") => {
            service.clear()?;
            println!("✓ Notifications cleared");
            return Ok(());
        }
        Some("read") => {
            let id = args.get(1).context("Usage: secure-remit notifications read <id>")?;
            if !service.mark_as_read(id)? {
                println!("No unread notification with id {}", id);
            }
        }
        Some("delete") => {
            let id = args.get(1).context("Usage: secure-remit notifications delete <id>")?;
            if !service.delete(id)? {
                println!("No notification with id {}", id);
            }
        }
        Some(other) => bail!("Unknown notifications action: {}", other),
    }

    let notifications = service.snapshot()?;
    println!("🔔 Notifications ({} unread)", service.unread_count()?);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if notifications.is_empty() {
        println!("No notifications");
    }
    for n in &notifications {
        println!(
            "{} {} [{:?}/{:?}] {} - {}",
            if n.read { " " } else { "•" },
            n.timestamp.format("%Y-%m-%d %H:%M"),
            n.kind,
            n.priority,
            n.title,
            n.message
        );
        println!("    id: {}", n.id);
    }

    Ok(())
}
