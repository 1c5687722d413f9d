use anyhow::Context;
use colored::Colorize;
use lendlog_ledger::{
    AccountMatcher, Clock, CsvLedger, LedgerAuditor, LedgerReader, ProjectionBuilder, ReplayEngine,
    SystemClock,
};
use lendlog_server::{AppState, LendlogServer, ServerConfig};
use lendlog_store::{AccountStore, CatalogSource, CollateralVault, CsvCatalog};
use lendlog_types::LoanKind;
use serde::Serialize;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = ServerConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    dispatch(cli.command, config, cli.format)
}

pub fn dispatch(command: Command, config: ServerConfig, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        Command::Serve(args) => cmd_serve(args, config),
        Command::Catalog(args) => cmd_catalog(args, &config, format),
        Command::Borrowers => cmd_borrowers(&config, format),
        Command::Overdue(args) => cmd_overdue(args, &config, format),
        Command::History(args) => cmd_history(args, &config, format),
        Command::Record(args) => cmd_record(args, &config),
        Command::Audit => cmd_audit(&config, format),
        Command::Register(args) => cmd_register(args, &config),
        Command::HashPassword(args) => {
            println!("{}", lendlog_crypto::hash_password(&args.password)?);
            Ok(())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_ledger(config: &ServerConfig) -> anyhow::Result<CsvLedger> {
    CsvLedger::open(&config.ledger_path)
        .with_context(|| format!("opening ledger {}", config.ledger_path.display()))
}

fn cmd_serve(args: ServeArgs, mut config: ServerConfig) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if args.static_dir.is_some() {
        config.static_dir = args.static_dir;
    }
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(LendlogServer::new(config).serve())?;
    Ok(())
}

fn cmd_catalog(args: CatalogArgs, config: &ServerConfig, format: OutputFormat) -> anyhow::Result<()> {
    let catalog = CsvCatalog::new(&config.catalog_path).load()?;
    let events = open_ledger(config)?.read_all()?;
    let view: Vec<_> = ProjectionBuilder::compute_catalog_view(&catalog, &events)
        .into_iter()
        .filter(|entry| !args.available || entry.available > 0)
        .collect();

    if format == OutputFormat::Json {
        return print_json(&view);
    }
    if view.is_empty() {
        println!("No books.");
        return Ok(());
    }
    for entry in &view {
        let stock = format!("{}/{}", entry.available, entry.total);
        let stock = if entry.available == 0 { stock.red() } else { stock.green() };
        println!(
            "{:>6}  {}  {}  {}",
            entry.id.dimmed(),
            stock,
            entry.name.bold(),
            format!("[{} · shelf {}]", entry.category, entry.shelf).dimmed()
        );
    }
    Ok(())
}

fn cmd_borrowers(config: &ServerConfig, format: OutputFormat) -> anyhow::Result<()> {
    let events = open_ledger(config)?.read_all()?;
    let borrowers = ProjectionBuilder::compute_active_borrowers(&events);

    if format == OutputFormat::Json {
        return print_json(&borrowers);
    }
    if borrowers.is_empty() {
        println!("Nobody is holding a book.");
    }
    for b in &borrowers {
        println!("{}", b.borrower.bold());
        for book in &b.books {
            println!("  {} {}", "•".cyan(), book);
        }
    }
    Ok(())
}

fn cmd_overdue(args: OverdueArgs, config: &ServerConfig, format: OutputFormat) -> anyhow::Result<()> {
    let events = open_ledger(config)?.read_all()?;
    let collateral = CollateralVault::open(&config.collateral_path, None)?.index()?;
    let loans: Vec<_> = ProjectionBuilder::admin_active_loans(
        &ReplayEngine::replay(&events),
        &collateral,
        &config.policy(),
        SystemClock.now(),
    )
    .into_iter()
    .filter(|loan| args.all || loan.is_overdue)
    .collect();

    if format == OutputFormat::Json {
        return print_json(&loans);
    }
    if loans.is_empty() {
        println!("{} No overdue loans.", "✓".green().bold());
        return Ok(());
    }
    for loan in &loans {
        let status = if loan.is_overdue {
            format!("{} days overdue", -loan.days_left).red().bold()
        } else {
            format!("{} days left", loan.days_left).green()
        };
        let who = match &loan.email {
            Some(email) => format!("{} <{}>", loan.borrower, email),
            None => loan.borrower.clone(),
        };
        let deposit = if loan.has_collateral { " [collateral]".yellow() } else { "".normal() };
        println!(
            "{}  {}  held {}d since {}  {}{}",
            who.bold(),
            loan.book,
            loan.days_held,
            loan.borrowed_at,
            status,
            deposit
        );
    }
    Ok(())
}

fn cmd_history(args: HistoryArgs, config: &ServerConfig, format: OutputFormat) -> anyhow::Result<()> {
    let events = open_ledger(config)?.read_all()?;
    let (mut history, active) = match &args.email {
        Some(email) => {
            let account = AccountStore::open(&config.users_path)?.get(email)?;
            let matcher = AccountMatcher::new(email, account.as_ref().map(|a| a.name.as_str()));
            let h = ProjectionBuilder::compute_borrower_history(&events, &matcher);
            (h.history, Some(h.active))
        }
        None => (ProjectionBuilder::full_history(&events), None),
    };
    if let Some(limit) = args.limit {
        history.truncate(limit);
    }

    if format == OutputFormat::Json {
        return match active {
            Some(active) => print_json(&serde_json::json!({ "history": history, "active": active })),
            None => print_json(&history),
        };
    }
    for event in &history {
        let kind = match event.kind {
            LoanKind::Borrow => event.kind.as_str().yellow(),
            LoanKind::Return => event.kind.as_str().green(),
        };
        println!("{}  {:<6}  {}  {}", event.timestamp.as_str().dimmed(), kind, event.borrower.bold(), event.book);
    }
    if let Some(active) = active {
        let held: Vec<_> = active.into_iter().collect();
        println!("Still holding: {}", if held.is_empty() { "nothing".to_string() } else { held.join(", ") });
    }
    Ok(())
}

fn cmd_record(args: RecordArgs, config: &ServerConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(config)?;
    let kind = LoanKind::from(args.action);
    let notice = state.record(&args.student, &args.book, kind.as_str())?;
    println!(
        "{} {} {} by {} (due {})",
        "✓".green().bold(),
        notice.action,
        notice.book_title.bold(),
        notice.student_name,
        notice.due_date
    );

    let runtime = tokio::runtime::Runtime::new()?;
    if let Err(e) = runtime.block_on(state.hook.on_recorded(&notice)) {
        tracing::warn!(error = %e, "transaction hook failed");
    }
    Ok(())
}

fn cmd_audit(config: &ServerConfig, format: OutputFormat) -> anyhow::Result<()> {
    let catalog = CsvCatalog::new(&config.catalog_path).load()?;
    let scan = open_ledger(config)?.scan()?;
    let report = LedgerAuditor::audit(&scan, &catalog);

    if format == OutputFormat::Json {
        return print_json(&report);
    }
    if report.is_clean() {
        println!("{} {} events, no findings.", "✓".green().bold(), report.event_count);
        return Ok(());
    }
    println!(
        "{} {} events, {} findings, {} unreadable rows",
        "!".yellow().bold(),
        report.event_count,
        report.findings.len(),
        report.skipped_rows
    );
    for finding in &report.findings {
        let at = if finding.position == 0 { "-".to_string() } else { format!("#{}", finding.position) };
        println!("  {:>5}  {}  {}", at.dimmed(), finding.kind.to_string().yellow(), finding.description);
    }
    Ok(())
}

fn cmd_register(args: RegisterArgs, config: &ServerConfig) -> anyhow::Result<()> {
    AccountStore::open(&config.users_path)?.register(
        &args.email,
        &args.password,
        &args.name,
        args.student_id.as_deref(),
    )?;
    println!("{} Registered {}", "✓".green().bold(), args.email.bold());
    Ok(())
}
