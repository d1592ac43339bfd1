use std::time::Duration;

use chrono::NaiveDate;
use clap::{Args, Subcommand};
use engine::{
    Amount, Expense, ExpenseChanges, ExpenseSpec, KeyValueStore, MirrorTable, Periodicity, Store,
    SyncOutcome, SyncRemote, categories, dates, expenses, stats,
};

use crate::{
    config::AppConfig,
    error::{AppError, Result},
};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List expenses, newest first, recurring mirrors included.
    List(ListArgs),
    /// Record a new expense (negative amount) or income (positive amount).
    Add(AddArgs),
    Edit(EditArgs),
    /// Copy an expense under a new id.
    Duplicate(DuplicateArgs),
    /// Flag an expense as deleted.
    Delete { id: String },
    /// Toggle the checked mark of an expense.
    Check { id: String },
    /// Push local changes and merge the remote ones.
    Sync,
    Stats(StatsArgs),
    /// Show the category catalog.
    Categories,
    /// Months holding at least one expense.
    Months,
    /// Labels already used in a category, most used last.
    Labels { category: String },
    /// Stay up, syncing periodically and logging every change.
    Watch,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Only this month (YYYY-MM).
    #[arg(long, value_parser = parse_month)]
    month: Option<NaiveDate>,
    /// Include deleted expenses, without mirrors.
    #[arg(long)]
    deleted: bool,
    /// Print records as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    #[arg(long, allow_hyphen_values = true)]
    amount: Amount,
    #[arg(long)]
    category: String,
    #[arg(long)]
    label: Option<String>,
    /// Defaults to today (YYYY-MM-DD).
    #[arg(long, value_parser = parse_day)]
    date: Option<NaiveDate>,
    /// Repeats every month.
    #[arg(long)]
    monthly: bool,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    id: String,
    #[arg(long, allow_hyphen_values = true)]
    amount: Option<Amount>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    label: Option<String>,
    #[arg(long, value_parser = parse_day)]
    date: Option<NaiveDate>,
    /// one-time | monthly
    #[arg(long, value_parser = parse_periodicity)]
    periodicity: Option<Periodicity>,
}

#[derive(Debug, Args)]
pub struct DuplicateArgs {
    id: String,
    #[arg(long, value_parser = parse_day)]
    date: Option<NaiveDate>,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Month to report (YYYY-MM), the current one by default.
    #[arg(long, value_parser = parse_month)]
    month: Option<NaiveDate>,
    /// Number of past months in the trend.
    #[arg(long, default_value_t = 6)]
    months: u32,
    /// Categories listed before grouping the rest.
    #[arg(long, default_value_t = 5)]
    top: usize,
    /// Leave exceptional categories out.
    #[arg(long)]
    budget: bool,
}

fn parse_day(raw: &str) -> std::result::Result<NaiveDate, String> {
    dates::require_day(raw).map_err(|err| err.to_string())
}

fn parse_month(raw: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d")
        .map_err(|_| format!("invalid month: {raw}"))
}

fn parse_periodicity(raw: &str) -> std::result::Result<Periodicity, String> {
    Periodicity::parse(raw).ok_or_else(|| format!("unknown periodicity: {raw}"))
}

pub async fn run<S: KeyValueStore, R: SyncRemote>(
    store: &Store<S, R>,
    settings: &AppConfig,
    command: Command,
    online: bool,
) -> Result<()> {
    match command {
        Command::List(args) => {
            open(store, online).await;
            list(store, &args).await?;
        }
        Command::Add(args) => {
            store.load().await;
            let expense = store
                .add_expense(ExpenseSpec {
                    date: args.date,
                    amount: Some(args.amount),
                    category: Some(args.category),
                    label: args.label,
                    periodicity: args.monthly.then_some(Periodicity::Monthly),
                    ..Default::default()
                })
                .await;
            persist(store, online).await?;
            print_expense(&expense, &MirrorTable::default());
        }
        Command::Edit(args) => {
            let changes = ExpenseChanges {
                date: args.date,
                amount: args.amount,
                category: args.category,
                label: args.label,
                periodicity: args.periodicity,
                ..Default::default()
            };
            if changes.is_empty() {
                return Err(AppError::Usage("nothing to change".to_string()));
            }
            store.load().await;
            let expense = store.edit_expense(&args.id, changes).await?;
            persist(store, online).await?;
            print_expense(&expense, &MirrorTable::default());
        }
        Command::Duplicate(args) => {
            store.load().await;
            let copy = store
                .duplicate_expense(
                    &args.id,
                    ExpenseChanges {
                        date: args.date,
                        ..Default::default()
                    },
                )
                .await?;
            persist(store, online).await?;
            print_expense(&copy, &MirrorTable::default());
        }
        Command::Delete { id } => {
            store.load().await;
            store.delete_expense(&id).await?;
            persist(store, online).await?;
        }
        Command::Check { id } => {
            store.load().await;
            let expense = store.toggle_checked(&id).await?;
            persist(store, online).await?;
            print_expense(&expense, &MirrorTable::default());
        }
        Command::Sync => {
            store.load().await;
            if !online {
                return Err(AppError::Usage("cannot sync while offline".to_string()));
            }
            let outcome = store.sync().await;
            report(outcome);
            if outcome == SyncOutcome::Failed {
                return Err(AppError::Usage("sync failed, see the log".to_string()));
            }
        }
        Command::Stats(args) => {
            open(store, online).await;
            print_stats(&store.expenses().await, &args);
        }
        Command::Categories => {
            for def in categories::category_defs() {
                let mut flags = Vec::new();
                if def.infrequent {
                    flags.push("infrequent");
                }
                if def.exceptional {
                    flags.push("exceptional");
                }
                println!("{:<14} {:<24} {}", def.name, def.icon, flags.join(","));
            }
        }
        Command::Months => {
            open(store, online).await;
            for month in expenses::extract_months(&store.expenses().await) {
                println!("{month}");
            }
        }
        Command::Labels { category } => {
            open(store, online).await;
            for label in expenses::extract_labels(&store.expenses().await, &category) {
                println!("{label}");
            }
        }
        Command::Watch => {
            store.load().await;
            watch(store, settings).await;
        }
    }

    Ok(())
}

async fn open<S: KeyValueStore, R: SyncRemote>(store: &Store<S, R>, online: bool) {
    if online {
        report(store.load_and_sync().await);
    } else {
        store.load().await;
    }
}

async fn persist<S: KeyValueStore, R: SyncRemote>(store: &Store<S, R>, online: bool) -> Result<()> {
    if online {
        report(store.save_and_sync().await);
    } else {
        store.save().await?;
    }
    Ok(())
}

fn report(outcome: SyncOutcome) {
    match outcome {
        SyncOutcome::Merged(count) => tracing::info!("{count} expenses updated from remote"),
        SyncOutcome::UpToDate => tracing::info!("Already up to date"),
        SyncOutcome::Failed => tracing::warn!("Sync failed, local changes are kept"),
        SyncOutcome::AlreadyRunning => tracing::debug!("Sync already running"),
    }
}

fn print_expense(expense: &Expense, mirrors: &MirrorTable) {
    let kind = if expense.deleted() {
        'D'
    } else if mirrors.is_mirror_ghost(expense) {
        '~'
    } else if expense.is_recurring() {
        'R'
    } else {
        ' '
    };
    let checked = if expense.checked() { 'x' } else { ' ' };
    println!(
        "{} {} [{checked}]{kind} {:>10} {:<14} {}",
        dates::format_day(expense.date()),
        expense.id(),
        expense.amount().to_string(),
        expense.category(),
        expense.label()
    );
}

async fn list<S: KeyValueStore, R: SyncRemote>(store: &Store<S, R>, args: &ListArgs) -> Result<()> {
    let (all, mirrors) = if args.deleted {
        (store.all_expenses().await, MirrorTable::default())
    } else {
        let view = store.view().await;
        (view.expenses, view.mirrors)
    };
    let shown: Vec<&Expense> = match args.month {
        Some(month) => all
            .iter()
            .filter(|expense| dates::start_of_month(expense.date()) == month)
            .collect(),
        None => all.iter().collect(),
    };

    if args.json {
        let records: Vec<_> = shown.iter().map(|expense| expense.to_record()).collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    for expense in shown {
        print_expense(expense, &mirrors);
    }
    Ok(())
}

fn print_amounts(rows: &[(String, Amount)]) {
    for (key, amount) in rows {
        println!("  {key:<14} {:>10}", amount.to_string());
    }
}

fn print_stats(all: &[Expense], args: &StatsArgs) {
    let today = dates::today();
    let month = args.month.unwrap_or(today);
    let scoped: Vec<&Expense> = if args.budget {
        stats::budget_expenses(all)
    } else {
        all.iter().collect()
    };
    let of_month = stats::filter_of_month(scoped.iter().copied(), month);

    println!("{}", dates::format_month(month));
    println!("  balance        {:>10}", stats::balance(of_month.iter().copied()).to_string());
    println!(
        "  debits         {:>10}",
        stats::balance_of_debits(of_month.iter().copied()).to_string()
    );
    println!(
        "    one-time     {:>10}",
        stats::balance_of_one_time_debits(of_month.iter().copied()).to_string()
    );
    println!(
        "    recurring    {:>10}",
        stats::balance_of_recurring_debits(of_month.iter().copied()).to_string()
    );

    println!("By category");
    print_amounts(&stats::sum_by_category(of_month.iter().copied(), args.top));

    let recent = stats::filter_of_last_months(scoped.iter().copied(), args.months, today);
    println!("Last {} months", args.months);
    print_amounts(&stats::balance_by_month(recent.iter().copied()));
    println!("Running balance");
    print_amounts(&stats::aggregated_balance_by_month(scoped.iter().copied()));

    let upcoming = stats::filter_future(scoped.iter().copied(), today);
    if !upcoming.is_empty() {
        println!(
            "Upcoming: {} entries, {}",
            upcoming.len(),
            stats::sum(upcoming.iter().copied())
        );
    }
}

async fn watch<S: KeyValueStore, R: SyncRemote>(store: &Store<S, R>, settings: &AppConfig) {
    let interval = Duration::from_secs(settings.resync_interval_secs);
    let mut status = store.subscribe();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    tracing::info!("Watching, resync every {}s", interval.as_secs());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(outcome) = store.sync_if_stale(interval).await {
                    report(outcome);
                }
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                if !current.loading {
                    tracing::info!(
                        "revision {}: {} expenses",
                        current.revision,
                        store.expenses().await.len()
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
}
