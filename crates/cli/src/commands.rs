use chrono::NaiveDate;
use clap::{Args, Subcommand};
use store::{
    Money, Movement, MovementKind, MovementPatch, NewMovement, Statistics, Stores, Totals,
    filter_by_category,
};

use crate::{
    error::{AppError, Result},
    prompt,
};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in; the password is prompted (or read from DINERITO_PASSWORD).
    Login { email: String },
    /// Create an account and log in.
    Register { name: String, email: String },
    Logout,
    /// Show the logged-in user.
    Whoami,
    /// Change the display name of the logged-in user.
    RenameUser { name: String },
    Categories(Categories),
    Movements(Movements),
    /// Income, expense and balance of the cached movements.
    Totals,
    Stats(Stats),
}

#[derive(Debug, Args)]
pub struct Categories {
    #[command(subcommand)]
    command: CategoryCommand,
}

#[derive(Debug, Subcommand)]
enum CategoryCommand {
    List,
    Add { name: String },
    Rename { id: i64, name: String },
    Delete { id: i64 },
}

#[derive(Debug, Args)]
pub struct Movements {
    #[command(subcommand)]
    command: MovementCommand,
}

#[derive(Debug, Subcommand)]
enum MovementCommand {
    List {
        /// Only movements filed under this category id.
        #[arg(long)]
        category: Option<i64>,
    },
    Add {
        /// `income` or `expense`.
        kind: MovementKind,
        label: String,
        amount: Money,
        /// YYYY-MM-DD.
        date: NaiveDate,
        #[arg(long)]
        category: Option<i64>,
    },
    Update {
        id: i64,
        #[arg(long = "type")]
        kind: Option<MovementKind>,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        amount: Option<Money>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        category: Option<i64>,
    },
    Delete { id: i64 },
}

#[derive(Debug, Args)]
pub struct Stats {
    #[command(subcommand)]
    command: StatsCommand,
}

#[derive(Debug, Subcommand)]
enum StatsCommand {
    Daily {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Monthly {
        #[arg(long)]
        month: Option<u32>,
        #[arg(long)]
        year: Option<i32>,
    },
    Yearly {
        #[arg(long)]
        year: Option<i32>,
    },
}

/// Turns a store's `false` into an error carrying its message.
fn check(ok: bool, error: Option<String>) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(AppError::Action(
            error.unwrap_or_else(|| "action failed".to_string()),
        ))
    }
}

fn require_session(stores: &Stores) -> Result<()> {
    if stores.session.is_authenticated() {
        Ok(())
    } else {
        Err(AppError::Action(
            "not logged in, run `dinerito login <email>` first".to_string(),
        ))
    }
}

pub async fn run(stores: &Stores, command: Command) -> Result<()> {
    match command {
        Command::Login { email } => {
            let password = prompt::password("Password: ")?;
            let ok = stores.session.login(&email, &password).await;
            check(ok, stores.session.error())?;
            whoami(stores);
        }
        Command::Register { name, email } => {
            let password = prompt::new_password()?;
            let ok = stores.session.register(&name, &email, &password).await;
            check(ok, stores.session.error())?;
            whoami(stores);
        }
        Command::Logout => {
            stores.session.logout().await;
            println!("logged out");
        }
        Command::Whoami => whoami(stores),
        Command::RenameUser { name } => {
            let ok = stores.session.update_username(&name).await;
            check(ok, stores.session.error())?;
            whoami(stores);
        }
        Command::Categories(args) => {
            require_session(stores)?;
            categories(stores, args.command).await?;
        }
        Command::Movements(args) => {
            require_session(stores)?;
            movements(stores, args.command).await?;
        }
        Command::Totals => print_totals(&stores.movements.totals()),
        Command::Stats(args) => {
            require_session(stores)?;
            stats(stores, args.command).await?;
        }
    }
    Ok(())
}

fn whoami(stores: &Stores) {
    match stores.session.user() {
        Some(user) => println!("{} <{}> (id {})", user.name, user.email, user.id),
        None => println!("not logged in"),
    }
}

async fn categories(stores: &Stores, command: CategoryCommand) -> Result<()> {
    let store = &stores.categories;
    let ok = match command {
        CategoryCommand::List => store.fetch_all().await,
        CategoryCommand::Add { name } => store.add(&name).await,
        CategoryCommand::Rename { id, name } => {
            store.start_editing(id);
            store.rename(id, &name).await
        }
        CategoryCommand::Delete { id } => store.delete(id).await,
    };
    check(ok, store.error())?;

    for category in store.categories() {
        println!("{:>5}  {}", category.id, category.name);
    }
    Ok(())
}

async fn movements(stores: &Stores, command: MovementCommand) -> Result<()> {
    let store = &stores.movements;
    let mut filter = None;
    let ok = match command {
        MovementCommand::List { category } => {
            filter = category;
            // Names are resolved from categories, refresh them best-effort.
            stores.categories.fetch_all().await;
            store.fetch_all().await
        }
        MovementCommand::Add {
            kind,
            label,
            amount,
            date,
            category,
        } => {
            store
                .add(NewMovement {
                    kind,
                    label,
                    amount,
                    date,
                    category_id: category,
                })
                .await
        }
        MovementCommand::Update {
            id,
            kind,
            label,
            amount,
            date,
            category,
        } => {
            store
                .update(
                    id,
                    MovementPatch {
                        kind,
                        label,
                        amount,
                        date,
                        category_id: category,
                    },
                )
                .await
        }
        MovementCommand::Delete { id } => store.delete(id).await,
    };
    check(ok, store.error())?;

    let named = store.with_category_names(&stores.categories.categories());
    for movement in &listed(named, filter) {
        print_movement(movement);
    }
    print_totals(&store.totals());
    Ok(())
}

fn listed(movements: Vec<Movement>, category: Option<i64>) -> Vec<Movement> {
    match category {
        Some(category_id) => filter_by_category(&movements, category_id),
        None => movements,
    }
}

async fn stats(stores: &Stores, command: StatsCommand) -> Result<()> {
    let store = &stores.statistics;
    let (ok, result) = match command {
        StatsCommand::Daily { date } => (store.fetch_daily(date).await, store.daily()),
        StatsCommand::Monthly { month, year } => {
            (store.fetch_monthly(month, year).await, store.monthly())
        }
        StatsCommand::Yearly { year } => (store.fetch_yearly(year).await, store.yearly()),
    };
    check(ok, store.error())?;

    if let Some(Statistics { totals, movements }) = result {
        for movement in &movements {
            print_movement(movement);
        }
        print_totals(&totals);
    }
    Ok(())
}

fn print_movement(movement: &Movement) {
    let sign = match movement.kind {
        MovementKind::Income => '+',
        MovementKind::Expense => '-',
    };
    println!(
        "{:>5}  {}  {sign}{:>10}  {}{}",
        movement.id,
        movement.date,
        movement.amount.to_string(),
        movement.label,
        movement
            .category
            .as_deref()
            .map(|c| format!("  [{c}]"))
            .unwrap_or_default()
    );
}

fn print_totals(totals: &Totals) {
    println!(
        "income {}  expense {}  balance {}",
        totals.income, totals.expense, totals.balance
    );
}
