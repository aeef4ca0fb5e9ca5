use std::sync::Arc;

use api_types::{
    BranchId,
    branch::Branch,
    cash::CashMovement,
    party::{Client as Customer, Supplier},
    product::Product,
    purchase::Purchase,
    sale::Sale,
    stock::{StockAdjustment, StockByBranch},
    user::User,
};
use clap::{Parser, Subcommand, ValueEnum};
use client::{
    Cached, Client, ClientError, DashboardSummary, Esponja, FileSessionStorage, ListFilters,
    SearchCriteria, SearchKind, SessionStorage, StockKey,
};
use serde::Serialize;

use crate::{
    config::ConfigArgs,
    error::{AppError, Result},
};

mod config;
mod error;
mod prompt;

/// Runs `$call::<Entity>(args..)` for the entity picked on the command line.
macro_rules! with_entity {
    ($entity:expr, $call:ident($($arg:expr),*)) => {
        match $entity {
            Entity::Products => $call::<Product>($($arg),*).await,
            Entity::Clients => $call::<Customer>($($arg),*).await,
            Entity::Suppliers => $call::<Supplier>($($arg),*).await,
            Entity::Sales => $call::<Sale>($($arg),*).await,
            Entity::Purchases => $call::<Purchase>($($arg),*).await,
            Entity::Cash => $call::<CashMovement>($($arg),*).await,
            Entity::Stock => $call::<StockByBranch>($($arg),*).await,
            Entity::Branches => $call::<Branch>($($arg),*).await,
            Entity::Users => $call::<User>($($arg),*).await,
        }
    };
}

#[derive(Parser, Debug)]
#[command(name = "esponja")]
#[command(about = "La Esponja ERP client (branch-aware)")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in; the password is read from ESPONJA_PASSWORD or prompted.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "ESPONJA_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    Logout,
    /// Re-validate the stored session and show who is signed in.
    Whoami,
    Branch {
        #[command(subcommand)]
        command: BranchCommand,
    },
    /// List records, optionally filtered with `--filter key=value`.
    List {
        entity: Entity,
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },
    Search {
        entity: Entity,
        #[arg(long, value_enum, default_value_t = By::Name)]
        by: By,
        term: String,
    },
    Lookup {
        #[command(subcommand)]
        command: LookupCommand,
    },
    /// Stock records of one branch (default: the effective branch).
    Stock {
        #[arg(long)]
        branch: Option<i64>,
    },
    AdjustStock {
        #[arg(long)]
        product: i64,
        #[arg(long)]
        branch: i64,
        #[arg(long, allow_hyphen_values = true)]
        delta: i64,
        #[arg(long)]
        reason: Option<String>,
    },
    CancelSale {
        id: i64,
    },
    Dashboard {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum BranchCommand {
    List,
    /// Scope the next requests to another branch (privileged users only).
    Use { id: i64 },
    /// Go back to the user's own branch.
    Clear,
}

#[derive(Subcommand, Debug)]
enum LookupCommand {
    Product { code: String },
    Client { document: String },
    Supplier { document: String },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Entity {
    Products,
    Clients,
    Suppliers,
    Sales,
    Purchases,
    Cash,
    Stock,
    Branches,
    Users,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum By {
    Code,
    Name,
    Document,
    Category,
}

impl From<By> for SearchKind {
    fn from(by: By) -> Self {
        match by {
            By::Code => SearchKind::Code,
            By::Name => SearchKind::Name,
            By::Document => SearchKind::Document,
            By::Category => SearchKind::Category,
        }
    }
}

fn parse_filter(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected key=value, got `{raw}`")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = config::load(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "esponja={level},client={level}",
            level = settings.level
        ))
        .with_writer(std::io::stderr)
        .init();

    let client_config = settings.client();
    tracing::debug!("using API at {}", client_config.base_url);
    let storage: Arc<dyn SessionStorage> =
        Arc::new(FileSessionStorage::new(&client_config.session_path));
    let client = Client::new(&client_config, storage)?;
    let esponja = Esponja::new(client);

    run(&esponja, cli.command).await
}

async fn run(esponja: &Esponja, command: Command) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            let password = match password {
                Some(password) => password,
                None => prompt::password("password: ")?,
            };
            let user = esponja.login(&email, &password).await?;
            println!("signed in as {} ({})", user.name, user.role);
            return Ok(());
        }
        Command::Logout => {
            esponja.logout().await;
            println!("signed out");
            return Ok(());
        }
        _ => {}
    }

    let Some(user) = esponja.restore_session().await? else {
        return Err(ClientError::NotSignedIn.into());
    };

    match command {
        Command::Login { .. } | Command::Logout => Ok(()),
        Command::Whoami => {
            let branch = esponja.effective_branch().await;
            println!(
                "{} ({}), branch {}{}",
                user.name,
                user.role,
                branch.map_or_else(|| "-".to_string(), |b| b.to_string()),
                if user.can_override_branch {
                    ", may switch branch"
                } else {
                    ""
                }
            );
            Ok(())
        }
        Command::Branch { command } => branch(esponja, command).await,
        Command::List { entity, filters } => {
            let filters = filters
                .into_iter()
                .fold(ListFilters::new(), |filters, (key, value)| {
                    filters.with(key, value)
                });
            with_entity!(entity, list(esponja, filters))
        }
        Command::Search { entity, by, term } => {
            let criteria = SearchCriteria::new(by.into(), term);
            with_entity!(entity, search(esponja, criteria))
        }
        Command::Lookup { command } => lookup(esponja, command).await,
        Command::Stock { branch } => {
            let branch = match branch.map(BranchId) {
                Some(branch) => branch,
                None => esponja
                    .effective_branch()
                    .await
                    .ok_or_else(|| AppError::Input("no branch selected".to_string()))?,
            };
            esponja.fetch_stock_for_branch(branch).await?;
            print_json(esponja.snapshot::<StockByBranch>().await.items())
        }
        Command::AdjustStock {
            product,
            branch,
            delta,
            reason,
        } => {
            let key = StockKey {
                product_id: product,
                branch_id: BranchId(branch),
            };
            let row = esponja
                .adjust_stock(key, StockAdjustment { delta, reason })
                .await?;
            print_json(&row)
        }
        Command::CancelSale { id } => {
            let sale = esponja.cancel_sale(id).await?;
            print_json(&sale)
        }
        Command::Dashboard { from, to } => {
            let mut filters = ListFilters::new();
            if let Some(from) = from {
                filters = filters.with("desde", from);
            }
            if let Some(to) = to {
                filters = filters.with("hasta", to);
            }
            let today = chrono::Local::now().date_naive();
            let summary = esponja.load_dashboard(filters, today).await;
            print_dashboard(&summary);
            Ok(())
        }
    }
}

async fn branch(esponja: &Esponja, command: BranchCommand) -> Result<()> {
    match command {
        BranchCommand::List => {
            esponja.load_branches().await?;
            let current = esponja.effective_branch().await;
            let store = esponja.store().await;
            for branch in store.branch.available_branches() {
                let marker = if Some(branch.id) == current { "*" } else { " " };
                let inactive = if branch.active { "" } else { " (inactive)" };
                println!("{marker} {}  {}{inactive}", branch.id, branch.name);
            }
        }
        BranchCommand::Use { id } => {
            let change = esponja.select_branch(Some(BranchId(id))).await?;
            if change.changed() {
                println!("now working on branch {id}");
            }
        }
        BranchCommand::Clear => {
            esponja.select_branch(None).await?;
            let own = esponja.effective_branch().await;
            println!(
                "back to own branch {}",
                own.map_or_else(|| "-".to_string(), |b| b.to_string())
            );
        }
    }
    Ok(())
}

async fn lookup(esponja: &Esponja, command: LookupCommand) -> Result<()> {
    let found = match command {
        LookupCommand::Product { code } => print_found(esponja.product_by_code(&code).await?)?,
        LookupCommand::Client { document } => {
            print_found(esponja.client_by_document(&document).await?)?
        }
        LookupCommand::Supplier { document } => {
            print_found(esponja.supplier_by_document(&document).await?)?
        }
    };
    if !found {
        println!("no match");
    }
    Ok(())
}

fn print_found<T: Serialize>(record: Option<T>) -> Result<bool> {
    match record {
        Some(record) => print_json(&record).map(|()| true),
        None => Ok(false),
    }
}

async fn list<T: Cached + Serialize>(esponja: &Esponja, filters: ListFilters) -> Result<()> {
    esponja.fetch_list::<T>(filters).await?;
    print_json(esponja.snapshot::<T>().await.items())
}

async fn search<T: Cached + Serialize>(esponja: &Esponja, criteria: SearchCriteria) -> Result<()> {
    esponja.search::<T>(criteria).await?;
    print_json(esponja.snapshot::<T>().await.search_results())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_dashboard(summary: &DashboardSummary) {
    println!("sales:      {} for {}", summary.sales_count, summary.sales_total);
    println!("today:      {}", summary.sales_today);
    println!("purchases:  {}", summary.purchases_total);
    println!(
        "cash:       +{} / -{} = {}",
        summary.cash_income, summary.cash_expense, summary.cash_balance
    );
    for (branch, balance) in &summary.cash_by_branch {
        println!("  branch {branch}: {balance}");
    }
    println!("low stock:  {}", summary.low_stock);
    for missing in &summary.unavailable {
        println!("unavailable {}: {}", missing.source, missing.error);
    }
}
