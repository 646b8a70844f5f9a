//! Administrative console over the homestead ledger core.
//!
//! # Responsibility
//! - Parse admin commands and dispatch them to the core services.
//! - Print results as pretty JSON on stdout and errors on stderr.
//!
//! Exit code is non-zero whenever the core rejects a command.

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use homestead_core::{
    init_from_settings, open_db, BillingPeriod, BillingService, CoreConfig, HouseholdService,
    NewBill, NewTransaction, PaymentService, ProfileUpdate, RevenueService, SqliteBillRepository,
    SqliteHouseholdRepository, SqliteTransactionRepository, SqliteUserRepository, UserProfile,
    UserService,
};
use log::info;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "homestead", version, about = "Household membership and billing ledger")]
struct Cli {
    /// TOML configuration file; `HOMESTEAD__*` variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file, overriding `database.path`.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Identity records.
    #[command(subcommand)]
    User(UserCommand),
    /// Household registry and roster.
    #[command(subcommand)]
    Household(HouseholdCommand),
    /// Bills and item status.
    #[command(subcommand)]
    Bill(BillCommand),
    /// Settle one bill item.
    Pay(PayArgs),
    /// Payment history of the household headed by `head`.
    Transactions {
        head: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Revenue and arrears rollups.
    #[command(subcommand)]
    Report(ReportCommand),
}

#[derive(Subcommand)]
enum UserCommand {
    Register {
        national_id: String,
        #[arg(long)]
        name: String,
        /// Pre-computed credential hash.
        #[arg(long)]
        credential_hash: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        date_of_birth: Option<NaiveDate>,
    },
    Show {
        national_id: String,
    },
    Update {
        national_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        date_of_birth: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
enum HouseholdCommand {
    Create {
        #[arg(long)]
        head: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        address: String,
    },
    Delete {
        household_id: Uuid,
    },
    Show {
        household_id: Uuid,
    },
    ByHead {
        head: String,
    },
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    Count,
    AddMember {
        household_id: Uuid,
        national_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        relationship: String,
    },
    /// Remove a non-head member; with `--household`, the head is handled too.
    RemoveMember {
        national_id: String,
        #[arg(long)]
        household: Option<Uuid>,
    },
    RemoveHead {
        household_id: Uuid,
    },
}

#[derive(Subcommand)]
enum BillCommand {
    Create {
        #[arg(long)]
        head: String,
        #[arg(long = "type")]
        bill_type: String,
        #[arg(long)]
        due: NaiveDate,
        #[arg(long)]
        old_index: Option<i64>,
        #[arg(long)]
        new_index: Option<i64>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Set one item paid (`true`) or unpaid (`false`).
    Status {
        bill_id: Uuid,
        item_id: Uuid,
        paid: String,
    },
    Show {
        bill_id: Uuid,
    },
    List(BillListArgs),
}

#[derive(Args)]
#[group(multiple = false)]
struct BillListArgs {
    #[arg(long)]
    household: Option<Uuid>,
    #[arg(long)]
    head: Option<String>,
    #[arg(long)]
    user: Option<String>,
}

#[derive(Args)]
struct PayArgs {
    bill_id: Uuid,
    #[arg(long)]
    household: Uuid,
    #[arg(long, default_value_t = 0)]
    index: i64,
    #[arg(long)]
    amount: i64,
    #[arg(long, default_value = "cash")]
    method: String,
}

#[derive(Args)]
struct MonthArgs {
    #[arg(long)]
    year: i32,
    #[arg(long)]
    month: u32,
}

#[derive(Args)]
struct OptionalMonthArgs {
    #[arg(long, requires = "month")]
    year: Option<i32>,
    #[arg(long, requires = "year")]
    month: Option<u32>,
}

impl OptionalMonthArgs {
    fn period(&self) -> anyhow::Result<Option<BillingPeriod>> {
        match (self.year, self.month) {
            (Some(year), Some(month)) => Ok(Some(BillingPeriod::new(year, month)?)),
            _ => Ok(None),
        }
    }
}

#[derive(Subcommand)]
enum ReportCommand {
    Revenue(MonthArgs),
    Unpaid(OptionalMonthArgs),
    Overdue {
        #[arg(long)]
        as_of: NaiveDate,
        #[command(flatten)]
        period: OptionalMonthArgs,
    },
    Dashboard(MonthArgs),
    /// Ledger totals over every recorded payment.
    Ledger,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = CoreConfig::load(cli.config.as_deref()).context("loading configuration")?;
    init_from_settings(&config.logging).context("starting logging")?;

    let db_path = cli.db.unwrap_or_else(|| config.database.path.clone());
    let conn = open_db(&db_path)
        .with_context(|| format!("opening database `{}`", db_path.display()))?;
    info!(
        "event=cli_command module=cli status=start db={}",
        db_path.display()
    );

    match cli.command {
        Command::User(command) => run_user(&conn, command),
        Command::Household(command) => run_household(&conn, command),
        Command::Bill(command) => run_bill(&conn, &config, command),
        Command::Pay(args) => {
            let payments = payment_service(&conn)?;
            print(&payments.create_transaction(NewTransaction {
                bill_id: args.bill_id,
                household_id: args.household,
                bill_item_index: args.index,
                amount_paid: args.amount,
                method: args.method,
            })?)
        }
        Command::Transactions { head, page } => {
            print(&payment_service(&conn)?.list_by_household(&head, page)?)
        }
        Command::Report(command) => run_report(&conn, &config, command),
    }
}

fn run_user(conn: &Connection, command: UserCommand) -> anyhow::Result<()> {
    let users = UserService::new(SqliteUserRepository::try_new(conn)?);
    match command {
        UserCommand::Register {
            national_id,
            name,
            credential_hash,
            phone,
            address,
            date_of_birth,
        } => print(&users.register_user(
            &national_id,
            &name,
            &credential_hash,
            UserProfile {
                phone,
                address,
                date_of_birth,
            },
        )?),
        UserCommand::Show { national_id } => print(&users.get_user(&national_id)?),
        UserCommand::Update {
            national_id,
            name,
            phone,
            address,
            date_of_birth,
        } => print(&users.update_profile(
            &national_id,
            ProfileUpdate {
                name,
                phone,
                address,
                date_of_birth,
            },
        )?),
    }
}

fn run_household(conn: &Connection, command: HouseholdCommand) -> anyhow::Result<()> {
    let households = HouseholdService::new(SqliteHouseholdRepository::try_new(conn)?);
    match command {
        HouseholdCommand::Create {
            head,
            name,
            address,
        } => print(&households.create_household(&head, &name, &address)?),
        HouseholdCommand::Delete { household_id } => print(&json!({
            "household_id": household_id,
            "affected_users": households.delete_household(household_id)?,
        })),
        HouseholdCommand::Show { household_id } => print(&households.get(household_id)?),
        HouseholdCommand::ByHead { head } => print(&households.get_by_head(&head)?),
        HouseholdCommand::List { page } => print(&households.list_paginated(page)?),
        HouseholdCommand::Count => print(&json!({
            "total": households.count_households()?,
        })),
        HouseholdCommand::AddMember {
            household_id,
            national_id,
            name,
            relationship,
        } => print(&households.add_member(household_id, &national_id, &name, &relationship)?),
        HouseholdCommand::RemoveMember {
            national_id,
            household: Some(household_id),
        } => print(&households.remove_member_from(household_id, &national_id)?),
        HouseholdCommand::RemoveMember {
            national_id,
            household: None,
        } => print(&households.remove_member(&national_id)?),
        HouseholdCommand::RemoveHead { household_id } => {
            print(&households.transfer_head_on_removal(household_id)?)
        }
    }
}

fn run_bill(conn: &Connection, config: &CoreConfig, command: BillCommand) -> anyhow::Result<()> {
    let billing = billing_service(conn, config)?;
    match command {
        BillCommand::Create {
            head,
            bill_type,
            due,
            old_index,
            new_index,
            description,
        } => print(&billing.create_bill(NewBill {
            head_national_id: head,
            bill_type,
            due_date: due,
            old_index,
            new_index,
            description,
        })?),
        BillCommand::Status {
            bill_id,
            item_id,
            paid,
        } => {
            let paid = homestead_core::parse_paid_flag(&paid)?;
            print(&billing.set_item_status(bill_id, item_id, paid)?)
        }
        BillCommand::Show { bill_id } => print(&billing.get_bill(bill_id)?),
        BillCommand::List(args) => {
            let bills = if let Some(household_id) = args.household {
                billing.list_by_household(household_id)?
            } else if let Some(head) = args.head {
                billing.list_by_head(&head)?
            } else if let Some(user) = args.user {
                billing.list_for_user(&user)?
            } else {
                billing.list_all()?
            };
            print(&bills)
        }
    }
}

fn run_report(conn: &Connection, config: &CoreConfig, command: ReportCommand) -> anyhow::Result<()> {
    let billing = billing_service(conn, config)?;
    let payments = payment_service(conn)?;
    let households = HouseholdService::new(SqliteHouseholdRepository::try_new(conn)?);
    let revenue = RevenueService::new(&billing, &payments, &households);
    match command {
        ReportCommand::Revenue(month) => print(&revenue.revenue_for_month(month.year, month.month)?),
        ReportCommand::Unpaid(period) => {
            let period = period.period()?;
            print(&json!({
                "period": period,
                "households_with_unpaid_items": revenue.count_households_with_unpaid_items(period)?,
            }))
        }
        ReportCommand::Overdue { as_of, period } => {
            print(&revenue.overdue_report(as_of, period.period()?)?)
        }
        ReportCommand::Dashboard(month) => {
            print(&revenue.dashboard(BillingPeriod::new(month.year, month.month)?)?)
        }
        ReportCommand::Ledger => print(&json!({
            "total_revenue": revenue.total_revenue()?,
            "by_bill_type": revenue.revenue_by_bill_type()?,
        })),
    }
}

fn billing_service<'c>(
    conn: &'c Connection,
    config: &CoreConfig,
) -> anyhow::Result<BillingService<SqliteBillRepository<'c>, SqliteHouseholdRepository<'c>>> {
    Ok(BillingService::new(
        SqliteBillRepository::try_new(conn)?,
        SqliteHouseholdRepository::try_new(conn)?,
        config.pricing.clone(),
    )?)
}

fn payment_service(
    conn: &Connection,
) -> anyhow::Result<PaymentService<SqliteTransactionRepository<'_>, SqliteHouseholdRepository<'_>>>
{
    Ok(PaymentService::new(
        SqliteTransactionRepository::try_new(conn)?,
        SqliteHouseholdRepository::try_new(conn)?,
    ))
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
