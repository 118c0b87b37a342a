use std::path::PathBuf;

use chrono::{Datelike, NaiveDate};
use estate_core::{
    AgingReport, OccupancyRow, PayrollSummary, RentRollRow, ReportService, TrialBalance,
};
use estate_domain::Permission;

use super::{split_subcommand, CommandDefinition};
use crate::cli::args::Args;
use crate::cli::context::{CommandError, CommandResult, ShellContext};
use crate::cli::output;
use crate::cli::table::{Table, TableColumn};
use crate::export::export_to_path;

const REPORTS: &str = "occupancy|rent-roll|aging|trial-balance|payroll";

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new(
            "report",
            "Print operational and financial reports",
            "report occupancy
report rent-roll
report aging [--as-of <date>]
report trial-balance
report payroll [--from <date>] [--to <date>]",
            cmd_report,
        ),
        CommandDefinition::new(
            "export",
            "Write a report to a CSV or JSON file",
            "export <occupancy|rent-roll|aging|trial-balance|payroll> <path> [--as-of <date>] [--from <date>] [--to <date>]",
            cmd_export,
        ),
    ]
}

enum Report {
    Occupancy(Vec<OccupancyRow>),
    RentRoll(Vec<RentRollRow>),
    Aging(AgingReport),
    TrialBalance(TrialBalance),
    Payroll(PayrollSummary),
}

/// Builds the named report; payroll defaults to the current calendar month.
fn build(context: &ShellContext, name: &str, args: &Args) -> Result<Report, CommandError> {
    let today = context.clock.today();
    match name {
        "occupancy" => context.read(Permission::ViewReports, |ws, _| {
            Ok(Report::Occupancy(ReportService::occupancy(ws)))
        }),
        "rent-roll" | "rentroll" => context.read(Permission::ViewReports, |ws, _| {
            Ok(Report::RentRoll(ReportService::rent_roll(ws)))
        }),
        "aging" => {
            let as_of = args.flag_date("as-of")?.unwrap_or(today);
            context.read(Permission::ViewReports, |ws, _| {
                Ok(Report::Aging(ReportService::aging(ws, as_of)))
            })
        }
        "trial-balance" | "trial" => context.read(Permission::ViewReports, |ws, _| {
            Ok(Report::TrialBalance(ReportService::trial_balance(ws)))
        }),
        "payroll" => {
            let from = args.flag_date("from")?.unwrap_or_else(|| month_start(today));
            let to = args.flag_date("to")?.unwrap_or(today);
            context.read(Permission::ViewReports, |ws, _| {
                Ok(Report::Payroll(ReportService::payroll_summary(ws, from, to)?))
            })
        }
        other => Err(CommandError::usage(format!(
            "unknown report `{}`; choose one of {}",
            other, REPORTS
        ))),
    }
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn cmd_report(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let name = sub.ok_or_else(|| CommandError::usage(format!("usage: report <{}>", REPORTS)))?;
    let args = Args::parse(rest)?;
    let report = build(context, &name, &args)?;
    render(&report, &context.currency());
    Ok(())
}

fn cmd_export(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let name = sub.ok_or_else(|| CommandError::usage(format!("usage: export <{}> <path>", REPORTS)))?;
    let args = Args::parse(rest)?;
    let path = PathBuf::from(args.required(0, "path")?);
    let report = build(context, &name, &args)?;
    let rows = match &report {
        Report::Occupancy(rows) => export_to_path(rows, &path)?,
        Report::RentRoll(rows) => export_to_path(rows, &path)?,
        Report::Aging(report) => export_to_path(&report.rows, &path)?,
        Report::TrialBalance(balance) => export_to_path(&balance.rows, &path)?,
        Report::Payroll(summary) => export_to_path(&summary.rows, &path)?,
    };
    output::success(format!("{} row(s) written to {}.", rows, path.display()));
    Ok(())
}

fn render(report: &Report, currency: &str) {
    match report {
        Report::Occupancy(rows) => {
            output::section("Occupancy");
            let mut table = Table::new(vec![
                TableColumn::left("Property"),
                TableColumn::left("Name"),
                TableColumn::right("Units"),
                TableColumn::right("Available"),
                TableColumn::right("Reserved"),
                TableColumn::right("Occupied"),
                TableColumn::right("Sold"),
                TableColumn::right("Maintenance"),
                TableColumn::right("Rate"),
            ]);
            for row in rows {
                table.push(vec![
                    row.property.clone(),
                    row.name.clone(),
                    row.total_units.to_string(),
                    row.available.to_string(),
                    row.reserved.to_string(),
                    row.occupied.to_string(),
                    row.sold.to_string(),
                    row.maintenance.to_string(),
                    format!("{:.1}%", row.occupancy_rate * 100.0),
                ]);
            }
            table.print_or("No properties.");
        }
        Report::RentRoll(rows) => {
            output::section("Rent roll");
            let mut table = Table::new(vec![
                TableColumn::left("Unit"),
                TableColumn::left("Tenant"),
                TableColumn::left("Start"),
                TableColumn::left("End"),
                TableColumn::left("Billing"),
                TableColumn::right("Rent"),
                TableColumn::right("Outstanding"),
            ]);
            for row in rows {
                table.push(vec![
                    format!("{}/{}", row.property, row.unit),
                    row.tenant_name.clone(),
                    row.start_date.to_string(),
                    row.end_date.to_string(),
                    row.billing.clone(),
                    output::money(row.rent, currency),
                    output::money(row.outstanding, currency),
                ]);
            }
            table.print_or("No active leases.");
            let total: f64 = rows.iter().map(|row| row.rent).sum();
            output::info(format!("  Contracted rent: {}", output::money(total, currency)));
        }
        Report::Aging(report) => {
            output::section(format!("Receivables aging as of {}", report.as_of));
            let mut table = Table::new(vec![
                TableColumn::left("Invoice"),
                TableColumn::left("Party"),
                TableColumn::left("Due"),
                TableColumn::right("Days"),
                TableColumn::left("Bucket"),
                TableColumn::right("Outstanding"),
            ]);
            for row in &report.rows {
                table.push(vec![
                    row.invoice.clone(),
                    row.party.clone(),
                    row.due_date.to_string(),
                    row.days_past_due.max(0).to_string(),
                    row.bucket.label().to_string(),
                    output::money(row.outstanding, currency),
                ]);
            }
            table.print_or("Nothing outstanding.");
            let totals = &report.totals;
            for (label, amount) in [
                ("current", totals.current),
                ("1-30", totals.days_1_30),
                ("31-60", totals.days_31_60),
                ("61-90", totals.days_61_90),
                ("90+", totals.over_90),
                ("total", totals.total),
            ] {
                output::info(format!("  {:<8} {:>14}", label, output::money(amount, currency)));
            }
        }
        Report::TrialBalance(balance) => {
            output::section("Trial balance");
            let mut table = Table::new(vec![
                TableColumn::left("Code"),
                TableColumn::left("Account"),
                TableColumn::right("Debit"),
                TableColumn::right("Credit"),
            ]);
            for row in &balance.rows {
                table.push(vec![
                    row.code.clone(),
                    row.name.clone(),
                    output::money(row.debit, currency),
                    output::money(row.credit, currency),
                ]);
            }
            table.push(vec![
                String::new(),
                "Total".into(),
                output::money(balance.total_debit, currency),
                output::money(balance.total_credit, currency),
            ]);
            table.print();
            if balance.is_balanced() {
                output::success("Debits equal credits.");
            } else {
                output::warning("The ledger is out of balance.");
            }
        }
        Report::Payroll(summary) => {
            output::section(format!(
                "Payroll {} .. {}",
                summary.period_start, summary.period_end
            ));
            let mut table = Table::new(vec![
                TableColumn::left("Employee"),
                TableColumn::left("Name"),
                TableColumn::left("Department"),
                TableColumn::left("Period"),
                TableColumn::right("Net"),
                TableColumn::left("Posted"),
            ]);
            for row in &summary.rows {
                table.push(vec![
                    row.employee.clone(),
                    row.name.clone(),
                    row.department.clone(),
                    format!("{} .. {}", row.period_start, row.period_end),
                    output::money(row.net_pay, currency),
                    if row.posted { "yes".into() } else { "no".into() },
                ]);
            }
            table.print_or("No payroll in this period.");
            output::info(format!("  Total net    : {}", output::money(summary.total_net, currency)));
            output::info(format!("  Total posted : {}", output::money(summary.total_posted, currency)));
        }
    }
}
