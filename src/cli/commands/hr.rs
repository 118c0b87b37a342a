use chrono::NaiveTime;
use estate_core::{HrService, NewEmployee, NewPayroll};
use estate_domain::{AttendanceStatus, LeaveKind, PayrollStatus, Permission};

use super::{split_subcommand, CommandDefinition};
use crate::cli::args::{parse_amount, parse_date, parse_label, Args};
use crate::cli::context::{CommandError, CommandResult, ShellContext};
use crate::cli::lookup;
use crate::cli::output;
use crate::cli::table::{page_footer, Table, TableColumn};

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new(
            "employee",
            "Maintain the employee register",
            "employee add <first> <last> <email> <annual-salary> [--position <text>] [--department <text>] [--start <date>]
employee list [--status active|terminated] [--search <text>] [--sort name|salary|start] [--page <n>]
employee salary <employee> <annual-salary>
employee terminate <employee>",
            cmd_employee,
        ),
        CommandDefinition::new(
            "attendance",
            "Record and review daily attendance",
            "attendance record <employee> <present|absent|late|half_day|on_leave> [--date <date>] [--in HH:MM] [--out HH:MM]
attendance list [employee] [--from <date>] [--to <date>]",
            cmd_attendance,
        ),
        CommandDefinition::new(
            "leave",
            "Request and decide employee leave",
            "leave request <employee> <start> <end> [--kind annual|vacation|sick|unpaid|other] [--reason <text>]
leave approve <request> | reject <request>
leave list",
            cmd_leave,
        ),
        CommandDefinition::new(
            "payroll",
            "Generate, adjust, and post payroll",
            "payroll generate <period-start> <period-end>
payroll record <employee> <period-start> <period-end> <base> [--bonus <amount>] [--deduction <amount>] [--net <amount>]
payroll post <entry> [--date <date>]
payroll post-all [--date <date>]
payroll list [--status draft|posted]",
            cmd_payroll,
        ),
    ]
}

fn cmd_employee(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let args = Args::parse(rest)?;
    let currency = context.currency();
    match sub.as_deref() {
        Some("add") => {
            let draft = NewEmployee {
                first_name: args.required(0, "first")?.to_string(),
                last_name: args.required(1, "last")?.to_string(),
                email: args.required(2, "email")?.to_string(),
                salary: parse_amount("salary", args.required(3, "annual-salary")?)?,
                position: args.flag("position").unwrap_or("Staff").to_string(),
                department: args.flag("department").unwrap_or("General").to_string(),
                start_date: match args.flag_date("start")? {
                    Some(date) => date,
                    None => context.clock.today(),
                },
            };
            let tid = context.mutate(Permission::ManageHr, |ws, _, _| {
                let id = HrService::add_employee(ws, draft)?;
                Ok(ws.employee(id).map(|employee| employee.tid.to_string()))
            })?;
            output::success(format!("Employee {} added.", tid.unwrap_or_default()));
            Ok(())
        }
        Some("list") | None => {
            let filter = args.filter_state()?;
            context.read(Permission::ManageHr, |ws, _| {
                let page = filter.apply(&ws.employees);
                let mut table = Table::new(vec![
                    TableColumn::left("Ref"),
                    TableColumn::left("Name"),
                    TableColumn::left("Position"),
                    TableColumn::left("Department"),
                    TableColumn::left("Started"),
                    TableColumn::right("Salary"),
                    TableColumn::left("Status"),
                ]);
                for employee in &page.items {
                    table.push(vec![
                        employee.tid.to_string(),
                        employee.full_name(),
                        employee.position.clone(),
                        employee.department.clone(),
                        employee.start_date.to_string(),
                        output::money(employee.salary, &currency),
                        employee.status.to_string(),
                    ]);
                }
                table.print_or("No employees match.");
                page_footer(&page);
                Ok(())
            })
        }
        Some("salary") => {
            let key = args.required(0, "employee")?;
            let salary = parse_amount("salary", args.required(1, "annual-salary")?)?;
            context.mutate(Permission::ManageHr, |ws, _, _| {
                let id = lookup::employee(ws, key)?;
                HrService::set_salary(ws, id, salary)
            })?;
            output::success(format!("Salary of {} set to {}.", key, output::money(salary, &currency)));
            Ok(())
        }
        Some("terminate") => {
            let key = args.required(0, "employee")?;
            if !context.confirm(&format!("Terminate employee {}?", key))? {
                output::info("Nothing changed.");
                return Ok(());
            }
            context.mutate(Permission::ManageHr, |ws, _, _| {
                let id = lookup::employee(ws, key)?;
                HrService::terminate(ws, id)
            })?;
            output::success(format!("Employee {} terminated.", key));
            Ok(())
        }
        Some(other) => Err(CommandError::usage(format!("unknown employee subcommand `{}`", other))),
    }
}

fn parse_time(field: &str, raw: &str) -> Result<NaiveTime, CommandError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| CommandError::usage(format!("{} must be HH:MM, got `{}`", field, raw)))
}

fn cmd_attendance(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let args = Args::parse(rest)?;
    match sub.as_deref() {
        Some("record") => {
            let key = args.required(0, "employee")?;
            let status: AttendanceStatus = parse_label(args.required(1, "status")?)?;
            let date = match args.flag_date("date")? {
                Some(date) => date,
                None => context.clock.today(),
            };
            let check_in = args.flag("in").map(|raw| parse_time("--in", raw)).transpose()?;
            let check_out = args.flag("out").map(|raw| parse_time("--out", raw)).transpose()?;
            context.mutate(Permission::ManageHr, |ws, _, _| {
                let id = lookup::employee(ws, key)?;
                HrService::record_attendance(ws, id, date, status, check_in, check_out)
            })?;
            output::success(format!("{} marked {} on {}.", key, status, date));
            Ok(())
        }
        Some("list") | None => {
            let scope = args.get(0);
            let from = args.flag_date("from")?;
            let to = args.flag_date("to")?;
            context.read(Permission::ManageHr, |ws, _| {
                let employee_id = scope.map(|key| lookup::employee(ws, key)).transpose()?;
                let mut records: Vec<_> = ws
                    .attendance
                    .iter()
                    .filter(|record| employee_id.map_or(true, |id| record.employee_id == id))
                    .filter(|record| from.map_or(true, |from| record.date >= from))
                    .filter(|record| to.map_or(true, |to| record.date <= to))
                    .collect();
                records.sort_by_key(|record| record.date);
                let mut table = Table::new(vec![
                    TableColumn::left("Date"),
                    TableColumn::left("Employee"),
                    TableColumn::left("Status"),
                    TableColumn::left("In"),
                    TableColumn::left("Out"),
                    TableColumn::right("Hours"),
                ]);
                let clock_time = |time: Option<NaiveTime>| {
                    time.map(|time| time.format("%H:%M").to_string())
                        .unwrap_or_else(|| "-".into())
                };
                for record in records {
                    table.push(vec![
                        record.date.to_string(),
                        ws.employee(record.employee_id)
                            .map(|employee| employee.full_name())
                            .unwrap_or_default(),
                        record.status.to_string(),
                        clock_time(record.check_in),
                        clock_time(record.check_out),
                        record.hours().map(|hours| format!("{:.1}", hours)).unwrap_or_else(|| "-".into()),
                    ]);
                }
                table.print_or("No attendance recorded.");
                Ok(())
            })
        }
        Some(other) => Err(CommandError::usage(format!("unknown attendance subcommand `{}`", other))),
    }
}

fn cmd_leave(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let args = Args::parse(rest)?;
    match sub.as_deref() {
        Some("request") => {
            let key = args.required(0, "employee")?;
            let start = parse_date("start", args.required(1, "start")?)?;
            let end = parse_date("end", args.required(2, "end")?)?;
            let kind = args.flag_parsed::<LeaveKind>("kind")?.unwrap_or(LeaveKind::Annual);
            let reason = args.flag("reason");
            let id = context.mutate(Permission::ManageHr, |ws, _, _| {
                let employee_id = lookup::employee(ws, key)?;
                HrService::request_leave(ws, employee_id, start, end, kind, reason)
            })?;
            output::success(format!("Leave request {} filed for {}.", lookup::short(id), key));
            Ok(())
        }
        Some(decision @ ("approve" | "reject")) => {
            let key = args.required(0, "request")?;
            let approve = decision == "approve";
            context.mutate(Permission::ManageHr, |ws, _, _| {
                let id = lookup::leave_request(ws, key)?;
                HrService::decide_leave(ws, id, approve)
            })?;
            output::success(format!(
                "Leave request {} {}.",
                key,
                if approve { "approved" } else { "rejected" }
            ));
            Ok(())
        }
        Some("list") | None => context.read(Permission::ManageHr, |ws, _| {
            let mut table = Table::new(vec![
                TableColumn::left("Id"),
                TableColumn::left("Employee"),
                TableColumn::left("Kind"),
                TableColumn::left("From"),
                TableColumn::left("To"),
                TableColumn::right("Days"),
                TableColumn::left("Status"),
            ]);
            for request in &ws.leave_requests {
                table.push(vec![
                    lookup::short(request.id),
                    ws.employee(request.employee_id)
                        .map(|employee| employee.full_name())
                        .unwrap_or_default(),
                    request.kind.to_string(),
                    request.start_date.to_string(),
                    request.end_date.to_string(),
                    request.days().to_string(),
                    request.status.to_string(),
                ]);
            }
            table.print_or("No leave requests.");
            Ok(())
        }),
        Some(other) => Err(CommandError::usage(format!("unknown leave subcommand `{}`", other))),
    }
}

fn cmd_payroll(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let args = Args::parse(rest)?;
    let currency = context.currency();
    match sub.as_deref() {
        Some("generate") => {
            let start = parse_date("period-start", args.required(0, "period-start")?)?;
            let end = parse_date("period-end", args.required(1, "period-end")?)?;
            let created = context.mutate(Permission::ManageHr, |ws, _, _| {
                HrService::generate_payroll(ws, start, end)
            })?;
            if created.is_empty() {
                output::info("Every active employee already has payroll for this period.");
            } else {
                output::success(format!("{} draft payroll entries created.", created.len()));
            }
            Ok(())
        }
        Some("record") => {
            let key = args.required(0, "employee")?;
            let period_start = parse_date("period-start", args.required(1, "period-start")?)?;
            let period_end = parse_date("period-end", args.required(2, "period-end")?)?;
            let base_salary = parse_amount("base", args.required(3, "base")?)?;
            let bonuses = args.flag_amount("bonus")?.unwrap_or(0.0);
            let deductions = args.flag_amount("deduction")?.unwrap_or(0.0);
            let net_pay = args.flag_amount("net")?;
            let id = context.mutate(Permission::ManageHr, |ws, _, _| {
                let employee_id = lookup::employee(ws, key)?;
                HrService::record_payroll(
                    ws,
                    NewPayroll {
                        employee_id,
                        period_start,
                        period_end,
                        base_salary,
                        bonuses,
                        deductions,
                        net_pay,
                    },
                )
            })?;
            output::success(format!("Payroll entry {} recorded for {}.", lookup::short(id), key));
            Ok(())
        }
        Some("post") => {
            let key = args.required(0, "entry")?;
            let date = match args.flag_date("date")? {
                Some(date) => date,
                None => context.clock.today(),
            };
            let voucher = context.mutate(Permission::ManageHr, |ws, _, clock| {
                let id = lookup::payroll(ws, key)?;
                let voucher = HrService::post_payroll(ws, id, date, clock)?;
                Ok(ws.voucher(voucher).map(|voucher| voucher.reference()))
            })?;
            output::success(format!(
                "Payroll entry {} posted as {}.",
                key,
                voucher.unwrap_or_default()
            ));
            Ok(())
        }
        Some("post-all") => {
            let date = match args.flag_date("date")? {
                Some(date) => date,
                None => context.clock.today(),
            };
            let posted = context.mutate(Permission::ManageHr, |ws, _, clock| {
                let drafts: Vec<_> = ws
                    .payroll
                    .iter()
                    .filter(|entry| entry.status == PayrollStatus::Draft)
                    .map(|entry| entry.id)
                    .collect();
                for id in &drafts {
                    HrService::post_payroll(ws, *id, date, clock)?;
                }
                Ok(drafts.len())
            })?;
            output::success(format!("{} payroll entries posted.", posted));
            Ok(())
        }
        Some("list") | None => {
            let status = args.flag_parsed::<PayrollStatus>("status")?;
            context.read(Permission::ManageHr, |ws, _| {
                let mut table = Table::new(vec![
                    TableColumn::left("Id"),
                    TableColumn::left("Employee"),
                    TableColumn::left("Period"),
                    TableColumn::right("Base"),
                    TableColumn::right("Bonuses"),
                    TableColumn::right("Deductions"),
                    TableColumn::right("Net"),
                    TableColumn::left("Status"),
                ]);
                for entry in ws
                    .payroll
                    .iter()
                    .filter(|entry| status.map_or(true, |status| entry.status == status))
                {
                    table.push(vec![
                        lookup::short(entry.id),
                        ws.employee(entry.employee_id)
                            .map(|employee| employee.full_name())
                            .unwrap_or_default(),
                        format!("{} .. {}", entry.period_start, entry.period_end),
                        output::money(entry.base_salary, &currency),
                        output::money(entry.bonuses, &currency),
                        output::money(entry.deductions, &currency),
                        output::money(entry.net_pay, &currency),
                        entry.status.to_string(),
                    ]);
                }
                table.print_or("No payroll entries.");
                Ok(())
            })
        }
        Some(other) => Err(CommandError::usage(format!("unknown payroll subcommand `{}`", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_times_use_hours_and_minutes() {
        assert_eq!(
            parse_time("--in", "09:05").unwrap(),
            NaiveTime::from_hms_opt(9, 5, 0).unwrap()
        );
        assert!(parse_time("--in", "9am").is_err());
    }
}
