use estate_core::{CoreError, LeaseService, NewLease, PartyService, PortalService};
use estate_domain::{LeaseStatus, MaintenanceStatus, PaymentMethod, Permission, Priority, TimeInterval};

use super::{split_subcommand, CommandDefinition};
use crate::cli::args::{parse_amount, parse_date, parse_interval, parse_label, Args};
use crate::cli::context::{CommandError, CommandResult, ShellContext};
use crate::cli::lookup;
use crate::cli::output;
use crate::cli::table::{page_footer, Table, TableColumn};

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new(
            "tenant",
            "Register and maintain tenants",
            "tenant add <name> <email> [--phone <number>]
tenant list [--search <text>] [--sort name|email|date] [--page <n>]
tenant update <tenant> [--name <text>] [--email <address>] [--phone <number>]
tenant remove <tenant>",
            cmd_tenant,
        ),
        CommandDefinition::new(
            "lease",
            "Create leases, bill rent, and manage lease status",
            "lease create <unit> <tenant> <start> <end> <rent> [--deposit <amount>] [--billing monthly|quarterly|yearly|<n>-<unit>] [--draft]
lease list [--status <status>] [--from <date>] [--to <date>] [--sort start|end|rent] [--page <n>]
lease status <lease> <draft|active|terminated|expired>
lease schedule <lease>
lease bill <lease> [--through <date>]
lease expire [--as-of <date>]",
            cmd_lease,
        ),
        CommandDefinition::new(
            "portal",
            "Tenant self-service: dashboard, invoices, payments, maintenance",
            "portal <tenant> [dashboard]
portal <tenant> invoices | payments
portal <tenant> pay <invoice> <amount> [--method cash|bank_transfer|card|cheque] [--date <date>] [--reference <text>]
portal <tenant> request <subject> [--details <text>] [--priority low|medium|high|urgent]",
            cmd_portal,
        ),
        CommandDefinition::new(
            "maintenance",
            "Track maintenance requests raised by tenants",
            "maintenance list [--status open|in_progress|resolved|closed]
maintenance status <request> <status>",
            cmd_maintenance,
        ),
    ]
}

fn cmd_tenant(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let args = Args::parse(rest)?;
    match sub.as_deref() {
        Some("add") => {
            let name = args.required(0, "name")?;
            let email = args.required(1, "email")?;
            let phone = args.flag("phone");
            let id = context.mutate(Permission::ManageLeases, |ws, _, _| {
                PartyService::add_tenant(ws, name, email, phone)
            })?;
            let tid = context.manager.with_current(|ws| ws.tenant(id).map(|t| t.tid.to_string()))?;
            output::success(format!("Tenant {} registered.", tid.unwrap_or_default()));
            Ok(())
        }
        Some("list") | None => {
            let filter = args.filter_state()?;
            context.read(Permission::ManageLeases, |ws, _| {
                let page = filter.apply(&ws.tenants);
                let mut table = Table::new(vec![
                    TableColumn::left("Ref"),
                    TableColumn::left("Name"),
                    TableColumn::left("Email"),
                    TableColumn::left("Phone"),
                    TableColumn::left("Unit"),
                ]);
                for tenant in &page.items {
                    table.push(vec![
                        tenant.tid.to_string(),
                        tenant.name.clone(),
                        tenant.email.clone(),
                        tenant.phone.clone().unwrap_or_else(|| "-".into()),
                        tenant
                            .unit_id
                            .map(|id| lookup::unit_label(ws, id))
                            .unwrap_or_else(|| "-".into()),
                    ]);
                }
                table.print_or("No tenants match.");
                page_footer(&page);
                Ok(())
            })
        }
        Some("update") => {
            let key = args.required(0, "tenant")?;
            let (name, email, phone) = (args.flag("name"), args.flag("email"), args.flag("phone"));
            if name.is_none() && email.is_none() && phone.is_none() {
                return Err(CommandError::usage("nothing to update; pass --name, --email, or --phone"));
            }
            context.mutate(Permission::ManageLeases, |ws, _, _| {
                let id = lookup::tenant(ws, key)?;
                PartyService::update_tenant(ws, id, name, email, phone)
            })?;
            output::success(format!("Tenant {} updated.", key));
            Ok(())
        }
        Some("remove") => {
            let key = args.required(0, "tenant")?;
            context.mutate(Permission::ManageLeases, |ws, _, _| {
                let id = lookup::tenant(ws, key)?;
                PartyService::remove_tenant(ws, id)
            })?;
            output::success(format!("Tenant {} removed.", key));
            Ok(())
        }
        Some(other) => Err(CommandError::usage(format!("unknown tenant subcommand `{}`", other))),
    }
}

fn cmd_lease(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let args = Args::parse_with_switches(rest, &["draft"])?;
    match sub.as_deref() {
        Some("create") => {
            let unit = args.required(0, "unit")?;
            let tenant = args.required(1, "tenant")?;
            let start_date = parse_date("start", args.required(2, "start")?)?;
            let end_date = parse_date("end", args.required(3, "end")?)?;
            let rent = parse_amount("rent", args.required(4, "rent")?)?;
            let deposit = args.flag_amount("deposit")?.unwrap_or(0.0);
            let billing = args
                .flag("billing")
                .map(parse_interval)
                .transpose()?
                .unwrap_or_else(TimeInterval::monthly);
            let activate = !args.switch("draft");
            let id = context.mutate(Permission::ManageLeases, |ws, _, _| {
                let draft = NewLease {
                    unit_id: lookup::unit(ws, unit)?,
                    tenant_id: lookup::tenant(ws, tenant)?,
                    start_date,
                    end_date,
                    rent,
                    deposit,
                    billing,
                    activate,
                };
                LeaseService::create(ws, draft)
            })?;
            output::success(format!(
                "Lease {} created ({}).",
                lookup::short(id),
                if activate { "active" } else { "draft" }
            ));
            Ok(())
        }
        Some("list") | None => {
            let filter = args.filter_state()?;
            let currency = context.currency();
            context.read(Permission::ManageLeases, |ws, _| {
                let page = filter.apply(&ws.leases);
                let mut table = Table::new(vec![
                    TableColumn::left("Id"),
                    TableColumn::left("Unit"),
                    TableColumn::left("Tenant"),
                    TableColumn::left("Start"),
                    TableColumn::left("End"),
                    TableColumn::left("Billing"),
                    TableColumn::right("Rent"),
                    TableColumn::left("Status"),
                ]);
                for lease in &page.items {
                    table.push(vec![
                        lookup::short(lease.id),
                        lookup::unit_label(ws, lease.unit_id),
                        ws.tenant(lease.tenant_id)
                            .map(|tenant| tenant.tid.to_string())
                            .unwrap_or_default(),
                        lease.start_date.to_string(),
                        lease.end_date.to_string(),
                        lease.billing.label(),
                        output::money(lease.rent, &currency),
                        lease.status.to_string(),
                    ]);
                }
                table.print_or("No leases match.");
                page_footer(&page);
                Ok(())
            })
        }
        Some("status") => {
            let key = args.required(0, "lease")?;
            let status: LeaseStatus = parse_label(args.required(1, "status")?)?;
            context.mutate(Permission::ManageLeases, |ws, _, _| {
                let id = lookup::lease(ws, key)?;
                LeaseService::set_status(ws, id, status)
            })?;
            output::success(format!("Lease {} is now {}.", key, status));
            Ok(())
        }
        Some("schedule") => {
            let key = args.required(0, "lease")?;
            let currency = context.currency();
            context.read(Permission::ManageLeases, |ws, _| {
                let id = lookup::lease(ws, key)?;
                let lease = ws.lease(id).ok_or_else(|| CoreError::not_found("Lease", key))?;
                let mut table = Table::new(vec![
                    TableColumn::right("#"),
                    TableColumn::left("Due"),
                    TableColumn::right("Amount"),
                    TableColumn::left("Billed"),
                ]);
                for (index, due) in LeaseService::rent_schedule(lease).iter().enumerate() {
                    let billed = lease.billed_through.is_some_and(|through| due.due_date <= through);
                    table.push(vec![
                        (index + 1).to_string(),
                        due.due_date.to_string(),
                        output::money(due.amount, &currency),
                        if billed { "yes".into() } else { "no".into() },
                    ]);
                }
                table.print_or("The lease has no installments.");
                Ok(())
            })
        }
        Some("bill") => {
            let key = args.required(0, "lease")?;
            let through = match args.flag_date("through")? {
                Some(date) => date,
                None => context.clock.today(),
            };
            let invoices = context.mutate(Permission::ManageFinance, |ws, _, clock| {
                let id = lookup::lease(ws, key)?;
                LeaseService::bill_due_rent(ws, id, through, clock)
            })?;
            if invoices.is_empty() {
                output::info(format!("Nothing due through {}.", through));
            } else {
                output::success(format!("{} rent invoice(s) issued through {}.", invoices.len(), through));
            }
            Ok(())
        }
        Some("expire") => {
            let as_of = match args.flag_date("as-of")? {
                Some(date) => date,
                None => context.clock.today(),
            };
            let expired = context.mutate(Permission::ManageLeases, |ws, _, _| LeaseService::expire_due(ws, as_of))?;
            output::success(format!("{} lease(s) expired as of {}.", expired.len(), as_of));
            Ok(())
        }
        Some(other) => Err(CommandError::usage(format!("unknown lease subcommand `{}`", other))),
    }
}

fn cmd_portal(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (tenant, rest) = match args.split_first() {
        Some((tenant, rest)) => (*tenant, rest),
        None => return Err(CommandError::usage("usage: portal <tenant> [dashboard|invoices|payments|pay|request]")),
    };
    let (sub, rest) = split_subcommand(rest);
    let args = Args::parse(rest)?;
    let currency = context.currency();
    match sub.as_deref() {
        Some("dashboard") | None => {
            let today = context.clock.today();
            let dashboard = context.read(Permission::ManageLeases, |ws, _| {
                let id = lookup::tenant(ws, tenant)?;
                Ok(PortalService::dashboard(ws, id, today)?)
            })?;
            output::section(format!("{} ({})", dashboard.name, dashboard.tenant));
            output::info(format!("  Unit            : {}", dashboard.unit.as_deref().unwrap_or("-")));
            if let Some(end) = dashboard.lease_end {
                output::info(format!("  Lease ends      : {}", end));
            }
            output::info(format!(
                "  Outstanding     : {} across {} invoice(s)",
                output::money(dashboard.outstanding_balance, &currency),
                dashboard.open_invoices
            ));
            if let Some(due) = dashboard.next_rent_due {
                output::info(format!(
                    "  Next rent due   : {} on {}",
                    output::money(due.amount, &currency),
                    due.due_date
                ));
            }
            output::info(format!("  Open requests   : {}", dashboard.open_maintenance));
            Ok(())
        }
        Some("invoices") => context.read(Permission::ManageLeases, |ws, _| {
            let id = lookup::tenant(ws, tenant)?;
            let mut table = Table::new(vec![
                TableColumn::left("Invoice"),
                TableColumn::left("Due"),
                TableColumn::right("Total"),
                TableColumn::right("Outstanding"),
                TableColumn::left("Status"),
            ]);
            for invoice in PortalService::invoices(ws, id) {
                table.push(vec![
                    invoice.number.to_string(),
                    invoice.due_date.to_string(),
                    output::money(invoice.total_amount(), &currency),
                    output::money(invoice.outstanding(), &currency),
                    invoice.status.to_string(),
                ]);
            }
            table.print_or("No invoices.");
            Ok(())
        }),
        Some("payments") => context.read(Permission::ManageLeases, |ws, _| {
            let id = lookup::tenant(ws, tenant)?;
            let mut table = Table::new(vec![
                TableColumn::left("Date"),
                TableColumn::left("Invoice"),
                TableColumn::right("Amount"),
                TableColumn::left("Method"),
                TableColumn::left("Reference"),
            ]);
            for payment in PortalService::payments(ws, id) {
                table.push(vec![
                    payment.date.to_string(),
                    ws.invoice(payment.invoice_id)
                        .map(|invoice| invoice.number.to_string())
                        .unwrap_or_default(),
                    output::money(payment.amount, &currency),
                    payment.method.to_string(),
                    payment.reference.clone().unwrap_or_else(|| "-".into()),
                ]);
            }
            table.print_or("No payments.");
            Ok(())
        }),
        Some("pay") => {
            let invoice = args.required(0, "invoice")?;
            let amount = parse_amount("amount", args.required(1, "amount")?)?;
            let method = args
                .flag_parsed::<PaymentMethod>("method")?
                .unwrap_or(PaymentMethod::BankTransfer);
            let date = match args.flag_date("date")? {
                Some(date) => date,
                None => context.clock.today(),
            };
            let reference = args.flag("reference");
            context.mutate(Permission::ManageLeases, |ws, _, clock| {
                let tenant_id = lookup::tenant(ws, tenant)?;
                let invoice_id = lookup::invoice(ws, invoice)?;
                PortalService::submit_payment(ws, tenant_id, invoice_id, amount, method, date, reference, clock)
            })?;
            output::success(format!(
                "Payment of {} recorded against {}.",
                output::money(amount, &currency),
                invoice
            ));
            Ok(())
        }
        Some("request") => {
            let subject = args
                .rest(0)
                .ok_or_else(|| CommandError::usage("usage: portal <tenant> request <subject>"))?;
            let details = args.flag("details").unwrap_or_default();
            let priority = args.flag_parsed::<Priority>("priority")?.unwrap_or_default();
            let id = context.mutate(Permission::ManageLeases, |ws, _, clock| {
                let tenant_id = lookup::tenant(ws, tenant)?;
                PortalService::request_maintenance(ws, tenant_id, &subject, details, priority, clock)
            })?;
            output::success(format!("Maintenance request {} opened.", lookup::short(id)));
            Ok(())
        }
        Some(other) => Err(CommandError::usage(format!("unknown portal action `{}`", other))),
    }
}

fn cmd_maintenance(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let args = Args::parse(rest)?;
    match sub.as_deref() {
        Some("list") | None => {
            let status = args.flag_parsed::<MaintenanceStatus>("status")?;
            context.read(Permission::ManageLeases, |ws, _| {
                let mut table = Table::new(vec![
                    TableColumn::left("Id"),
                    TableColumn::left("Tenant"),
                    TableColumn::left("Unit"),
                    TableColumn::left("Subject"),
                    TableColumn::left("Priority"),
                    TableColumn::left("Status"),
                    TableColumn::left("Opened"),
                ]);
                for request in ws
                    .maintenance
                    .iter()
                    .filter(|request| status.map_or(true, |status| request.status == status))
                {
                    table.push(vec![
                        lookup::short(request.id),
                        ws.tenant(request.tenant_id)
                            .map(|tenant| tenant.tid.to_string())
                            .unwrap_or_default(),
                        request
                            .unit_id
                            .map(|id| lookup::unit_label(ws, id))
                            .unwrap_or_else(|| "-".into()),
                        request.subject.clone(),
                        request.priority.to_string(),
                        request.status.to_string(),
                        request.created_at.format("%Y-%m-%d").to_string(),
                    ]);
                }
                table.print_or("No maintenance requests.");
                Ok(())
            })
        }
        Some("status") => {
            let key = args.required(0, "request")?;
            let status: MaintenanceStatus = parse_label(args.required(1, "status")?)?;
            context.mutate(Permission::ManageLeases, |ws, _, _| {
                let id = lookup::maintenance(ws, key)?;
                PortalService::set_maintenance_status(ws, id, status)
            })?;
            output::success(format!("Request {} is now {}.", key, status));
            Ok(())
        }
        Some(other) => Err(CommandError::usage(format!(
            "unknown maintenance subcommand `{}`",
            other
        ))),
    }
}
