use estate_core::{CrmService, LeaseService, PartyService};
use estate_domain::{Channel, ClientStage, DealStage, LeadStage, Permission, SaleStatus};

use super::{split_subcommand, CommandDefinition};
use crate::cli::args::{parse_amount, parse_label, Args};
use crate::cli::context::{CommandError, CommandResult, ShellContext};
use crate::cli::lookup;
use crate::cli::output;
use crate::cli::table::{page_footer, Table, TableColumn};

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new(
            "sale",
            "Sell units to buyers",
            "sale buyer <name> <email> [--phone <number>]
sale create <unit> <buyer-email> <price> [--date <date>]
sale status <sale> <completed|refunded|cancelled>
sale list",
            cmd_sale,
        ),
        CommandDefinition::new(
            "lead",
            "Capture and qualify sales leads",
            "lead add <name> [--email <address>] [--phone <number>] [--source <text>]
lead stage <lead> <contacted|qualified|lost>
lead convert <lead>
lead list [--status <stage>] [--search <text>] [--page <n>]",
            cmd_lead,
        ),
        CommandDefinition::new(
            "client",
            "Manage clients and their communication history",
            "client add <name> [--email <address>] [--phone <number>]
client stage <client> <prospect|active|inactive>
client log <client> <email|call|meeting|note> <subject> [--content <text>] [--deal <deal>]
client history <client>
client list",
            cmd_client,
        ),
        CommandDefinition::new(
            "deal",
            "Track deals through the sales pipeline",
            "deal add <client> <value> <title> [--unit <unit>]
deal stage <deal> <negotiation|closed_won|closed_lost>
deal list [--status <stage>] [--page <n>]
deal pipeline",
            cmd_deal,
        ),
    ]
}

fn cmd_sale(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let args = Args::parse(rest)?;
    let currency = context.currency();
    match sub.as_deref() {
        Some("buyer") => {
            let name = args.required(0, "name")?;
            let email = args.required(1, "email")?;
            let phone = args.flag("phone");
            context.mutate(Permission::ManageCrm, |ws, _, _| {
                PartyService::add_buyer(ws, name, email, phone)
            })?;
            output::success(format!("Buyer {} registered.", name));
            Ok(())
        }
        Some("create") => {
            let unit = args.required(0, "unit")?;
            let buyer = args.required(1, "buyer-email")?;
            let price = parse_amount("price", args.required(2, "price")?)?;
            let date = match args.flag_date("date")? {
                Some(date) => date,
                None => context.clock.today(),
            };
            let id = context.mutate(Permission::ManageCrm, |ws, _, _| {
                let unit_id = lookup::unit(ws, unit)?;
                let buyer_id = lookup::buyer(ws, buyer)?;
                LeaseService::create_sale(ws, unit_id, buyer_id, date, price)
            })?;
            output::success(format!(
                "Sale {} opened for {} at {}; the unit is reserved.",
                lookup::short(id),
                unit,
                output::money(price, &currency)
            ));
            Ok(())
        }
        Some("status") => {
            let key = args.required(0, "sale")?;
            let status: SaleStatus = parse_label(args.required(1, "status")?)?;
            context.mutate(Permission::ManageCrm, |ws, _, _| {
                let id = lookup::sale(ws, key)?;
                LeaseService::set_sale_status(ws, id, status)
            })?;
            output::success(format!("Sale {} is now {}.", key, status));
            Ok(())
        }
        Some("list") | None => context.read(Permission::ManageCrm, |ws, _| {
            let mut table = Table::new(vec![
                TableColumn::left("Id"),
                TableColumn::left("Unit"),
                TableColumn::left("Buyer"),
                TableColumn::left("Date"),
                TableColumn::right("Price"),
                TableColumn::left("Status"),
            ]);
            for sale in &ws.sales {
                table.push(vec![
                    lookup::short(sale.id),
                    lookup::unit_label(ws, sale.unit_id),
                    ws.buyer(sale.buyer_id)
                        .map(|buyer| buyer.email.clone())
                        .unwrap_or_default(),
                    sale.sale_date.to_string(),
                    output::money(sale.price, &currency),
                    sale.status.to_string(),
                ]);
            }
            table.print_or("No sales.");
            Ok(())
        }),
        Some(other) => Err(CommandError::usage(format!("unknown sale subcommand `{}`", other))),
    }
}

fn cmd_lead(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let args = Args::parse(rest)?;
    match sub.as_deref() {
        Some("add") => {
            let name = args
                .rest(0)
                .ok_or_else(|| CommandError::usage("usage: lead add <name>"))?;
            let (email, phone, source) = (args.flag("email"), args.flag("phone"), args.flag("source"));
            let id = context.mutate(Permission::ManageCrm, |ws, _, clock| {
                CrmService::add_lead(ws, &name, email, phone, source, clock.now())
            })?;
            output::success(format!("Lead {} captured.", lookup::short(id)));
            Ok(())
        }
        Some("stage") => {
            let key = args.required(0, "lead")?;
            let stage: LeadStage = parse_label(args.required(1, "stage")?)?;
            context.mutate(Permission::ManageCrm, |ws, _, _| {
                let id = lookup::lead(ws, key)?;
                CrmService::set_lead_stage(ws, id, stage)
            })?;
            output::success(format!("Lead {} moved to {}.", key, stage));
            Ok(())
        }
        Some("convert") => {
            let key = args.required(0, "lead")?;
            let client = context.mutate(Permission::ManageCrm, |ws, _, _| {
                let id = lookup::lead(ws, key)?;
                let client_id = CrmService::convert_lead(ws, id)?;
                Ok(ws.client(client_id).map(|client| client.tid.to_string()))
            })?;
            output::success(format!(
                "Lead {} converted to client {}.",
                key,
                client.unwrap_or_default()
            ));
            Ok(())
        }
        Some("list") | None => {
            let filter = args.filter_state()?;
            context.read(Permission::ManageCrm, |ws, _| {
                let page = filter.apply(&ws.leads);
                let mut table = Table::new(vec![
                    TableColumn::left("Id"),
                    TableColumn::left("Name"),
                    TableColumn::left("Email"),
                    TableColumn::left("Source"),
                    TableColumn::left("Stage"),
                    TableColumn::left("Created"),
                ]);
                for lead in &page.items {
                    table.push(vec![
                        lookup::short(lead.id),
                        lead.name.clone(),
                        lead.email.clone().unwrap_or_else(|| "-".into()),
                        lead.source.clone().unwrap_or_else(|| "-".into()),
                        lead.stage.to_string(),
                        lead.created_at.format("%Y-%m-%d").to_string(),
                    ]);
                }
                table.print_or("No leads match.");
                page_footer(&page);
                Ok(())
            })
        }
        Some(other) => Err(CommandError::usage(format!("unknown lead subcommand `{}`", other))),
    }
}

fn cmd_client(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let args = Args::parse(rest)?;
    match sub.as_deref() {
        Some("add") => {
            let name = args
                .rest(0)
                .ok_or_else(|| CommandError::usage("usage: client add <name>"))?;
            let (email, phone) = (args.flag("email"), args.flag("phone"));
            let tid = context.mutate(Permission::ManageCrm, |ws, _, _| {
                let id = CrmService::add_client(ws, &name, email, phone)?;
                Ok(ws.client(id).map(|client| client.tid.to_string()))
            })?;
            output::success(format!("Client {} added.", tid.unwrap_or_default()));
            Ok(())
        }
        Some("stage") => {
            let key = args.required(0, "client")?;
            let stage: ClientStage = parse_label(args.required(1, "stage")?)?;
            context.mutate(Permission::ManageCrm, |ws, _, _| {
                let id = lookup::client(ws, key)?;
                CrmService::set_client_stage(ws, id, stage)
            })?;
            output::success(format!("Client {} is now {}.", key, stage));
            Ok(())
        }
        Some("log") => {
            let key = args.required(0, "client")?;
            let channel: Channel = parse_label(args.required(1, "channel")?)?;
            let subject = args
                .rest(2)
                .ok_or_else(|| CommandError::usage("usage: client log <client> <channel> <subject>"))?;
            let content = args.flag("content").unwrap_or_default();
            let deal = args.flag("deal");
            context.mutate(Permission::ManageCrm, |ws, _, clock| {
                let client_id = lookup::client(ws, key)?;
                let deal_id = deal.map(|deal| lookup::deal(ws, deal)).transpose()?;
                CrmService::log_communication(ws, client_id, deal_id, channel, &subject, content, clock.now())
            })?;
            output::success(format!("{} logged for {}.", channel, key));
            Ok(())
        }
        Some("history") => {
            let key = args.required(0, "client")?;
            context.read(Permission::ManageCrm, |ws, _| {
                let id = lookup::client(ws, key)?;
                let mut table = Table::new(vec![
                    TableColumn::left("When"),
                    TableColumn::left("Channel"),
                    TableColumn::left("Deal"),
                    TableColumn::left("Subject"),
                ]);
                for entry in CrmService::history(ws, id) {
                    table.push(vec![
                        entry.occurred_at.format("%Y-%m-%d %H:%M").to_string(),
                        entry.channel.to_string(),
                        entry
                            .deal_id
                            .and_then(|deal| ws.deal(deal))
                            .map(|deal| deal.tid.to_string())
                            .unwrap_or_else(|| "-".into()),
                        entry.subject.clone(),
                    ]);
                }
                table.print_or("No communication logged.");
                Ok(())
            })
        }
        Some("list") | None => context.read(Permission::ManageCrm, |ws, _| {
            let mut table = Table::new(vec![
                TableColumn::left("Ref"),
                TableColumn::left("Name"),
                TableColumn::left("Email"),
                TableColumn::left("Stage"),
                TableColumn::right("Deals"),
            ]);
            for client in &ws.clients {
                table.push(vec![
                    client.tid.to_string(),
                    client.name.clone(),
                    client.email.clone().unwrap_or_else(|| "-".into()),
                    client.stage.to_string(),
                    ws.deals
                        .iter()
                        .filter(|deal| deal.client_id == client.id)
                        .count()
                        .to_string(),
                ]);
            }
            table.print_or("No clients.");
            Ok(())
        }),
        Some(other) => Err(CommandError::usage(format!("unknown client subcommand `{}`", other))),
    }
}

fn cmd_deal(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let args = Args::parse(rest)?;
    let currency = context.currency();
    match sub.as_deref() {
        Some("add") => {
            let client = args.required(0, "client")?;
            let value = parse_amount("value", args.required(1, "value")?)?;
            let title = args
                .rest(2)
                .ok_or_else(|| CommandError::usage("usage: deal add <client> <value> <title>"))?;
            let unit = args.flag("unit");
            let tid = context.mutate(Permission::ManageCrm, |ws, _, _| {
                let client_id = lookup::client(ws, client)?;
                let unit_id = unit.map(|unit| lookup::unit(ws, unit)).transpose()?;
                let id = CrmService::add_deal(ws, client_id, &title, value, unit_id)?;
                Ok(ws.deal(id).map(|deal| deal.tid.to_string()))
            })?;
            output::success(format!("Deal {} opened.", tid.unwrap_or_default()));
            Ok(())
        }
        Some("stage") => {
            let key = args.required(0, "deal")?;
            let stage: DealStage = parse_label(args.required(1, "stage")?)?;
            let today = match args.flag_date("date")? {
                Some(date) => date,
                None => context.clock.today(),
            };
            context.mutate(Permission::ManageCrm, |ws, _, _| {
                let id = lookup::deal(ws, key)?;
                CrmService::set_deal_stage(ws, id, stage, today)
            })?;
            output::success(format!("Deal {} moved to {}.", key, stage));
            Ok(())
        }
        Some("list") => {
            let filter = args.filter_state()?;
            context.read(Permission::ManageCrm, |ws, _| {
                let page = filter.apply(&ws.deals);
                let mut table = Table::new(vec![
                    TableColumn::left("Ref"),
                    TableColumn::left("Client"),
                    TableColumn::left("Title"),
                    TableColumn::right("Value"),
                    TableColumn::left("Stage"),
                    TableColumn::left("Closed"),
                ]);
                for deal in &page.items {
                    table.push(vec![
                        deal.tid.to_string(),
                        ws.client(deal.client_id)
                            .map(|client| client.name.clone())
                            .unwrap_or_default(),
                        deal.title.clone(),
                        output::money(deal.value, &currency),
                        deal.stage.to_string(),
                        deal.closed_on.map(|date| date.to_string()).unwrap_or_else(|| "-".into()),
                    ]);
                }
                table.print_or("No deals match.");
                page_footer(&page);
                Ok(())
            })
        }
        Some("pipeline") | None => {
            let pipeline = context.read(Permission::ManageCrm, |ws, _| Ok(CrmService::pipeline(ws)))?;
            let mut table = Table::new(vec![
                TableColumn::left("Stage"),
                TableColumn::right("Deals"),
                TableColumn::right("Value"),
            ]);
            for (stage, totals) in pipeline {
                table.push(vec![
                    stage.to_string(),
                    totals.count.to_string(),
                    output::money(totals.value, &currency),
                ]);
            }
            table.print();
            Ok(())
        }
        Some(other) => Err(CommandError::usage(format!("unknown deal subcommand `{}`", other))),
    }
}

