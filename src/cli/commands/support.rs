use estate_core::{CoreError, NotificationService, SupportService};
use estate_domain::{Permission, Priority, TicketStatus};

use super::{split_subcommand, CommandDefinition};
use crate::cli::args::{parse_label, Args};
use crate::cli::context::{CommandError, CommandResult, ShellContext};
use crate::cli::lookup;
use crate::cli::output;
use crate::cli::table::{page_footer, Table, TableColumn};

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new(
            "ticket",
            "Raise and work support tickets",
            "ticket create <title> [--details <text>] [--priority low|medium|high|urgent] [--category <text>]
ticket status <ticket> <open|in_progress|resolved|closed> [--comment <text>]
ticket comment <ticket> <text>
ticket audit <ticket>
ticket list [--status <status>] [--search <text>] [--sort priority|date] [--page <n>]",
            cmd_ticket,
        ),
        CommandDefinition::new(
            "notify",
            "Send and read in-app notifications",
            "notify send <user-email> <title> [--message <text>]
notify list
notify read <notification> | read-all
notify remove <notification>",
            cmd_notify,
        ),
    ]
}

fn cmd_ticket(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let args = Args::parse(rest)?;
    match sub.as_deref() {
        Some("create") => {
            let title = args
                .rest(0)
                .ok_or_else(|| CommandError::usage("usage: ticket create <title>"))?;
            let details = args.flag("details").unwrap_or_default();
            let priority = args.flag_parsed::<Priority>("priority")?.unwrap_or_default();
            let category = args.flag("category").unwrap_or("general");
            let session = context.session()?;
            let tid = context.mutate_as(&session, |ws, session, clock| {
                let id = SupportService::create(
                    ws,
                    &title,
                    details,
                    priority,
                    category,
                    Some(session.user_id),
                    clock,
                )?;
                Ok(ws.ticket(id).map(|ticket| ticket.tid.to_string()))
            })?;
            output::success(format!("Ticket {} opened.", tid.unwrap_or_default()));
            Ok(())
        }
        Some("status") => {
            let key = args.required(0, "ticket")?;
            let status: TicketStatus = parse_label(args.required(1, "status")?)?;
            let comment = args.flag("comment");
            context.mutate(Permission::ManageSupport, |ws, _, clock| {
                let id = lookup::ticket(ws, key)?;
                SupportService::update_status(ws, id, status, comment, clock)
            })?;
            output::success(format!("Ticket {} is now {}.", key, status));
            Ok(())
        }
        Some("comment") => {
            let key = args.required(0, "ticket")?;
            let text = args
                .rest(1)
                .ok_or_else(|| CommandError::usage("usage: ticket comment <ticket> <text>"))?;
            context.mutate(Permission::ManageSupport, |ws, _, clock| {
                let id = lookup::ticket(ws, key)?;
                SupportService::comment(ws, id, &text, clock)
            })?;
            output::success(format!("Comment added to {}.", key));
            Ok(())
        }
        Some("audit") => {
            let key = args.required(0, "ticket")?;
            context.read(Permission::ManageSupport, |ws, _| {
                let id = lookup::ticket(ws, key)?;
                let mut table = Table::new(vec![
                    TableColumn::left("When"),
                    TableColumn::left("Action"),
                    TableColumn::left("Change"),
                    TableColumn::left("Comment"),
                ]);
                for entry in SupportService::audit(ws, id) {
                    let change = match (entry.old_status, entry.new_status) {
                        (Some(old), Some(new)) => format!("{} -> {}", old, new),
                        (None, Some(new)) => new.to_string(),
                        _ => String::new(),
                    };
                    table.push(vec![
                        entry.at.format("%Y-%m-%d %H:%M").to_string(),
                        entry.action.to_string(),
                        change,
                        entry.comment.clone().unwrap_or_default(),
                    ]);
                }
                table.print_or("No audit entries.");
                Ok(())
            })
        }
        Some("list") | None => {
            let filter = args.filter_state()?;
            context.read(Permission::ManageSupport, |ws, _| {
                let page = filter.apply(&ws.tickets);
                let mut table = Table::new(vec![
                    TableColumn::left("Ref"),
                    TableColumn::left("Title"),
                    TableColumn::left("Priority"),
                    TableColumn::left("Category"),
                    TableColumn::left("Status"),
                    TableColumn::left("Opened"),
                ]);
                for ticket in &page.items {
                    table.push(vec![
                        ticket.tid.to_string(),
                        ticket.title.clone(),
                        ticket.priority.to_string(),
                        ticket.category.clone(),
                        ticket.status.to_string(),
                        ticket.created_at.format("%Y-%m-%d").to_string(),
                    ]);
                }
                table.print_or("No tickets match.");
                page_footer(&page);
                Ok(())
            })
        }
        Some(other) => Err(CommandError::usage(format!("unknown ticket subcommand `{}`", other))),
    }
}

fn cmd_notify(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let args = Args::parse(rest)?;
    match sub.as_deref() {
        Some("send") => {
            let email = args.required(0, "user-email")?;
            let title = args
                .rest(1)
                .ok_or_else(|| CommandError::usage("usage: notify send <user-email> <title>"))?;
            let message = args.flag("message").unwrap_or_default();
            context.mutate(Permission::SendNotifications, |ws, _, clock| {
                let user_id = lookup::user(ws, email)?;
                NotificationService::notify(ws, user_id, &title, message, clock)
            })?;
            output::success(format!("Notification sent to {}.", email));
            Ok(())
        }
        Some("list") | None => {
            let session = context.session()?;
            context.manager.with_current(|ws| {
                let unread = NotificationService::unread_count(ws, session.user_id);
                output::section(format!("Notifications ({} unread)", unread));
                let mut table = Table::new(vec![
                    TableColumn::left("Id"),
                    TableColumn::left(""),
                    TableColumn::left("Received"),
                    TableColumn::left("Title"),
                    TableColumn::left("Message"),
                ]);
                for notification in NotificationService::list_for(ws, session.user_id) {
                    table.push(vec![
                        lookup::short(notification.id),
                        if notification.read { String::new() } else { "*".into() },
                        notification.created_at.format("%Y-%m-%d %H:%M").to_string(),
                        notification.title.clone(),
                        notification.message.clone(),
                    ]);
                }
                table.print_or("Your inbox is empty.");
            })?;
            Ok(())
        }
        Some(action @ ("read" | "remove")) => {
            let key = args.required(0, "notification")?;
            let session = context.session()?;
            context.mutate_as(&session, |ws, session, _| {
                let id = lookup::notification(ws, key)?;
                let owned = ws
                    .notifications
                    .iter()
                    .any(|notification| notification.id == id && notification.user_id == session.user_id);
                if !owned {
                    return Err(CoreError::not_found("Notification", key));
                }
                if action == "read" {
                    NotificationService::mark_read(ws, id)
                } else {
                    NotificationService::remove(ws, id)
                }
            })?;
            let done = if action == "read" { "marked read" } else { "removed" };
            output::success(format!("Notification {} {}.", key, done));
            Ok(())
        }
        Some("read-all") => {
            let session = context.session()?;
            let changed = context.mutate_as(&session, |ws, session, _| {
                Ok(NotificationService::mark_all_read(ws, session.user_id))
            })?;
            output::success(format!("{} notification(s) marked read.", changed));
            Ok(())
        }
        Some(other) => Err(CommandError::usage(format!("unknown notify subcommand `{}`", other))),
    }
}
