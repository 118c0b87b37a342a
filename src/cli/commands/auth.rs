use chrono::{TimeZone, Utc};
use estate_core::AuthService;
use estate_domain::Permission;

use super::{split_subcommand, CommandDefinition};
use crate::cli::context::{CommandError, CommandResult, ShellContext};
use crate::cli::lookup;
use crate::cli::output;
use crate::cli::table::{Table, TableColumn};

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new(
            "login",
            "Start a session in the open workspace",
            "login <email> [password]",
            cmd_login,
        ),
        CommandDefinition::new("logout", "End the current session", "logout", cmd_logout),
        CommandDefinition::new("whoami", "Show the current session", "whoami", cmd_whoami),
        CommandDefinition::new(
            "device",
            "Review and approve login devices",
            "device pending
device approve <user-email> <device-id>",
            cmd_device,
        ),
    ]
}

fn cmd_login(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let email = args
        .first()
        .ok_or_else(|| CommandError::usage("usage: login <email> [password]"))?;
    let password = context.secret(args.get(1).copied(), "password")?;
    let device = context.device_id.clone();
    let policy = context.policy();
    context.set_token(None);
    let outcome = context.mutate_open(|ws, clock| {
        AuthService::login(ws, email, &password, &device, &policy, clock)
    })?;
    let pending = outcome.device_approval_required;
    context.set_token(Some(outcome.token));
    if pending {
        output::warning(format!(
            "Device `{}` is waiting for approval; the session becomes usable once an administrator approves it.",
            device
        ));
    } else {
        output::success(format!("Logged in as {}.", email.to_ascii_lowercase()));
    }
    Ok(())
}

fn cmd_logout(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    context.set_token(None);
    output::info("Logged out.");
    Ok(())
}

fn cmd_whoami(context: &mut ShellContext, _args: &[&str]) -> CommandResult {
    let session = context.session()?;
    let (email, role) = context.manager.with_current(|ws| {
        let email = ws.user(session.user_id).map(|user| user.email.clone());
        let role = ws.role(session.role_id).map(|role| role.name.clone());
        (email.unwrap_or_default(), role.unwrap_or_default())
    })?;
    let expires = Utc
        .timestamp_opt(session.expires_at, 0)
        .single()
        .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_default();
    output::section("Session");
    output::info(format!("  User     : {}", email));
    output::info(format!("  Role     : {}", role));
    output::info(format!("  Device   : {}", session.device_id));
    output::info(format!("  Expires  : {}", expires));
    Ok(())
}

fn cmd_device(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    match sub.as_deref() {
        Some("pending") | None => {
            let rows = context.read(Permission::ApproveDevices, |ws, _| {
                Ok(AuthService::pending_devices(ws)
                    .into_iter()
                    .map(|approval| {
                        vec![
                            ws.user(approval.user_id)
                                .map(|user| user.email.clone())
                                .unwrap_or_else(|| lookup::short(approval.user_id)),
                            approval.device_id.clone(),
                            approval.requested_at.format("%Y-%m-%d %H:%M").to_string(),
                        ]
                    })
                    .collect::<Vec<_>>())
            })?;
            if rows.is_empty() {
                output::info("No devices are waiting for approval.");
                return Ok(());
            }
            let mut table = Table::new(vec![
                TableColumn::left("User"),
                TableColumn::left("Device"),
                TableColumn::left("Requested"),
            ]);
            rows.into_iter().for_each(|row| table.push(row));
            table.print();
            Ok(())
        }
        Some("approve") => {
            let (user, device) = match rest {
                [user, device, ..] => (*user, *device),
                _ => {
                    return Err(CommandError::usage(
                        "usage: device approve <user-email> <device-id>",
                    ))
                }
            };
            let session = context.session()?;
            context.mutate_as(&session, |ws, session, clock| {
                let user_id = lookup::user(ws, user)?;
                AuthService::approve_device(ws, session, user_id, device, clock)
            })?;
            output::success(format!("Device `{}` approved for {}.", device, user));
            Ok(())
        }
        Some(other) => Err(CommandError::usage(format!(
            "unknown device subcommand `{}`",
            other
        ))),
    }
}
