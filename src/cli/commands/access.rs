use chrono::Duration;
use estate_core::{AccessService, AuthService, CoreError};
use estate_domain::Permission;

use super::{split_subcommand, CommandDefinition};
use crate::cli::args::{parse_label, Args};
use crate::cli::context::{CommandError, CommandResult, ShellContext};
use crate::cli::lookup;
use crate::cli::output;
use crate::cli::table::{Table, TableColumn};

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new(
            "role",
            "Manage roles and their permissions",
            "role list
role create <name> <perm,perm,...>
role perms <name> <perm,perm,...>
role delete <name>
role permissions",
            cmd_role,
        ),
        CommandDefinition::new(
            "user",
            "List users and change their role or status",
            "user list
user assign <email> <role>
user disable <email> | enable <email>",
            cmd_user,
        ),
        CommandDefinition::new(
            "invite",
            "Generate and redeem invitation links",
            "invite create <role> [--email <address>]
invite list
invite accept <token|url> <name> <email> [password]",
            cmd_invite,
        ),
    ]
}

fn parse_permissions(raw: &str) -> Result<Vec<Permission>, CommandError> {
    raw.split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(parse_label::<Permission>)
        .collect()
}

fn cmd_role(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    match sub.as_deref() {
        Some("list") | None => {
            let rows = context.read(Permission::ReadRoles, |ws, _| {
                Ok(ws
                    .roles
                    .iter()
                    .map(|role| {
                        let members = ws.users.iter().filter(|user| user.role_id == role.id).count();
                        let permissions: Vec<&str> = role.permissions.iter().map(|p| p.as_str()).collect();
                        vec![
                            role.name.clone(),
                            if role.system { "yes".into() } else { "no".into() },
                            members.to_string(),
                            permissions.join(", "),
                        ]
                    })
                    .collect::<Vec<_>>())
            })?;
            let mut table = Table::new(vec![
                TableColumn::left("Role"),
                TableColumn::left("System"),
                TableColumn::right("Users"),
                TableColumn::left("Permissions"),
            ]);
            rows.into_iter().for_each(|row| table.push(row));
            table.print();
            Ok(())
        }
        Some("permissions") => {
            for permission in Permission::ALL {
                output::info(format!("  {}", permission));
            }
            Ok(())
        }
        Some("create") => {
            let (name, perms) = name_and_permissions(rest, "role create <name> <perm,perm,...>")?;
            context.mutate(Permission::CreateRoles, |ws, _, _| {
                AccessService::create_role(ws, &name, perms)
            })?;
            output::success(format!("Role `{}` created.", name));
            Ok(())
        }
        Some("perms") => {
            let (name, perms) = name_and_permissions(rest, "role perms <name> <perm,perm,...>")?;
            context.mutate(Permission::CreateRoles, |ws, _, _| {
                let id = lookup::role(ws, &name)?;
                AccessService::set_permissions(ws, id, perms)
            })?;
            output::success(format!("Permissions of `{}` updated.", name));
            Ok(())
        }
        Some("delete") => {
            let name = rest
                .first()
                .ok_or_else(|| CommandError::usage("usage: role delete <name>"))?;
            context.mutate(Permission::CreateRoles, |ws, _, _| {
                let id = lookup::role(ws, name)?;
                AccessService::delete_role(ws, id)
            })?;
            output::success(format!("Role `{}` deleted.", name));
            Ok(())
        }
        Some(other) => Err(CommandError::usage(format!("unknown role subcommand `{}`", other))),
    }
}

/// Role names may contain spaces (`HR Manager`); the last argument is the permission list.
fn name_and_permissions(rest: &[&str], usage: &str) -> Result<(String, Vec<Permission>), CommandError> {
    match rest.split_last() {
        Some((perms, name)) if !name.is_empty() => Ok((name.join(" "), parse_permissions(perms)?)),
        _ => Err(CommandError::usage(format!("usage: {}", usage))),
    }
}

fn cmd_user(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    match sub.as_deref() {
        Some("list") | None => {
            let rows = context.read(Permission::ReadRoles, |ws, _| {
                Ok(ws
                    .users
                    .iter()
                    .map(|user| {
                        vec![
                            user.email.clone(),
                            user.name.clone(),
                            ws.role(user.role_id).map(|role| role.name.clone()).unwrap_or_default(),
                            if user.active { "active".into() } else { "disabled".into() },
                            user.approved_devices.len().to_string(),
                        ]
                    })
                    .collect::<Vec<_>>())
            })?;
            let mut table = Table::new(vec![
                TableColumn::left("Email"),
                TableColumn::left("Name"),
                TableColumn::left("Role"),
                TableColumn::left("Status"),
                TableColumn::right("Devices"),
            ]);
            rows.into_iter().for_each(|row| table.push(row));
            table.print_or("No users.");
            Ok(())
        }
        Some("assign") => {
            let (email, role) = match rest {
                [email, role @ ..] if !role.is_empty() => (*email, role.join(" ")),
                _ => return Err(CommandError::usage("usage: user assign <email> <role>")),
            };
            let session = context.session()?;
            context.mutate_as(&session, |ws, session, _| {
                let user_id = lookup::user(ws, email)?;
                let role_id = lookup::role(ws, &role)?;
                AccessService::assign_role(ws, session, user_id, role_id)
            })?;
            output::success(format!("{} now has role `{}`.", email, role));
            Ok(())
        }
        Some(action @ ("disable" | "enable")) => {
            let email = rest
                .first()
                .ok_or_else(|| CommandError::usage(format!("usage: user {} <email>", action)))?;
            let active = action == "enable";
            let session = context.authorize(Permission::CreateRoles)?;
            context.mutate_as(&session, |ws, session, _| {
                let user_id = lookup::user(ws, email)?;
                if user_id == session.user_id && !active {
                    return Err(CoreError::InvalidOperation(
                        "you cannot disable your own account".into(),
                    ));
                }
                AccessService::set_user_active(ws, user_id, active)
            })?;
            output::success(format!("User {} {}d.", email, action));
            Ok(())
        }
        Some(other) => Err(CommandError::usage(format!("unknown user subcommand `{}`", other))),
    }
}

fn cmd_invite(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    match sub.as_deref() {
        Some("create") => {
            let args = Args::parse(rest)?;
            let role = args
                .rest(0)
                .ok_or_else(|| CommandError::usage("usage: invite create <role> [--email <address>]"))?;
            let email = args.flag("email");
            let base_url = context.config.auth.invite_base_url.clone();
            let ttl = Duration::hours(context.config.auth.invite_ttl_hours);
            let session = context.session()?;
            let link = context.mutate_as(&session, |ws, session, clock| {
                let role_id = lookup::role(ws, &role)?;
                AccessService::generate_invite(ws, session, role_id, email, &base_url, ttl, clock)
            })?;
            output::success(format!("Invite for role `{}` created.", role));
            output::info(link.url);
            output::hint(format!(
                "The link is single use and expires in {} hours.",
                ttl.num_hours()
            ));
            Ok(())
        }
        Some("list") | None => {
            let now = context.clock.now();
            let rows = context.read(Permission::GenerateInviteLinks, |ws, _| {
                Ok(ws
                    .invites
                    .iter()
                    .map(|invite| {
                        let state = if invite.is_accepted() {
                            "accepted"
                        } else if invite.is_expired(now) {
                            "expired"
                        } else {
                            "open"
                        };
                        vec![
                            lookup::short(invite.id),
                            ws.role(invite.role_id).map(|role| role.name.clone()).unwrap_or_default(),
                            invite.email.clone().unwrap_or_else(|| "-".into()),
                            invite.expires_at.format("%Y-%m-%d %H:%M").to_string(),
                            state.to_string(),
                        ]
                    })
                    .collect::<Vec<_>>())
            })?;
            let mut table = Table::new(vec![
                TableColumn::left("Id"),
                TableColumn::left("Role"),
                TableColumn::left("Email"),
                TableColumn::left("Expires"),
                TableColumn::left("State"),
            ]);
            rows.into_iter().for_each(|row| table.push(row));
            table.print_or("No invites.");
            Ok(())
        }
        Some("accept") => {
            let (token, name, email) = match rest {
                [token, name, email, ..] => (*token, *name, *email),
                _ => {
                    return Err(CommandError::usage(
                        "usage: invite accept <token|url> <name> <email> [password]",
                    ))
                }
            };
            let password = context.secret(rest.get(3).copied(), "password")?;
            let device = context.device_id.clone();
            let policy = context.policy();
            let outcome = context.mutate_open(|ws, clock| {
                AccessService::accept_invite(ws, token, name, email, &password, clock)?;
                AuthService::login(ws, email, &password, &device, &policy, clock)
            })?;
            context.set_token(Some(outcome.token));
            output::success(format!("Welcome, {}. You are logged in.", name));
            Ok(())
        }
        Some(other) => Err(CommandError::usage(format!("unknown invite subcommand `{}`", other))),
    }
}
