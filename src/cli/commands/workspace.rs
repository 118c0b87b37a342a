use std::path::Path;

use estate_core::{storage::workspace_warnings, AccessService, AuthService, CoreError};
use estate_domain::{Permission, ADMIN_ROLE};
use tracing::warn;

use super::{split_subcommand, CommandDefinition};
use crate::cli::args::Args;
use crate::cli::context::{CommandError, CommandResult, ShellContext};
use crate::cli::output;
use crate::cli::table::{Table, TableColumn};

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![CommandDefinition::new(
        "workspace",
        "Create, open, save, and back up workspaces",
        "workspace new <name> <admin-email> [password] [--admin-name <name>]
workspace open <name|path>
workspace list | save [name] | close | delete <name> | warnings
workspace backup [note] | backups | restore <n|file>",
        cmd_workspace,
    )]
}

fn cmd_workspace(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    match sub.as_deref() {
        Some("new") => create(context, rest),
        Some("open") => open(context, rest),
        Some("list") | None => list(context),
        Some("save") => save(context, rest),
        Some("close") => close(context),
        Some("delete") => delete(context, rest),
        Some("warnings") => warnings(context),
        Some("backup") => backup(context, rest),
        Some("backups") => backups(context),
        Some("restore") => restore(context, rest),
        Some(other) => Err(CommandError::usage(format!(
            "unknown workspace subcommand `{}`",
            other
        ))),
    }
}

/// Creates the workspace, registers its first administrator, and logs them in.
fn create(context: &mut ShellContext, rest: &[&str]) -> CommandResult {
    let args = Args::parse(rest)?;
    let name = args.required(0, "name")?;
    let email = args.required(1, "admin-email")?;
    let password = context.secret(args.get(2), "password")?;
    let admin_name = args.flag("admin-name").unwrap_or("Administrator").to_string();

    context.manager.create(name)?;
    context.set_token(None);
    let device = context.device_id.clone();
    let policy = context.policy();
    let registered = context.mutate_open(|ws, clock| {
        let role_id = ws
            .role_by_name(ADMIN_ROLE)
            .map(|role| role.id)
            .ok_or_else(|| CoreError::not_found("Role", ADMIN_ROLE))?;
        AccessService::register_user(ws, &admin_name, email, &password, role_id, clock)?;
        AuthService::login(ws, email, &password, &device, &policy, clock)
    });
    let outcome = match registered {
        Ok(outcome) => outcome,
        Err(err) => {
            // A workspace without an administrator cannot be used; drop it.
            context.manager.close();
            if let Err(cleanup) = context.manager.storage().delete_workspace(name) {
                warn!(workspace = %name, error = %cleanup, "could not remove half-created workspace");
            }
            return Err(err);
        }
    };
    context.set_token(Some(outcome.token));
    remember(context, name)?;
    output::success(format!(
        "Workspace `{}` created; logged in as {}.",
        name,
        email.to_ascii_lowercase()
    ));
    Ok(())
}

fn open(context: &mut ShellContext, rest: &[&str]) -> CommandResult {
    let target = rest
        .first()
        .ok_or_else(|| CommandError::usage("usage: workspace open <name|path>"))?;
    let path = Path::new(target);
    context.set_token(None);
    let report = if path.extension().is_some_and(|ext| ext == "json") && path.exists() {
        context.manager.load_from_path(path)?
    } else {
        context.manager.load(target)?
    };
    context.report_load(&report);
    if let Some(name) = &report.name {
        remember(context, name)?;
    }
    output::success(format!("Workspace `{}` opened.", target));
    output::hint("Use `login <email> [password]` to start a session.");
    Ok(())
}

fn remember(context: &mut ShellContext, name: &str) -> CommandResult {
    if context.config.default_workspace.as_deref() != Some(name) {
        context.config.default_workspace = Some(name.to_string());
        context.persist_config()?;
    }
    Ok(())
}

fn list(context: &mut ShellContext) -> CommandResult {
    let workspaces = context.catalog.list_workspace_metadata()?;
    if workspaces.is_empty() {
        output::info("No workspaces yet.");
        return Ok(());
    }
    let mut table = Table::new(vec![
        TableColumn::left("Name"),
        TableColumn::right("Properties"),
        TableColumn::right("Units"),
        TableColumn::right("Vouchers"),
        TableColumn::right("Users"),
        TableColumn::right("Receivables"),
        TableColumn::left("Updated"),
    ]);
    for meta in workspaces {
        table.push(vec![
            meta.name,
            meta.property_count.to_string(),
            meta.unit_count.to_string(),
            meta.voucher_count.to_string(),
            meta.user_count.to_string(),
            format!("{:.2}", meta.outstanding_receivables),
            meta.updated_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    table.print();
    Ok(())
}

fn save(context: &mut ShellContext, rest: &[&str]) -> CommandResult {
    context.session()?;
    match rest.first() {
        Some(name) => {
            context.manager.save_as(name)?;
            output::success(format!("Workspace saved as `{}`.", name));
        }
        None => {
            context.manager.save()?;
            output::success("Workspace saved.");
        }
    }
    Ok(())
}

fn close(context: &mut ShellContext) -> CommandResult {
    if !context.manager.is_open() {
        return Err(CommandError::WorkspaceNotOpen);
    }
    context.manager.close();
    context.set_token(None);
    output::info("Workspace closed.");
    Ok(())
}

fn delete(context: &mut ShellContext, rest: &[&str]) -> CommandResult {
    let name = rest
        .first()
        .ok_or_else(|| CommandError::usage("usage: workspace delete <name>"))?;
    if context.manager.current_name() == Some(*name) {
        return Err(CommandError::usage("close the workspace before deleting it"));
    }
    if !context.confirm(&format!("Delete workspace `{}`?", name))? {
        output::info("Operation cancelled.");
        return Ok(());
    }
    context.manager.storage().delete_workspace(name)?;
    if context.config.default_workspace.as_deref() == Some(*name) {
        context.config.default_workspace = None;
        context.persist_config()?;
    }
    output::success(format!("Workspace `{}` deleted.", name));
    Ok(())
}

fn warnings(context: &mut ShellContext) -> CommandResult {
    let warnings = context.manager.with_current(workspace_warnings)?;
    if warnings.is_empty() {
        output::success("No integrity warnings.");
    }
    for warning in warnings {
        output::warning(warning);
    }
    Ok(())
}

fn backup(context: &mut ShellContext, rest: &[&str]) -> CommandResult {
    context.session()?;
    let note = (!rest.is_empty()).then(|| rest.join(" "));
    let info = context.manager.backup(note.as_deref())?;
    output::success(format!("Backup written: {}", info.id));
    Ok(())
}

fn backups(context: &mut ShellContext) -> CommandResult {
    let backups = context.manager.list_backups()?;
    if backups.is_empty() {
        output::info("No backups yet.");
        return Ok(());
    }
    let mut table = Table::new(vec![
        TableColumn::right("#"),
        TableColumn::left("Created"),
        TableColumn::left("File"),
    ]);
    for (index, info) in backups.iter().enumerate() {
        table.push(vec![
            (index + 1).to_string(),
            info.created_at.clone(),
            info.id.clone(),
        ]);
    }
    table.print();
    Ok(())
}

fn restore(context: &mut ShellContext, rest: &[&str]) -> CommandResult {
    let reference = rest
        .first()
        .ok_or_else(|| CommandError::usage("usage: workspace restore <n|file>"))?;
    context.authorize(Permission::CreateRoles)?;
    if !context.confirm("Replace the open workspace with this backup?")? {
        output::info("Operation cancelled.");
        return Ok(());
    }
    let report = context.manager.restore(reference)?;
    context.report_load(&report);
    // Tokens are signed with the workspace key, which the backup may not share.
    if context.session().is_err() {
        context.set_token(None);
        output::hint("Session ended; log in again.");
    }
    output::success(format!("Restored backup {}.", reference));
    Ok(())
}
