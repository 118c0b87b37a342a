use estate_config::Config;

use super::{split_subcommand, CommandDefinition};
use crate::cli::context::{CommandError, CommandResult, ShellContext};
use crate::cli::output;

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![CommandDefinition::new(
        "config",
        "View and manage CLI preferences",
        "config [show|set <key> <value>|backup [note]|backups|restore <name>]",
        cmd_config,
    )]
}

fn cmd_config(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    match sub.as_deref() {
        Some("show") | None => show(context),
        Some("set") => {
            let (key, value) = match rest {
                [key, value @ ..] if !value.is_empty() => (key.to_ascii_lowercase(), value.join(" ")),
                [key] if key.eq_ignore_ascii_case("default_workspace") => (key.to_ascii_lowercase(), String::new()),
                _ => {
                    return Err(CommandError::usage(format!(
                        "usage: config set <{}> <value>",
                        Config::KEYS.join("|")
                    )))
                }
            };
            context.config.set(&key, &value)?;
            context.persist_config()?;
            output::success(format!("{} = {}", key, context.config.get(&key)?));
            if key == "backup_retention" {
                output::hint("Workspace backups pick up the new retention on the next start.");
            }
            Ok(())
        }
        Some("backup") => {
            let note = (!rest.is_empty()).then(|| rest.join(" "));
            let name = context.config_manager.backup(&context.config, note.as_deref())?;
            output::success(format!("Configuration backed up to {}.", name));
            Ok(())
        }
        Some("backups") => {
            let backups = context.config_manager.list_backups()?;
            if backups.is_empty() {
                output::info("No configuration backups.");
            }
            for name in backups {
                output::info(format!("  {}", name));
            }
            Ok(())
        }
        Some("restore") => {
            let name = rest
                .first()
                .ok_or_else(|| CommandError::usage("usage: config restore <name>"))?;
            let restored = context.config_manager.restore(name)?;
            context.config = restored;
            context.persist_config()?;
            output::success(format!("Configuration restored from {}.", name));
            Ok(())
        }
        Some(other) => Err(CommandError::usage(format!("unknown config subcommand `{}`", other))),
    }
}

fn show(context: &ShellContext) -> CommandResult {
    output::section("Configuration");
    for key in Config::KEYS {
        let value = context.config.get(key)?;
        let value = if value.is_empty() { "-".to_string() } else { value };
        output::info(format!("  {:<30} {}", key, value));
    }
    output::info(format!("  {:<30} {}", "file", context.config_manager.config_path().display()));
    Ok(())
}
