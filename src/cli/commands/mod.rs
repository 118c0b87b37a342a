use std::collections::HashMap;

pub mod access;
pub mod auth;
pub mod config;
pub mod finance;
pub mod hr;
pub mod leasing;
pub mod property;
pub mod report;
pub mod sales;
pub mod support;
pub mod system;
pub mod workspace;

use super::context::{CommandResult, ShellContext};

pub(crate) fn all_definitions() -> Vec<CommandDefinition> {
    let mut commands = Vec::new();
    commands.extend(system::definitions());
    commands.extend(workspace::definitions());
    commands.extend(auth::definitions());
    commands.extend(access::definitions());
    commands.extend(config::definitions());
    commands.extend(property::definitions());
    commands.extend(leasing::definitions());
    commands.extend(finance::definitions());
    commands.extend(sales::definitions());
    commands.extend(hr::definitions());
    commands.extend(support::definitions());
    commands.extend(report::definitions());
    commands
}

pub type CommandHandler = fn(&mut ShellContext, &[&str]) -> CommandResult;

#[derive(Clone)]
pub struct CommandDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub usage: &'static str,
    pub handler: CommandHandler,
}

impl CommandDefinition {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        usage: &'static str,
        handler: CommandHandler,
    ) -> Self {
        Self {
            name,
            description,
            usage,
            handler,
        }
    }

    /// Second words of the usage lines, e.g. `create`, `post` for `voucher`.
    pub fn subcommands(&self) -> Vec<&'static str> {
        let mut words: Vec<&'static str> = self
            .usage
            .lines()
            .filter_map(|line| {
                let mut parts = line.split_whitespace();
                (parts.next() == Some(self.name)).then(|| parts.next()).flatten()
            })
            .filter(|word| !word.starts_with(['<', '[', '-']))
            .flat_map(|word| word.split('|'))
            .collect();
        words.sort_unstable();
        words.dedup();
        words
    }
}

pub struct CommandRegistry {
    commands: HashMap<&'static str, CommandDefinition>,
    order: Vec<&'static str>,
}

impl CommandRegistry {
    pub fn new(definitions: Vec<CommandDefinition>) -> Self {
        let mut commands = HashMap::new();
        let mut order = Vec::new();
        for definition in definitions {
            order.push(definition.name);
            commands.insert(definition.name, definition);
        }
        Self { commands, order }
    }

    pub fn get(&self, name: &str) -> Option<&CommandDefinition> {
        self.commands.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CommandDefinition> {
        self.order
            .iter()
            .filter_map(move |name| self.commands.get(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.order.iter().copied()
    }
}

/// Splits `<subcommand> rest...`, lowercasing the subcommand.
pub(crate) fn split_subcommand<'a>(args: &'a [&'a str]) -> (Option<String>, &'a [&'a str]) {
    match args.split_first() {
        Some((first, rest)) => (Some(first.to_ascii_lowercase()), rest),
        None => (None, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_names_are_unique() {
        let definitions = all_definitions();
        let names: std::collections::HashSet<_> =
            definitions.iter().map(|definition| definition.name).collect();
        assert_eq!(names.len(), definitions.len());
        let registry = CommandRegistry::new(definitions);
        assert!(registry.get("voucher").is_some());
        assert!(registry.get("ledger").is_none());
    }

    #[test]
    fn subcommands_come_from_usage_lines() {
        let registry = CommandRegistry::new(all_definitions());
        let voucher = registry.get("voucher").unwrap().subcommands();
        assert_eq!(voucher, ["create", "draft", "list", "post", "remove", "reverse", "show"]);
        assert!(registry.get("version").unwrap().subcommands().is_empty());
    }
}
