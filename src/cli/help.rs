use super::commands::{CommandDefinition, CommandRegistry};
use super::output;

pub fn print_overview(registry: &CommandRegistry) {
    output::section("Available commands");
    for definition in registry.iter() {
        output::info(format!("  {:<12} {}", definition.name, definition.description));
    }
    output::info("Use `help <command>` for details.");
}

pub fn print_command(definition: &CommandDefinition) {
    output::section(format!("Help: {}", definition.name));
    output::info(format!("  Description: {}", definition.description));
    for (index, line) in definition.usage.lines().enumerate() {
        let label = if index == 0 { "  Usage:" } else { "        " };
        output::info(format!("{} {}", label, line.trim()));
    }
}
