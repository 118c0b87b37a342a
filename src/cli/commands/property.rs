use estate_core::{PropertyChanges, PropertyService};
use estate_domain::{Permission, PropertyKind, RecordStatus, Unit, UnitKind, UnitStatus};

use super::{split_subcommand, CommandDefinition};
use crate::cli::args::{parse_amount, parse_label, Args};
use crate::cli::context::{CommandError, CommandResult, ShellContext};
use crate::cli::lookup;
use crate::cli::output;
use crate::cli::table::{page_footer, Table, TableColumn};

pub(crate) fn definitions() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::new(
            "property",
            "Manage properties, blocks, and floors",
            "property add <name> <code> [--address <text>] [--kind residential|commercial|mixed_use]
property list [--search <text>] [--status active|inactive] [--sort name|code] [--page <n>]
property update <property> [--name <text>] [--address <text>] [--kind <kind>] [--status <status>] [--notes <text>]
property remove <property>
property block <property> <code> <name>
property floor <property> <block-code> <level> [name]",
            cmd_property,
        ),
        CommandDefinition::new(
            "unit",
            "Manage rentable and saleable units",
            "unit add <property> <number> [--kind <kind>] [--rent <amount>] [--area <sqft>] [--block <code> --floor <level>]
unit list [property] [--status <status>] [--search <text>] [--min <rent>] [--max <rent>] [--page <n>]
unit status <unit> <available|reserved|occupied|sold|maintenance>
unit rent <unit> <amount>
unit remove <unit>
unit occupancy",
            cmd_unit,
        ),
    ]
}

fn cmd_property(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let args = Args::parse(rest)?;
    match sub.as_deref() {
        Some("add") => {
            let name = args.required(0, "name")?;
            let code = args.required(1, "code")?;
            let address = args.flag("address").unwrap_or_default();
            let kind = args.flag_parsed::<PropertyKind>("kind")?.unwrap_or_default();
            let id = context.mutate(Permission::ManageProperties, |ws, _, _| {
                PropertyService::add_property(ws, name, code, address, kind)
            })?;
            let tid = context.manager.with_current(|ws| ws.property(id).map(|p| p.tid.to_string()))?;
            output::success(format!("Property {} added.", tid.unwrap_or_default()));
            Ok(())
        }
        Some("list") | None => {
            let filter = args.filter_state()?;
            context.read(Permission::ViewProperties, |ws, _| {
                let page = filter.apply(&ws.properties);
                let mut table = Table::new(vec![
                    TableColumn::left("Ref"),
                    TableColumn::left("Code"),
                    TableColumn::left("Name"),
                    TableColumn::left("Kind"),
                    TableColumn::left("Status"),
                    TableColumn::right("Units"),
                    TableColumn::left("Address"),
                ]);
                for property in &page.items {
                    table.push(vec![
                        property.tid.to_string(),
                        property.code.clone(),
                        property.name.clone(),
                        property.kind.to_string(),
                        property.status.to_string(),
                        PropertyService::units_of(ws, property.id).len().to_string(),
                        property.address.clone(),
                    ]);
                }
                table.print_or("No properties match.");
                page_footer(&page);
                Ok(())
            })
        }
        Some("update") => {
            let key = args.required(0, "property")?;
            let changes = PropertyChanges {
                name: args.flag("name").map(str::to_string),
                address: args.flag("address").map(str::to_string),
                kind: args.flag_parsed::<PropertyKind>("kind")?,
                status: args.flag_parsed::<RecordStatus>("status")?,
                notes: args.flag("notes").map(str::to_string),
            };
            context.mutate(Permission::ManageProperties, |ws, _, _| {
                let id = lookup::property(ws, key)?;
                PropertyService::update_property(ws, id, changes)
            })?;
            output::success(format!("Property {} updated.", key));
            Ok(())
        }
        Some("remove") => {
            let key = args.required(0, "property")?;
            context.mutate(Permission::ManageProperties, |ws, _, _| {
                let id = lookup::property(ws, key)?;
                PropertyService::remove_property(ws, id)
            })?;
            output::success(format!("Property {} removed.", key));
            Ok(())
        }
        Some("block") => {
            let key = args.required(0, "property")?;
            let code = args.required(1, "code")?;
            let name = args.rest(2).unwrap_or_else(|| format!("Block {}", code));
            context.mutate(Permission::ManageProperties, |ws, _, _| {
                let property_id = lookup::property(ws, key)?;
                PropertyService::add_block(ws, property_id, &name, code)
            })?;
            output::success(format!("Block {} added to {}.", code, key));
            Ok(())
        }
        Some("floor") => {
            let key = args.required(0, "property")?;
            let block = args.required(1, "block-code")?;
            let level: i32 = args
                .required(2, "level")?
                .parse()
                .map_err(|_| CommandError::usage("floor level must be a whole number"))?;
            let name = args.rest(3).unwrap_or_else(|| format!("Level {}", level));
            context.mutate(Permission::ManageProperties, |ws, _, _| {
                let property_id = lookup::property(ws, key)?;
                let block_id = lookup::block(ws, property_id, block)?;
                PropertyService::add_floor(ws, block_id, &name, level)
            })?;
            output::success(format!("Floor {} added to block {}.", level, block));
            Ok(())
        }
        Some(other) => Err(CommandError::usage(format!(
            "unknown property subcommand `{}`",
            other
        ))),
    }
}

fn cmd_unit(context: &mut ShellContext, args: &[&str]) -> CommandResult {
    let (sub, rest) = split_subcommand(args);
    let args = Args::parse(rest)?;
    match sub.as_deref() {
        Some("add") => {
            let key = args.required(0, "property")?;
            let number = args.required(1, "number")?;
            let kind = args.flag_parsed::<UnitKind>("kind")?.unwrap_or_default();
            let rent = args.flag_amount("rent")?;
            let area = args.flag_amount("area")?;
            let placement = match (args.flag("block"), args.flag("floor")) {
                (Some(block), Some(floor)) => Some((block, floor)),
                (None, None) => None,
                _ => return Err(CommandError::usage("--block and --floor go together")),
            };
            context.mutate(Permission::ManageProperties, |ws, _, _| {
                let property_id = lookup::property(ws, key)?;
                let mut unit = Unit::new(property_id, number, kind);
                if let Some((block, floor)) = placement {
                    let block_id = lookup::block(ws, property_id, block)?;
                    let floor_id = lookup::floor(ws, block_id, floor)?;
                    unit = unit.on_floor(block_id, floor_id);
                }
                if let Some(rent) = rent {
                    unit = unit.with_rent(rent);
                }
                unit.area_sqft = area;
                PropertyService::add_unit(ws, unit)
            })?;
            output::success(format!("Unit {}/{} added.", key.to_ascii_uppercase(), number));
            Ok(())
        }
        Some("list") | None => {
            let filter = args.filter_state()?;
            let scope = args.get(0);
            let currency = context.currency();
            context.read(Permission::ViewProperties, |ws, _| {
                let property_id = scope.map(|key| lookup::property(ws, key)).transpose()?;
                let units = ws
                    .units
                    .iter()
                    .filter(|unit| property_id.map_or(true, |id| unit.property_id == id));
                let page = filter.apply(units);
                let mut table = Table::new(vec![
                    TableColumn::left("Unit"),
                    TableColumn::left("Kind"),
                    TableColumn::left("Status"),
                    TableColumn::right("Rent"),
                    TableColumn::right("Area"),
                ]);
                for unit in &page.items {
                    table.push(vec![
                        lookup::unit_label(ws, unit.id),
                        unit.kind.to_string(),
                        unit.status.to_string(),
                        unit.monthly_rent
                            .map(|rent| output::money(rent, &currency))
                            .unwrap_or_else(|| "-".into()),
                        unit.area_sqft.map(|area| format!("{:.0}", area)).unwrap_or_else(|| "-".into()),
                    ]);
                }
                table.print_or("No units match.");
                page_footer(&page);
                Ok(())
            })
        }
        Some("status") => {
            let key = args.required(0, "unit")?;
            let status: UnitStatus = parse_label(args.required(1, "status")?)?;
            context.mutate(Permission::ManageProperties, |ws, _, _| {
                let id = lookup::unit(ws, key)?;
                PropertyService::set_unit_status(ws, id, status)
            })?;
            output::success(format!("Unit {} is now {}.", key, status));
            Ok(())
        }
        Some("rent") => {
            let key = args.required(0, "unit")?;
            let rent = parse_amount("rent", args.required(1, "amount")?)?;
            context.mutate(Permission::ManageProperties, |ws, _, _| {
                let id = lookup::unit(ws, key)?;
                PropertyService::set_unit_rent(ws, id, rent)
            })?;
            output::success(format!("Rent for {} set to {:.2}.", key, rent));
            Ok(())
        }
        Some("remove") => {
            let key = args.required(0, "unit")?;
            context.mutate(Permission::ManageProperties, |ws, _, _| {
                let id = lookup::unit(ws, key)?;
                PropertyService::remove_unit(ws, id)
            })?;
            output::success(format!("Unit {} removed.", key));
            Ok(())
        }
        Some("occupancy") => {
            let summary = context.read(Permission::ViewProperties, |ws, _| Ok(PropertyService::occupancy(ws)))?;
            output::section("Occupancy");
            for (status, count) in &summary.by_status {
                output::info(format!("  {:<12} {:>5}", status.to_string(), count));
            }
            output::info(format!("  {:<12} {:>5}", "total", summary.total_units));
            output::info(format!("  Occupancy rate: {:.1}%", summary.occupancy_rate * 100.0));
            Ok(())
        }
        Some(other) => Err(CommandError::usage(format!("unknown unit subcommand `{}`", other))),
    }
}
