//! Validated mutations for the physical portfolio.

use std::collections::BTreeMap;

use estate_domain::{
    tid_prefix, Block, Floor, Property, PropertyKind, RecordStatus, Unit, UnitStatus, Workspace,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::{CoreError, ServiceResult};

/// Optional field overrides applied by [`PropertyService::update_property`].
#[derive(Debug, Clone, Default)]
pub struct PropertyChanges {
    pub name: Option<String>,
    pub address: Option<String>,
    pub kind: Option<PropertyKind>,
    pub status: Option<RecordStatus>,
    pub notes: Option<String>,
}

/// Unit counts per status for the whole workspace.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OccupancySummary {
    pub total_units: usize,
    pub by_status: BTreeMap<UnitStatus, usize>,
    /// Occupied units over units still on the rental market (everything except sold).
    pub occupancy_rate: f64,
}

pub struct PropertyService;

impl PropertyService {
    pub fn add_property(
        ws: &mut Workspace,
        name: &str,
        code: &str,
        address: &str,
        kind: PropertyKind,
    ) -> ServiceResult<Uuid> {
        let name = required("Property name", name)?;
        let code = required("Property code", code)?;
        if ws
            .properties
            .iter()
            .any(|property| property.code.eq_ignore_ascii_case(&code))
        {
            return Err(CoreError::Conflict(format!(
                "property code `{}` already exists",
                code
            )));
        }
        let tid = ws.next_tid(tid_prefix::PROPERTY);
        let property = Property::new(tid, name, code.to_ascii_uppercase(), address.trim()).with_kind(kind);
        let id = property.id;
        info!(property = %property.tid, "property added");
        ws.properties.push(property);
        ws.touch();
        Ok(id)
    }

    pub fn update_property(
        ws: &mut Workspace,
        id: Uuid,
        changes: PropertyChanges,
    ) -> ServiceResult<()> {
        let name = changes
            .name
            .as_deref()
            .map(|name| required("Property name", name))
            .transpose()?;
        let property = ws
            .properties
            .iter_mut()
            .find(|property| property.id == id)
            .ok_or_else(|| CoreError::not_found("Property", id))?;
        if let Some(name) = name {
            property.name = name;
        }
        if let Some(address) = changes.address {
            property.address = address.trim().to_string();
        }
        if let Some(kind) = changes.kind {
            property.kind = kind;
        }
        if let Some(status) = changes.status {
            property.status = status;
        }
        if changes.notes.is_some() {
            property.notes = changes.notes;
        }
        ws.touch();
        Ok(())
    }

    /// Removes a property that no longer has blocks or units.
    pub fn remove_property(ws: &mut Workspace, id: Uuid) -> ServiceResult<()> {
        if ws.property(id).is_none() {
            return Err(CoreError::not_found("Property", id));
        }
        if ws.blocks.iter().any(|block| block.property_id == id)
            || ws.units.iter().any(|unit| unit.property_id == id)
        {
            return Err(CoreError::InvalidOperation(
                "property still has blocks or units".into(),
            ));
        }
        ws.properties.retain(|property| property.id != id);
        ws.touch();
        Ok(())
    }

    pub fn add_block(
        ws: &mut Workspace,
        property_id: Uuid,
        name: &str,
        code: &str,
    ) -> ServiceResult<Uuid> {
        if ws.property(property_id).is_none() {
            return Err(CoreError::not_found("Property", property_id));
        }
        let name = required("Block name", name)?;
        let code = required("Block code", code)?;
        if ws
            .blocks
            .iter()
            .any(|block| block.property_id == property_id && block.code.eq_ignore_ascii_case(&code))
        {
            return Err(CoreError::Conflict(format!(
                "block code `{}` already exists in this property",
                code
            )));
        }
        let block = Block::new(property_id, name, code.to_ascii_uppercase());
        let id = block.id;
        ws.blocks.push(block);
        ws.touch();
        Ok(id)
    }

    pub fn remove_block(ws: &mut Workspace, id: Uuid) -> ServiceResult<()> {
        if ws.block(id).is_none() {
            return Err(CoreError::not_found("Block", id));
        }
        if ws.floors.iter().any(|floor| floor.block_id == id)
            || ws.units.iter().any(|unit| unit.block_id == Some(id))
        {
            return Err(CoreError::InvalidOperation(
                "block still has floors or units".into(),
            ));
        }
        ws.blocks.retain(|block| block.id != id);
        ws.touch();
        Ok(())
    }

    pub fn add_floor(ws: &mut Workspace, block_id: Uuid, name: &str, level: i32) -> ServiceResult<Uuid> {
        if ws.block(block_id).is_none() {
            return Err(CoreError::not_found("Block", block_id));
        }
        if ws
            .floors
            .iter()
            .any(|floor| floor.block_id == block_id && floor.level == level)
        {
            return Err(CoreError::Conflict(format!(
                "level {} already exists in this block",
                level
            )));
        }
        let name = if name.trim().is_empty() {
            format!("Level {}", level)
        } else {
            name.trim().to_string()
        };
        let floor = Floor::new(block_id, name, level);
        let id = floor.id;
        ws.floors.push(floor);
        ws.touch();
        Ok(id)
    }

    pub fn remove_floor(ws: &mut Workspace, id: Uuid) -> ServiceResult<()> {
        if ws.floor(id).is_none() {
            return Err(CoreError::not_found("Floor", id));
        }
        if ws.units.iter().any(|unit| unit.floor_id == Some(id)) {
            return Err(CoreError::InvalidOperation("floor still has units".into()));
        }
        ws.floors.retain(|floor| floor.id != id);
        ws.touch();
        Ok(())
    }

    /// Adds a unit after checking that its block and floor hang off its property.
    pub fn add_unit(ws: &mut Workspace, unit: Unit) -> ServiceResult<Uuid> {
        Self::validate_unit(ws, &unit)?;
        let id = unit.id;
        info!(unit = %unit.unit_number, "unit added");
        ws.units.push(unit);
        ws.touch();
        Ok(id)
    }

    /// Manual status changes. Occupancy and sale status are owned by leases and sales.
    pub fn set_unit_status(ws: &mut Workspace, id: Uuid, status: UnitStatus) -> ServiceResult<()> {
        if matches!(status, UnitStatus::Occupied | UnitStatus::Sold) {
            return Err(CoreError::InvalidOperation(format!(
                "units become {} through leases and sales",
                status
            )));
        }
        let unit = ws
            .unit_mut(id)
            .ok_or_else(|| CoreError::not_found("Unit", id))?;
        if matches!(unit.status, UnitStatus::Occupied | UnitStatus::Sold) {
            return Err(CoreError::InvalidOperation(format!(
                "unit {} is {} and cannot be changed manually",
                unit.unit_number, unit.status
            )));
        }
        unit.status = status;
        ws.touch();
        Ok(())
    }

    pub fn set_unit_rent(ws: &mut Workspace, id: Uuid, monthly_rent: f64) -> ServiceResult<()> {
        if !monthly_rent.is_finite() || monthly_rent < 0.0 {
            return Err(CoreError::validation("rent must be zero or positive"));
        }
        let unit = ws
            .unit_mut(id)
            .ok_or_else(|| CoreError::not_found("Unit", id))?;
        unit.monthly_rent = Some(monthly_rent);
        ws.touch();
        Ok(())
    }

    pub fn remove_unit(ws: &mut Workspace, id: Uuid) -> ServiceResult<()> {
        if ws.unit(id).is_none() {
            return Err(CoreError::not_found("Unit", id));
        }
        if ws.leases.iter().any(|lease| lease.unit_id == id)
            || ws.sales.iter().any(|sale| sale.unit_id == id)
        {
            return Err(CoreError::InvalidOperation(
                "unit has leases or sales on record".into(),
            ));
        }
        ws.units.retain(|unit| unit.id != id);
        ws.touch();
        Ok(())
    }

    pub fn units_of(ws: &Workspace, property_id: Uuid) -> Vec<&Unit> {
        ws.units
            .iter()
            .filter(|unit| unit.property_id == property_id)
            .collect()
    }

    pub fn occupancy(ws: &Workspace) -> OccupancySummary {
        let mut by_status: BTreeMap<UnitStatus, usize> =
            UnitStatus::ALL.iter().map(|status| (*status, 0)).collect();
        for unit in &ws.units {
            *by_status.entry(unit.status).or_default() += 1;
        }
        let occupied = by_status[&UnitStatus::Occupied];
        let leasable = ws.units.len() - by_status[&UnitStatus::Sold];
        let occupancy_rate = if leasable == 0 {
            0.0
        } else {
            occupied as f64 / leasable as f64
        };
        OccupancySummary {
            total_units: ws.units.len(),
            by_status,
            occupancy_rate,
        }
    }

    fn validate_unit(ws: &Workspace, unit: &Unit) -> ServiceResult<()> {
        if ws.property(unit.property_id).is_none() {
            return Err(CoreError::not_found("Property", unit.property_id));
        }
        required("Unit number", &unit.unit_number)?;
        if ws.units.iter().any(|existing| {
            existing.property_id == unit.property_id
                && existing.unit_number.eq_ignore_ascii_case(unit.unit_number.trim())
        }) {
            return Err(CoreError::Conflict(format!(
                "unit {} already exists in this property",
                unit.unit_number
            )));
        }
        if let Some(block_id) = unit.block_id {
            let block = ws
                .block(block_id)
                .ok_or_else(|| CoreError::not_found("Block", block_id))?;
            if block.property_id != unit.property_id {
                return Err(CoreError::validation("block belongs to another property"));
            }
        }
        if let Some(floor_id) = unit.floor_id {
            let floor = ws
                .floor(floor_id)
                .ok_or_else(|| CoreError::not_found("Floor", floor_id))?;
            if Some(floor.block_id) != unit.block_id {
                return Err(CoreError::validation("floor belongs to another block"));
            }
        }
        if unit.monthly_rent.map_or(false, |rent| !rent.is_finite() || rent < 0.0) {
            return Err(CoreError::validation("rent must be zero or positive"));
        }
        if unit.area_sqft.map_or(false, |area| !area.is_finite() || area <= 0.0) {
            return Err(CoreError::validation("area must be positive"));
        }
        Ok(())
    }
}

pub(crate) fn required(field: &str, value: &str) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(CoreError::Validation(format!("{} cannot be empty", field)))
    } else {
        Ok(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use estate_domain::UnitKind;

    fn workspace_with_block() -> (Workspace, Uuid, Uuid) {
        let mut ws = Workspace::new("Test");
        let property =
            PropertyService::add_property(&mut ws, "Harbor View", "hv", "1 Quay St", PropertyKind::Residential)
                .expect("add property");
        let block = PropertyService::add_block(&mut ws, property, "Block A", "A").expect("add block");
        (ws, property, block)
    }

    #[test]
    fn property_codes_are_unique_ignoring_case() {
        let (mut ws, _, _) = workspace_with_block();
        let err = PropertyService::add_property(&mut ws, "Other", "HV", "", PropertyKind::Commercial)
            .expect_err("duplicate code");
        assert!(matches!(err, CoreError::Conflict(_)), "unexpected error: {err:?}");
        assert_eq!(ws.properties[0].tid.as_str(), "PRP-0001");
    }

    #[test]
    fn floor_must_belong_to_units_block() {
        let (mut ws, property, block) = workspace_with_block();
        let other_block = PropertyService::add_block(&mut ws, property, "Block B", "B").unwrap();
        let floor = PropertyService::add_floor(&mut ws, other_block, "", 1).unwrap();
        let unit = Unit::new(property, "101", UnitKind::Residential).on_floor(block, floor);
        let err = PropertyService::add_unit(&mut ws, unit).expect_err("mismatched floor");
        assert!(matches!(err, CoreError::Validation(ref m) if m.contains("floor")));
    }

    #[test]
    fn removal_refuses_while_children_exist() {
        let (mut ws, property, block) = workspace_with_block();
        assert!(PropertyService::remove_property(&mut ws, property).is_err());
        PropertyService::remove_block(&mut ws, block).expect("empty block removes");
        PropertyService::remove_property(&mut ws, property).expect("empty property removes");
        assert!(ws.properties.is_empty());
    }

    #[test]
    fn occupancy_excludes_sold_units_from_rate() {
        let (mut ws, property, _) = workspace_with_block();
        for number in ["1", "2", "3", "4"] {
            PropertyService::add_unit(&mut ws, Unit::new(property, number, UnitKind::Residential)).unwrap();
        }
        ws.units[0].status = UnitStatus::Occupied;
        ws.units[1].status = UnitStatus::Sold;
        let summary = PropertyService::occupancy(&ws);
        assert_eq!(summary.total_units, 4);
        assert_eq!(summary.by_status[&UnitStatus::Available], 2);
        assert!((summary.occupancy_rate - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn manual_status_cannot_mark_units_occupied() {
        let (mut ws, property, _) = workspace_with_block();
        let unit = PropertyService::add_unit(&mut ws, Unit::new(property, "9", UnitKind::Storage)).unwrap();
        assert!(PropertyService::set_unit_status(&mut ws, unit, UnitStatus::Occupied).is_err());
        PropertyService::set_unit_status(&mut ws, unit, UnitStatus::Maintenance).unwrap();
        assert_eq!(ws.unit(unit).unwrap().status, UnitStatus::Maintenance);
    }
}
