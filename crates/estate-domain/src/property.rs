//! Domain types describing the physical portfolio: properties, blocks, floors, and units.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::*;

/// A managed building or compound.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Property {
    pub id: Uuid,
    pub tid: Tid,
    pub name: String,
    pub code: String,
    pub address: String,
    pub kind: PropertyKind,
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Property {
    pub fn new(
        tid: Tid,
        name: impl Into<String>,
        code: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tid,
            name: name.into(),
            code: code.into(),
            address: address.into(),
            kind: PropertyKind::Residential,
            status: RecordStatus::Active,
            notes: None,
        }
    }

    pub fn with_kind(mut self, kind: PropertyKind) -> Self {
        self.kind = kind;
        self
    }
}

impl Identifiable for Property {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Property {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Displayable for Property {
    fn display_label(&self) -> String {
        format!("{} {} ({})", self.tid, self.name, self.code)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    #[default]
    Residential,
    Commercial,
    MixedUse,
}

crate::labelled_enum!(PropertyKind {
    Residential => "residential",
    Commercial => "commercial",
    MixedUse => "mixed_use",
});

/// A building block within a property.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub id: Uuid,
    pub property_id: Uuid,
    pub name: String,
    pub code: String,
    pub status: RecordStatus,
}

impl Block {
    pub fn new(property_id: Uuid, name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            property_id,
            name: name.into(),
            code: code.into(),
            status: RecordStatus::Active,
        }
    }
}

impl Identifiable for Block {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Block {
    fn name(&self) -> &str {
        &self.name
    }
}

/// A floor inside a block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Floor {
    pub id: Uuid,
    pub block_id: Uuid,
    pub name: String,
    pub level: i32,
    pub status: RecordStatus,
}

impl Floor {
    pub fn new(block_id: Uuid, name: impl Into<String>, level: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            block_id,
            name: name.into(),
            level,
            status: RecordStatus::Active,
        }
    }
}

impl Identifiable for Floor {
    fn id(&self) -> Uuid {
        self.id
    }
}

/// A rentable or sellable unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Unit {
    pub id: Uuid,
    pub property_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor_id: Option<Uuid>,
    pub unit_number: String,
    pub name: String,
    pub kind: UnitKind,
    pub status: UnitStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_sqft: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_rent: Option<f64>,
}

impl Unit {
    pub fn new(property_id: Uuid, unit_number: impl Into<String>, kind: UnitKind) -> Self {
        let unit_number = unit_number.into();
        Self {
            id: Uuid::new_v4(),
            property_id,
            block_id: None,
            floor_id: None,
            name: format!("Unit {}", unit_number),
            unit_number,
            kind,
            status: UnitStatus::Available,
            area_sqft: None,
            monthly_rent: None,
        }
    }

    pub fn on_floor(mut self, block_id: Uuid, floor_id: Uuid) -> Self {
        self.block_id = Some(block_id);
        self.floor_id = Some(floor_id);
        self
    }

    pub fn with_rent(mut self, monthly_rent: f64) -> Self {
        self.monthly_rent = Some(monthly_rent);
        self
    }
}

impl Identifiable for Unit {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl NamedEntity for Unit {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Displayable for Unit {
    fn display_label(&self) -> String {
        format!("{} [{}] {}", self.name, self.kind, self.status)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    #[default]
    Residential,
    Commercial,
    Parking,
    Storage,
}

crate::labelled_enum!(UnitKind {
    Residential => "residential",
    Commercial => "commercial",
    Parking => "parking",
    Storage => "storage",
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Available,
    Reserved,
    Occupied,
    Sold,
    Maintenance,
}

crate::labelled_enum!(UnitStatus {
    Available => "available",
    Reserved => "reserved",
    Occupied => "occupied",
    Sold => "sold",
    Maintenance => "maintenance",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_status_parses_loosely() {
        assert_eq!("Occupied".parse::<UnitStatus>(), Ok(UnitStatus::Occupied));
        assert_eq!(" sold ".parse::<UnitStatus>(), Ok(UnitStatus::Sold));
        assert!("vacant".parse::<UnitStatus>().is_err());
        assert_eq!("mixed-use".parse::<PropertyKind>(), Ok(PropertyKind::MixedUse));
    }

    #[test]
    fn unit_serializes_status_in_snake_case() {
        let unit = Unit::new(Uuid::new_v4(), "101", UnitKind::Residential);
        let json = serde_json::to_value(&unit).unwrap();
        assert_eq!(json["status"], "available");
        assert_eq!(json["name"], "Unit 101");
        assert!(json.get("block_id").is_none());
    }
}
