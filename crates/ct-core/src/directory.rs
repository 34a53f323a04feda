//! Read-only technician and building directories.
//!
//! Both directories are lookups owned by the hosting system; the board and
//! assignment flows only ever read from them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::store::StoreError;

/// A technician who can be assigned tickets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Technician {
    pub id: u64,
    pub name: String,
    /// Trade specialty, e.g. `plumbing` or `electrical`.
    pub specialty: String,
    /// The default technician receives tickets nobody claims.
    pub is_default: bool,
    /// Buildings this technician covers.
    #[serde(default)]
    pub buildings: Vec<u64>,
}

impl Technician {
    pub fn covers_building(&self, building_id: u64) -> bool {
        self.buildings.contains(&building_id)
    }
}

/// A managed building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Building {
    pub id: u64,
    pub name: String,
    pub address: String,
}

/// Read-only technician lookups.
#[async_trait]
pub trait TechnicianDirectory: Send + Sync {
    async fn get(&self, id: u64) -> Result<Option<Technician>, StoreError>;

    async fn list(&self) -> Result<Vec<Technician>, StoreError>;

    /// The lead (default) technician covering the given building, if any.
    async fn default_for_building(&self, building_id: u64)
        -> Result<Option<Technician>, StoreError>;
}

/// Read-only building lookups.
#[async_trait]
pub trait BuildingDirectory: Send + Sync {
    async fn get(&self, id: u64) -> Result<Option<Building>, StoreError>;

    async fn list(&self) -> Result<Vec<Building>, StoreError>;
}

/// In-memory TechnicianDirectory seeded at startup.
#[derive(Debug, Clone, Default)]
pub struct MemoryTechnicianDirectory {
    technicians: Vec<Technician>,
}

impl MemoryTechnicianDirectory {
    pub fn new(technicians: Vec<Technician>) -> Self {
        Self { technicians }
    }
}

#[async_trait]
impl TechnicianDirectory for MemoryTechnicianDirectory {
    async fn get(&self, id: u64) -> Result<Option<Technician>, StoreError> {
        Ok(self.technicians.iter().find(|t| t.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Technician>, StoreError> {
        Ok(self.technicians.clone())
    }

    async fn default_for_building(
        &self,
        building_id: u64,
    ) -> Result<Option<Technician>, StoreError> {
        Ok(self
            .technicians
            .iter()
            .find(|t| t.is_default && t.covers_building(building_id))
            .cloned())
    }
}

/// In-memory BuildingDirectory seeded at startup.
#[derive(Debug, Clone, Default)]
pub struct MemoryBuildingDirectory {
    buildings: Vec<Building>,
}

impl MemoryBuildingDirectory {
    pub fn new(buildings: Vec<Building>) -> Self {
        Self { buildings }
    }
}

#[async_trait]
impl BuildingDirectory for MemoryBuildingDirectory {
    async fn get(&self, id: u64) -> Result<Option<Building>, StoreError> {
        Ok(self.buildings.iter().find(|b| b.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Building>, StoreError> {
        Ok(self.buildings.clone())
    }
}
