//! Rows as the API returns them. JSON uses camelCase field names.

use crate::catalog::{
    Cost, EventKind, ResearchBranch, ResourceKind, Severity, StructureKind, Technology,
    TradeStatus, UnitKind,
};
use crate::territory::Coord;
use serde::{Deserialize, Serialize};

pub use nationgrid_protocol::ResourceBundle;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub capital_city_name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    pub id: String,
    pub country_id: String,
    pub money: f64,
    pub population: i64,
    pub research_points: f64,
    pub manpower: i64,
    pub stability: f64,
    pub oil: f64,
    pub minerals: f64,
    pub materials: f64,
    pub food: f64,
    pub uranium: f64,
    pub economic_strength: f64,
    pub last_updated: String,
}

impl Resources {
    pub fn get(&self, kind: ResourceKind) -> f64 {
        match kind {
            ResourceKind::Money => self.money,
            ResourceKind::Population => self.population as f64,
            ResourceKind::ResearchPoints => self.research_points,
            ResourceKind::Manpower => self.manpower as f64,
            ResourceKind::Stability => self.stability,
            ResourceKind::Oil => self.oil,
            ResourceKind::Minerals => self.minerals,
            ResourceKind::Materials => self.materials,
            ResourceKind::Food => self.food,
            ResourceKind::Uranium => self.uranium,
            ResourceKind::EconomicStrength => self.economic_strength,
        }
    }

    /// First resource in `order` the nation cannot cover.
    pub fn shortfall(&self, cost: &Cost, order: &[ResourceKind]) -> Option<ResourceKind> {
        order.iter().copied().find(|&k| {
            let need = cost.get(k);
            need > 0.0 && self.get(k) < need
        })
    }

    pub fn debit(&mut self, cost: &Cost) {
        self.money -= cost.money;
        self.materials -= cost.materials;
        self.food -= cost.food;
        self.oil -= cost.oil;
        self.uranium -= cost.uranium;
        self.manpower -= cost.manpower;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Territory {
    pub id: String,
    pub country_id: String,
    pub x: i64,
    pub y: i64,
    pub city_name: Option<String>,
}

impl Territory {
    pub fn coord(&self) -> Coord {
        Coord::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Structure {
    pub id: String,
    pub territory_id: String,
    #[serde(rename = "type")]
    pub kind: StructureKind,
    pub level: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: String,
    pub country_id: String,
    #[serde(rename = "type")]
    pub kind: UnitKind,
    pub quantity: i64,
    pub current_territory_id: Option<String>,
    pub target_territory_id: Option<String>,
    pub movement_progress: f64,
    pub movement_speed: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Research {
    pub id: String,
    pub country_id: String,
    pub branch: ResearchBranch,
    pub technology: Technology,
    pub level: i64,
    pub in_progress: bool,
    pub progress: f64,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub from_country_id: String,
    pub to_country_id: String,
    pub offer_resources: ResourceBundle,
    pub request_resources: ResourceBundle,
    pub status: TradeStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NationEvent {
    pub id: String,
    pub country_id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub severity: Severity,
    pub message: String,
    pub created_at: String,
}

/// Everything created by a successful signup.
#[derive(Debug, Clone, Serialize)]
pub struct Nation {
    pub user: User,
    pub country: Country,
    pub resources: Resources,
    pub territories: Vec<Territory>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resources() -> Resources {
        Resources {
            id: "res-1".into(),
            country_id: "cty-1".into(),
            money: 10_000.0,
            population: 500_000,
            research_points: 0.0,
            manpower: 200,
            stability: 100.0,
            oil: 0.0,
            minerals: 0.0,
            materials: 100.0,
            food: 0.0,
            uranium: 0.0,
            economic_strength: 50.0,
            last_updated: String::new(),
        }
    }

    #[test]
    fn shortfall_follows_check_order() {
        use crate::catalog::{StructureKind, STRUCTURE_COST_ORDER};
        let r = resources();
        assert_eq!(r.shortfall(&StructureKind::Bank.cost(), STRUCTURE_COST_ORDER), None);
        // Factory needs 150 materials and 50 oil; materials is checked first.
        assert_eq!(
            r.shortfall(&StructureKind::Factory.cost(), STRUCTURE_COST_ORDER),
            Some(ResourceKind::Materials)
        );
    }

    #[test]
    fn debit_subtracts_every_component() {
        let mut r = resources();
        r.debit(&UnitKind::Infantry.cost().times(2).unwrap());
        assert_eq!(r.manpower, 0);
        assert_eq!(r.money, 8_000.0);
        assert_eq!(r.materials, 100.0);
    }

    #[test]
    fn user_json_hides_password_hash() {
        let u = User {
            id: "usr-1".into(),
            username: "ada".into(),
            password_hash: "$2b$10$abcdefghijklmnopqrstuu".into(),
            created_at: "2026-01-01T00:00:00Z".into(),
        };
        let json = serde_json::to_value(&u).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["username"], "ada");
    }
}
