//! Static game tables: what things are called and what they cost.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {what}")]
pub struct UnknownName {
    pub what: &'static str,
    pub name: String,
}

/// Declares a closed set of snake_case names stored as TEXT in sqlite and sent
/// as strings over the wire.
macro_rules! named_enum {
    ($(#[$meta:meta])* $name:ident, $what:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownName;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(UnknownName { what: $what, name: s.to_string() }),
                }
            }
        }
    };
}

named_enum!(ResourceKind, "resource" {
    Money => "money",
    Population => "population",
    ResearchPoints => "research_points",
    Manpower => "manpower",
    Stability => "stability",
    Oil => "oil",
    Minerals => "minerals",
    Materials => "materials",
    Food => "food",
    Uranium => "uranium",
    EconomicStrength => "economic_strength",
});

impl ResourceKind {
    /// Resources a nation may put into a trade offer.
    pub const TRADABLE: &'static [ResourceKind] = &[
        ResourceKind::Money,
        ResourceKind::Oil,
        ResourceKind::Minerals,
        ResourceKind::Materials,
        ResourceKind::Food,
        ResourceKind::Uranium,
    ];

    /// Human wording used in error messages ("Insufficient research points").
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::ResearchPoints => "research points",
            ResourceKind::EconomicStrength => "economic strength",
            other => other.as_str(),
        }
    }

    pub fn is_tradable(self) -> bool {
        Self::TRADABLE.contains(&self)
    }
}

named_enum!(StructureKind, "structure type" {
    Bank => "bank",
    Farm => "farm",
    PoliticalOffice => "political_office",
    City => "city",
    Factory => "factory",
    MilitaryBase => "military_base",
    OilRig => "oil_rig",
    Mine => "mine",
    ResearchCenter => "research_center",
    MissileSilo => "missile_silo",
    RocketSilo => "rocket_silo",
    NuclearPowerPlant => "nuclear_power_plant",
});

named_enum!(UnitKind, "unit type" {
    Infantry => "infantry",
    SpecialForces => "special_forces",
    Tank => "tank",
    Apc => "apc",
    Aircraft => "aircraft",
    Missile => "missile",
});

named_enum!(ResearchBranch, "research branch" {
    Military => "military",
    Economic => "economic",
    Political => "political",
});

named_enum!(Technology, "technology" {
    BasicInfantry => "basic_infantry",
    SpecialForces => "special_forces",
    Tanks => "tanks",
    Aircraft => "aircraft",
    AdvancedWeapons => "advanced_weapons",
    TacticalDoctrine => "tactical_doctrine",
    NuclearWeapons => "nuclear_weapons",
    BankingSystem => "banking_system",
    IndustrialEfficiency => "industrial_efficiency",
    TradeRoutes => "trade_routes",
    EconomicPolicy => "economic_policy",
    AdvancedManufacturing => "advanced_manufacturing",
    BasicGovernance => "basic_governance",
    Democracy => "democracy",
    Propaganda => "propaganda",
    IntelligenceAgency => "intelligence_agency",
    Diplomacy => "diplomacy",
});

named_enum!(TradeStatus, "trade status" {
    Pending => "pending",
    Accepted => "accepted",
    Rejected => "rejected",
    Cancelled => "cancelled",
});

named_enum!(EventKind, "event type" {
    Coup => "coup",
    Insurgency => "insurgency",
    EconomicCrash => "economic_crash",
});

named_enum!(Severity, "severity" {
    Low => "low",
    Medium => "medium",
    High => "high",
    Critical => "critical",
});

/// Sparse resource bundle. Zero means "not required".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Cost {
    pub money: f64,
    pub materials: f64,
    pub food: f64,
    pub oil: f64,
    pub uranium: f64,
    pub manpower: i64,
}

impl Cost {
    pub fn get(&self, kind: ResourceKind) -> f64 {
        match kind {
            ResourceKind::Money => self.money,
            ResourceKind::Materials => self.materials,
            ResourceKind::Food => self.food,
            ResourceKind::Oil => self.oil,
            ResourceKind::Uranium => self.uranium,
            ResourceKind::Manpower => self.manpower as f64,
            _ => 0.0,
        }
    }

    /// Cost of `quantity` items, or `None` if manpower would overflow.
    pub fn times(&self, quantity: i64) -> Option<Cost> {
        let q = quantity as f64;
        Some(Cost {
            money: self.money * q,
            materials: self.materials * q,
            food: self.food * q,
            oil: self.oil * q,
            uranium: self.uranium * q,
            manpower: self.manpower.checked_mul(quantity)?,
        })
    }
}

/// Order in which a structure's cost is checked; the first shortfall is
/// reported.
pub const STRUCTURE_COST_ORDER: &[ResourceKind] = &[
    ResourceKind::Materials,
    ResourceKind::Money,
    ResourceKind::Food,
    ResourceKind::Oil,
    ResourceKind::Uranium,
];

pub const UNIT_COST_ORDER: &[ResourceKind] = &[
    ResourceKind::Manpower,
    ResourceKind::Money,
    ResourceKind::Materials,
    ResourceKind::Oil,
    ResourceKind::Uranium,
];

impl StructureKind {
    pub fn cost(self) -> Cost {
        let (materials, money) = match self {
            StructureKind::Bank => (100.0, 5_000.0),
            StructureKind::Farm => (50.0, 2_000.0),
            StructureKind::PoliticalOffice => (80.0, 8_000.0),
            StructureKind::City => (200.0, 15_000.0),
            StructureKind::Factory => (150.0, 10_000.0),
            StructureKind::MilitaryBase => (180.0, 12_000.0),
            StructureKind::OilRig => (120.0, 8_000.0),
            StructureKind::Mine => (100.0, 6_000.0),
            StructureKind::ResearchCenter => (200.0, 20_000.0),
            StructureKind::MissileSilo => (300.0, 50_000.0),
            StructureKind::RocketSilo => (350.0, 60_000.0),
            StructureKind::NuclearPowerPlant => (500.0, 100_000.0),
        };
        let mut cost = Cost {
            materials,
            money,
            ..Cost::default()
        };
        match self {
            StructureKind::Farm => cost.food = 20.0,
            StructureKind::City => cost.food = 100.0,
            StructureKind::Factory => cost.oil = 50.0,
            StructureKind::MissileSilo => cost.uranium = 10.0,
            StructureKind::RocketSilo => cost.uranium = 15.0,
            StructureKind::NuclearPowerPlant => cost.uranium = 50.0,
            _ => {}
        }
        cost
    }
}

impl UnitKind {
    /// Cost of a single unit.
    pub fn cost(self) -> Cost {
        let (manpower, money) = match self {
            UnitKind::Infantry => (100, 1_000.0),
            UnitKind::SpecialForces => (50, 5_000.0),
            UnitKind::Tank => (20, 15_000.0),
            UnitKind::Apc => (15, 10_000.0),
            UnitKind::Aircraft => (10, 50_000.0),
            UnitKind::Missile => (5, 100_000.0),
        };
        let mut cost = Cost {
            manpower,
            money,
            ..Cost::default()
        };
        match self {
            UnitKind::Tank => {
                cost.materials = 50.0;
                cost.oil = 20.0;
            }
            UnitKind::Apc => {
                cost.materials = 30.0;
                cost.oil = 15.0;
            }
            UnitKind::Aircraft => {
                cost.materials = 100.0;
                cost.oil = 50.0;
            }
            UnitKind::Missile => {
                cost.materials = 200.0;
                cost.uranium = 10.0;
            }
            UnitKind::Infantry | UnitKind::SpecialForces => {}
        }
        cost
    }

    pub fn movement_speed(self) -> f64 {
        match self {
            UnitKind::Aircraft => 5.0,
            UnitKind::Tank => 2.0,
            _ => 1.0,
        }
    }
}

impl Technology {
    pub fn branch(self) -> ResearchBranch {
        use Technology::*;
        match self {
            BasicInfantry | SpecialForces | Tanks | Aircraft | AdvancedWeapons
            | TacticalDoctrine | NuclearWeapons => ResearchBranch::Military,
            BankingSystem | IndustrialEfficiency | TradeRoutes | EconomicPolicy
            | AdvancedManufacturing => ResearchBranch::Economic,
            BasicGovernance | Democracy | Propaganda | IntelligenceAgency | Diplomacy => {
                ResearchBranch::Political
            }
        }
    }

    /// Research points needed.
    pub fn cost(self) -> f64 {
        use Technology::*;
        match self {
            BasicInfantry => 100.0,
            SpecialForces => 300.0,
            Tanks => 500.0,
            Aircraft => 800.0,
            AdvancedWeapons => 400.0,
            TacticalDoctrine => 600.0,
            NuclearWeapons => 2_000.0,
            BankingSystem => 150.0,
            IndustrialEfficiency => 250.0,
            TradeRoutes => 200.0,
            EconomicPolicy => 350.0,
            AdvancedManufacturing => 500.0,
            BasicGovernance => 100.0,
            Democracy => 300.0,
            Propaganda => 200.0,
            IntelligenceAgency => 400.0,
            Diplomacy => 350.0,
        }
    }
}

impl ResearchBranch {
    /// Technologies filed under this branch, in tech-tree order. Not used by
    /// the request path, which derives the branch from the technology; kept
    /// for clients and tooling that list the tree.
    pub fn technologies(self) -> impl Iterator<Item = Technology> {
        Technology::ALL
            .iter()
            .copied()
            .filter(move |t| t.branch() == self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for k in StructureKind::ALL {
            assert_eq!(k.as_str().parse::<StructureKind>().unwrap(), *k);
        }
        for t in Technology::ALL {
            assert_eq!(t.as_str().parse::<Technology>().unwrap(), *t);
        }
    }

    #[test]
    fn unknown_names_carry_a_readable_message() {
        let err = "castle".parse::<StructureKind>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid structure type");
        let err = "warp_drive".parse::<Technology>().unwrap_err();
        assert_eq!(err.to_string(), "Invalid technology");
    }

    #[test]
    fn structure_costs_match_table() {
        let silo = StructureKind::NuclearPowerPlant.cost();
        assert_eq!(silo.materials, 500.0);
        assert_eq!(silo.money, 100_000.0);
        assert_eq!(silo.uranium, 50.0);
        assert_eq!(StructureKind::Farm.cost().food, 20.0);
        assert_eq!(StructureKind::Bank.cost().oil, 0.0);
    }

    #[test]
    fn unit_cost_scales_with_quantity() {
        let tanks = UnitKind::Tank.cost().times(3).unwrap();
        assert_eq!(tanks.manpower, 60);
        assert_eq!(tanks.money, 45_000.0);
        assert_eq!(tanks.oil, 60.0);
        assert!(UnitKind::Infantry.cost().times(i64::MAX).is_none());
    }

    #[test]
    fn branches_partition_technologies() {
        let total: usize = ResearchBranch::ALL
            .iter()
            .map(|b| b.technologies().count())
            .sum();
        assert_eq!(total, Technology::ALL.len());
        assert_eq!(ResearchBranch::Economic.technologies().count(), 5);
        assert_eq!(Technology::NuclearWeapons.branch(), ResearchBranch::Military);
    }

    #[test]
    fn research_points_label_reads_naturally() {
        assert_eq!(ResourceKind::ResearchPoints.label(), "research points");
        assert_eq!(ResourceKind::Oil.label(), "oil");
        assert!(!ResourceKind::Population.is_tradable());
    }
}
