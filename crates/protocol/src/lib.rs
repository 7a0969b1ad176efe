use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which cached view a client should refetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Invalidation {
    ResourceUpdate,
    TerritoryUpdate,
    StructureUpdate,
    UnitUpdate,
    ResearchUpdate,
    TradeUpdate,
    /// A row was added to the events feed. Only `Engine::record_event`
    /// produces those and no request handler calls it yet, so the server
    /// never sends this and `/api/events` stays empty.
    Event,
}

impl Invalidation {
    /// API path whose cached response becomes stale. Clients map an incoming
    /// frame to the query they must refetch with this.
    pub fn query_path(self) -> &'static str {
        match self {
            Self::ResourceUpdate => paths::RESOURCES,
            Self::TerritoryUpdate => paths::TERRITORIES,
            Self::StructureUpdate => paths::STRUCTURES,
            Self::UnitUpdate => paths::UNITS,
            Self::ResearchUpdate => paths::RESEARCH,
            Self::TradeUpdate => paths::TRADES,
            Self::Event => paths::EVENTS,
        }
    }
}

/// Frame sent over `/ws`. Clients may relay anything JSON; the server only
/// originates frames of this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    #[serde(rename = "type")]
    pub kind: Invalidation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl WsMessage {
    pub fn new(kind: Invalidation) -> Self {
        Self {
            kind,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub country_name: String,
    #[serde(default)]
    pub capital_city_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildStructureInput {
    pub territory_id: String,
    pub structure_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainUnitsInput {
    pub unit_type: String,
    #[serde(default = "one")]
    pub quantity: i64,
}

fn one() -> i64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub technology: String,
}

/// Resource name -> amount. Keys are the snake_case resource names
/// (`money`, `oil`, `food`, ...).
pub type ResourceBundle = BTreeMap<String, f64>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeInput {
    pub to_country_id: String,
    #[serde(default)]
    pub offer: ResourceBundle,
    #[serde(default)]
    pub request: ResourceBundle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevOutput {
    pub rev: i64,
}

/// Routes served by `nationgrid-server`. The router is built from these, and
/// `Invalidation::query_path` points back at them.
pub mod paths {
    pub const HEALTH: &str = "/health";
    pub const REV: &str = "/api/rev";
    pub const SIGNUP: &str = "/api/auth/signup";
    pub const LOGIN: &str = "/api/auth/login";
    pub const LOGOUT: &str = "/api/auth/logout";
    pub const COUNTRY: &str = "/api/country";
    pub const COUNTRIES: &str = "/api/countries";
    pub const WS: &str = "/ws";
    pub const RESOURCES: &str = "/api/resources";
    pub const TERRITORIES: &str = "/api/territories";
    pub const STRUCTURES: &str = "/api/structures";
    pub const UNITS: &str = "/api/units";
    pub const RESEARCH: &str = "/api/research";
    pub const TRADES: &str = "/api/trades";
    pub const EVENTS: &str = "/api/events";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_message_uses_type_tag() {
        let msg = WsMessage::new(Invalidation::StructureUpdate);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "structure_update" }));
    }

    #[test]
    fn signup_input_reads_camel_case() {
        let input: SignupInput = serde_json::from_value(serde_json::json!({
            "username": "ada",
            "password": "pw",
            "countryName": "Freedonia",
            "capitalCityName": "Fredville",
        }))
        .unwrap();
        assert_eq!(input.country_name, "Freedonia");
        assert_eq!(input.capital_city_name, "Fredville");
    }

    #[test]
    fn train_units_defaults_to_one() {
        let input: TrainUnitsInput =
            serde_json::from_value(serde_json::json!({ "unitType": "tank" })).unwrap();
        assert_eq!(input.quantity, 1);
    }

    #[test]
    fn payload_rides_next_to_the_type_tag() {
        let msg = WsMessage::new(Invalidation::TradeUpdate)
            .with_payload(serde_json::json!({ "tradeId": "trd-1" }));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "trade_update");
        assert_eq!(json["payload"]["tradeId"], "trd-1");
        assert_eq!(msg.kind.query_path(), paths::TRADES);
    }
}
