//! Player actions that spend resources or create records.

use crate::catalog::{
    Cost, EventKind, ResearchBranch, ResourceKind, Severity, StructureKind, Technology,
    TradeStatus, UnitKind, STRUCTURE_COST_ORDER, UNIT_COST_ORDER,
};
use crate::model::*;
use crate::rows::{self, EVENT_COLS, RESEARCH_COLS, TRADE_COLS, UNIT_COLS};
use crate::world::{country_by_id, resources_for, territory_by_id};
use crate::{append_event_tx, new_id, now_rfc3339, Engine, GameError, Result};
use rusqlite::{Connection, TransactionBehavior};

/// Newest events returned per nation.
pub const EVENT_FEED_LIMIT: usize = 50;

/// Largest batch a single training order may ask for.
pub const MAX_UNIT_QUANTITY: i64 = 1_000_000;

impl Engine {
    pub fn structures_for_country(&self, country_id: &str) -> Result<Vec<Structure>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT s.id, s.territory_id, s.kind, s.level, s.created_at
             FROM structures s JOIN territories t ON t.id = s.territory_id
             WHERE t.country_id = ?1
             ORDER BY s.rowid",
        )?;
        let rows = stmt.query_map([country_id], rows::structure)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Builds `kind` on one of the nation's own cells and pays for it.
    pub fn build_structure(
        &self,
        country_id: &str,
        territory_id: &str,
        kind: StructureKind,
    ) -> Result<Structure> {
        let mut conn = self.open()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let territory = territory_by_id(&tx, territory_id)?;
        if territory.map_or(true, |t| t.country_id != country_id) {
            return Err(GameError::ForeignTerritory);
        }

        let mut resources = resources_for(&tx, country_id)?.ok_or(GameError::NotFound("Resources"))?;
        let cost = kind.cost();
        if let Some(missing) = resources.shortfall(&cost, STRUCTURE_COST_ORDER) {
            return Err(GameError::Insufficient(missing));
        }

        let structure = Structure {
            id: new_id("str"),
            territory_id: territory_id.to_string(),
            kind,
            level: 1,
            created_at: now_rfc3339(),
        };
        tx.execute(
            "INSERT INTO structures (id, territory_id, kind, level, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            (
                &structure.id,
                &structure.territory_id,
                kind.as_str(),
                structure.level,
                &structure.created_at,
            ),
        )?;

        resources.debit(&cost);
        store_resources(&tx, &resources)?;
        append_event_tx(
            &tx,
            "structure.built",
            Some(&structure.id),
            serde_json::json!({ "country_id": country_id, "territory_id": territory_id, "kind": kind }),
        )?;
        tx.commit()?;
        Ok(structure)
    }

    pub fn units_for_country(&self, country_id: &str) -> Result<Vec<Unit>> {
        let conn = self.open()?;
        let sql = format!("SELECT {UNIT_COLS} FROM units WHERE country_id = ?1 ORDER BY rowid");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([country_id], rows::unit)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Trains `quantity` units of `kind` as one stack.
    pub fn train_units(&self, country_id: &str, kind: UnitKind, quantity: i64) -> Result<Unit> {
        if !(1..=MAX_UNIT_QUANTITY).contains(&quantity) {
            return Err(GameError::invalid(format!(
                "Quantity must be between 1 and {MAX_UNIT_QUANTITY}"
            )));
        }
        let cost: Cost = kind
            .cost()
            .times(quantity)
            .ok_or_else(|| GameError::invalid("Quantity too large"))?;

        let mut conn = self.open()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut resources = resources_for(&tx, country_id)?.ok_or(GameError::NotFound("Resources"))?;
        if let Some(missing) = resources.shortfall(&cost, UNIT_COST_ORDER) {
            return Err(GameError::Insufficient(missing));
        }

        let unit = Unit {
            id: new_id("unt"),
            country_id: country_id.to_string(),
            kind,
            quantity,
            current_territory_id: None,
            target_territory_id: None,
            movement_progress: 0.0,
            movement_speed: kind.movement_speed(),
            created_at: now_rfc3339(),
        };
        tx.execute(
            "INSERT INTO units (id, country_id, kind, quantity, movement_progress, movement_speed, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            (
                &unit.id,
                &unit.country_id,
                kind.as_str(),
                unit.quantity,
                unit.movement_progress,
                unit.movement_speed,
                &unit.created_at,
            ),
        )?;

        resources.debit(&cost);
        store_resources(&tx, &resources)?;
        append_event_tx(
            &tx,
            "units.trained",
            Some(&unit.id),
            serde_json::json!({ "country_id": country_id, "kind": kind, "quantity": quantity }),
        )?;
        tx.commit()?;
        Ok(unit)
    }

    pub fn research_for_country(&self, country_id: &str) -> Result<Vec<Research>> {
        let conn = self.open()?;
        let sql = format!(
            "SELECT {RESEARCH_COLS} FROM research WHERE country_id = ?1 ORDER BY rowid"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([country_id], rows::research)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Spends research points to unlock `technology` immediately.
    ///
    /// `branch`, when given, must be the technology's own branch.
    pub fn complete_research(
        &self,
        country_id: &str,
        branch: Option<ResearchBranch>,
        technology: Technology,
    ) -> Result<Research> {
        if branch.is_some_and(|b| b != technology.branch()) {
            return Err(GameError::invalid(format!(
                "Technology {technology} is not in the {} branch",
                branch.map(ResearchBranch::as_str).unwrap_or_default()
            )));
        }

        let mut conn = self.open()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let owned: i64 = tx.query_row(
            "SELECT COUNT(*) FROM research WHERE country_id = ?1 AND technology = ?2",
            (country_id, technology.as_str()),
            |row| row.get(0),
        )?;
        if owned > 0 {
            return Err(GameError::AlreadyResearched(technology.to_string()));
        }

        let mut resources = resources_for(&tx, country_id)?.ok_or(GameError::NotFound("Resources"))?;
        let cost = technology.cost();
        if resources.research_points < cost {
            return Err(GameError::Insufficient(ResourceKind::ResearchPoints));
        }

        let research = Research {
            id: new_id("rsc"),
            country_id: country_id.to_string(),
            branch: technology.branch(),
            technology,
            level: 1,
            in_progress: false,
            progress: 100.0,
            updated_at: now_rfc3339(),
        };
        tx.execute(
            "INSERT INTO research (id, country_id, branch, technology, level, in_progress, progress, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            (
                &research.id,
                &research.country_id,
                research.branch.as_str(),
                technology.as_str(),
                research.level,
                research.in_progress,
                research.progress,
                &research.updated_at,
            ),
        )?;

        resources.research_points -= cost;
        store_resources(&tx, &resources)?;
        append_event_tx(
            &tx,
            "research.completed",
            Some(&research.id),
            serde_json::json!({ "country_id": country_id, "technology": technology }),
        )?;
        tx.commit()?;
        Ok(research)
    }

    /// Trades sent or received by the nation, newest first.
    pub fn trades_for_country(&self, country_id: &str) -> Result<Vec<Trade>> {
        let conn = self.open()?;
        let sql = format!(
            "SELECT {TRADE_COLS} FROM trades
             WHERE from_country_id = ?1 OR to_country_id = ?1
             ORDER BY rowid DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([country_id], rows::trade)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Records a pending trade proposal. Nothing changes hands.
    pub fn create_trade(
        &self,
        from_country_id: &str,
        to_country_id: &str,
        offer: &ResourceBundle,
        request: &ResourceBundle,
    ) -> Result<Trade> {
        if from_country_id == to_country_id {
            return Err(GameError::invalid("Cannot trade with yourself"));
        }
        validate_bundle(offer)?;
        validate_bundle(request)?;
        if offer.is_empty() && request.is_empty() {
            return Err(GameError::invalid("Trade must offer or request something"));
        }

        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        if country_by_id(&tx, to_country_id)?.is_none() {
            return Err(GameError::NotFound("Country"));
        }

        let trade = Trade {
            id: new_id("trd"),
            from_country_id: from_country_id.to_string(),
            to_country_id: to_country_id.to_string(),
            offer_resources: offer.clone(),
            request_resources: request.clone(),
            status: TradeStatus::Pending,
            created_at: now_rfc3339(),
        };
        tx.execute(
            "INSERT INTO trades (id, from_country_id, to_country_id, offer_json, request_json, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            (
                &trade.id,
                &trade.from_country_id,
                &trade.to_country_id,
                serde_json::to_string(offer)?,
                serde_json::to_string(request)?,
                trade.status.as_str(),
                &trade.created_at,
            ),
        )?;
        append_event_tx(
            &tx,
            "trade.proposed",
            Some(&trade.id),
            serde_json::json!({ "from": from_country_id, "to": to_country_id }),
        )?;
        tx.commit()?;
        Ok(trade)
    }

    /// Newest [`EVENT_FEED_LIMIT`] events for the nation. Empty unless
    /// something has called [`Engine::record_event`].
    pub fn events_for_country(&self, country_id: &str) -> Result<Vec<NationEvent>> {
        let conn = self.open()?;
        let sql = format!(
            "SELECT {EVENT_COLS} FROM events WHERE country_id = ?1
             ORDER BY rowid DESC LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map((country_id, EVENT_FEED_LIMIT as i64), rows::event)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Adds a row to a nation's events feed. There is no event generator yet;
    /// the request handlers never call this, so only tests and embedders
    /// fill the feed.
    pub fn record_event(
        &self,
        country_id: &str,
        kind: EventKind,
        severity: Severity,
        message: &str,
    ) -> Result<NationEvent> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let event = NationEvent {
            id: new_id("evt"),
            country_id: country_id.to_string(),
            kind,
            severity,
            message: message.to_string(),
            created_at: now_rfc3339(),
        };
        tx.execute(
            "INSERT INTO events (id, country_id, kind, severity, message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            (
                &event.id,
                &event.country_id,
                kind.as_str(),
                severity.as_str(),
                &event.message,
                &event.created_at,
            ),
        )?;
        append_event_tx(
            &tx,
            "event.recorded",
            Some(&event.id),
            serde_json::json!({ "country_id": country_id, "kind": kind, "severity": severity }),
        )?;
        tx.commit()?;
        Ok(event)
    }
}

fn validate_bundle(bundle: &ResourceBundle) -> Result<()> {
    for (name, amount) in bundle {
        let kind: ResourceKind = name.parse()?;
        if !kind.is_tradable() {
            return Err(GameError::invalid(format!("{} cannot be traded", kind.label())));
        }
        if !amount.is_finite() || *amount < 0.0 {
            return Err(GameError::invalid(format!(
                "Invalid amount for {}",
                kind.label()
            )));
        }
    }
    Ok(())
}

fn store_resources(conn: &Connection, r: &Resources) -> Result<()> {
    conn.execute(
        "UPDATE resources SET money = ?2, research_points = ?3, manpower = ?4, oil = ?5,
             materials = ?6, food = ?7, uranium = ?8, last_updated = ?9
         WHERE country_id = ?1",
        (
            &r.country_id,
            r.money,
            r.research_points,
            r.manpower,
            r.oil,
            r.materials,
            r.food,
            r.uranium,
            now_rfc3339(),
        ),
    )?;
    Ok(())
}
