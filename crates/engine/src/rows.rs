use crate::catalog::UnknownName;
use crate::model::*;
use rusqlite::types::Type;
use rusqlite::Row;
use std::str::FromStr;

pub(crate) const USER_COLS: &str = "id, username, password_hash, created_at";
pub(crate) const COUNTRY_COLS: &str = "id, user_id, name, capital_city_name, created_at";
pub(crate) const RESOURCES_COLS: &str = "id, country_id, money, population, research_points, manpower, stability, oil, minerals, materials, food, uranium, economic_strength, last_updated";
pub(crate) const TERRITORY_COLS: &str = "id, country_id, x, y, city_name";
pub(crate) const UNIT_COLS: &str = "id, country_id, kind, quantity, current_territory_id, target_territory_id, movement_progress, movement_speed, created_at";
pub(crate) const RESEARCH_COLS: &str =
    "id, country_id, branch, technology, level, in_progress, progress, updated_at";
pub(crate) const TRADE_COLS: &str =
    "id, from_country_id, to_country_id, offer_json, request_json, status, created_at";
pub(crate) const EVENT_COLS: &str = "id, country_id, kind, severity, message, created_at";

fn named<T: FromStr<Err = UnknownName>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    s.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn bundle(row: &Row<'_>, idx: usize) -> rusqlite::Result<ResourceBundle> {
    let s: String = row.get(idx)?;
    serde_json::from_str(&s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub(crate) fn country(row: &Row<'_>) -> rusqlite::Result<Country> {
    Ok(Country {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        capital_city_name: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub(crate) fn resources(row: &Row<'_>) -> rusqlite::Result<Resources> {
    Ok(Resources {
        id: row.get(0)?,
        country_id: row.get(1)?,
        money: row.get(2)?,
        population: row.get(3)?,
        research_points: row.get(4)?,
        manpower: row.get(5)?,
        stability: row.get(6)?,
        oil: row.get(7)?,
        minerals: row.get(8)?,
        materials: row.get(9)?,
        food: row.get(10)?,
        uranium: row.get(11)?,
        economic_strength: row.get(12)?,
        last_updated: row.get(13)?,
    })
}

pub(crate) fn territory(row: &Row<'_>) -> rusqlite::Result<Territory> {
    Ok(Territory {
        id: row.get(0)?,
        country_id: row.get(1)?,
        x: row.get(2)?,
        y: row.get(3)?,
        city_name: row.get(4)?,
    })
}

/// Expects `s.id, s.territory_id, s.kind, s.level, s.created_at`.
pub(crate) fn structure(row: &Row<'_>) -> rusqlite::Result<Structure> {
    Ok(Structure {
        id: row.get(0)?,
        territory_id: row.get(1)?,
        kind: named(row, 2)?,
        level: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub(crate) fn unit(row: &Row<'_>) -> rusqlite::Result<Unit> {
    Ok(Unit {
        id: row.get(0)?,
        country_id: row.get(1)?,
        kind: named(row, 2)?,
        quantity: row.get(3)?,
        current_territory_id: row.get(4)?,
        target_territory_id: row.get(5)?,
        movement_progress: row.get(6)?,
        movement_speed: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub(crate) fn research(row: &Row<'_>) -> rusqlite::Result<Research> {
    Ok(Research {
        id: row.get(0)?,
        country_id: row.get(1)?,
        branch: named(row, 2)?,
        technology: named(row, 3)?,
        level: row.get(4)?,
        in_progress: row.get(5)?,
        progress: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

pub(crate) fn trade(row: &Row<'_>) -> rusqlite::Result<Trade> {
    Ok(Trade {
        id: row.get(0)?,
        from_country_id: row.get(1)?,
        to_country_id: row.get(2)?,
        offer_resources: bundle(row, 3)?,
        request_resources: bundle(row, 4)?,
        status: named(row, 5)?,
        created_at: row.get(6)?,
    })
}

pub(crate) fn event(row: &Row<'_>) -> rusqlite::Result<NationEvent> {
    Ok(NationEvent {
        id: row.get(0)?,
        country_id: row.get(1)?,
        kind: named(row, 2)?,
        severity: named(row, 3)?,
        message: row.get(4)?,
        created_at: row.get(5)?,
    })
}
