//! Accounts, nations and the shared map.

use crate::auth::{hash_password, verify_password};
use crate::model::*;
use crate::rows::{self, COUNTRY_COLS, RESOURCES_COLS, TERRITORY_COLS, USER_COLS};
use crate::territory::{origin_window_for, Allocator, Coord, TerritoryRng};
use crate::{append_event_tx, new_id, now_rfc3339, Engine, GameError, Result};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use std::collections::HashSet;

/// Signup form.
#[derive(Debug, Clone, Copy)]
pub struct NewNation<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub country_name: &'a str,
    pub capital_city_name: &'a str,
}

impl NewNation<'_> {
    fn validate(&self) -> Result<()> {
        let fields = [
            self.username,
            self.password,
            self.country_name,
            self.capital_city_name,
        ];
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(GameError::invalid("Missing required fields"));
        }
        Ok(())
    }
}

impl Engine {
    /// Registers a user and founds their nation: country, starting resources
    /// and a connected block of territory that overlaps no other nation.
    ///
    /// The origin cell becomes the capital. Runs in one write transaction, so
    /// concurrent signups see each other's claims.
    pub fn found_nation<R: TerritoryRng + ?Sized>(
        &self,
        input: &NewNation<'_>,
        rng: &mut R,
    ) -> Result<Nation> {
        input.validate()?;
        // Hashing is slow; keep it outside the write lock.
        let password_hash = hash_password(input.password)?;

        let mut conn = self.open()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if user_by_username(&tx, input.username)?.is_some() {
            return Err(GameError::UsernameTaken);
        }

        let ts = now_rfc3339();
        let user = User {
            id: new_id("usr"),
            username: input.username.to_string(),
            password_hash,
            created_at: ts.clone(),
        };
        tx.execute(
            "INSERT INTO users (id, username, password_hash, created_at) VALUES (?1, ?2, ?3, ?4)",
            (&user.id, &user.username, &user.password_hash, &user.created_at),
        )?;

        let country = Country {
            id: new_id("cty"),
            user_id: user.id.clone(),
            name: input.country_name.to_string(),
            capital_city_name: input.capital_city_name.to_string(),
            created_at: ts.clone(),
        };
        tx.execute(
            "INSERT INTO countries (id, user_id, name, capital_city_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            (
                &country.id,
                &country.user_id,
                &country.name,
                &country.capital_city_name,
                &country.created_at,
            ),
        )?;

        tx.execute(
            "INSERT INTO resources (id, country_id, last_updated) VALUES (?1, ?2, ?3)",
            (new_id("res"), &country.id, &ts),
        )?;
        let resources = resources_for(&tx, &country.id)?.ok_or(GameError::NotFound("Resources"))?;

        let claimed = claimed_coords(&tx)?;
        let allocator = Allocator {
            origin_window: origin_window_for(self.world.origin_window, claimed.len()),
            origin_attempts: self.world.origin_attempts,
        };
        let cells = allocator
            .allocate(&country.id, self.world.territory_count, rng, &claimed)
            .map_err(|e| {
                tracing::warn!(
                    country = %country.name,
                    claimed = claimed.len(),
                    window = allocator.origin_window,
                    error = %e,
                    "territory allocation failed"
                );
                e
            })?;

        let mut territories = Vec::with_capacity(cells.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO territories (id, country_id, x, y, city_name) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (i, cell) in cells.into_iter().enumerate() {
                let t = Territory {
                    id: new_id("ter"),
                    country_id: cell.owner_id,
                    x: cell.coord.x,
                    y: cell.coord.y,
                    city_name: (i == 0).then(|| country.capital_city_name.clone()),
                };
                stmt.execute((&t.id, &t.country_id, t.x, t.y, &t.city_name))?;
                territories.push(t);
            }
        }

        let capital = territories.first().map(Territory::coord);
        append_event_tx(
            &tx,
            "nation.founded",
            Some(&country.id),
            serde_json::json!({
                "country_id": country.id,
                "name": country.name,
                "territories": territories.len(),
                "capital": capital,
            }),
        )?;
        tx.commit()?;

        tracing::info!(
            country = %country.name,
            territories = territories.len(),
            capital = ?capital,
            "nation founded"
        );

        Ok(Nation {
            user,
            country,
            resources,
            territories,
        })
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        let conn = self.open()?;
        let user = user_by_username(&conn, username)?.ok_or(GameError::InvalidCredentials)?;
        if !verify_password(password, &user.password_hash) {
            return Err(GameError::InvalidCredentials);
        }
        Ok(user)
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.open()?;
        let sql = format!("SELECT {USER_COLS} FROM users WHERE id = ?1");
        Ok(conn.query_row(&sql, [id], rows::user).optional()?)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.open()?;
        user_by_username(&conn, username)
    }

    pub fn get_country(&self, id: &str) -> Result<Option<Country>> {
        let conn = self.open()?;
        country_by_id(&conn, id)
    }

    pub fn country_for_user(&self, user_id: &str) -> Result<Option<Country>> {
        let conn = self.open()?;
        let sql = format!("SELECT {COUNTRY_COLS} FROM countries WHERE user_id = ?1");
        Ok(conn.query_row(&sql, [user_id], rows::country).optional()?)
    }

    pub fn list_countries(&self) -> Result<Vec<Country>> {
        let conn = self.open()?;
        let sql = format!("SELECT {COUNTRY_COLS} FROM countries ORDER BY rowid");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], rows::country)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn resources_for_country(&self, country_id: &str) -> Result<Option<Resources>> {
        let conn = self.open()?;
        resources_for(&conn, country_id)
    }

    /// Every claimed cell of every nation, for drawing the map.
    pub fn list_territories(&self) -> Result<Vec<Territory>> {
        let conn = self.open()?;
        let sql = format!("SELECT {TERRITORY_COLS} FROM territories ORDER BY country_id, rowid");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], rows::territory)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn territories_for_country(&self, country_id: &str) -> Result<Vec<Territory>> {
        let conn = self.open()?;
        let sql = format!("SELECT {TERRITORY_COLS} FROM territories WHERE country_id = ?1 ORDER BY rowid");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([country_id], rows::territory)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    pub fn get_territory(&self, id: &str) -> Result<Option<Territory>> {
        let conn = self.open()?;
        territory_by_id(&conn, id)
    }
}

pub(crate) fn user_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLS} FROM users WHERE username = ?1");
    Ok(conn.query_row(&sql, [username], rows::user).optional()?)
}

pub(crate) fn country_by_id(conn: &Connection, id: &str) -> Result<Option<Country>> {
    let sql = format!("SELECT {COUNTRY_COLS} FROM countries WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], rows::country).optional()?)
}

pub(crate) fn resources_for(conn: &Connection, country_id: &str) -> Result<Option<Resources>> {
    let sql = format!("SELECT {RESOURCES_COLS} FROM resources WHERE country_id = ?1");
    Ok(conn.query_row(&sql, [country_id], rows::resources).optional()?)
}

pub(crate) fn territory_by_id(conn: &Connection, id: &str) -> Result<Option<Territory>> {
    let sql = format!("SELECT {TERRITORY_COLS} FROM territories WHERE id = ?1");
    Ok(conn.query_row(&sql, [id], rows::territory).optional()?)
}

fn claimed_coords(conn: &Connection) -> Result<HashSet<Coord>> {
    let mut stmt = conn.prepare("SELECT x, y FROM territories")?;
    let rows = stmt.query_map([], |row| Ok(Coord::new(row.get(0)?, row.get(1)?)))?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
}
