//! Navigation order of pages.
//!
//! Order values form one global sequence. Moving a page swaps its order
//! value with its nearest neighbour in the requested direction; no other
//! page is renumbered, so gaps left by removals are kept.

use std::fmt;
use std::str::FromStr;

use rusqlite::Connection;
use tracing::{debug, error, warn};

use crate::blog::db::SoloDb;
use crate::blog::repo::pages;
use crate::errors::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            _ => Err(format!("Invalid direction: {}", s)),
        }
    }
}

/// Outcome of a reorder request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderChange {
    Swapped,
    /// The page was already first (up) or last (down).
    Unchanged,
}

/// Order value for a newly appended page.
pub fn next_page_order(conn: &Connection) -> Result<i64, ServiceError> {
    Ok(pages::max_order(conn)? + 1)
}

impl SoloDb {
    /// Swap the order of `page_id` with the neighbouring page in
    /// `direction`. A page without a neighbour is left as is.
    pub fn change_page_order(
        &self,
        page_id: &str,
        direction: Direction,
    ) -> Result<OrderChange, ServiceError> {
        let tx = self.begin()?;

        let Some(src) = pages::get(&tx, page_id)? else {
            return Err(ServiceError::not_found("Page", page_id));
        };
        let neighbour = match direction {
            Direction::Up => pages::get_upper(&tx, src.order)?,
            Direction::Down => pages::get_under(&tx, src.order)?,
        };
        let Some(target) = neighbour else {
            warn!(page_id, %direction, "No neighbouring page to swap order with");
            tx.rollback()
                .map_err(|e| anyhow::Error::new(e).context("Failed to roll back reorder"))?;
            return Ok(OrderChange::Unchanged);
        };

        let swap = pages::set_order(&tx, &src.id, target.order)
            .and_then(|()| pages::set_order(&tx, &target.id, src.order));
        if let Err(e) = swap {
            error!(page_id, error = %format!("{e:#}"), "Failed to swap page order");
            return Err(e.into());
        }
        tx.commit()
            .map_err(|e| anyhow::Error::new(e).context("Failed to commit reorder"))?;

        debug!(
            page_id,
            target_id = %target.id,
            from = src.order,
            to = target.order,
            "Swapped page order"
        );
        Ok(OrderChange::Swapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn seed(db: &SoloDb, rows: &[(&str, i64)]) -> Result<()> {
        for (id, order) in rows {
            pages::insert(db.conn(), &pages::sample(id, *order, &format!("/p{id}")))?;
        }
        Ok(())
    }

    fn order_of(db: &SoloDb, id: &str) -> Result<i64> {
        Ok(pages::get(db.conn(), id)?.expect("page exists").order)
    }

    #[test]
    fn direction_parses() {
        assert_eq!(Direction::from_str("up").unwrap(), Direction::Up);
        assert_eq!(Direction::from_str("down").unwrap(), Direction::Down);
        assert!(Direction::from_str("left").is_err());
    }

    #[test]
    fn first_page_gets_order_zero() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        assert_eq!(next_page_order(db.conn())?, 0);
        seed(&db, &[("1", 0), ("2", 5)])?;
        assert_eq!(next_page_order(db.conn())?, 6);
        Ok(())
    }

    #[test]
    fn move_up_swaps_with_previous_page() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        seed(&db, &[("1", 1), ("2", 2)])?;
        assert_eq!(db.change_page_order("2", Direction::Up)?, OrderChange::Swapped);
        assert_eq!(order_of(&db, "2")?, 1);
        assert_eq!(order_of(&db, "1")?, 2);
        Ok(())
    }

    #[test]
    fn up_then_down_restores_orders() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        seed(&db, &[("1", 0), ("2", 3), ("3", 9)])?;
        db.change_page_order("3", Direction::Up)?;
        db.change_page_order("3", Direction::Down)?;
        assert_eq!(order_of(&db, "1")?, 0);
        assert_eq!(order_of(&db, "2")?, 3);
        assert_eq!(order_of(&db, "3")?, 9);
        Ok(())
    }

    #[test]
    fn no_neighbour_is_a_silent_noop() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        seed(&db, &[("1", 0), ("2", 1)])?;
        assert_eq!(db.change_page_order("1", Direction::Up)?, OrderChange::Unchanged);
        assert_eq!(db.change_page_order("2", Direction::Down)?, OrderChange::Unchanged);
        assert_eq!(order_of(&db, "1")?, 0);
        assert_eq!(order_of(&db, "2")?, 1);
        Ok(())
    }

    #[test]
    fn missing_page_is_not_found() -> Result<()> {
        let db = SoloDb::new_in_memory()?;
        assert!(matches!(
            db.change_page_order("nope", Direction::Up),
            Err(ServiceError::NotFound { entity: "Page", .. })
        ));
        Ok(())
    }
}
