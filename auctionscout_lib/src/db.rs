//! SQLite storage for auction listings and validated items.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::aggregate::{PricePoint, TransactionSummary};
use crate::types::{
    AuctionItem, DbStats, EnrichmentTarget, InsertOutcome, ValidatedItem, ValidatedRecord,
};

/// Schema version written to `PRAGMA user_version`.
pub const SCHEMA_VERSION: i32 = 1;

#[derive(thiserror::Error, Debug)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct Db {
    conn: Connection,
}

const VALIDATED_COLUMNS: &str = "tid, case_number, address, land_area, building_area,
    building_area_pyung, floor_count, elevator_count, approval_date, appraisal_amount,
    minimum_amount, failure_count, yearly_transaction_count, bdsplanet_link, land_price_link,
    previous_minimum_amount, recent_min_price, recent_max_price, recent_avg_price,
    recent_transaction_count, unit_ai_price, unit_public_price, enriched_at";

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    pub fn init(&self) -> Result<(), DbError> {
        let schema = include_str!("../../schema/sqlite.sql");
        self.conn.execute_batch(schema)?;

        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        if version < SCHEMA_VERSION {
            self.conn
                .pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        Ok(())
    }

    /// Insert a listing row unless it is already known.
    ///
    /// Duplicates are detected by case number when one is present, otherwise
    /// by exact address. Existing rows are never updated.
    pub fn insert_auction_item(&self, item: &AuctionItem) -> Result<InsertOutcome, DbError> {
        let tx = self.conn.unchecked_transaction()?;

        let existing: Option<i64> = match item.case_number.as_deref().filter(|c| !c.is_empty()) {
            Some(case) => tx
                .query_row(
                    "SELECT id FROM auction_items WHERE case_number = ?1",
                    params![case],
                    |row| row.get(0),
                )
                .optional()?,
            None => tx
                .query_row(
                    "SELECT id FROM auction_items WHERE address = ?1",
                    params![item.address],
                    |row| row.get(0),
                )
                .optional()?,
        };
        if existing.is_some() {
            return Ok(InsertOutcome::Duplicate);
        }

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO auction_items (
                tid, case_number, address, appraisal_amount, minimum_amount,
                failure_count, status, bid_date, raw_price
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                item.tid,
                item.case_number,
                item.address,
                item.appraisal_amount,
                item.minimum_amount,
                item.failure_count,
                item.status,
                item.bid_date,
                item.raw_price,
            ],
        )?;
        tx.commit()?;

        Ok(if inserted == 1 {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::Duplicate
        })
    }

    /// Site ids of stored listing rows, oldest first.
    pub fn auction_tids(&self, limit: Option<i64>) -> Result<Vec<i64>, DbError> {
        let sql = match limit {
            Some(n) => format!("SELECT tid FROM auction_items ORDER BY id LIMIT {}", n),
            None => "SELECT tid FROM auction_items ORDER BY id".to_string(),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let tids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(tids)
    }

    pub fn auction_item(&self, tid: i64) -> Result<Option<AuctionItem>, DbError> {
        let item = self
            .conn
            .query_row(
                "SELECT tid, case_number, address, appraisal_amount, minimum_amount,
                        failure_count, status, bid_date, raw_price
                 FROM auction_items WHERE tid = ?1",
                params![tid],
                |row| {
                    Ok(AuctionItem {
                        tid: row.get(0)?,
                        case_number: row.get(1)?,
                        address: row.get(2)?,
                        appraisal_amount: row.get(3)?,
                        minimum_amount: row.get(4)?,
                        failure_count: row.get(5)?,
                        status: row.get(6)?,
                        bid_date: row.get(7)?,
                        raw_price: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
                    })
                },
            )
            .optional()?;
        Ok(item)
    }

    /// Clear every validated item ahead of a full refresh. Returns rows removed.
    pub fn reset_validated_items(&self) -> Result<usize, DbError> {
        let tx = self.conn.unchecked_transaction()?;
        let removed = tx.execute("DELETE FROM validated_items", [])?;
        tx.commit()?;
        Ok(removed)
    }

    pub fn insert_validated_item(&self, item: &ValidatedItem) -> Result<(), DbError> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO validated_items (
                tid, case_number, address, land_area, building_area, building_area_pyung,
                floor_count, elevator_count, approval_date, appraisal_amount, minimum_amount,
                failure_count, yearly_transaction_count, bdsplanet_link, land_price_link,
                previous_minimum_amount
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                item.tid,
                item.case_number,
                item.address,
                item.land_area,
                item.building_area,
                item.building_area_pyung,
                item.floor_count,
                item.elevator_count,
                item.approval_date,
                item.appraisal_amount,
                item.minimum_amount,
                item.failure_count,
                item.yearly_transaction_count,
                item.bdsplanet_link,
                item.land_price_link,
                item.previous_minimum_amount,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Write the trailing-year transaction summary. Only the summary columns,
    /// the derived pyung value and `enriched_at` are touched.
    ///
    /// Returns false when no validated item has this tid.
    pub fn update_transaction_summary(
        &self,
        tid: i64,
        summary: &TransactionSummary,
        building_area_pyung: Option<f64>,
    ) -> Result<bool, DbError> {
        let min_json = serde_json::to_string(&summary.min)?;
        let max_json = serde_json::to_string(&summary.max)?;
        let tx = self.conn.unchecked_transaction()?;
        let updated = tx.execute(
            "UPDATE validated_items
             SET recent_min_price = ?1,
                 recent_max_price = ?2,
                 recent_avg_price = ?3,
                 recent_transaction_count = ?4,
                 building_area_pyung = COALESCE(?5, building_area_pyung),
                 enriched_at = datetime('now')
             WHERE tid = ?6",
            params![
                min_json,
                max_json,
                summary.average,
                summary.count,
                building_area_pyung,
                tid
            ],
        )?;
        tx.commit()?;
        Ok(updated > 0)
    }

    /// Write the per-unit AI-estimated and public-assessed prices.
    pub fn update_unit_prices(
        &self,
        tid: i64,
        ai_price: Option<i64>,
        public_price: Option<i64>,
    ) -> Result<bool, DbError> {
        let tx = self.conn.unchecked_transaction()?;
        let updated = tx.execute(
            "UPDATE validated_items
             SET unit_ai_price = ?1, unit_public_price = ?2, enriched_at = datetime('now')
             WHERE tid = ?3",
            params![ai_price, public_price, tid],
        )?;
        tx.commit()?;
        Ok(updated > 0)
    }

    /// Validated items that carry a valuation-site link.
    pub fn enrichment_targets(&self, limit: Option<i64>) -> Result<Vec<EnrichmentTarget>, DbError> {
        let mut sql = String::from(
            "SELECT tid, case_number, address, building_area, bdsplanet_link
             FROM validated_items
             WHERE bdsplanet_link IS NOT NULL AND bdsplanet_link <> ''
             ORDER BY created_at, tid",
        );
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }
        let mut stmt = self.conn.prepare(&sql)?;
        let targets = stmt
            .query_map([], |row| {
                Ok(EnrichmentTarget {
                    tid: row.get(0)?,
                    case_number: row.get(1)?,
                    address: row.get(2)?,
                    building_area: row.get(3)?,
                    bdsplanet_link: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(targets)
    }

    pub fn validated_items(&self, limit: Option<i64>) -> Result<Vec<ValidatedRecord>, DbError> {
        let mut sql = format!(
            "SELECT {} FROM validated_items ORDER BY created_at, tid",
            VALIDATED_COLUMNS
        );
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }
        let mut stmt = self.conn.prepare(&sql)?;
        let raw = stmt
            .query_map([], read_validated)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(RawValidated::into_record).collect()
    }

    pub fn validated_item(&self, tid: i64) -> Result<Option<ValidatedRecord>, DbError> {
        let sql = format!("SELECT {} FROM validated_items WHERE tid = ?1", VALIDATED_COLUMNS);
        let raw = self
            .conn
            .query_row(&sql, params![tid], read_validated)
            .optional()?;
        raw.map(RawValidated::into_record).transpose()
    }

    pub fn stats(&self) -> Result<DbStats, DbError> {
        let count = |sql: &str| -> Result<i64, DbError> {
            Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
        };
        let auction_items = count("SELECT COUNT(*) FROM auction_items")?;
        let with_case_number = count(
            "SELECT COUNT(*) FROM auction_items
             WHERE case_number IS NOT NULL AND case_number <> ''",
        )?;
        let validated_items = count("SELECT COUNT(*) FROM validated_items")?;
        let enriched_items =
            count("SELECT COUNT(*) FROM validated_items WHERE enriched_at IS NOT NULL")?;

        let mut stmt = self.conn.prepare(
            "SELECT SUBSTR(case_number, 1, 4) AS year, COUNT(*)
             FROM auction_items
             WHERE case_number IS NOT NULL AND case_number <> ''
             GROUP BY year
             ORDER BY year DESC",
        )?;
        let per_year = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<(String, i64)>, _>>()?;

        Ok(DbStats {
            auction_items,
            with_case_number,
            per_year,
            validated_items,
            enriched_items,
        })
    }
}

struct RawValidated {
    item: ValidatedItem,
    min_json: Option<String>,
    max_json: Option<String>,
    avg: Option<i64>,
    count: Option<i64>,
    ai: Option<i64>,
    public: Option<i64>,
    enriched_at: Option<String>,
}

impl RawValidated {
    fn into_record(self) -> Result<ValidatedRecord, DbError> {
        let point = |json: Option<String>| -> Result<Option<PricePoint>, DbError> {
            Ok(match json {
                Some(s) => Some(serde_json::from_str(&s)?),
                None => None,
            })
        };
        Ok(ValidatedRecord {
            item: self.item,
            recent_min_price: point(self.min_json)?,
            recent_max_price: point(self.max_json)?,
            recent_avg_price: self.avg,
            recent_transaction_count: self.count,
            unit_ai_price: self.ai,
            unit_public_price: self.public,
            enriched_at: self.enriched_at,
        })
    }
}

fn read_validated(row: &Row<'_>) -> rusqlite::Result<RawValidated> {
    Ok(RawValidated {
        item: ValidatedItem {
            tid: row.get(0)?,
            case_number: row.get(1)?,
            address: row.get(2)?,
            land_area: row.get(3)?,
            building_area: row.get(4)?,
            building_area_pyung: row.get(5)?,
            floor_count: row.get(6)?,
            elevator_count: row.get(7)?,
            approval_date: row.get(8)?,
            appraisal_amount: row.get(9)?,
            minimum_amount: row.get(10)?,
            failure_count: row.get(11)?,
            yearly_transaction_count: row.get(12)?,
            bdsplanet_link: row.get(13)?,
            land_price_link: row.get(14)?,
            previous_minimum_amount: row.get(15)?,
        },
        min_json: row.get(16)?,
        max_json: row.get(17)?,
        avg: row.get(18)?,
        count: row.get(19)?,
        ai: row.get(20)?,
        public: row.get(21)?,
        enriched_at: row.get(22)?,
    })
}
