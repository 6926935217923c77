//! Records persisted by the scraper.

use serde::Serialize;

use crate::aggregate::PricePoint;

/// A listing row as scraped from the auction portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuctionItem {
    /// Site-assigned numeric id.
    pub tid: i64,
    pub case_number: Option<String>,
    pub address: String,
    pub appraisal_amount: Option<i64>,
    pub minimum_amount: Option<i64>,
    pub failure_count: Option<i64>,
    pub status: Option<String>,
    pub bid_date: Option<String>,
    pub raw_price: String,
}

/// Facts captured for an auction item that passed the viability gate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidatedItem {
    pub tid: i64,
    pub case_number: Option<String>,
    pub address: String,
    pub land_area: Option<String>,
    pub building_area: Option<String>,
    pub building_area_pyung: Option<f64>,
    pub floor_count: Option<i64>,
    pub elevator_count: Option<i64>,
    pub approval_date: Option<String>,
    pub appraisal_amount: Option<i64>,
    pub minimum_amount: Option<i64>,
    pub failure_count: Option<i64>,
    pub yearly_transaction_count: i64,
    pub bdsplanet_link: Option<String>,
    pub land_price_link: Option<String>,
    pub previous_minimum_amount: Option<i64>,
}

/// A stored validated item together with its enrichment columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedRecord {
    #[serde(flatten)]
    pub item: ValidatedItem,
    pub recent_min_price: Option<PricePoint>,
    pub recent_max_price: Option<PricePoint>,
    pub recent_avg_price: Option<i64>,
    pub recent_transaction_count: Option<i64>,
    pub unit_ai_price: Option<i64>,
    pub unit_public_price: Option<i64>,
    pub enriched_at: Option<String>,
}

/// A validated item that still has valuation-site work to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentTarget {
    pub tid: i64,
    pub case_number: Option<String>,
    pub address: String,
    pub building_area: Option<String>,
    pub bdsplanet_link: String,
}

/// Result of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same case number (or address, or tid) already exists.
    Duplicate,
}

/// Row counts for the `stats` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DbStats {
    pub auction_items: i64,
    pub with_case_number: i64,
    /// Case numbers per filing year, most recent first.
    pub per_year: Vec<(String, i64)>,
    pub validated_items: i64,
    pub enriched_items: i64,
}
