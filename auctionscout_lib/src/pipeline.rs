//! The scrape-normalize-persist pipeline.
//!
//! Three passes share one browser session and one database handle:
//! `crawl_listing` stores listing rows, `build_validated_items` opens each
//! stored item's detail view and keeps the viable ones, and
//! `enrich_valuations` adds transaction summaries and unit prices from the
//! valuation site. A failing item is logged and counted; the batch carries
//! on with the next one.

use auctionscout_browser::Browser;
use chrono::NaiveDate;
use scraper::Html;

use crate::aggregate::{summarize, yearly_count};
use crate::config::Config;
use crate::db::Db;
use crate::error::{NavigationError, PipelineError};
use crate::extract::{extract_detail, listing_rows, monthly_counts, transaction_rows, unit_price};
use crate::listing::{ListingClient, ListingQuery};
use crate::navigator::Navigator;
use crate::normalize::{area_to_pyung, parse_unit_address};
use crate::types::{AuctionItem, EnrichmentTarget, InsertOutcome, ValidatedItem};

/// Rows per page requested from the listing site.
pub const LISTING_PAGE_SIZE: u32 = 100;

/// Optional enrichment steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Land/building area, floors, elevators and approval date.
    pub building_info: bool,
    /// Minimum price of the previous auction round.
    pub previous_price: bool,
    /// Per-unit AI-estimated and public-assessed prices (needs a login).
    pub unit_prices: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            building_info: true,
            previous_price: true,
            unit_prices: true,
        }
    }
}

/// How the listing pages are reached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlOptions {
    /// Saved search to open from the favorites menu.
    pub favorite_search: Option<String>,
    /// Further result pages fetched through the listing API after the
    /// rendered first page.
    pub extra_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Stored,
    Duplicate,
    /// No trailing-year transactions; deliberately not processed further.
    NotViable,
    /// The valuation site had no recent transactions to summarize.
    NoData,
    Failed(String),
}

/// Tally of one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub stored: usize,
    pub duplicates: usize,
    pub not_viable: usize,
    pub no_data: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Stored => self.stored += 1,
            ItemOutcome::Duplicate => self.duplicates += 1,
            ItemOutcome::NotViable => self.not_viable += 1,
            ItemOutcome::NoData => self.no_data += 1,
            ItemOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.stored + self.duplicates + self.not_viable + self.no_data + self.failed
    }
}

/// Receives per-item progress of a batch.
pub trait BatchObserver {
    fn started(&mut self, _total: usize) {}
    fn item_done(&mut self, _tid: i64, _outcome: &ItemOutcome) {}
}

impl BatchObserver for () {}

/// Valuation-site session state across one enrichment batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValuationLogin {
    NotTried,
    LoggedIn,
    /// Unit prices are skipped for the rest of the batch.
    Failed,
}

pub struct Pipeline<'a, B: Browser> {
    nav: Navigator<'a, B>,
    db: &'a Db,
    config: &'a Config,
    options: PipelineOptions,
    today: NaiveDate,
}

impl<'a, B: Browser> Pipeline<'a, B> {
    pub fn new(browser: &'a B, db: &'a Db, config: &'a Config, options: PipelineOptions) -> Self {
        Self {
            nav: Navigator::new(browser),
            db,
            config,
            options,
            today: chrono::Local::now().date_naive(),
        }
    }

    /// Fix the reference date of the trailing-year window.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    // ---- listing ----

    /// Log in to the listing site and bring up the search results, the page
    /// detail views are opened from.
    pub async fn open_listing_session(&self, crawl: &CrawlOptions) -> Result<(), PipelineError> {
        self.nav.open_listing_site(&self.config.listing_site_url).await?;
        self.nav
            .login_listing(&self.config.username, &self.config.password)
            .await?;
        self.nav.open_search(&self.config.listing_search_url).await?;
        if let Some(id) = crawl.favorite_search.as_deref() {
            self.nav.open_favorite_search(id).await?;
        }
        self.nav.dismiss_listing_popups().await?;
        self.nav.set_page_size(LISTING_PAGE_SIZE).await?;
        self.nav.wait_for_listing().await?;
        Ok(())
    }

    /// Open the listing session and store every listed item not already
    /// known.
    pub async fn crawl_listing(
        &self,
        crawl: &CrawlOptions,
        observer: &mut impl BatchObserver,
    ) -> Result<BatchReport, PipelineError> {
        self.open_listing_session(crawl).await?;

        let source = self.nav.snapshot().await?;
        let mut items = listing_rows(&Html::parse_document(&source));
        tracing::info!("listing page shows {} items", items.len());

        if crawl.extra_pages > 0 {
            items.extend(self.fetch_extra_pages(crawl.extra_pages).await?);
        }

        observer.started(items.len());
        let mut report = BatchReport::default();
        for item in &items {
            let outcome = match self.db.insert_auction_item(item) {
                Ok(InsertOutcome::Inserted) => ItemOutcome::Stored,
                Ok(InsertOutcome::Duplicate) => ItemOutcome::Duplicate,
                Err(e) => {
                    tracing::error!(tid = item.tid, "failed to store listing row: {}", e);
                    ItemOutcome::Failed(e.to_string())
                }
            };
            report.record(&outcome);
            observer.item_done(item.tid, &outcome);
        }
        tracing::info!(
            "listing crawl done: {} new, {} duplicate, {} failed",
            report.stored,
            report.duplicates,
            report.failed
        );
        Ok(report)
    }

    async fn fetch_extra_pages(&self, pages: u32) -> Result<Vec<AuctionItem>, PipelineError> {
        let client = ListingClient::new(&self.config.listing_api_url, &self.config.listing_search_url)?;
        let cookies = self.nav.browser().cookies().await?;
        let mut items = Vec::new();
        for page_no in 2..=pages + 1 {
            let query = ListingQuery {
                page_no,
                data_size: LISTING_PAGE_SIZE,
                ..ListingQuery::default()
            };
            let rows = client.fetch_page(&cookies, &query).await?;
            if rows.is_empty() {
                break;
            }
            items.extend(rows);
        }
        Ok(items)
    }

    // ---- detail ----

    /// Rebuild the validated items from scratch: open every stored listing
    /// item's detail view and keep those with trailing-year transactions.
    pub async fn build_validated_items(
        &self,
        tids: &[i64],
        observer: &mut impl BatchObserver,
    ) -> Result<BatchReport, PipelineError> {
        let removed = self.db.reset_validated_items()?;
        tracing::info!("cleared {} validated items", removed);

        observer.started(tids.len());
        let mut report = BatchReport::default();
        for &tid in tids {
            let outcome = match self.process_detail(tid).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(tid, "detail processing failed: {}", e);
                    ItemOutcome::Failed(e.to_string())
                }
            };
            if outcome == ItemOutcome::NotViable {
                tracing::info!(tid, "no trailing-year transactions, skipped");
            }
            report.record(&outcome);
            observer.item_done(tid, &outcome);
        }
        tracing::info!(
            "detail pass done: {} stored, {} not viable, {} failed",
            report.stored,
            report.not_viable,
            report.failed
        );
        Ok(report)
    }

    async fn process_detail(&self, tid: i64) -> Result<ItemOutcome, PipelineError> {
        let scope = self.nav.open_detail(tid).await?;
        let result = self.store_detail(tid).await;
        if let Err(e) = scope.release(self.nav.browser()).await {
            tracing::warn!(tid, "could not close detail view: {}", e);
        }
        result
    }

    async fn store_detail(&self, tid: i64) -> Result<ItemOutcome, PipelineError> {
        let source = self.nav.snapshot().await?;
        let (fields, months) = {
            let doc = Html::parse_document(&source);
            (extract_detail(&doc), monthly_counts(&doc))
        };

        let yearly = yearly_count(&months, self.today);
        if yearly == 0 {
            return Ok(ItemOutcome::NotViable);
        }

        let listed = self.db.auction_item(tid)?;
        let address = fields
            .address
            .clone()
            .or_else(|| listed.as_ref().map(|l| l.address.clone()))
            .ok_or_else(|| NavigationError::Missing("address".to_string()))?;

        let mut item = ValidatedItem {
            tid,
            case_number: fields
                .case_number
                .clone()
                .or_else(|| listed.as_ref().and_then(|l| l.case_number.clone())),
            address,
            appraisal_amount: fields
                .appraisal_amount
                .or_else(|| listed.as_ref().and_then(|l| l.appraisal_amount)),
            minimum_amount: fields
                .minimum_amount
                .or_else(|| listed.as_ref().and_then(|l| l.minimum_amount)),
            failure_count: fields
                .failure_count
                .or_else(|| listed.as_ref().and_then(|l| l.failure_count)),
            yearly_transaction_count: yearly,
            bdsplanet_link: fields.links.bdsplanet.clone(),
            land_price_link: fields.links.land_price.clone(),
            ..ValidatedItem::default()
        };
        if self.options.building_info {
            item.building_area_pyung = fields.building_area.as_deref().and_then(area_to_pyung);
            item.land_area = fields.land_area;
            item.building_area = fields.building_area;
            item.floor_count = fields.floor_count;
            item.elevator_count = fields.elevator_count;
            item.approval_date = fields.approval_date;
        }
        if self.options.previous_price {
            item.previous_minimum_amount = fields.previous_minimum_amount;
        }

        self.db.insert_validated_item(&item)?;
        tracing::info!(tid, yearly, "validated item stored");
        Ok(ItemOutcome::Stored)
    }

    // ---- valuation ----

    /// Summarize recent transactions for every validated item with a
    /// valuation link and, when enabled, read its unit prices.
    pub async fn enrich_valuations(
        &self,
        targets: &[EnrichmentTarget],
        observer: &mut impl BatchObserver,
    ) -> Result<BatchReport, PipelineError> {
        observer.started(targets.len());
        let mut report = BatchReport::default();
        let mut login = ValuationLogin::NotTried;
        for target in targets {
            let outcome = match self.enrich_target(target, &mut login).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(tid = target.tid, "valuation enrichment failed: {}", e);
                    ItemOutcome::Failed(e.to_string())
                }
            };
            report.record(&outcome);
            observer.item_done(target.tid, &outcome);
        }
        tracing::info!(
            "valuation pass done: {} enriched, {} without data, {} failed",
            report.stored,
            report.no_data,
            report.failed
        );
        Ok(report)
    }

    async fn enrich_target(
        &self,
        target: &EnrichmentTarget,
        login: &mut ValuationLogin,
    ) -> Result<ItemOutcome, PipelineError> {
        let tid = target.tid;
        let link = self.config.valuation_link(&target.bdsplanet_link)?;
        self.nav.open_valuation_page(&link).await?;

        let pyung = target.building_area.as_deref().and_then(area_to_pyung);
        match pyung {
            Some(p) => {
                if self.nav.select_nearest_area_option(p).await?.is_none() {
                    tracing::warn!(tid, "no area option to select");
                }
            }
            None => tracing::debug!(tid, "building area unknown, keeping default area"),
        }
        self.nav.wait_for_transactions().await?;

        let source = self.nav.snapshot().await?;
        let records = transaction_rows(&Html::parse_document(&source));
        let Some(summary) = summarize(&records, self.today) else {
            tracing::warn!(tid, "no transactions in the trailing year");
            return Ok(ItemOutcome::NoData);
        };
        tracing::info!(
            tid,
            min = summary.min.price,
            max = summary.max.price,
            average = summary.average,
            count = summary.count,
            "transaction summary"
        );
        self.db.update_transaction_summary(tid, &summary, pyung)?;

        // The summary is committed; a unit price miss does not undo it.
        if self.options.unit_prices {
            if let Err(e) = self.enrich_unit(target, login).await {
                tracing::warn!(tid, "unit prices not read: {}", e);
            }
        }
        Ok(ItemOutcome::Stored)
    }

    async fn enrich_unit(
        &self,
        target: &EnrichmentTarget,
        login: &mut ValuationLogin,
    ) -> Result<(), PipelineError> {
        let tid = target.tid;
        let address = parse_unit_address(&target.address);
        let Some(unit) = address.unit.as_deref() else {
            tracing::warn!(tid, "no unit number in address {:?}", target.address);
            return Ok(());
        };

        match *login {
            ValuationLogin::LoggedIn => {}
            ValuationLogin::Failed => {
                tracing::debug!(tid, "valuation login failed earlier, unit prices skipped");
                return Ok(());
            }
            ValuationLogin::NotTried => {
                match self
                    .nav
                    .login_valuation(&self.config.username, &self.config.password)
                    .await
                {
                    Ok(()) => *login = ValuationLogin::LoggedIn,
                    Err(e) => {
                        tracing::warn!("valuation login failed, unit prices skipped for this batch: {}", e);
                        *login = ValuationLogin::Failed;
                        return Ok(());
                    }
                }
            }
        }

        self.nav
            .select_building_and_open_estimate_tab(address.building.as_deref())
            .await?;
        self.nav.expand_unit_list().await?;
        self.nav.select_unit(unit).await?;

        let source = self.nav.snapshot().await?;
        let (ai_price, public_price) = unit_price(&Html::parse_document(&source), unit);
        if ai_price.is_none() && public_price.is_none() {
            tracing::warn!(tid, unit, "unit prices not found");
            return Ok(());
        }
        self.db.update_unit_prices(tid, ai_price, public_price)?;
        tracing::info!(tid, unit, ?ai_price, ?public_price, "unit prices stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auctionscout_browser::fake::{FakeBrowser, FakeElement, FakePage};
    use auctionscout_browser::Locator;

    use crate::navigator::detail_script;

    const LISTING: &str = "https://listing.test/";
    const VALUATION: &str = "https://www.bdsplanet.com/map/realprice_map/abc";

    fn config() -> Config {
        Config::from_toml_str(
            r#"
            listing_site_url = "https://listing.test/"
            listing_api_url = "https://listing.test/api"
            listing_search_url = "https://listing.test/search"
            username = "bidder"
            password = "secret"
            "#,
        )
        .unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()
    }

    fn detail_url(tid: i64) -> String {
        format!("https://listing.test/detail/{}", tid)
    }

    fn detail_page(tid: i64, recent_count: u32) -> FakePage {
        let source = format!(
            r#"<html><body>
            <table>
              <tr><th>사건번호</th><td>2024타경{tid}</td></tr>
              <tr><th>소재지</th><td>서울특별시 강남구 역삼동 1 101동 1203호</td></tr>
              <tr><th>감정가</th><td>10,000만원</td></tr>
              <tr><th>최저가</th><td>7,000만원</td></tr>
              <tr><th>건물면적</th><td>84.9㎡</td></tr>
              <tr><th>층수</th><td>지하 2층 / 지상 15층</td></tr>
            </table>
            <a href="{VALUATION}">valuation</a>
            <table>
              <tr><th>년월</th><th>거래건수</th></tr>
              <tr><td>202508</td><td>{recent_count}</td></tr>
              <tr><td>202301</td><td>9</td></tr>
            </table>
            </body></html>"#
        );
        FakePage::new(detail_url(tid)).with_source(source)
    }

    fn browser_with_details(pages: &[(i64, u32)]) -> FakeBrowser {
        let browser = FakeBrowser::new();
        browser.add_page(FakePage::new(LISTING));
        for &(tid, count) in pages {
            browser.add_page(detail_page(tid, count));
            browser.on_script(detail_script(tid), detail_url(tid));
        }
        browser
    }

    fn db() -> Db {
        let db = Db::open_in_memory().unwrap();
        db.init().unwrap();
        db
    }

    #[derive(Default)]
    struct Recorder(Vec<(i64, ItemOutcome)>);

    impl BatchObserver for Recorder {
        fn item_done(&mut self, tid: i64, outcome: &ItemOutcome) {
            self.0.push((tid, outcome.clone()));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn viable_items_are_stored_and_others_skipped() {
        let browser = browser_with_details(&[(11, 3), (12, 0)]);
        browser.goto(LISTING).await.unwrap();
        let db = db();
        let config = config();
        let pipeline = Pipeline::new(&browser, &db, &config, PipelineOptions::default()).with_today(today());

        let mut seen = Recorder::default();
        let report = pipeline.build_validated_items(&[11, 12], &mut seen).await.unwrap();

        assert_eq!(report.stored, 1);
        assert_eq!(report.not_viable, 1);
        assert_eq!(seen.0, vec![(11, ItemOutcome::Stored), (12, ItemOutcome::NotViable)]);

        let stored = db.validated_item(11).unwrap().unwrap();
        assert_eq!(stored.item.case_number.as_deref(), Some("2024-11"));
        assert_eq!(stored.item.appraisal_amount, Some(10000));
        assert_eq!(stored.item.minimum_amount, Some(7000));
        assert_eq!(stored.item.yearly_transaction_count, 3);
        assert_eq!(stored.item.floor_count, Some(15));
        assert_eq!(stored.item.building_area_pyung, Some(25.68));
        assert_eq!(stored.item.bdsplanet_link.as_deref(), Some(VALUATION));
        assert_eq!(stored.unit_ai_price, None);
        assert!(db.validated_item(12).unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn detail_views_are_closed_after_each_item() {
        let browser = browser_with_details(&[(21, 1), (22, 0)]);
        browser.goto(LISTING).await.unwrap();
        let base = browser.current_view().await.unwrap();
        let db = db();
        let config = config();
        let pipeline = Pipeline::new(&browser, &db, &config, PipelineOptions::default()).with_today(today());

        pipeline.build_validated_items(&[21, 22], &mut ()).await.unwrap();

        assert_eq!(browser.view_count(), 1);
        assert_eq!(browser.current_view().await.unwrap(), base);
    }

    #[tokio::test(start_paused = true)]
    async fn one_failing_item_does_not_abort_the_batch() {
        let browser = browser_with_details(&[(32, 2)]);
        browser.fail_script(detail_script(31));
        browser.goto(LISTING).await.unwrap();
        let db = db();
        let config = config();
        let pipeline = Pipeline::new(&browser, &db, &config, PipelineOptions::default()).with_today(today());

        let report = pipeline.build_validated_items(&[31, 32], &mut ()).await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.stored, 1);
        assert!(db.validated_item(32).unwrap().is_some());
        assert_eq!(browser.current_url().await.unwrap(), LISTING);
    }

    #[tokio::test(start_paused = true)]
    async fn rebuild_clears_previous_validated_items() {
        let browser = browser_with_details(&[(41, 1)]);
        browser.goto(LISTING).await.unwrap();
        let db = db();
        db.insert_validated_item(&ValidatedItem {
            tid: 99,
            address: "old".to_string(),
            yearly_transaction_count: 4,
            ..ValidatedItem::default()
        })
        .unwrap();
        let config = config();
        let pipeline = Pipeline::new(&browser, &db, &config, PipelineOptions::default()).with_today(today());

        pipeline.build_validated_items(&[41], &mut ()).await.unwrap();

        assert!(db.validated_item(99).unwrap().is_none());
        assert!(db.validated_item(41).unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_steps_leave_their_fields_empty() {
        let browser = browser_with_details(&[(51, 1)]);
        browser.goto(LISTING).await.unwrap();
        let db = db();
        let config = config();
        let options = PipelineOptions {
            building_info: false,
            previous_price: false,
            unit_prices: false,
        };
        let pipeline = Pipeline::new(&browser, &db, &config, options).with_today(today());

        pipeline.build_validated_items(&[51], &mut ()).await.unwrap();

        let stored = db.validated_item(51).unwrap().unwrap();
        assert_eq!(stored.item.floor_count, None);
        assert_eq!(stored.item.building_area, None);
        assert_eq!(stored.item.appraisal_amount, Some(10000));
    }

    fn listing_browser(rows: &str) -> FakeBrowser {
        let browser = FakeBrowser::new();
        browser.add_page(
            FakePage::new(LISTING)
                .with_element(Locator::css("body"), FakeElement::new())
                .with_element(Locator::xpath("//span[@onclick='floating_div(400);']"), FakeElement::new())
                .with_element(Locator::id("client_id"), FakeElement::new())
                .with_element(Locator::id("passwd"), FakeElement::new())
                .with_element(Locator::xpath("//a[@onclick='login();']"), FakeElement::new())
                .with_element(
                    Locator::xpath("//a[contains(text(), '로그아웃')] | //span[contains(text(), '환영')] | //div[contains(@class, 'user-info')]"),
                    FakeElement::new(),
                ),
        );
        browser.add_page(
            FakePage::new("https://listing.test/search")
                .with_source(format!("<table id=\"tblLst\">{}</table>", rows))
                .with_element(Locator::id("tblLst"), FakeElement::new()),
        );
        browser
    }

    fn listing_row(tid: i64, case: &str, address: &str) -> String {
        format!(
            r#"<tr onclick="cntsViewPN({tid}, 1, 1, 0);"><td></td><td></td>
            <td>아파트<br>{case}<br>{address}</td><td>20,000만원<br>14,000만원</td>
            <td>유찰 1회</td><td>2025.10.01</td></tr>"#
        )
    }

    #[tokio::test(start_paused = true)]
    async fn crawl_stores_new_rows_once() {
        let rows = [
            listing_row(1, "2025-100", "대구 수성구 범어동 5동 501호"),
            listing_row(2, "2025-100", "대구 수성구 범어동 5동 501호"),
            listing_row(3, "2025-200", "부산 해운대구 우동 101동 302호"),
        ]
        .concat();
        let browser = listing_browser(&rows);
        let db = db();
        let config = config();
        let pipeline = Pipeline::new(&browser, &db, &config, PipelineOptions::default()).with_today(today());

        let mut seen = Recorder::default();
        let report = pipeline
            .crawl_listing(&CrawlOptions::default(), &mut seen)
            .await
            .unwrap();

        assert_eq!(report.stored, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(seen.0[1], (2, ItemOutcome::Duplicate));
        assert_eq!(db.auction_tids(None).unwrap(), vec![1, 3]);
        assert_eq!(browser.typed_into(&Locator::id("client_id")), "bidder");
    }

    #[tokio::test(start_paused = true)]
    async fn crawl_stops_when_login_fails() {
        let browser = FakeBrowser::new();
        browser.add_page(FakePage::new(LISTING).with_element(Locator::css("body"), FakeElement::new()));
        let db = db();
        let config = config();
        let pipeline = Pipeline::new(&browser, &db, &config, PipelineOptions::default()).with_today(today());

        let err = pipeline
            .crawl_listing(&CrawlOptions::default(), &mut ())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Navigation(NavigationError::Missing(_))));
        assert!(db.auction_tids(None).unwrap().is_empty());
    }

    fn valuation_page(rows: &str) -> FakePage {
        let source = format!("<html><body><table><tbody>{}</tbody></table></body></html>", rows);
        FakePage::new(VALUATION)
            .with_source(source)
            .with_element(
                Locator::xpath("//tbody//tr[@class='tr-click-ef']"),
                FakeElement::new(),
            )
    }

    fn target(tid: i64, address: &str) -> EnrichmentTarget {
        EnrichmentTarget {
            tid,
            case_number: None,
            address: address.to_string(),
            building_area: Some("84.9㎡".to_string()),
            bdsplanet_link: VALUATION.to_string(),
        }
    }

    fn seed_validated(db: &Db, tid: i64, address: &str) {
        db.insert_validated_item(&ValidatedItem {
            tid,
            address: address.to_string(),
            yearly_transaction_count: 2,
            bdsplanet_link: Some(VALUATION.to_string()),
            ..ValidatedItem::default()
        })
        .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stale_transactions_write_nothing() {
        let browser = FakeBrowser::new();
        browser.add_page(valuation_page(
            r#"<tr class="tr-click-ef"><td class="td01">23.01.05</td><td class="td03"><span class="paybold">5억</span></td><td class="td04">3층</td></tr>"#,
        ));
        let db = db();
        seed_validated(&db, 61, "역삼동 101동 1203호");
        let config = config();
        let pipeline = Pipeline::new(&browser, &db, &config, PipelineOptions::default()).with_today(today());

        let report = pipeline
            .enrich_valuations(&[target(61, "역삼동 101동 1203호")], &mut ())
            .await
            .unwrap();

        assert_eq!(report.no_data, 1);
        let stored = db.validated_item(61).unwrap().unwrap();
        assert_eq!(stored.recent_transaction_count, None);
        assert_eq!(stored.unit_ai_price, None);
    }

    #[tokio::test(start_paused = true)]
    async fn recent_transactions_are_summarized() {
        let browser = FakeBrowser::new();
        browser.add_page(valuation_page(concat!(
            r#"<tr class="tr-click-ef"><td class="td01">25.08.29</td><td class="td03"><span class="paybold">5억 2,000</span></td><td class="td04">12층</td></tr>"#,
            r#"<tr class="tr-click-ef"><td class="td01">25.03.02</td><td class="td03"><span class="paybold">4억 8,000</span></td><td class="td04">3층</td></tr>"#,
        )));
        let db = db();
        seed_validated(&db, 71, "역삼동 상가");
        let config = config();
        let pipeline = Pipeline::new(&browser, &db, &config, PipelineOptions::default()).with_today(today());

        let report = pipeline
            .enrich_valuations(&[target(71, "역삼동 상가")], &mut ())
            .await
            .unwrap();

        assert_eq!(report.stored, 1);
        let stored = db.validated_item(71).unwrap().unwrap();
        assert_eq!(stored.recent_transaction_count, Some(2));
        assert_eq!(stored.recent_avg_price, Some(50000));
        assert_eq!(stored.recent_min_price.unwrap().floor, "3층");
        assert_eq!(stored.recent_max_price.unwrap().price, 52000);
        assert_eq!(stored.item.building_area_pyung, Some(25.68));
        assert_eq!(stored.unit_ai_price, None);
    }

    const RECENT_ROW: &str = r#"<tr class="tr-click-ef"><td class="td01">25.08.29</td><td class="td03"><span class="paybold">5억 2,000</span></td><td class="td04">12층</td></tr>"#;
    const UNIT_LIST: &str = r#"<div class="ho-list">
        <div class="clickSpan on"><span data-honm="1203">1203호</span>
          <span class="hoPrice">4,825만<br>3,280만</span></div>
        </div>"#;

    fn login_button() -> Locator {
        Locator::xpath("//a[@class='btns def-bt rpdNeedLogin']")
    }

    fn building_button() -> Locator {
        Locator::xpath("//button[@data-dongnm='101']")
    }

    fn unit_page(with_login_form: bool) -> FakePage {
        let page = valuation_page(&format!("{}</tbody></table>{}<table><tbody>", RECENT_ROW, UNIT_LIST))
            .with_element(login_button(), FakeElement::new())
            .with_element(building_button(), FakeElement::new())
            .with_element(Locator::id("clickAsumGongPrice"), FakeElement::new())
            .with_element(Locator::xpath("//span[@data-honm='1203']"), FakeElement::new());
        if !with_login_form {
            return page;
        }
        page.with_element(Locator::css("input[data-logintype='email']"), FakeElement::new())
            .with_element(Locator::css("input[data-logintype='password']"), FakeElement::new())
            .with_element(Locator::css("a.btns.t23vaWrh18bbabduwz"), FakeElement::new())
    }

    #[tokio::test(start_paused = true)]
    async fn unrendered_transaction_table_counts_as_failure() {
        let browser = FakeBrowser::new();
        browser.add_page(FakePage::new(VALUATION).with_source("<html><body></body></html>"));
        let db = db();
        seed_validated(&db, 65, "역삼동 101동 1203호");
        let config = config();
        let pipeline = Pipeline::new(&browser, &db, &config, PipelineOptions::default()).with_today(today());

        let mut seen = Recorder::default();
        let report = pipeline
            .enrich_valuations(&[target(65, "역삼동 101동 1203호")], &mut seen)
            .await
            .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.no_data, 0);
        assert!(matches!(seen.0[0].1, ItemOutcome::Failed(ref msg) if msg.contains("transaction table")));
        let stored = db.validated_item(65).unwrap().unwrap();
        assert_eq!(stored.recent_transaction_count, None);
    }

    #[tokio::test(start_paused = true)]
    async fn unit_prices_are_read_after_a_single_login() {
        let browser = FakeBrowser::new();
        browser.add_page(unit_page(true));
        let db = db();
        seed_validated(&db, 81, "역삼동 101동 1203호");
        seed_validated(&db, 82, "역삼동 101동 1203호");
        let config = config();
        let pipeline = Pipeline::new(&browser, &db, &config, PipelineOptions::default()).with_today(today());

        let report = pipeline
            .enrich_valuations(
                &[target(81, "역삼동 101동 1203호"), target(82, "역삼동 101동 1203호")],
                &mut (),
            )
            .await
            .unwrap();

        assert_eq!(report.stored, 2);
        for tid in [81, 82] {
            let stored = db.validated_item(tid).unwrap().unwrap();
            assert_eq!(stored.recent_transaction_count, Some(1));
            assert_eq!(stored.unit_ai_price, Some(4825));
            assert_eq!(stored.unit_public_price, Some(3280));
        }
        assert_eq!(browser.clicks_on(&login_button()), 1);
        assert_eq!(browser.typed_into(&Locator::css("input[data-logintype='email']")), "bidder");
        assert_eq!(browser.clicks_on(&building_button()), 4);
        assert_eq!(browser.clicks_on(&Locator::id("clickAsumGongPrice")), 2);
        assert_eq!(browser.clicks_on(&Locator::xpath("//span[@data-honm='1203']")), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_login_skips_unit_prices_but_keeps_summaries() {
        let browser = FakeBrowser::new();
        browser.add_page(unit_page(false));
        let db = db();
        seed_validated(&db, 91, "역삼동 101동 1203호");
        seed_validated(&db, 92, "역삼동 101동 1203호");
        let config = config();
        let pipeline = Pipeline::new(&browser, &db, &config, PipelineOptions::default()).with_today(today());

        let report = pipeline
            .enrich_valuations(
                &[target(91, "역삼동 101동 1203호"), target(92, "역삼동 101동 1203호")],
                &mut (),
            )
            .await
            .unwrap();

        assert_eq!(report.stored, 2);
        assert_eq!(report.failed, 0);
        for tid in [91, 92] {
            let stored = db.validated_item(tid).unwrap().unwrap();
            assert_eq!(stored.recent_transaction_count, Some(1));
            assert_eq!(stored.unit_ai_price, None);
        }
        assert_eq!(browser.clicks_on(&login_button()), 1);
        assert_eq!(browser.clicks_on(&building_button()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn valuation_site_setting_rebases_scraped_links() {
        let browser = FakeBrowser::new();
        browser.add_page(valuation_page(RECENT_ROW));
        let db = db();
        seed_validated(&db, 95, "역삼동 상가");
        let config = Config::from_toml_str(
            r#"
            listing_site_url = "https://listing.test/"
            listing_api_url = "https://listing.test/api"
            listing_search_url = "https://listing.test/search"
            valuation_site_url = "https://www.bdsplanet.com"
            username = "bidder"
            password = "secret"
            "#,
        )
        .unwrap();
        let pipeline = Pipeline::new(&browser, &db, &config, PipelineOptions::default()).with_today(today());

        let mut relative = target(95, "역삼동 상가");
        relative.bdsplanet_link = "/map/realprice_map/abc".to_string();
        let report = pipeline.enrich_valuations(&[relative], &mut ()).await.unwrap();

        assert_eq!(report.stored, 1);
        assert_eq!(browser.current_url().await.unwrap(), VALUATION);
    }
}
