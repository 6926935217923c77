//! Browser choreography for the listing site and the valuation site.
//!
//! Every interaction is followed by a fixed settling delay sized to the
//! rendering cost the sites typically show. Optional controls (popups, the
//! "more" button) are looked up through ordered locator lists and their
//! absence is not an error.

use std::time::Duration;

use auctionscout_browser::{wait_for, wait_for_all, wait_for_new_view, Browser, BrowserError, Locator, ViewHandle};

use crate::error::NavigationError;
use crate::normalize::SQM_PER_PYUNG;

/// Settling delays after an interaction.
pub mod delay {
    use std::time::Duration;

    pub const DOUBLE_CLICK_GAP: Duration = Duration::from_millis(500);
    pub const POPUP: Duration = Duration::from_secs(1);
    pub const STEP: Duration = Duration::from_secs(2);
    pub const RENDER: Duration = Duration::from_secs(3);
    pub const PAGE_LOAD: Duration = Duration::from_secs(5);
}

/// Default bound for wait-with-timeout steps.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(10);

const LISTING_LOGIN_OPEN: &str = "//span[@onclick='floating_div(400);']";
const LISTING_LOGIN_SUBMIT: &str = "//a[@onclick='login();']";
const LISTING_LOGGED_IN: &str = "//a[contains(text(), '로그아웃')] | //span[contains(text(), '환영')] | //div[contains(@class, 'user-info')]";
const LISTING_SECTION_TOGGLE: &str = "//div[@class='hand' and @onclick='mySectionToggle(1)']";
const LISTING_RESULTS: &str = "//table | //div[contains(@class, 'list')] | //div[contains(@class, 'result')]";

const LISTING_POPUPS: &[&str] = &[
    "//button[contains(text(), '닫기')]",
    "//button[contains(text(), '취소')]",
    "//button[contains(text(), '나중에')]",
    "//div[@class='close']",
    "//span[@class='close']",
    "//button[@class='close']",
    "//div[contains(@class, 'popup')]//button",
    "//div[contains(@class, 'modal')]//button",
];

const VALUATION_POPUPS: &[&str] = &[
    "//a[@class='adPop__utilArea__todayHide']",
    "//a[@class='adPop__utilArea__popClose ui_pop_close']",
];

const AREA_DROPDOWN: &str = "//div[@class='this']//div[@data-dan-toggle-con='rpTopSelect']";
const AREA_OPTIONS: &str = "//a[contains(@class, 'tac-box')][@data-area]";
const TRANSACTION_ROWS: &str = "//tbody//tr[@class='tr-click-ef']";

const VALUATION_LOGIN_BUTTONS: &[&str] = &[
    "//a[@class='btns def-bt rpdNeedLogin']",
    "//a[contains(@class, 'rpdNeedLogin')]",
    "//a[contains(text(), '간편 로그인')]",
    "//span[contains(text(), '간편 로그인')]/parent::a",
];
const VALUATION_EMAIL: &str = "input[data-logintype='email']";
const VALUATION_PASSWORD: &str = "input[data-logintype='password']";
const VALUATION_SUBMIT: &str = "a.btns.t23vaWrh18bbabduwz";

const ESTIMATE_TAB: &str = "clickAsumGongPrice";

const UNIT_LIST_MORE: &[&str] = &[
    "//a[@class='more']//span[@class='moretxt']",
    "//a[@class='more']",
    "//span[@class='moretxt']",
    "//a[contains(@class, 'more')]//span[@class='moretxt']",
    "//a[contains(@class, 'more')]//span[contains(@class, 'moretxt')]",
    "//a[contains(@class, 'more')]",
    "//span[contains(@class, 'moretxt')]",
    "//span[contains(text(), '더보기')]",
    "//a[contains(text(), '더보기')]",
    "//span[text()='더보기']",
    "//a[@href='#' and contains(@class, 'more')]",
    "//a[contains(@class, 'more')]/span[@class='moretxt']",
    "//a[contains(@class, 'more')]/span",
    "//*[contains(@class, 'more')]//*[contains(text(), '더보기')]",
    "//a[contains(@class, 'more')]//*[contains(text(), '더보기')]",
    "//span[contains(text(), '더 보기')]",
    "//a[contains(@class, 'more') and not(@disabled)]",
];

fn xpaths(list: &[&str]) -> Vec<Locator> {
    list.iter().map(|x| Locator::xpath(*x)).collect()
}

/// Script the listing site binds to a row click; opens the detail view.
pub fn detail_script(tid: i64) -> String {
    format!("cntsViewPN({}, 1, 1, 0);", tid)
}

/// Index of the option closest to `target`; ties go to the earlier option.
pub fn nearest_option(options: &[f64], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, value) in options.iter().enumerate() {
        let diff = (value - target).abs();
        match best {
            Some((_, best_diff)) if diff >= best_diff => {}
            _ => best = Some((idx, diff)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Focus on a view opened by a page script, with guaranteed return to the
/// view that was focused before.
#[derive(Debug)]
pub struct ViewScope {
    base: ViewHandle,
    opened: ViewHandle,
}

impl ViewScope {
    /// Run `script`, wait for the view it opens and focus it.
    ///
    /// On any failure focus is put back on the original view before the
    /// error is returned.
    pub async fn open<B>(browser: &B, script: &str, timeout: Duration) -> Result<Self, BrowserError>
    where
        B: Browser + ?Sized,
    {
        let base = browser.current_view().await?;
        let known = browser.views().await?;
        let attempt: Result<ViewHandle, BrowserError> = async {
            browser.execute(script).await?;
            let opened = wait_for_new_view(browser, &known, timeout).await?;
            browser.switch_to(&opened).await?;
            Ok(opened)
        }
        .await;

        match attempt {
            Ok(opened) => Ok(Self { base, opened }),
            Err(e) => {
                if let Err(restore) = browser.switch_to(&base).await {
                    tracing::error!("could not return to base view {}: {}", base, restore);
                }
                Err(e)
            }
        }
    }

    pub fn base(&self) -> &ViewHandle {
        &self.base
    }

    /// Close the opened view (if still open) and focus the base view.
    pub async fn release<B>(self, browser: &B) -> Result<(), BrowserError>
    where
        B: Browser + ?Sized,
    {
        let closed = self.close_opened(browser).await;
        let restored = browser.switch_to(&self.base).await;
        closed.and(restored)
    }

    async fn close_opened<B>(&self, browser: &B) -> Result<(), BrowserError>
    where
        B: Browser + ?Sized,
    {
        if !browser.views().await?.contains(&self.opened) {
            return Ok(());
        }
        browser.switch_to(&self.opened).await?;
        browser.close_view().await
    }
}

/// Drives one browser session through the sites' page flows.
pub struct Navigator<'a, B: Browser> {
    browser: &'a B,
    wait_timeout: Duration,
}

impl<'a, B: Browser> Navigator<'a, B> {
    pub fn new(browser: &'a B) -> Self {
        Self {
            browser,
            wait_timeout: WAIT_TIMEOUT,
        }
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    pub fn browser(&self) -> &'a B {
        self.browser
    }

    async fn settle(&self, pause: Duration) {
        tokio::time::sleep(pause).await;
    }

    /// First locator that resolves to a displayed element.
    async fn first_visible(
        &self,
        locators: &[Locator],
    ) -> Result<Option<(usize, B::Element)>, BrowserError> {
        for (idx, locator) in locators.iter().enumerate() {
            if let Some(el) = self.browser.find(locator).await? {
                if self.browser.is_displayed(&el).await? {
                    return Ok(Some((idx, el)));
                }
            }
        }
        Ok(None)
    }

    /// First locator that resolves to any element.
    async fn first_present(
        &self,
        locators: &[Locator],
    ) -> Result<Option<(usize, B::Element)>, BrowserError> {
        for (idx, locator) in locators.iter().enumerate() {
            if let Some(el) = self.browser.find(locator).await? {
                return Ok(Some((idx, el)));
            }
        }
        Ok(None)
    }

    /// Native click, falling back to a script click when it is intercepted.
    async fn click_or_script(&self, el: &B::Element) -> Result<(), BrowserError> {
        if let Err(e) = self.browser.click(el).await {
            tracing::debug!("native click failed ({}), using script click", e);
            self.browser.script_click(el).await?;
        }
        Ok(())
    }

    async fn require(&self, locator: Locator, what: &str) -> Result<B::Element, NavigationError> {
        match wait_for(self.browser, &locator, self.wait_timeout).await {
            Ok(el) => Ok(el),
            Err(BrowserError::Timeout { .. }) => Err(NavigationError::Missing(what.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn type_into(&self, el: &B::Element, text: &str) -> Result<(), BrowserError> {
        self.browser.clear(el).await?;
        self.browser.send_keys(el, text).await
    }

    /// Serialized DOM of the focused page.
    pub async fn snapshot(&self) -> Result<String, BrowserError> {
        self.browser.source().await
    }

    // ---- listing site ----

    pub async fn open_listing_site(&self, url: &str) -> Result<(), NavigationError> {
        self.browser.goto(url).await?;
        self.require(Locator::css("body"), "page body").await?;
        self.settle(delay::RENDER).await;
        tracing::info!("opened listing site: {}", self.browser.title().await?);
        Ok(())
    }

    pub async fn login_listing(&self, username: &str, password: &str) -> Result<(), NavigationError> {
        let open = self
            .require(Locator::xpath(LISTING_LOGIN_OPEN), "login button")
            .await?;
        self.browser.script_click(&open).await?;
        self.settle(delay::STEP).await;

        let user = self.require(Locator::id("client_id"), "username field").await?;
        self.type_into(&user, username).await?;
        let pass = self.require(Locator::id("passwd"), "password field").await?;
        self.type_into(&pass, password).await?;
        let submit = self
            .require(Locator::xpath(LISTING_LOGIN_SUBMIT), "login submit")
            .await?;
        self.browser.click(&submit).await?;
        self.settle(delay::RENDER).await;

        match wait_for(self.browser, &Locator::xpath(LISTING_LOGGED_IN), self.wait_timeout).await {
            Ok(_) => {
                tracing::info!("logged in to listing site");
                Ok(())
            }
            Err(BrowserError::Timeout { .. }) => Err(NavigationError::LoginFailed("listing site")),
            Err(e) => Err(e.into()),
        }
    }

    /// Close the section overlay and the first visible generic popup.
    /// Returns how many were closed.
    pub async fn dismiss_listing_popups(&self) -> Result<usize, BrowserError> {
        let mut closed = 0;
        let toggle = [Locator::xpath(LISTING_SECTION_TOGGLE)];
        if let Some((_, el)) = self.first_visible(&toggle).await? {
            self.browser.click(&el).await?;
            self.settle(delay::POPUP).await;
            closed += 1;
        }
        if let Some((idx, el)) = self.first_visible(&xpaths(LISTING_POPUPS)).await? {
            match self.browser.click(&el).await {
                Ok(()) => {
                    tracing::debug!("closed popup via {}", LISTING_POPUPS[idx]);
                    self.settle(delay::POPUP).await;
                    closed += 1;
                }
                Err(e) => tracing::debug!("popup close failed: {}", e),
            }
        }
        Ok(closed)
    }

    pub async fn open_search(&self, search_url: &str) -> Result<(), NavigationError> {
        self.browser.goto(search_url).await?;
        self.settle(delay::STEP).await;
        self.dismiss_listing_popups().await?;
        Ok(())
    }

    /// Open the saved search `search_id` from the favorites menu.
    pub async fn open_favorite_search(&self, search_id: &str) -> Result<(), NavigationError> {
        let menu = self.require(Locator::id("fv_view1"), "favorite search menu").await?;
        self.browser.click(&menu).await?;
        self.settle(delay::STEP).await;

        let entry = Locator::xpath(format!(
            "//span[@onclick=\"FvMySrch('{}','1')\"]",
            search_id
        ));
        let entry = self.require(entry, "favorite search entry").await?;
        self.browser.click(&entry).await?;
        self.settle(delay::RENDER).await;

        self.require(Locator::xpath(LISTING_RESULTS), "search results").await?;
        tracing::info!("opened favorite search {}", search_id);
        Ok(())
    }

    /// Choose `size` rows per page. Returns false when the selector is absent.
    pub async fn set_page_size(&self, size: u32) -> Result<bool, BrowserError> {
        let option = Locator::xpath(format!(
            "//select[@id='dataSize_s']/option[@value='{}']",
            size
        ));
        match self.browser.find(&option).await? {
            Some(el) => {
                self.browser.click(&el).await?;
                self.settle(delay::RENDER).await;
                Ok(true)
            }
            None => {
                tracing::warn!("page size selector not found");
                Ok(false)
            }
        }
    }

    pub async fn wait_for_listing(&self) -> Result<(), NavigationError> {
        self.require(Locator::id("tblLst"), "listing table").await?;
        Ok(())
    }

    /// Open the detail view of `tid` and focus it.
    pub async fn open_detail(&self, tid: i64) -> Result<ViewScope, BrowserError> {
        let scope = ViewScope::open(self.browser, &detail_script(tid), self.wait_timeout).await?;
        self.settle(delay::RENDER).await;
        Ok(scope)
    }

    // ---- valuation site ----

    /// Click the "hide today" control, else the generic close control.
    /// Returns false when neither is shown.
    pub async fn dismiss_interstitials(&self) -> Result<bool, BrowserError> {
        for locator in xpaths(VALUATION_POPUPS) {
            let Some(el) = self.browser.find(&locator).await? else {
                continue;
            };
            if !self.browser.is_displayed(&el).await? {
                continue;
            }
            match self.browser.click(&el).await {
                Ok(()) => {
                    self.settle(delay::POPUP).await;
                    return Ok(true);
                }
                Err(e) => tracing::debug!("interstitial {} not closed: {}", locator, e),
            }
        }
        Ok(false)
    }

    pub async fn open_valuation_page(&self, link: &str) -> Result<(), BrowserError> {
        self.browser.goto(link).await?;
        self.settle(delay::PAGE_LOAD).await;
        tracing::debug!("valuation page: {}", self.browser.title().await?);
        self.dismiss_interstitials().await?;
        Ok(())
    }

    /// Pick the offered area option closest to `target_pyung`.
    ///
    /// Returns the chosen option in pyung, or `None` when the page offers no
    /// options.
    pub async fn select_nearest_area_option(
        &self,
        target_pyung: f64,
    ) -> Result<Option<f64>, BrowserError> {
        if let Some(dropdown) = self.browser.find(&Locator::xpath(AREA_DROPDOWN)).await? {
            self.browser.click(&dropdown).await?;
            self.settle(delay::STEP).await;
        }

        let mut candidates = Vec::new();
        for el in self.browser.find_all(&Locator::xpath(AREA_OPTIONS)).await? {
            let area = self.browser.attr(&el, "data-area").await?;
            if let Some(sqm) = area.and_then(|a| a.trim().parse::<f64>().ok()) {
                candidates.push((el, sqm / SQM_PER_PYUNG));
            }
        }
        let pyungs: Vec<f64> = candidates.iter().map(|(_, p)| *p).collect();
        let Some(idx) = nearest_option(&pyungs, target_pyung) else {
            tracing::warn!("no area options offered");
            return Ok(None);
        };

        let (el, chosen) = &candidates[idx];
        self.click_or_script(el).await?;
        self.settle(delay::RENDER).await;
        tracing::info!("selected area option {:.2} for target {:.2}", chosen, target_pyung);
        Ok(Some(*chosen))
    }

    /// Wait for the transaction table rows to render.
    pub async fn wait_for_transactions(&self) -> Result<(), NavigationError> {
        match wait_for_all(self.browser, &Locator::xpath(TRANSACTION_ROWS), self.wait_timeout).await {
            Ok(_) => {
                self.settle(delay::RENDER).await;
                Ok(())
            }
            Err(BrowserError::Timeout { .. }) => {
                Err(NavigationError::Missing("transaction table".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn login_valuation(&self, username: &str, password: &str) -> Result<(), NavigationError> {
        let Some((idx, button)) = self.first_present(&xpaths(VALUATION_LOGIN_BUTTONS)).await? else {
            return Err(NavigationError::Missing("valuation login button".to_string()));
        };
        tracing::debug!("valuation login via {}", VALUATION_LOGIN_BUTTONS[idx]);
        self.browser.script_click(&button).await?;
        self.settle(delay::STEP).await;

        let email = self.require(Locator::css(VALUATION_EMAIL), "email field").await?;
        self.type_into(&email, username).await?;
        let pass = self.require(Locator::css(VALUATION_PASSWORD), "password field").await?;
        self.type_into(&pass, password).await?;
        let submit = self.require(Locator::css(VALUATION_SUBMIT), "login submit").await?;
        self.browser.click(&submit).await?;
        self.settle(delay::RENDER).await;

        self.browser.refresh().await?;
        self.settle(delay::RENDER).await;
        tracing::info!("logged in to valuation site");
        Ok(())
    }

    /// Activate the building control (twice: the site ignores a single
    /// click) and then the estimate/assessed price tab.
    pub async fn select_building_and_open_estimate_tab(
        &self,
        building: Option<&str>,
    ) -> Result<(), NavigationError> {
        if let Some(building) = building {
            let locator = Locator::xpath(format!("//button[@data-dongnm='{}']", building));
            let button = self
                .browser
                .find(&locator)
                .await?
                .ok_or_else(|| NavigationError::Missing(format!("building {}", building)))?;
            self.browser.click(&button).await?;
            self.settle(delay::DOUBLE_CLICK_GAP).await;
            self.browser.click(&button).await?;
            self.settle(delay::STEP).await;
        }

        let tab = self
            .browser
            .find(&Locator::id(ESTIMATE_TAB))
            .await?
            .ok_or_else(|| NavigationError::Missing("estimate tab".to_string()))?;
        self.browser.click(&tab).await?;
        self.settle(delay::STEP).await;
        Ok(())
    }

    /// Expand the unit list when a "more" control is shown.
    pub async fn expand_unit_list(&self) -> Result<bool, BrowserError> {
        match self.first_visible(&xpaths(UNIT_LIST_MORE)).await? {
            Some((idx, more)) => {
                self.browser.script_click(&more).await?;
                self.settle(delay::STEP).await;
                tracing::debug!("expanded unit list via {}", UNIT_LIST_MORE[idx]);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn select_unit(&self, unit: &str) -> Result<(), NavigationError> {
        let locator = Locator::xpath(format!("//span[@data-honm='{}']", unit));
        let el = self
            .browser
            .find(&locator)
            .await?
            .ok_or_else(|| NavigationError::Missing(format!("unit {}", unit)))?;
        self.click_or_script(&el).await?;
        self.settle(delay::STEP).await;
        Ok(())
    }
}
