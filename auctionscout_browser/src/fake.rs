//! Scripted in-memory [`Browser`] for exercising navigation logic offline.
//!
//! Pages are registered up front with their serialized source and the
//! elements the navigation code is expected to look up. Every interaction is
//! appended to an action log that tests can assert against.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::{Browser, BrowserError, Locator, SessionCookie, ViewHandle};

const BLANK: &str = "about:blank";

/// An element registered on a [`FakePage`].
#[derive(Debug, Clone)]
pub struct FakeElement {
    attrs: HashMap<String, String>,
    displayed: bool,
    click_intercepted: bool,
    navigates_to: Option<String>,
}

impl Default for FakeElement {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeElement {
    pub fn new() -> Self {
        Self {
            attrs: HashMap::new(),
            displayed: true,
            click_intercepted: false,
            navigates_to: None,
        }
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Present in the DOM but not visible.
    pub fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    /// Native clicks fail as if an overlay covered the element; script clicks still work.
    pub fn intercept_click(mut self) -> Self {
        self.click_intercepted = true;
        self
    }

    /// Clicking loads `url` into the focused view.
    pub fn navigates_to(mut self, url: impl Into<String>) -> Self {
        self.navigates_to = Some(url.into());
        self
    }
}

/// A page that can be loaded into a view of the [`FakeBrowser`].
#[derive(Debug, Clone)]
pub struct FakePage {
    url: String,
    title: String,
    source: String,
    elements: Vec<(Locator, FakeElement)>,
}

impl FakePage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            source: String::new(),
            elements: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_element(mut self, locator: Locator, element: FakeElement) -> Self {
        self.elements.push((locator, element));
        self
    }
}

/// Handle to an element of a [`FakePage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeHandle {
    page: String,
    index: usize,
    locator: Locator,
}

/// One recorded interaction with the [`FakeBrowser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Goto(String),
    Refresh,
    Click(Locator),
    ScriptClick(Locator),
    Clear(Locator),
    SendKeys(Locator, String),
    Execute(String),
    SwitchTo(ViewHandle),
    CloseView(ViewHandle),
}

struct View {
    handle: ViewHandle,
    url: String,
}

struct State {
    pages: HashMap<String, FakePage>,
    views: Vec<View>,
    focused: Option<ViewHandle>,
    openers: HashMap<String, String>,
    failing_scripts: HashSet<String>,
    cookies: Vec<SessionCookie>,
    actions: Vec<Action>,
    next_view: usize,
}

impl State {
    fn focused_index(&self) -> Result<usize, BrowserError> {
        let focused = self
            .focused
            .as_ref()
            .ok_or_else(|| BrowserError::NoSuchView("focused view was closed".to_string()))?;
        self.views
            .iter()
            .position(|v| &v.handle == focused)
            .ok_or_else(|| BrowserError::NoSuchView(focused.to_string()))
    }

    fn focused_url(&self) -> Result<String, BrowserError> {
        let idx = self.focused_index()?;
        Ok(self.views[idx].url.clone())
    }

    fn element(&self, handle: &FakeHandle) -> Result<&FakeElement, BrowserError> {
        self.pages
            .get(&handle.page)
            .and_then(|p| p.elements.get(handle.index))
            .map(|(_, el)| el)
            .ok_or_else(|| BrowserError::StaleElement(handle.locator.to_string()))
    }

    fn open_view(&mut self, url: String) -> ViewHandle {
        let handle = ViewHandle::new(format!("view-{}", self.next_view));
        self.next_view += 1;
        self.views.push(View {
            handle: handle.clone(),
            url,
        });
        handle
    }

    fn navigate_focused(&mut self, url: String) -> Result<(), BrowserError> {
        let idx = self.focused_index()?;
        self.views[idx].url = url;
        Ok(())
    }
}

/// In-memory browser with a single initial blank view.
pub struct FakeBrowser {
    state: Mutex<State>,
}

impl Default for FakeBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBrowser {
    pub fn new() -> Self {
        let mut state = State {
            pages: HashMap::new(),
            views: Vec::new(),
            focused: None,
            openers: HashMap::new(),
            failing_scripts: HashSet::new(),
            cookies: Vec::new(),
            actions: Vec::new(),
            next_view: 0,
        };
        let first = state.open_view(BLANK.to_string());
        state.focused = Some(first);
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register (or replace) a page by its URL.
    pub fn add_page(&self, page: FakePage) {
        let mut state = self.lock();
        state.pages.insert(page.url.clone(), page);
    }

    /// Executing exactly `script` opens a new, unfocused view showing `url`.
    pub fn on_script(&self, script: impl Into<String>, url: impl Into<String>) {
        self.lock().openers.insert(script.into(), url.into());
    }

    /// Executing exactly `script` fails with [`BrowserError::Script`].
    pub fn fail_script(&self, script: impl Into<String>) {
        self.lock().failing_scripts.insert(script.into());
    }

    pub fn set_cookie(&self, name: impl Into<String>, value: impl Into<String>) {
        self.lock().cookies.push(SessionCookie {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Every interaction so far, oldest first.
    pub fn actions(&self) -> Vec<Action> {
        self.lock().actions.clone()
    }

    /// Number of native and script clicks delivered to elements found by `locator`.
    pub fn clicks_on(&self, locator: &Locator) -> usize {
        self.lock()
            .actions
            .iter()
            .filter(|a| matches!(a, Action::Click(l) | Action::ScriptClick(l) if l == locator))
            .count()
    }

    /// Text typed into elements found by `locator`, concatenated.
    pub fn typed_into(&self, locator: &Locator) -> String {
        self.lock()
            .actions
            .iter()
            .filter_map(|a| match a {
                Action::SendKeys(l, text) if l == locator => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Number of views currently open.
    pub fn view_count(&self) -> usize {
        self.lock().views.len()
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    type Element = FakeHandle;

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        let mut state = self.lock();
        state.actions.push(Action::Goto(url.to_string()));
        state.navigate_focused(url.to_string())
    }

    async fn refresh(&self) -> Result<(), BrowserError> {
        let mut state = self.lock();
        state.focused_index()?;
        state.actions.push(Action::Refresh);
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        self.lock().focused_url()
    }

    async fn title(&self) -> Result<String, BrowserError> {
        let state = self.lock();
        let url = state.focused_url()?;
        Ok(state
            .pages
            .get(&url)
            .map(|p| p.title.clone())
            .unwrap_or_default())
    }

    async fn source(&self) -> Result<String, BrowserError> {
        let state = self.lock();
        let url = state.focused_url()?;
        Ok(state
            .pages
            .get(&url)
            .map(|p| p.source.clone())
            .unwrap_or_default())
    }

    async fn find(&self, locator: &Locator) -> Result<Option<FakeHandle>, BrowserError> {
        Ok(self.find_all(locator).await?.into_iter().next())
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<FakeHandle>, BrowserError> {
        let state = self.lock();
        let url = state.focused_url()?;
        let Some(page) = state.pages.get(&url) else {
            return Ok(Vec::new());
        };
        Ok(page
            .elements
            .iter()
            .enumerate()
            .filter(|(_, (l, _))| l == locator)
            .map(|(index, _)| FakeHandle {
                page: url.clone(),
                index,
                locator: locator.clone(),
            })
            .collect())
    }

    async fn attr(&self, element: &FakeHandle, name: &str) -> Result<Option<String>, BrowserError> {
        Ok(self.lock().element(element)?.attrs.get(name).cloned())
    }

    async fn is_displayed(&self, element: &FakeHandle) -> Result<bool, BrowserError> {
        Ok(self.lock().element(element)?.displayed)
    }

    async fn click(&self, element: &FakeHandle) -> Result<(), BrowserError> {
        let mut state = self.lock();
        let el = state.element(element)?.clone();
        if el.click_intercepted {
            return Err(BrowserError::Command(format!(
                "element click intercepted: {}",
                element.locator
            )));
        }
        state.actions.push(Action::Click(element.locator.clone()));
        match el.navigates_to {
            Some(url) => state.navigate_focused(url),
            None => Ok(()),
        }
    }

    async fn script_click(&self, element: &FakeHandle) -> Result<(), BrowserError> {
        let mut state = self.lock();
        let el = state.element(element)?.clone();
        state
            .actions
            .push(Action::ScriptClick(element.locator.clone()));
        match el.navigates_to {
            Some(url) => state.navigate_focused(url),
            None => Ok(()),
        }
    }

    async fn clear(&self, element: &FakeHandle) -> Result<(), BrowserError> {
        let mut state = self.lock();
        state.element(element)?;
        state.actions.push(Action::Clear(element.locator.clone()));
        Ok(())
    }

    async fn send_keys(&self, element: &FakeHandle, text: &str) -> Result<(), BrowserError> {
        let mut state = self.lock();
        state.element(element)?;
        state
            .actions
            .push(Action::SendKeys(element.locator.clone(), text.to_string()));
        Ok(())
    }

    async fn execute(&self, script: &str) -> Result<(), BrowserError> {
        let mut state = self.lock();
        state.focused_index()?;
        state.actions.push(Action::Execute(script.to_string()));
        if state.failing_scripts.contains(script) {
            return Err(BrowserError::Script(script.to_string()));
        }
        if let Some(url) = state.openers.get(script).cloned() {
            state.open_view(url);
        }
        Ok(())
    }

    async fn views(&self) -> Result<Vec<ViewHandle>, BrowserError> {
        Ok(self.lock().views.iter().map(|v| v.handle.clone()).collect())
    }

    async fn current_view(&self) -> Result<ViewHandle, BrowserError> {
        let state = self.lock();
        let idx = state.focused_index()?;
        Ok(state.views[idx].handle.clone())
    }

    async fn switch_to(&self, view: &ViewHandle) -> Result<(), BrowserError> {
        let mut state = self.lock();
        if !state.views.iter().any(|v| &v.handle == view) {
            return Err(BrowserError::NoSuchView(view.to_string()));
        }
        state.actions.push(Action::SwitchTo(view.clone()));
        state.focused = Some(view.clone());
        Ok(())
    }

    async fn close_view(&self) -> Result<(), BrowserError> {
        let mut state = self.lock();
        let idx = state.focused_index()?;
        let closed = state.views.remove(idx);
        state.actions.push(Action::CloseView(closed.handle));
        state.focused = None;
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<SessionCookie>, BrowserError> {
        Ok(self.lock().cookies.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = "https://listing.test/list";

    fn browser_with_list() -> FakeBrowser {
        let browser = FakeBrowser::new();
        browser.add_page(
            FakePage::new(LIST)
                .with_title("list")
                .with_source("<table id='tblLst'></table>")
                .with_element(Locator::id("client_id"), FakeElement::new())
                .with_element(
                    Locator::css("a.tac-box"),
                    FakeElement::new().attr("data-area", "59.9"),
                )
                .with_element(
                    Locator::css("a.tac-box"),
                    FakeElement::new().attr("data-area", "84.9"),
                )
                .with_element(
                    Locator::id("covered"),
                    FakeElement::new().intercept_click(),
                ),
        );
        browser
    }

    #[tokio::test]
    async fn missing_element_is_none_not_error() {
        let browser = browser_with_list();
        browser.goto(LIST).await.unwrap();
        assert!(browser.find(&Locator::id("nope")).await.unwrap().is_none());
        assert_eq!(browser.find_all(&Locator::css("a.tac-box")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn blank_view_has_no_elements() {
        let browser = browser_with_list();
        assert_eq!(browser.current_url().await.unwrap(), "about:blank");
        assert!(browser.find(&Locator::id("client_id")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn intercepted_click_falls_back_to_script_click() {
        let browser = browser_with_list();
        browser.goto(LIST).await.unwrap();
        let covered = browser.find(&Locator::id("covered")).await.unwrap().unwrap();
        assert!(browser.click(&covered).await.is_err());
        browser.script_click(&covered).await.unwrap();
        assert_eq!(browser.clicks_on(&Locator::id("covered")), 1);
    }

    #[tokio::test]
    async fn script_opens_unfocused_view() {
        let browser = browser_with_list();
        browser.on_script("cntsViewPN(1, 1, 1, 0);", "https://listing.test/detail/1");
        browser.goto(LIST).await.unwrap();
        let base = browser.current_view().await.unwrap();

        browser.execute("cntsViewPN(1, 1, 1, 0);").await.unwrap();

        assert_eq!(browser.view_count(), 2);
        assert_eq!(browser.current_view().await.unwrap(), base);
    }

    #[tokio::test]
    async fn closing_focused_view_leaves_no_focus() {
        let browser = browser_with_list();
        browser.on_script("open()", LIST);
        browser.execute("open()").await.unwrap();
        let views = browser.views().await.unwrap();
        browser.switch_to(&views[1]).await.unwrap();
        browser.close_view().await.unwrap();

        assert!(matches!(
            browser.current_view().await,
            Err(BrowserError::NoSuchView(_))
        ));
        browser.switch_to(&views[0]).await.unwrap();
        assert_eq!(browser.current_view().await.unwrap(), views[0]);
    }

    #[tokio::test]
    async fn typed_text_is_recorded() {
        let browser = browser_with_list();
        browser.goto(LIST).await.unwrap();
        let input = browser.find(&Locator::id("client_id")).await.unwrap().unwrap();
        browser.clear(&input).await.unwrap();
        browser.send_keys(&input, "bidder").await.unwrap();
        assert_eq!(browser.typed_into(&Locator::id("client_id")), "bidder");
    }
}
