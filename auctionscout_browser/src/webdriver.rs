//! [`Browser`] implementation backed by a remote WebDriver (chromedriver).

use async_trait::async_trait;
use fantoccini::{elements::Element, wd::WindowHandle, Client, ClientBuilder};
use serde_json::{json, Value};

use crate::{Browser, BrowserError, Locator, SessionCookie, ViewHandle};

/// Desktop Chrome user agent presented to the scraped sites.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// A live Chrome session driven over the WebDriver protocol.
pub struct WebDriverBrowser {
    client: Client,
}

impl WebDriverBrowser {
    /// Open a new Chrome session through the WebDriver server at `webdriver_url`
    /// (usually `http://localhost:9515`).
    pub async fn connect(webdriver_url: &str, headless: bool) -> Result<Self, BrowserError> {
        let mut builder = ClientBuilder::rustls();
        builder.capabilities(chrome_capabilities(headless));
        let client = builder.connect(webdriver_url).await?;
        tracing::info!("browser session started via {}", webdriver_url);
        Ok(Self { client })
    }

    /// End the WebDriver session and close every window.
    pub async fn quit(self) -> Result<(), BrowserError> {
        self.client.close().await?;
        Ok(())
    }
}

fn chrome_capabilities(headless: bool) -> serde_json::Map<String, Value> {
    let mut args = vec![
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-notifications".to_string(),
        "--disable-popup-blocking".to_string(),
        "--window-size=1920,1080".to_string(),
        format!("--user-agent={}", USER_AGENT),
    ];
    if headless {
        args.push("--headless=new".to_string());
    }

    let mut caps = serde_json::Map::new();
    caps.insert(
        "goog:chromeOptions".to_string(),
        json!({
            "args": args,
            "excludeSwitches": ["enable-automation"],
            "prefs": {
                "credentials_enable_service": false,
                "profile.password_manager_enabled": false,
            },
        }),
    );
    caps
}

fn element_arg(element: &Element) -> Result<Value, BrowserError> {
    serde_json::to_value(element).map_err(|e| BrowserError::Script(e.to_string()))
}

#[async_trait]
impl Browser for WebDriverBrowser {
    type Element = Element;

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        tracing::debug!("goto {}", url);
        self.client.goto(url).await?;
        Ok(())
    }

    async fn refresh(&self) -> Result<(), BrowserError> {
        self.client.refresh().await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.client.current_url().await?.to_string())
    }

    async fn title(&self) -> Result<String, BrowserError> {
        Ok(self.client.title().await?)
    }

    async fn source(&self) -> Result<String, BrowserError> {
        Ok(self.client.source().await?)
    }

    async fn find(&self, locator: &Locator) -> Result<Option<Element>, BrowserError> {
        match self.client.find(locator.as_webdriver()).await {
            Ok(element) => Ok(Some(element)),
            Err(e) if e.is_miss() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<Element>, BrowserError> {
        Ok(self.client.find_all(locator.as_webdriver()).await?)
    }

    async fn attr(&self, element: &Element, name: &str) -> Result<Option<String>, BrowserError> {
        Ok(element.attr(name).await?)
    }

    async fn is_displayed(&self, element: &Element) -> Result<bool, BrowserError> {
        Ok(element.is_displayed().await?)
    }

    async fn click(&self, element: &Element) -> Result<(), BrowserError> {
        element.click().await?;
        Ok(())
    }

    async fn script_click(&self, element: &Element) -> Result<(), BrowserError> {
        let arg = element_arg(element)?;
        self.client
            .execute("arguments[0].click();", vec![arg])
            .await?;
        Ok(())
    }

    async fn clear(&self, element: &Element) -> Result<(), BrowserError> {
        element.clear().await?;
        Ok(())
    }

    async fn send_keys(&self, element: &Element, text: &str) -> Result<(), BrowserError> {
        element.send_keys(text).await?;
        Ok(())
    }

    async fn execute(&self, script: &str) -> Result<(), BrowserError> {
        self.client
            .execute(script, vec![])
            .await
            .map_err(|e| BrowserError::Script(format!("{}: {}", script, e)))?;
        Ok(())
    }

    async fn views(&self) -> Result<Vec<ViewHandle>, BrowserError> {
        let handles = self.client.windows().await?;
        Ok(handles
            .into_iter()
            .map(|h| ViewHandle::new(String::from(h)))
            .collect())
    }

    async fn current_view(&self) -> Result<ViewHandle, BrowserError> {
        let handle = self.client.window().await?;
        Ok(ViewHandle::new(String::from(handle)))
    }

    async fn switch_to(&self, view: &ViewHandle) -> Result<(), BrowserError> {
        let handle = WindowHandle::try_from(view.as_str().to_string())
            .map_err(|_| BrowserError::NoSuchView(view.to_string()))?;
        self.client.switch_to_window(handle).await?;
        Ok(())
    }

    async fn close_view(&self) -> Result<(), BrowserError> {
        self.client.close_window().await?;
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<SessionCookie>, BrowserError> {
        let cookies = self.client.get_all_cookies().await?;
        Ok(cookies
            .into_iter()
            .map(|c| SessionCookie {
                name: c.name().to_string(),
                value: c.value().to_string(),
            })
            .collect())
    }
}
