// src/browser/webdriver.rs
//! W3C WebDriver client over plain HTTP (chromedriver, geckodriver, Selenium)

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, trace};

use super::{BrowserError, BrowserSession, ElementHandle, Locator};
use crate::core::config_manager::BrowserConfig;

/// Key under which W3C drivers serialize element references
const ELEMENT_KEY: &str = "element-6066-11e4-a6ab-4aba-ad68-4f7a0c6e6f4b";

const COMMAND_TIMEOUT_SECS: u64 = 90;

const BROWSER_ARGS: &[&str] = &[
    "--window-size=1920,1080",
    "--disable-blink-features=AutomationControlled",
    "--disable-notifications",
    "--no-sandbox",
    "--disable-dev-shm-usage",
];

pub struct WebDriverSession {
    client: reqwest::Client,
    base_url: String,
    session_id: String,
}

impl WebDriverSession {
    /// Open a new browser session on the driver at `config.webdriver_url`
    pub async fn start(config: &BrowserConfig) -> Result<Self, BrowserError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(COMMAND_TIMEOUT_SECS))
            .build()?;
        let base_url = config.webdriver_url.trim_end_matches('/').to_string();

        let mut args: Vec<&str> = BROWSER_ARGS.to_vec();
        if config.headless {
            args.push("--headless=new");
        }

        let capabilities = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": { "args": args },
                    "timeouts": { "implicit": 0, "pageLoad": 60_000 }
                }
            }
        });

        info!(
            "Starting WebDriver session at {} (headless: {})",
            base_url, config.headless
        );

        let response = client
            .post(format!("{}/session", base_url))
            .json(&capabilities)
            .send()
            .await?;
        let value = Self::read_value(response).await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::Protocol {
                status: 200,
                message: "new session response carried no sessionId".to_string(),
            })?
            .to_string();

        info!("WebDriver session {} started", session_id);

        Ok(Self {
            client,
            base_url,
            session_id,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, BrowserError> {
        let url = format!("{}/session/{}{}", self.base_url, self.session_id, path);
        trace!("WebDriver {} {}", method, path);

        let mut request = self.client.request(method.clone(), &url);
        if method == Method::POST {
            request = request.json(&body.unwrap_or_else(|| json!({})));
        }

        let response = request.send().await?;
        Self::read_value(response).await
    }

    async fn read_value(response: reqwest::Response) -> Result<Value, BrowserError> {
        let status = response.status();
        let text = response.text().await?;

        let mut parsed: Value = serde_json::from_str(&text).map_err(|_| BrowserError::Protocol {
            status: status.as_u16(),
            message: text.clone(),
        })?;
        let value = parsed.get_mut("value").map(Value::take).unwrap_or(Value::Null);

        if status.is_success() {
            return Ok(value);
        }

        let code = value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Err(map_error(status.as_u16(), code, message))
    }

    fn element_path(element: &ElementHandle, suffix: &str) -> String {
        format!("/element/{}{}", element.id(), suffix)
    }
}

fn map_error(status: u16, code: &str, message: String) -> BrowserError {
    match code {
        "no such element" | "stale element reference" | "no such frame" => {
            BrowserError::NoSuchElement(message)
        }
        "invalid session id" | "no such window" => BrowserError::SessionClosed,
        "timeout" | "script timeout" => BrowserError::Timeout(message),
        _ => BrowserError::Protocol {
            status,
            message: format!("{}: {}", code, message),
        },
    }
}

fn element_ref(element: &ElementHandle) -> Value {
    json!({ ELEMENT_KEY: element.id() })
}

fn parse_elements(value: &Value) -> Vec<ElementHandle> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get(ELEMENT_KEY).and_then(Value::as_str))
                .map(|id| ElementHandle(id.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn locator_body(locator: &Locator) -> Value {
    json!({ "using": locator.strategy(), "value": locator.value() })
}

fn as_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        debug!("Navigating to {}", url);
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        self.command(Method::GET, "/url", None).await.map(as_string)
    }

    async fn refresh(&self) -> Result<(), BrowserError> {
        self.command(Method::POST, "/refresh", None).await?;
        Ok(())
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementHandle>, BrowserError> {
        let value = self
            .command(Method::POST, "/elements", Some(locator_body(locator)))
            .await?;
        Ok(parse_elements(&value))
    }

    async fn find_within(
        &self,
        parent: &ElementHandle,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        let value = self
            .command(
                Method::POST,
                &Self::element_path(parent, "/elements"),
                Some(locator_body(locator)),
            )
            .await?;
        Ok(parse_elements(&value))
    }

    async fn text(&self, element: &ElementHandle) -> Result<String, BrowserError> {
        self.command(Method::GET, &Self::element_path(element, "/text"), None)
            .await
            .map(as_string)
    }

    async fn attribute(
        &self,
        element: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        let value = self
            .command(
                Method::GET,
                &Self::element_path(element, &format!("/attribute/{}", name)),
                None,
            )
            .await?;
        Ok(match value {
            Value::Null => None,
            other => Some(as_string(other)),
        })
    }

    async fn value(&self, element: &ElementHandle) -> Result<String, BrowserError> {
        self.command(
            Method::GET,
            &Self::element_path(element, "/property/value"),
            None,
        )
        .await
        .map(as_string)
    }

    async fn tag_name(&self, element: &ElementHandle) -> Result<String, BrowserError> {
        self.command(Method::GET, &Self::element_path(element, "/name"), None)
            .await
            .map(|v| as_string(v).to_lowercase())
    }

    async fn is_displayed(&self, element: &ElementHandle) -> Result<bool, BrowserError> {
        self.command(Method::GET, &Self::element_path(element, "/displayed"), None)
            .await
            .map(|v| v.as_bool().unwrap_or(false))
    }

    async fn is_enabled(&self, element: &ElementHandle) -> Result<bool, BrowserError> {
        self.command(Method::GET, &Self::element_path(element, "/enabled"), None)
            .await
            .map(|v| v.as_bool().unwrap_or(false))
    }

    async fn is_selected(&self, element: &ElementHandle) -> Result<bool, BrowserError> {
        self.command(Method::GET, &Self::element_path(element, "/selected"), None)
            .await
            .map(|v| v.as_bool().unwrap_or(false))
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        self.command(Method::POST, &Self::element_path(element, "/click"), None)
            .await?;
        Ok(())
    }

    async fn clear(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        self.command(Method::POST, &Self::element_path(element, "/clear"), None)
            .await?;
        Ok(())
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), BrowserError> {
        self.command(
            Method::POST,
            &Self::element_path(element, "/value"),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn scroll_into_view(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({
                "script": "arguments[0].scrollIntoView({block: 'center'});",
                "args": [element_ref(element)]
            })),
        )
        .await?;
        Ok(())
    }

    async fn switch_to_frame(&self, frame: Option<&ElementHandle>) -> Result<(), BrowserError> {
        let id = frame.map(element_ref).unwrap_or(Value::Null);
        self.command(Method::POST, "/frame", Some(json!({ "id": id })))
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        info!("Closing WebDriver session {}", self.session_id);
        self.command(Method::DELETE, "", None).await?;
        Ok(())
    }
}
