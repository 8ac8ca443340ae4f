//! Minimal W3C WebDriver client.
//!
//! Only the handful of commands the calculator protocol needs are wrapped:
//! session lifecycle, navigation, page source and synchronous script
//! execution. Form controls are driven through scripts that set the value and
//! dispatch the same `input`/`change`/`blur` events a user would, because the
//! calculator validates on those events and ignores bare value changes.

use std::time::Duration;

use log::{debug, warn};
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("WebDriver request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("WebDriver returned {error}: {message}")]
    Protocol { error: String, message: String },
    #[error("unexpected WebDriver response: {0}")]
    UnexpectedResponse(String),
    #[error("element not found: {0}")]
    ElementNotFound(String),
    #[error("option {value:?} not available in {selector}")]
    OptionNotFound { selector: String, value: String },
}

impl BrowserError {
    pub fn is_timeout(&self) -> bool {
        match self {
            BrowserError::Http(e) => e.is_timeout(),
            BrowserError::Protocol { error, .. } => error == "timeout",
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

/// The browser operations the quote protocol is written against.
pub trait FormPage {
    fn goto(&mut self, url: &str) -> Result<(), BrowserError>;
    /// `Ok(false)` when the element is missing or hidden.
    fn is_visible(&mut self, selector: &str) -> Result<bool, BrowserError>;
    fn is_enabled(&mut self, selector: &str) -> Result<bool, BrowserError>;
    /// Options of a `<select>`, excluding placeholders with an empty value.
    fn options(&mut self, selector: &str) -> Result<Vec<SelectOption>, BrowserError>;
    fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError>;
    fn select(&mut self, selector: &str, value: &str) -> Result<(), BrowserError>;
    fn click(&mut self, selector: &str) -> Result<(), BrowserError>;
    /// Submits the form through `requestSubmit`, which runs validation like a
    /// click would but also works while the submit button is disabled.
    fn submit_form(&mut self, form_selector: &str) -> Result<(), BrowserError>;
    fn source(&mut self) -> Result<String, BrowserError>;
}

/// Opens one browser session per call. The returned page must release the
/// session when dropped.
pub trait Launcher {
    type Page: FormPage;

    fn launch(&self) -> Result<Self::Page, BrowserError>;
}

const VISIBLE_SCRIPT: &str = r#"
const el = document.querySelector(arguments[0]);
if (!el) return false;
const style = window.getComputedStyle(el);
return style.display !== 'none' && style.visibility !== 'hidden' && el.getClientRects().length > 0;
"#;

const ENABLED_SCRIPT: &str = r#"
const el = document.querySelector(arguments[0]);
return !!el && !el.disabled;
"#;

const OPTIONS_SCRIPT: &str = r#"
const el = document.querySelector(arguments[0]);
if (!el || !el.options) return [];
return Array.from(el.options)
    .filter(o => o.value !== '')
    .map(o => ({ value: o.value, label: o.textContent.trim() }));
"#;

const FILL_SCRIPT: &str = r#"
const el = document.querySelector(arguments[0]);
if (!el) return 'missing';
el.focus();
el.value = arguments[1];
el.dispatchEvent(new Event('input', { bubbles: true }));
el.dispatchEvent(new Event('change', { bubbles: true }));
el.dispatchEvent(new Event('blur', { bubbles: true }));
return 'ok';
"#;

const SELECT_SCRIPT: &str = r#"
const el = document.querySelector(arguments[0]);
if (!el) return 'missing';
const wanted = arguments[1];
const option = Array.from(el.options || []).find(o => o.value === wanted || o.textContent.trim() === wanted);
if (!option) return 'no-option';
el.focus();
el.value = option.value;
el.dispatchEvent(new Event('change', { bubbles: true }));
el.dispatchEvent(new Event('blur', { bubbles: true }));
return 'ok';
"#;

const CLICK_SCRIPT: &str = r#"
const el = document.querySelector(arguments[0]);
if (!el) return 'missing';
el.focus();
el.click();
el.dispatchEvent(new Event('change', { bubbles: true }));
return 'ok';
"#;

const SUBMIT_SCRIPT: &str = r#"
const form = document.querySelector(arguments[0]);
if (!form) return 'missing';
form.requestSubmit();
return 'ok';
"#;

/// Connection settings for a running chromedriver/geckodriver.
#[derive(Debug, Clone)]
pub struct WebDriver {
    client: Client,
    endpoint: String,
    headless: bool,
    page_load_timeout: Duration,
}

impl WebDriver {
    pub fn new(
        endpoint: &str,
        headless: bool,
        page_load_timeout: Duration,
    ) -> Result<Self, BrowserError> {
        // Navigation blocks until the page has loaded, so the HTTP timeout
        // has to outlast the driver's own page-load timeout.
        let client = Client::builder()
            .timeout(page_load_timeout + Duration::from_secs(30))
            .build()?;
        Ok(WebDriver {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            headless,
            page_load_timeout,
        })
    }

    fn capabilities(&self) -> Value {
        let mut chrome_args = vec!["--no-sandbox", "--disable-dev-shm-usage", "--window-size=1280,1024"];
        let mut firefox_args: Vec<&str> = Vec::new();
        if self.headless {
            chrome_args.push("--headless=new");
            firefox_args.push("-headless");
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "pageLoadStrategy": "normal",
                    "goog:chromeOptions": { "args": chrome_args },
                    "moz:firefoxOptions": { "args": firefox_args }
                }
            }
        })
    }
}

impl Launcher for WebDriver {
    type Page = Session;

    fn launch(&self) -> Result<Session, BrowserError> {
        // Create a new browser session
        let response = send(
            self.client
                .post(format!("{}/session", self.endpoint))
                .json(&self.capabilities()),
        )?;
        let id = response
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| BrowserError::UnexpectedResponse(response.to_string()))?
            .to_string();
        debug!("Opened WebDriver session {}", id);

        let session = Session {
            client: self.client.clone(),
            url: format!("{}/session/{}", self.endpoint, id),
            id,
        };
        // Apply driver timeouts; if this fails the session is still released by Drop
        session.command_post(
            "timeouts",
            json!({
                "pageLoad": self.page_load_timeout.as_millis() as u64,
                "script": 30_000,
                "implicit": 0
            }),
        )?;
        Ok(session)
    }
}

/// A live browser session, deleted when dropped.
#[derive(Debug)]
pub struct Session {
    client: Client,
    url: String,
    id: String,
}

impl Session {
    pub fn id(&self) -> &str {
        &self.id
    }

    fn command_post(&self, command: &str, body: Value) -> Result<Value, BrowserError> {
        send(self.client.post(format!("{}/{}", self.url, command)).json(&body))
    }

    fn execute(&self, script: &str, args: &[&str]) -> Result<Value, BrowserError> {
        self.command_post("execute/sync", json!({ "script": script, "args": args }))
    }

    /// Runs one of the control scripts, which report `missing`/`no-option`
    /// instead of throwing so the error can name the selector.
    fn interact(&self, script: &str, selector: &str, value: &str) -> Result<(), BrowserError> {
        let outcome = self.execute(script, &[selector, value])?;
        match outcome.as_str() {
            Some("ok") => Ok(()),
            Some("missing") => Err(BrowserError::ElementNotFound(selector.to_string())),
            Some("no-option") => Err(BrowserError::OptionNotFound {
                selector: selector.to_string(),
                value: value.to_string(),
            }),
            _ => Err(BrowserError::UnexpectedResponse(outcome.to_string())),
        }
    }
}

impl FormPage for Session {
    fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        self.command_post("url", json!({ "url": url }))?;
        Ok(())
    }

    fn is_visible(&mut self, selector: &str) -> Result<bool, BrowserError> {
        Ok(self.execute(VISIBLE_SCRIPT, &[selector])?.as_bool().unwrap_or(false))
    }

    fn is_enabled(&mut self, selector: &str) -> Result<bool, BrowserError> {
        Ok(self.execute(ENABLED_SCRIPT, &[selector])?.as_bool().unwrap_or(false))
    }

    fn options(&mut self, selector: &str) -> Result<Vec<SelectOption>, BrowserError> {
        let value = self.execute(OPTIONS_SCRIPT, &[selector])?;
        let entries = value
            .as_array()
            .ok_or_else(|| BrowserError::UnexpectedResponse(value.to_string()))?;
        Ok(entries
            .iter()
            .filter_map(|entry| {
                Some(SelectOption {
                    value: entry.get("value")?.as_str()?.to_string(),
                    label: entry.get("label")?.as_str()?.to_string(),
                })
            })
            .collect())
    }

    fn fill(&mut self, selector: &str, value: &str) -> Result<(), BrowserError> {
        self.interact(FILL_SCRIPT, selector, value)
    }

    fn select(&mut self, selector: &str, value: &str) -> Result<(), BrowserError> {
        self.interact(SELECT_SCRIPT, selector, value)
    }

    fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        self.interact(CLICK_SCRIPT, selector, "")
    }

    fn submit_form(&mut self, form_selector: &str) -> Result<(), BrowserError> {
        self.interact(SUBMIT_SCRIPT, form_selector, "")
    }

    fn source(&mut self) -> Result<String, BrowserError> {
        // Fetch the rendered DOM, not the original response
        let value = send(self.client.get(format!("{}/source", self.url)))?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BrowserError::UnexpectedResponse("page source was not a string".into()))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        match self.client.delete(&self.url).send() {
            Ok(_) => debug!("Closed WebDriver session {}", self.id),
            Err(e) => warn!("Failed to close WebDriver session {}: {}", self.id, e),
        }
    }
}

/// Sends a command and unwraps the `value` member of the reply.
fn send(request: RequestBuilder) -> Result<Value, BrowserError> {
    let response = request.send()?;
    let status = response.status();

    // Every reply wraps its payload in a "value" member
    let mut body: Value = response.json()?;
    let value = body.get_mut("value").map(Value::take).unwrap_or(Value::Null);

    // Errors carry "error" and "message" inside that payload
    if !status.is_success() {
        return Err(protocol_error(&value, status.as_u16()));
    }
    Ok(value)
}

fn protocol_error(value: &Value, status: u16) -> BrowserError {
    let field = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);
    BrowserError::Protocol {
        error: field("error").unwrap_or_else(|| format!("HTTP {}", status)),
        message: field("message").unwrap_or_default(),
    }
}
