use super::{BrowserDriver, DriverConfig, ElementRef};
use crate::selector::xpath_literal;
use crate::{AutomationError, Selector};
use reqwest::blocking::Client;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Key under which W3C WebDriver serializes element references
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Lightweight W3C WebDriver client speaking the HTTP wire protocol
#[derive(Debug)]
pub struct WebDriverClient {
    base_url: String,
    session_id: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    value: Value,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

impl WebDriverClient {
    /// Open a new browser session on the configured remote end
    #[instrument(skip(config), fields(url = %config.webdriver_url, browser = %config.browser))]
    pub fn connect(config: &DriverConfig) -> Result<Self, AutomationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        let base_url = config.webdriver_url.trim_end_matches('/').to_string();

        let body = json!({ "capabilities": { "alwaysMatch": capabilities(config) } });
        let response = client.post(format!("{base_url}/session")).json(&body).send()?;
        let value = decode_response(response)?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AutomationError::Driver(format!("New session response lacks a sessionId: {value}"))
            })?
            .to_string();

        info!(session_id = %session_id, "WebDriver session opened");
        Ok(Self {
            base_url,
            session_id,
            client,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, AutomationError> {
        let url = format!("{}/session/{}{}", self.base_url, self.session_id, path);
        let mut request = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(&body);
        } else if method == Method::POST {
            request = request.json(&json!({}));
        }
        decode_response(request.send()?)
    }

    fn element_command(
        &self,
        method: Method,
        element: &ElementRef,
        suffix: &str,
        body: Option<Value>,
    ) -> Result<Value, AutomationError> {
        self.command(method, &format!("/element/{}{}", element.as_str(), suffix), body)
    }
}

fn capabilities(config: &DriverConfig) -> Value {
    let mut args = config.args.clone();
    let browser = config.browser.to_lowercase();
    match browser.as_str() {
        "firefox" => {
            if config.headless {
                args.push("-headless".to_string());
            }
            json!({ "browserName": "firefox", "moz:firefoxOptions": { "args": args } })
        }
        "edge" | "msedge" | "microsoftedge" => {
            if config.headless {
                args.push("--headless=new".to_string());
            }
            json!({ "browserName": "MicrosoftEdge", "ms:edgeOptions": { "args": args } })
        }
        _ => {
            if config.headless {
                args.push("--headless=new".to_string());
            }
            json!({ "browserName": "chrome", "goog:chromeOptions": { "args": args } })
        }
    }
}

fn decode_response(response: reqwest::blocking::Response) -> Result<Value, AutomationError> {
    let status = response.status();
    let text = response.text()?;
    let parsed: WireResponse = serde_json::from_str(&text).map_err(|e| {
        AutomationError::Driver(format!("Malformed WebDriver response ({status}): {e}: {text}"))
    })?;

    if status.is_success() {
        return Ok(parsed.value);
    }

    match serde_json::from_value::<WireError>(parsed.value) {
        Ok(err) => Err(map_wire_error(&err.error, &err.message)),
        Err(_) => Err(AutomationError::Driver(format!(
            "WebDriver returned {status} without an error payload"
        ))),
    }
}

/// Map a W3C error code onto the automation error taxonomy
pub(crate) fn map_wire_error(code: &str, message: &str) -> AutomationError {
    match code {
        "stale element reference" | "detached shadow root" => {
            AutomationError::StaleElement(message.to_string())
        }
        "no such element" | "no such frame" | "no such alert" => {
            AutomationError::ElementNotFound(format!("{code}: {message}"))
        }
        "timeout" | "script timeout" => AutomationError::Timeout(message.to_string()),
        "invalid selector" => AutomationError::InvalidSelector(message.to_string()),
        "invalid argument" => AutomationError::InvalidArgument(message.to_string()),
        _ => AutomationError::Driver(format!("{code}: {message}")),
    }
}

fn element_refs(value: Value) -> Result<Vec<ElementRef>, AutomationError> {
    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(AutomationError::Driver(format!(
                "Expected an element list, got {other}"
            )))
        }
    };
    items
        .iter()
        .map(|item| {
            item.get(ELEMENT_KEY)
                .and_then(Value::as_str)
                .map(ElementRef::new)
                .ok_or_else(|| AutomationError::Driver(format!("Not an element reference: {item}")))
        })
        .collect()
}

fn element_arg(element: &ElementRef) -> Value {
    json!({ ELEMENT_KEY: element.as_str() })
}

fn value_as_string(value: Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    }
}

impl BrowserDriver for WebDriverClient {
    fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        debug!(url, "Navigating");
        self.command(Method::POST, "/url", Some(json!({ "url": url })))?;
        Ok(())
    }

    fn find_elements(&self, selector: &Selector) -> Result<Vec<ElementRef>, AutomationError> {
        let (using, value) = selector.to_webdriver()?;
        let found = self.command(
            Method::POST,
            "/elements",
            Some(json!({ "using": using, "value": value })),
        )?;
        element_refs(found)
    }

    fn is_displayed(&self, element: &ElementRef) -> Result<bool, AutomationError> {
        let v = self.element_command(Method::GET, element, "/displayed", None)?;
        Ok(v.as_bool().unwrap_or(false))
    }

    fn is_enabled(&self, element: &ElementRef) -> Result<bool, AutomationError> {
        let v = self.element_command(Method::GET, element, "/enabled", None)?;
        Ok(v.as_bool().unwrap_or(false))
    }

    fn value(&self, element: &ElementRef) -> Result<String, AutomationError> {
        let v = self.element_command(Method::GET, element, "/property/value", None)?;
        Ok(value_as_string(v))
    }

    fn selected_text(&self, element: &ElementRef) -> Result<String, AutomationError> {
        let script = "const s = arguments[0]; \
                      if (!s || !s.options || s.selectedIndex < 0) { return ''; } \
                      return s.options[s.selectedIndex].text;";
        let v = self.execute_script(script, vec![element_arg(element)])?;
        Ok(value_as_string(v).trim().to_string())
    }

    fn text(&self, element: &ElementRef) -> Result<String, AutomationError> {
        let v = self.element_command(Method::GET, element, "/text", None)?;
        Ok(value_as_string(v))
    }

    fn clear(&self, element: &ElementRef) -> Result<(), AutomationError> {
        self.element_command(Method::POST, element, "/clear", None)?;
        Ok(())
    }

    fn send_keys(&self, element: &ElementRef, text: &str) -> Result<(), AutomationError> {
        self.element_command(Method::POST, element, "/value", Some(json!({ "text": text })))?;
        Ok(())
    }

    fn click(&self, element: &ElementRef) -> Result<(), AutomationError> {
        self.element_command(Method::POST, element, "/click", None)?;
        Ok(())
    }

    fn select_by_visible_text(
        &self,
        element: &ElementRef,
        text: &str,
    ) -> Result<(), AutomationError> {
        let xpath = format!(".//option[normalize-space(.) = {}]", xpath_literal(text.trim()));
        let found = self.element_command(
            Method::POST,
            element,
            "/elements",
            Some(json!({ "using": "xpath", "value": xpath })),
        )?;
        let options = element_refs(found)?;
        let option = options.first().ok_or_else(|| {
            AutomationError::ElementNotFound(format!("No option with visible text {text:?}"))
        })?;
        self.click(option)
    }

    fn execute_script(&self, script: &str, args: Vec<Value>) -> Result<Value, AutomationError> {
        self.command(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
    }

    fn page_source(&self) -> Result<String, AutomationError> {
        Ok(value_as_string(self.command(Method::GET, "/source", None)?))
    }

    fn switch_to_frame(&self, name: Option<&str>) -> Result<(), AutomationError> {
        let id = match name {
            None => Value::Null,
            Some(name) => {
                let selector =
                    Selector::Css(format!("iframe[name=\"{name}\"], frame[name=\"{name}\"]"));
                let frames = self.find_elements(&selector)?;
                let frame = frames.first().ok_or_else(|| {
                    AutomationError::ElementNotFound(format!("No frame named {name:?}"))
                })?;
                element_arg(frame)
            }
        };
        self.command(Method::POST, "/frame", Some(json!({ "id": id })))?;
        Ok(())
    }

    fn dismiss_alert(&self) -> Result<Option<String>, AutomationError> {
        let text = match self.command(Method::GET, "/alert/text", None) {
            Ok(v) => value_as_string(v),
            Err(AutomationError::ElementNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        self.command(Method::POST, "/alert/dismiss", None)?;
        Ok(Some(text))
    }

    fn quit(&self) -> Result<(), AutomationError> {
        let url = format!("{}/session/{}", self.base_url, self.session_id);
        let response = self.client.delete(url).send()?;
        if let Err(e) = decode_response(response) {
            warn!(error = %e, "WebDriver refused to delete the session");
            return Err(e);
        }
        info!(session_id = %self.session_id, "WebDriver session closed");
        Ok(())
    }
}
