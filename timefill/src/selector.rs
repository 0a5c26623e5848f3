/// Represents ways to locate a DOM element
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Select by the element's `id` attribute
    Id(String),
    /// Select by the element's `name` attribute
    Name(String),
    /// Select using a CSS selector
    Css(String),
    /// Select using an XPath expression
    XPath(String),
    /// Select by visible link text
    LinkText(String),
    /// Represents an invalid selector string, with a reason.
    Invalid(String),
}

impl Selector {
    pub fn id(id: impl Into<String>) -> Self {
        Selector::Id(id.into())
    }

    /// Translate into the W3C WebDriver `(using, value)` pair.
    ///
    /// WebDriver has no native id/name strategies, so both are expressed as
    /// CSS attribute selectors. Attribute selectors are used instead of `#id`
    /// because the target application's ids contain `$`, which is not a
    /// valid bare CSS identifier character.
    pub fn to_webdriver(&self) -> Result<(&'static str, String), crate::AutomationError> {
        match self {
            Selector::Id(id) => Ok(("css selector", format!("[id=\"{}\"]", css_escape(id)))),
            Selector::Name(name) => Ok((
                "css selector",
                format!("[name=\"{}\"]", css_escape(name)),
            )),
            Selector::Css(css) => Ok(("css selector", css.clone())),
            Selector::XPath(xpath) => Ok(("xpath", xpath.clone())),
            Selector::LinkText(text) => Ok(("link text", text.clone())),
            Selector::Invalid(reason) => {
                Err(crate::AutomationError::InvalidSelector(reason.clone()))
            }
        }
    }
}

fn css_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Build an XPath string literal for arbitrary text, including text that
/// contains both quote characters.
pub fn xpath_literal(text: &str) -> String {
    if !text.contains('"') {
        return format!("\"{text}\"");
    }
    if !text.contains('\'') {
        return format!("'{text}'");
    }
    let parts: Vec<String> = text
        .split('"')
        .map(|part| format!("\"{part}\""))
        .collect();
    format!("concat({})", parts.join(", '\"', "))
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Id(v) => write!(f, "#{v}"),
            Selector::Name(v) => write!(f, "name:{v}"),
            Selector::Css(v) => write!(f, "css:{v}"),
            Selector::XPath(v) => write!(f, "xpath:{v}"),
            Selector::LinkText(v) => write!(f, "link:{v}"),
            Selector::Invalid(v) => write!(f, "invalid({v})"),
        }
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        let s = s.trim();
        match s {
            _ if s.is_empty() => Selector::Invalid("Empty selector".to_string()),
            _ if s.starts_with("id:") => Selector::Id(s[3..].to_string()),
            _ if s.starts_with('#') => Selector::Id(s[1..].to_string()),
            _ if s.to_lowercase().starts_with("name:") => Selector::Name(s[5..].to_string()),
            _ if s.to_lowercase().starts_with("css:") => Selector::Css(s[4..].to_string()),
            _ if s.to_lowercase().starts_with("xpath:") => Selector::XPath(s[6..].to_string()),
            _ if s.to_lowercase().starts_with("link:") => Selector::LinkText(s[5..].to_string()),
            _ if s.starts_with('/') || s.starts_with("(/") => Selector::XPath(s.to_string()),
            _ => Selector::Invalid(format!(
                "Unknown selector format: \"{s}\". Use prefixes like 'id:', '#', 'name:', 'css:', 'xpath:' or 'link:' to specify the selector type."
            )),
        }
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::from(s.as_str())
    }
}
