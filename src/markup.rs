//! # Stage: Inline Markup
//!
//! ## Responsibility
//! Turn the raw text of a chat message into a small, safe HTML fragment.
//! Supported markup is deliberately tiny: `**strong**`/`__strong__`,
//! `*em*`/`_em_`, `` `code` `` and `[label](url)` links.
//!
//! ## Guarantees
//! - Angle brackets from the input never survive unescaped; the only tags in
//!   the output are the ones introduced by the four substitution classes.
//! - Spans are matched non-greedily and never cross a line break.
//! - A link whose URL cannot be resolved is left as literal text.
//! - Non-panicking: resolution failures are logged, never returned.
//!
//! ## NOT Responsible For
//! - Idempotence. Rendering already-rendered output is undefined; callers
//!   render each raw message exactly once.
//! - Block-level markdown (lists, headings, quotes).

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;
use url::Url;

static STRONG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*|__(.+?)__").expect("strong pattern is valid"));
static EMPHASIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*(.+?)\*|_(.+?)_").expect("emphasis pattern is valid"));
static CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`(.+?)`").expect("code pattern is valid"));
static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("link pattern is valid"));

/// Renders chat message text against an optional page location.
///
/// Relative link targets are joined onto `base`. Without a base only absolute
/// URLs resolve; everything else is left as literal text.
#[derive(Debug, Clone, Default)]
pub struct MarkupRenderer {
    base: Option<Url>,
}

impl MarkupRenderer {
    pub fn new(base: Option<Url>) -> Self {
        MarkupRenderer { base }
    }

    /// The location relative links are resolved against.
    pub fn base(&self) -> Option<&Url> {
        self.base.as_ref()
    }

    /// Render `text` into an HTML fragment.
    ///
    /// The five steps run in a fixed order, each exactly once over the whole
    /// string. Escaping comes first so no later step can smuggle in markup;
    /// strong runs before emphasis so `**` is not eaten as two `*` spans.
    pub fn render(&self, text: &str) -> String {
        let text = escape_angle_brackets(text);
        let text = STRONG.replace_all(&text, |caps: &Captures| {
            format!("<strong>{}</strong>", first_group(caps))
        });
        let text = EMPHASIS.replace_all(&text, |caps: &Captures| {
            format!("<em>{}</em>", first_group(caps))
        });
        let text = CODE.replace_all(&text, "<code>$1</code>");
        let text = LINK.replace_all(&text, |caps: &Captures| self.link(caps));
        text.into_owned()
    }

    fn link(&self, caps: &Captures) -> String {
        let whole = &caps[0];
        let label = &caps[1];
        let target = &caps[2];

        match self.resolve(target) {
            Ok(url) => format!(
                r#"<a href="{}" target="_blank">{}</a>"#,
                url.as_str().replace('"', "&quot;"),
                label
            ),
            Err(e) => {
                debug!(url = target, error = %e, "could not resolve link in message, leaving it as text");
                whole.to_string()
            }
        }
    }

    fn resolve(&self, target: &str) -> Result<Url, url::ParseError> {
        match &self.base {
            Some(base) => base.join(target),
            None => Url::parse(target),
        }
    }
}

/// Render `text` without a page location (absolute links only).
pub fn render(text: &str) -> String {
    MarkupRenderer::default().render(text)
}

/// Replace `<` and `>` with their entity forms. Nothing else is touched.
pub fn escape_angle_brackets(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

/// Escape text for use inside an element or a double-quoted attribute.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn first_group<'t>(caps: &Captures<'t>) -> &'t str {
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
