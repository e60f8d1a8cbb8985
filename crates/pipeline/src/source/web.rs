//! Web page fetching and HTML-to-text cleanup.

use super::{RawDocument, TextSource};
use crate::normalize::normalize;
use async_trait::async_trait;
use fable_core::{AppError, AppResult};
use std::time::Duration;

/// Inline elements that do not separate words.
const INLINE_TAGS: [&str; 13] = [
    "a", "abbr", "b", "code", "em", "i", "mark", "small", "span", "strong", "sub", "sup", "u",
];

/// Fetches a page over HTTP and keeps its visible text.
#[derive(Debug, Clone)]
pub struct WebSource {
    client: reqwest::Client,
}

impl WebSource {
    pub fn new(timeout: Duration) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fable/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Download the raw HTML at `url`.
    ///
    /// Connection failures and non-success statuses are transport errors
    /// tagged with the URL.
    pub async fn fetch(&self, url: &str) -> AppResult<String> {
        tracing::debug!(url = %url, "Fetching page");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Transport(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Transport(format!("{}: HTTP {}", url, status)));
        }

        response
            .text()
            .await
            .map_err(|e| AppError::Transport(format!("{}: {}", url, e)))
    }
}

#[async_trait]
impl TextSource for WebSource {
    fn name(&self) -> &str {
        "web"
    }

    async fn extract(&self, location: &str) -> AppResult<RawDocument> {
        let html = self.fetch(location).await?;
        Ok(RawDocument::new(location, html_to_text(&html)))
    }
}

/// Visible text of an HTML document.
///
/// Drops comments and `<script>`/`<style>` bodies, removes tags, decodes
/// named and numeric entities and collapses whitespace.
pub fn html_to_text(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(open) = rest.find('<') {
        text.push_str(&rest[..open]);
        let tag = &rest[open..];

        rest = if tag.starts_with("<!--") {
            skip_past(tag, "-->")
        } else if let Some(element) = raw_text_element(tag) {
            skip_past_closing(tag, element)
        } else {
            if !INLINE_TAGS.contains(&tag_name(tag).as_str()) {
                text.push(' ');
            }
            skip_past(tag, ">")
        };
    }
    text.push_str(rest);

    normalize(&html_escape::decode_html_entities(&text)).into_string()
}

fn skip_past<'a>(s: &'a str, marker: &str) -> &'a str {
    match s.find(marker) {
        Some(at) => &s[at + marker.len()..],
        None => "",
    }
}

fn starts_with_ignore_case(s: &str, prefix: &str) -> bool {
    s.len() >= prefix.len() && s.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

/// `script` or `style` when `tag` opens one of them.
fn raw_text_element(tag: &str) -> Option<&'static str> {
    ["script", "style"].into_iter().find(|name| {
        let open = format!("<{}", name);
        starts_with_ignore_case(tag, &open)
            && tag[open.len()..]
                .chars()
                .next()
                .map_or(true, |c| c == '>' || c == '/' || c.is_whitespace())
    })
}

fn skip_past_closing<'a>(tag: &'a str, element: &str) -> &'a str {
    let closing = format!("</{}", element);
    let lower = tag.to_ascii_lowercase();
    match lower.find(&closing) {
        Some(at) => skip_past(&tag[at..], ">"),
        None => "",
    }
}

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('<')
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });

        format!("http://{}/clima", addr)
    }

    #[test]
    fn test_html_to_text_basic() {
        let html = "<html><body><p>Hello <b>world</b></p></body></html>";
        assert_eq!(html_to_text(html), "Hello world");
    }

    #[test]
    fn test_html_to_text_drops_script_and_style() {
        let html = r#"<head><STYLE type="text/css">p { color: red; }</style>
            <script>var x = "<p>no</p>";</script></head>
            <body><!-- aviso --><h1>Clima</h1><p>El  hielo
            se derrite.</p></body>"#;
        assert_eq!(html_to_text(html), "Clima El hielo se derrite.");
    }

    #[test]
    fn test_block_tags_separate_words() {
        assert_eq!(html_to_text("<li>uno</li><li>dos</li>"), "uno dos");
        assert_eq!(html_to_text("pala<em>bra</em>"), "palabra");
    }

    #[test]
    fn test_entities_are_decoded() {
        let html = "<p>Calor &amp; sequ&iacute;a &lt;3 &#241; &#xF1;&nbsp;fin</p>";
        assert_eq!(html_to_text(html), "Calor & sequía <3 ñ ñ fin");
    }

    #[test]
    fn test_spanish_named_entities_are_decoded() {
        let html = "<p>&iquest;Qu&eacute; pasa con el ni&ntilde;o y la &aacute;rida Am&eacute;rica?</p>";
        assert_eq!(html_to_text(html), "¿Qué pasa con el niño y la árida América?");
    }

    #[test]
    fn test_unknown_entity_is_kept() {
        assert_eq!(html_to_text("<p>a &noexiste; b</p>"), "a &noexiste; b");
    }

    #[test]
    fn test_multibyte_text_survives() {
        assert_eq!(html_to_text("<p>año · niño</p>"), "año · niño");
    }

    #[test]
    fn test_scriptlike_tag_name_is_not_script() {
        assert_eq!(html_to_text("<scripted>sí</scripted>"), "sí");
    }

    #[tokio::test]
    async fn test_extract_fetches_and_cleans() {
        let url = serve_once("200 OK", "<html><body><p>Los polos</p><p>se calientan</p></body></html>").await;
        let source = WebSource::new(Duration::from_secs(5)).unwrap();

        let doc = source.extract(&url).await.unwrap();
        assert_eq!(doc.source_id, url);
        assert_eq!(doc.text, "Los polos se calientan");
    }

    #[tokio::test]
    async fn test_http_error_is_tagged_with_url() {
        let url = serve_once("404 Not Found", "missing").await;
        let source = WebSource::new(Duration::from_secs(5)).unwrap();

        let err = source.fetch(&url).await.unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains(&url));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_invalid_url_is_transport_error() {
        let source = WebSource::new(Duration::from_secs(5)).unwrap();
        let err = source.fetch("not a url").await.unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("not a url"));
    }
}
