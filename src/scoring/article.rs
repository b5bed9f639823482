use crate::scoring::build_http_client;
use crate::scoring::types::{ArticleText, ScoreError};
use crate::storage::entity::article_text;
use crate::storage::repository::ArticleRepository;
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use regex::Regex;
use sea_orm::DatabaseConnection;
use std::sync::OnceLock;

pub const MAX_SNIPPET_CHARS: usize = 2000;
pub const MAX_FETCH_ERROR_CHARS: usize = 512;

/// 取得待打分文章的标题与摘要
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// stored 为新闻记录上已有的 title/snippet
    async fn load(&self, url: &str, stored: &ArticleText) -> Result<ArticleText, ScoreError>;
}

/// 优先使用库内文本，否则 HTTP 抓取网页并抽取 <title> 与 meta description
pub struct HttpArticleSource {
    client: reqwest::Client,
}

impl HttpArticleSource {
    pub fn new(proxy: Option<&str>, timeout_secs: u64, user_agent: &str) -> Result<Self, ScoreError> {
        Ok(Self {
            client: build_http_client(proxy, timeout_secs, Some(user_agent))?,
        })
    }
}

fn has_text(v: &Option<String>) -> bool {
    v.as_deref().is_some_and(|s| !s.trim().is_empty())
}

#[async_trait]
impl ArticleSource for HttpArticleSource {
    async fn load(&self, url: &str, stored: &ArticleText) -> Result<ArticleText, ScoreError> {
        if has_text(&stored.title) || has_text(&stored.snippet) {
            return Ok(ArticleText {
                url: url.to_string(),
                title: stored.title.clone(),
                snippet: stored.snippet.as_deref().map(truncate_chars),
            });
        }

        debug!("抓取文章: {url}");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScoreError::Http(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ScoreError::Http(format!("{} fetching {url}", status.as_u16())));
        }
        let html = resp
            .text()
            .await
            .map_err(|e| ScoreError::Http(e.to_string()))?;

        let article = extract_article(url, &html);
        if !has_text(&article.title) && !has_text(&article.snippet) {
            return Err(ScoreError::InvalidResponse(format!("no title or description in {url}")));
        }
        Ok(article)
    }
}

/// 以 article_texts 表做 URL 级缓存：命中文本直接返回，记录过抓取失败的 URL 不再请求
pub struct CachedArticleSource<S> {
    db: DatabaseConnection,
    inner: S,
}

impl<S: ArticleSource> CachedArticleSource<S> {
    pub fn new(db: DatabaseConnection, inner: S) -> Self {
        Self { db, inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn remember(&self, url: &str, result: &Result<ArticleText, ScoreError>) {
        let (title, snippet, fetch_error) = match result {
            Ok(a) => (a.title.clone(), a.snippet.clone(), None),
            Err(e) => (
                None,
                None,
                Some(e.to_string().chars().take(MAX_FETCH_ERROR_CHARS).collect()),
            ),
        };
        let row = article_text::Model {
            article_url: url.to_string(),
            title,
            snippet,
            last_fetched_at: Utc::now().timestamp(),
            fetch_error,
        };
        if let Err(e) = ArticleRepository::upsert(&self.db, row).await {
            warn!("⚠ 写入文章缓存失败 {url}: {e}");
        }
    }
}

#[async_trait]
impl<S: ArticleSource> ArticleSource for CachedArticleSource<S> {
    async fn load(&self, url: &str, stored: &ArticleText) -> Result<ArticleText, ScoreError> {
        if has_text(&stored.title) || has_text(&stored.snippet) {
            return self.inner.load(url, stored).await;
        }

        match ArticleRepository::find(&self.db, url).await {
            Ok(Some(row)) => {
                if let Some(err) = row.fetch_error.filter(|e| !e.trim().is_empty()) {
                    return Err(ScoreError::Http(format!("{url} failed earlier: {err}")));
                }
                if has_text(&row.title) || has_text(&row.snippet) {
                    debug!("文章缓存命中: {url}");
                    return Ok(ArticleText {
                        url: url.to_string(),
                        title: row.title,
                        snippet: row.snippet,
                    });
                }
            }
            Ok(None) => {}
            Err(e) => warn!("⚠ 读取文章缓存失败 {url}: {e}"),
        }

        let result = self.inner.load(url, stored).await;
        self.remember(url, &result).await;
        result
    }
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title pattern"))
}

fn meta_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<meta\s[^>]*(?:name|property)\s*=\s*["'](?:og:)?description["'][^>]*>"#)
            .expect("meta pattern")
    })
}

fn content_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?is)content\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("content pattern"))
}

pub fn extract_article(url: &str, html: &str) -> ArticleText {
    let title = title_re()
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| clean_html_text(m.as_str()))
        .filter(|s| !s.is_empty());

    let snippet = meta_re()
        .find_iter(html)
        .filter_map(|tag| content_re().captures(tag.as_str()))
        .filter_map(|c| c.get(1).or_else(|| c.get(2)))
        .map(|m| clean_html_text(m.as_str()))
        .find(|s| !s.is_empty())
        .map(|s| truncate_chars(&s));

    ArticleText {
        url: url.to_string(),
        title,
        snippet,
    }
}

fn clean_html_text(raw: &str) -> String {
    let decoded = raw
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn truncate_chars(s: &str) -> String {
    s.chars().take(MAX_SNIPPET_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{self, CountingFetcher};

    #[test]
    fn extracts_title_and_description() {
        let html = r#"<html><head>
            <TITLE> Acme &amp; Co agrees
              merger </TITLE>
            <meta property="og:description" content='Deal "expected" to close in Q3'>
            <meta name="description" content="fallback">
        </head></html>"#;
        let a = extract_article("https://news.test/x", html);
        assert_eq!(a.title.as_deref(), Some("Acme & Co agrees merger"));
        assert_eq!(a.snippet.as_deref(), Some("Deal \"expected\" to close in Q3"));
    }

    #[test]
    fn missing_tags_yield_none() {
        let a = extract_article("u", "<html><body>nothing</body></html>");
        assert_eq!(a.title, None);
        assert_eq!(a.snippet, None);
    }

    #[test]
    fn snippet_is_truncated_on_char_boundary() {
        let long = "é".repeat(MAX_SNIPPET_CHARS + 10);
        assert_eq!(truncate_chars(&long).chars().count(), MAX_SNIPPET_CHARS);
    }

    #[tokio::test]
    async fn cache_serves_later_loads_without_fetching() {
        let db = testkit::memory_db().await;
        let fetcher = CountingFetcher::new().dead("https://n/dead");
        let source = CachedArticleSource::new(db.clone(), fetcher);
        let bare = |url: &str| ArticleText {
            url: url.to_string(),
            title: None,
            snippet: None,
        };

        let first = source.load("https://n/1", &bare("https://n/1")).await.unwrap();
        let again = source.load("https://n/1", &bare("https://n/1")).await.unwrap();
        assert_eq!(first, again);
        assert!(source.load("https://n/dead", &bare("https://n/dead")).await.is_err());
        assert!(source.load("https://n/dead", &bare("https://n/dead")).await.is_err());
        assert_eq!(source.inner.fetches(), 2);

        let dead = ArticleRepository::find(&db, "https://n/dead").await.unwrap().unwrap();
        assert!(dead.fetch_error.is_some());
        assert_eq!(dead.title, None);
    }

    #[tokio::test]
    async fn cache_is_shared_across_sources() {
        let db = testkit::memory_db().await;
        let bare = ArticleText {
            url: "https://n/1".into(),
            title: None,
            snippet: None,
        };
        CachedArticleSource::new(db.clone(), CountingFetcher::new())
            .load("https://n/1", &bare)
            .await
            .unwrap();

        let later = CachedArticleSource::new(db.clone(), CountingFetcher::new());
        let a = later.load("https://n/1", &bare).await.unwrap();
        assert_eq!(a.title.as_deref(), Some("Fetched https://n/1"));
        assert_eq!(later.inner.fetches(), 0);
    }

    #[tokio::test]
    async fn stored_text_skips_network() {
        let source = HttpArticleSource::new(None, 1, "test-agent").unwrap();
        let stored = ArticleText {
            url: "http://127.0.0.1:9/unreachable".into(),
            title: Some("Stored headline".into()),
            snippet: None,
        };
        let a = source.load(&stored.url, &stored).await.unwrap();
        assert_eq!(a.title.as_deref(), Some("Stored headline"));
    }
}
