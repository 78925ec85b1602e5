// src/net.rs
use anyhow::Result;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA, REFERER, USER_AGENT};
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

pub const UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                      (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Clone, Debug)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub retries: u32,
    pub backoff: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            timeout: Duration::from_secs(15),
            retries: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http status {0}")]
    Status(StatusCode),
    #[error("blocked by bot check (status {0})")]
    Blocked(StatusCode),
    #[error("empty body")]
    Empty,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/* ================= HTTP 공통 ================= */

pub fn build_client(cfg: &HttpConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(UA));
    headers.insert(ACCEPT, HeaderValue::from_static(
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    ));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("ja,en-US;q=0.9,en;q=0.8"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

    Ok(reqwest::Client::builder()
        .cookie_store(true) // 세션 쿠키 유지
        .pool_max_idle_per_host(2)
        .tcp_keepalive(Duration::from_secs(20))
        .connect_timeout(Duration::from_secs(5))
        .timeout(cfg.timeout)
        .redirect(Policy::limited(10))
        .default_headers(headers)
        .build()?)
}

// 접근 제한/혼잡 안내, CDN 차단, 캡차 페이지에 나오는 문구
const BOT_MARKERS: &[&str] = &[
    "アクセスが制限されています",
    "アクセスが集中しております",
    "不正なアクセス",
    "ロボットではありません",
    "g-recaptcha",
    "<title>Access Denied</title>",
];

pub fn looks_like_bot(status: StatusCode, body: &str) -> bool {
    matches!(status.as_u16(), 403 | 429 | 503) || BOT_MARKERS.iter().any(|m| body.contains(m))
}

pub async fn fetch_html(
    client: &reqwest::Client,
    url: &str,
    referer: Option<&str>,
    limit: Duration,
) -> Result<String, FetchError> {
    let mut req = client.get(url);
    if let Some(r) = referer {
        req = req.header(REFERER, r);
    }
    let resp = timeout(limit, req.send())
        .await
        .map_err(|_| FetchError::Timeout(limit))??;

    let status = resp.status();
    let text = resp.text().await?;
    if looks_like_bot(status, &text) {
        return Err(FetchError::Blocked(status));
    }
    if !status.is_success() {
        return Err(FetchError::Status(status));
    }
    if text.trim().is_empty() {
        return Err(FetchError::Empty);
    }
    Ok(text)
}

/// 실패 시 backoff 두 배씩(상한 8배) 재시도
pub async fn fetch_html_with_retry(
    client: &reqwest::Client,
    url: &str,
    referer: Option<&str>,
    cfg: &HttpConfig,
) -> Option<String> {
    let mut backoff = cfg.backoff;
    let cap = cfg.backoff * 8;
    for attempt in 1..=cfg.retries.max(1) {
        match fetch_html(client, url, referer, cfg.timeout).await {
            Ok(text) => return Some(text),
            Err(FetchError::Status(s)) if s == StatusCode::NOT_FOUND => {
                debug!(url, "not found, no retry");
                return None;
            }
            Err(e) => warn!(url, attempt, error = %e, "fetch failed"),
        }
        if attempt < cfg.retries {
            sleep(backoff).await;
            backoff = (backoff * 2).min(cap);
        }
    }
    None
}

/// 리다이렉트를 따라간 최종 URL
pub async fn resolve_redirect(client: &reqwest::Client, url: &str, limit: Duration) -> Option<String> {
    match timeout(limit, client.get(url).send()).await {
        Ok(Ok(resp)) => Some(resp.url().to_string()),
        Ok(Err(e)) => {
            debug!(url, error = %e, "redirect resolution failed");
            None
        }
        Err(_) => {
            debug!(url, "redirect resolution timed out");
            None
        }
    }
}
