// src/fetcher.rs
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

use crate::browser::BrowserSession;
use crate::net::{self, HttpConfig};

/// 페이지를 가져오는 두 가지 방법. 브라우저는 탭 하나라 락으로 직렬화한다.
#[derive(Clone)]
pub enum Fetcher {
    Http { client: reqwest::Client, cfg: HttpConfig },
    Browser(Arc<Mutex<BrowserSession>>),
}

impl Fetcher {
    pub fn http(cfg: HttpConfig) -> anyhow::Result<Self> {
        Ok(Fetcher::Http { client: net::build_client(&cfg)?, cfg })
    }

    pub fn browser(session: BrowserSession) -> Self {
        Fetcher::Browser(Arc::new(Mutex::new(session)))
    }

    pub async fn page(&self, url: &str, referer: Option<&str>) -> Option<String> {
        match self {
            Fetcher::Http { client, cfg } => net::fetch_html_with_retry(client, url, referer, cfg).await,
            Fetcher::Browser(session) => {
                let session = session.lock().await;
                match session.page_source(url).await {
                    Ok(src) => Some(src),
                    Err(e) => {
                        warn!(url, error = %format!("{e:#}"), "browser fetch failed");
                        None
                    }
                }
            }
        }
    }

    /// 디렉터리 내부 리다이렉트 링크가 최종적으로 가리키는 URL
    pub async fn resolve(&self, url: &str) -> Option<String> {
        match self {
            Fetcher::Http { client, cfg } => net::resolve_redirect(client, url, cfg.timeout).await,
            Fetcher::Browser(session) => {
                let session = session.lock().await;
                match session.landing_url(url).await {
                    Ok(u) => Some(u),
                    Err(e) => {
                        warn!(url, error = %format!("{e:#}"), "browser redirect failed");
                        None
                    }
                }
            }
        }
    }

    pub async fn close(self) -> anyhow::Result<()> {
        if let Fetcher::Browser(session) = self {
            match Arc::try_unwrap(session) {
                Ok(m) => m.into_inner().quit().await?,
                Err(_) => warn!("browser session still shared, leaving it to the driver"),
            }
        }
        Ok(())
    }
}
