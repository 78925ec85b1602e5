// src/ssl.rs
use anyhow::Result;
use clap::ValueEnum;
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SslMode {
    /// https:// 로 시작하는지만 본다
    Scheme,
    /// 실제 TLS 연결(인증서 검증 포함)이 되는지 본다
    Handshake,
}

/// https 스킴 여부
pub fn scheme_only(url: &str) -> bool {
    url.trim().starts_with("https://")
}

#[derive(Clone)]
pub struct SslChecker {
    mode: SslMode,
    client: reqwest::Client,
}

impl SslChecker {
    pub fn new(mode: SslMode, limit: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(limit)
            .timeout(limit)
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(crate::net::UA)
            .build()?;
        Ok(SslChecker { mode, client })
    }

    pub fn mode(&self) -> SslMode {
        self.mode
    }

    pub async fn check(&self, url: &str) -> bool {
        if !scheme_only(url) {
            return false;
        }
        match self.mode {
            SslMode::Scheme => true,
            SslMode::Handshake => self.handshake(url.trim()).await,
        }
    }

    // 응답 코드와 무관하게 응답을 받았으면 TLS 는 성립한 것
    async fn handshake(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(resp) => {
                debug!(url, status = %resp.status(), "tls ok");
                true
            }
            Err(e) => {
                debug!(url, error = %e, "tls check failed");
                false
            }
        }
    }
}
