// src/browser.rs
//! WebDriver(chromedriver) 로 페이지를 여는 경로. 목록이 JS 로 채워질 때 쓴다.

use anyhow::{Context, Result};
use std::time::Duration;
use thirtyfour::prelude::*;
use thirtyfour::ChromiumLikeCapabilities;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::net::UA;

#[derive(Clone, Debug)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub headless: bool,
    /// 로드 직후 대기
    pub settle: Duration,
    /// 바닥까지 스크롤 횟수(지연 로딩 대응)
    pub scroll_passes: usize,
}

pub struct BrowserSession {
    driver: WebDriver,
    cfg: BrowserConfig,
}

impl BrowserSession {
    pub async fn launch(cfg: BrowserConfig) -> Result<Self> {
        let mut caps = DesiredCapabilities::chrome();
        caps.add_arg(&format!("--user-agent={UA}"))?;
        caps.add_arg("--disable-blink-features=AutomationControlled")?;
        caps.add_arg("--no-sandbox")?;
        caps.add_arg("--disable-dev-shm-usage")?;
        caps.add_arg("--lang=ja-JP")?;
        if cfg.headless {
            caps.add_arg("--headless=new")?;
        } else {
            caps.add_arg("--start-maximized")?;
        }
        caps.add_experimental_option("excludeSwitches", vec!["enable-automation"])?;

        let driver = WebDriver::new(cfg.webdriver_url.as_str(), caps)
            .await
            .with_context(|| format!("cannot reach webdriver at {}", cfg.webdriver_url))?;
        info!(webdriver = %cfg.webdriver_url, headless = cfg.headless, "browser session started");
        Ok(BrowserSession { driver, cfg })
    }

    /// 페이지를 열고 스크롤한 뒤의 DOM 소스
    pub async fn page_source(&self, url: &str) -> Result<String> {
        self.driver.goto(url).await.with_context(|| format!("goto {url}"))?;
        sleep(self.cfg.settle).await;
        for _ in 0..self.cfg.scroll_passes {
            self.driver
                .execute("window.scrollTo(0, document.body.scrollHeight);", Vec::new())
                .await?;
            sleep(Duration::from_millis(800)).await;
        }
        let src = self.driver.source().await?;
        debug!(url, bytes = src.len(), "page source");
        Ok(src)
    }

    /// 링크를 직접 열어 도착한 URL 을 본다(클릭 리다이렉트 대체)
    pub async fn landing_url(&self, url: &str) -> Result<String> {
        self.driver.goto(url).await.with_context(|| format!("goto {url}"))?;
        sleep(self.cfg.settle).await;
        Ok(self.driver.current_url().await?.to_string())
    }

    pub async fn quit(self) -> Result<()> {
        self.driver.quit().await?;
        Ok(())
    }
}
