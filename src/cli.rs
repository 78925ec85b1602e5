// src/cli.rs
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::browser::BrowserConfig;
use crate::crawl::CrawlConfig;
use crate::export::{Encoding, Format};
use crate::listing::DEFAULT_SEARCH_URL;
use crate::net::HttpConfig;
use crate::ssl::SslMode;

#[derive(Parser, Debug)]
#[command(
    name = "gnavi-crawler",
    version,
    about = "Restaurant directory crawler: list pages → detail pages → name/phone/email/address/official URL/SSL → CSV or MySQL"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 목록/상세 페이지를 수집해서 저장
    Crawl(CrawlArgs),
    /// 저장된 CSV 의 SSL 열을 URL 스킴 기준으로 다시 계산
    FixSsl {
        /// 대상 CSV
        path: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FetchMode {
    Http,
    Browser,
}

#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// 검색 결과(목록) URL, 여러 번 지정 가능(환경 변수는 공백으로 구분)
    #[arg(long = "search-url", env = "SEARCH_URLS", value_delimiter = ' ', default_value = DEFAULT_SEARCH_URL)]
    pub search_urls: Vec<String>,

    #[arg(long, env = "MAX_RECORDS", default_value_t = 50)]
    pub max_records: usize,

    /// 검색 URL 당 최대 페이지
    #[arg(long, env = "MAX_PAGES", default_value_t = 10)]
    pub max_pages: usize,

    /// 요청 사이 대기(ms)
    #[arg(long, env = "DELAY_MS", default_value_t = 3000)]
    pub delay_ms: u64,

    /// 상세 페이지 동시 처리 수
    #[arg(long, env = "CONCURRENCY", default_value_t = 1)]
    pub concurrency: usize,

    /// 전체 시간 예산(초), 0 이면 제한 없음
    #[arg(long, env = "BUDGET_SECS", default_value_t = 0)]
    pub budget_secs: u64,

    #[arg(long, env = "TIMEOUT_SECS", default_value_t = 15)]
    pub timeout_secs: u64,

    #[arg(long, env = "RETRIES", default_value_t = 3)]
    pub retries: u32,

    #[arg(long, value_enum, env = "FETCHER", default_value_t = FetchMode::Http)]
    pub fetcher: FetchMode,

    #[arg(long, env = "WEBDRIVER_URL", default_value = "http://localhost:9515")]
    pub webdriver_url: String,

    /// 브라우저 창 띄우기
    #[arg(long, env = "HEADFUL", default_value_t = false)]
    pub headful: bool,

    #[arg(long, env = "SCROLL_PASSES", default_value_t = 3)]
    pub scroll_passes: usize,

    #[arg(long, value_enum, env = "SSL_CHECK", default_value_t = SslMode::Handshake)]
    pub ssl_check: SslMode,

    #[arg(long, env = "SSL_TIMEOUT_SECS", default_value_t = 5)]
    pub ssl_timeout_secs: u64,

    /// 출력 파일({date} 사용 가능)
    #[arg(long, env = "OUTPUT", default_value = "gnavi_shops_{date}.csv")]
    pub output: String,

    #[arg(long, value_enum, env = "FORMAT", default_value_t = Format::Csv)]
    pub format: Format,

    /// CSV 인코딩(utf8-bom / cp932)
    #[arg(long, value_enum, env = "ENCODING", default_value_t = Encoding::Utf8Bom)]
    pub encoding: Encoding,

    /// 지정하면 MySQL 에도 저장
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "TABLE", default_value = "restaurants")]
    pub table: String,

    /// 콘솔 미리보기 개수
    #[arg(long, env = "PREVIEW_N", default_value_t = 3)]
    pub preview: usize,
}

impl CrawlArgs {
    pub fn crawl_config(&self) -> CrawlConfig {
        CrawlConfig {
            search_urls: self.search_urls.clone(),
            max_records: self.max_records,
            max_pages: self.max_pages,
            delay: Duration::from_millis(self.delay_ms),
            concurrency: self.concurrency,
            budget: (self.budget_secs > 0).then(|| Duration::from_secs(self.budget_secs)),
        }
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            retries: self.retries,
            ..HttpConfig::default()
        }
    }

    pub fn browser_config(&self) -> BrowserConfig {
        BrowserConfig {
            webdriver_url: self.webdriver_url.clone(),
            headless: !self.headful,
            settle: Duration::from_secs(2),
            scroll_passes: self.scroll_passes,
        }
    }
}
