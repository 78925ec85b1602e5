// src/crawl.rs
use anyhow::Result;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::{task::JoinSet, time::sleep};
use tracing::{debug, info, warn};
use url::Url;

use crate::detail::{self, OfficialLink};
use crate::fetcher::Fetcher;
use crate::listing;
use crate::shop::Shop;
use crate::ssl::SslChecker;

#[derive(Clone, Debug)]
pub struct CrawlConfig {
    pub search_urls: Vec<String>,
    pub max_records: usize,
    pub max_pages: usize,
    /// 요청 사이 고정 대기
    pub delay: Duration,
    pub concurrency: usize,
    pub budget: Option<Duration>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    MissingName,
    MissingAddress,
    DuplicateName,
    Full,
}

/// 수집 결과 + 채택 규칙(이름 필수, 市区町村/番地 필수, 이름 중복 금지)
#[derive(Debug)]
pub struct Collector {
    max: usize,
    shops: Vec<Shop>,
    names: HashSet<String>,
}

impl Collector {
    pub fn new(max: usize) -> Self {
        Collector { max, shops: Vec::new(), names: HashSet::new() }
    }

    pub fn offer(&mut self, shop: Shop) -> Admission {
        if self.is_full() {
            return Admission::Full;
        }
        if shop.name.trim().is_empty() {
            return Admission::MissingName;
        }
        if shop.city.is_empty() || shop.street.is_empty() {
            return Admission::MissingAddress;
        }
        if !self.names.insert(shop.name.clone()) {
            return Admission::DuplicateName;
        }
        self.shops.push(shop);
        Admission::Accepted
    }

    pub fn len(&self) -> usize {
        self.shops.len()
    }

    pub fn is_full(&self) -> bool {
        self.shops.len() >= self.max
    }

    pub fn into_shops(self) -> Vec<Shop> {
        self.shops
    }
}

/* ================= 상세 ================= */

async fn official_url(fetcher: &Fetcher, link: Option<OfficialLink>) -> String {
    match link {
        Some(OfficialLink::Direct(u)) => u,
        Some(OfficialLink::Redirect(r)) => fetcher
            .resolve(&r)
            .await
            .filter(|u| Url::parse(u).map(|p| !detail::is_directory_url(&p)).unwrap_or(false))
            .unwrap_or_default(),
        None => String::new(),
    }
}

pub async fn visit_detail(
    fetcher: &Fetcher,
    ssl: &SslChecker,
    url: &str,
    referer: &str,
    delay: Duration,
) -> Option<Shop> {
    sleep(delay).await;
    let html = fetcher.page(url, Some(referer)).await?;
    let d = detail::parse_detail(&html, url);
    if d.address.is_empty() {
        debug!(url, "no address on page");
    }
    let official = official_url(fetcher, d.official).await;
    let has_ssl = ssl.check(&official).await;
    debug!(url, name = %d.name, official = %official, has_ssl, "detail parsed");
    Some(Shop::new(d.name, d.phone, d.email, d.address, official, has_ssl))
}

/* ================= 목록 → 상세 루프 ================= */

pub async fn crawl(cfg: &CrawlConfig, fetcher: &Fetcher, ssl: &SslChecker) -> Result<Vec<Shop>> {
    let started = Instant::now();
    let over_budget = || cfg.budget.is_some_and(|b| started.elapsed() >= b);
    let conc = cfg.concurrency.max(1);

    let mut collector = Collector::new(cfg.max_records);
    let mut visited: HashSet<String> = HashSet::new();
    let mut first_request = true;

    'search: for base in &cfg.search_urls {
        info!(search_url = %base, "search start");

        for page in 1..=cfg.max_pages {
            if collector.is_full() || over_budget() {
                break 'search;
            }
            let list_url = match listing::page_url(base, page) {
                Ok(u) => u,
                Err(e) => {
                    warn!(search_url = %base, error = %e, "bad search url, skipped");
                    continue 'search;
                }
            };

            if !first_request {
                sleep(cfg.delay).await;
            }
            first_request = false;

            info!(page, url = %list_url, collected = collector.len(), target = cfg.max_records, "list page");
            let Some(html) = fetcher.page(&list_url, None).await else {
                warn!(url = %list_url, "list page unavailable, next search url");
                break;
            };

            let links: Vec<String> = listing::collect_shop_links(&html, &list_url)
                .into_iter()
                .filter(|l| visited.insert(l.clone()))
                .collect();
            info!(page, found = links.len(), "shop links");
            if links.is_empty() {
                break;
            }

            // 상세 병렬(기본 1 = 순차)
            let mut join = JoinSet::new();
            let mut next = 0usize;
            loop {
                while join.len() < conc
                    && next < links.len()
                    && collector.len() + join.len() < cfg.max_records
                    && !over_budget()
                {
                    let url = links[next].clone();
                    next += 1;
                    let fetcher = fetcher.clone();
                    let ssl = ssl.clone();
                    let referer = list_url.clone();
                    let delay = cfg.delay;
                    join.spawn(async move {
                        let shop = visit_detail(&fetcher, &ssl, &url, &referer, delay).await;
                        (url, shop)
                    });
                }

                let Some(res) = join.join_next().await else { break };
                match res {
                    Ok((url, Some(shop))) => {
                        let name = shop.name.clone();
                        match collector.offer(shop) {
                            Admission::Accepted => {
                                info!(n = collector.len(), target = cfg.max_records, name = %name, "collected")
                            }
                            reason => info!(url = %url, name = %name, ?reason, "skipped"),
                        }
                    }
                    Ok((url, None)) => warn!(url = %url, "detail page unavailable"),
                    Err(e) => warn!(error = %e, "detail task failed"),
                }

                if collector.is_full() {
                    join.abort_all();
                    // 취소 완료까지 기다려야 fetcher 복제본이 모두 풀린다
                    while join.join_next().await.is_some() {}
                    break;
                }
            }
        }
    }

    if over_budget() {
        warn!(elapsed = ?started.elapsed(), "time budget exhausted");
    }
    Ok(collector.into_shops())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shop(name: &str, city: &str, street: &str) -> Shop {
        Shop {
            name: name.into(),
            prefecture: "東京都".into(),
            city: city.into(),
            street: street.into(),
            ..Default::default()
        }
    }

    #[test]
    fn admission_rules() {
        let mut c = Collector::new(2);
        assert_eq!(c.offer(shop("", "千代田区", "丸の内1")), Admission::MissingName);
        assert_eq!(c.offer(shop("鮨 さくら", "", "丸の内1")), Admission::MissingAddress);
        assert_eq!(c.offer(shop("鮨 さくら", "千代田区", "")), Admission::MissingAddress);
        assert_eq!(c.offer(shop("鮨 さくら", "千代田区", "丸の内1")), Admission::Accepted);
        assert_eq!(c.offer(shop("鮨 さくら", "港区", "六本木1")), Admission::DuplicateName);
        assert_eq!(c.offer(shop("焼肉 たけし", "港区", "六本木1")), Admission::Accepted);
        assert!(c.is_full());
        assert_eq!(c.offer(shop("居酒屋 まる", "港区", "赤坂2")), Admission::Full);
        let names: Vec<String> = c.into_shops().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["鮨 さくら", "焼肉 たけし"]);
    }

    #[test]
    fn rejected_name_is_not_reserved() {
        let mut c = Collector::new(5);
        assert_eq!(c.offer(shop("鮨 さくら", "", "")), Admission::MissingAddress);
        assert_eq!(c.offer(shop("鮨 さくら", "千代田区", "丸の内1")), Admission::Accepted);
        assert_eq!(c.len(), 1);
    }

    #[tokio::test]
    async fn official_url_without_link_is_empty() {
        let f = Fetcher::http(crate::net::HttpConfig::default()).unwrap();
        assert_eq!(official_url(&f, None).await, "");
        assert_eq!(
            official_url(&f, Some(OfficialLink::Direct("https://sakura-sushi.jp/".into()))).await,
            "https://sakura-sushi.jp/"
        );
    }

    #[tokio::test]
    async fn crawl_with_unreachable_search_url_returns_empty() {
        let cfg = CrawlConfig {
            search_urls: vec!["not a url".into()],
            max_records: 5,
            max_pages: 2,
            delay: Duration::ZERO,
            concurrency: 1,
            budget: None,
        };
        let f = Fetcher::http(crate::net::HttpConfig::default()).unwrap();
        let ssl = SslChecker::new(crate::ssl::SslMode::Scheme, Duration::from_secs(1)).unwrap();
        let shops = crawl(&cfg, &f, &ssl).await.unwrap();
        assert!(shops.is_empty());
    }

    /* ---------- 로컬 mock 서버로 목록 → 상세 루프 ---------- */

    use crate::net::HttpConfig;
    use crate::ssl::SslMode;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn list_html(links: &[&str]) -> String {
        let items: String = links.iter().map(|l| format!(r#"<li><a href="{l}">店</a></li>"#)).collect();
        format!("<html><body><ul>{items}</ul><a href=\"/area/jp/rs/\">エリア</a></body></html>")
    }

    fn detail_html(name: &str, address: &str) -> String {
        format!(
            r#"<html><body><h1>{name}</h1><p itemprop="address">{address}</p>
               <a href="https://official.example.jp/">公式サイト</a></body></html>"#
        )
    }

    async fn serve(server: &MockServer, at: &str, body: String, times: u64) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(times)
            .mount(server)
            .await;
    }

    fn local_config(server: &MockServer, searches: &[&str], max_records: usize, concurrency: usize) -> CrawlConfig {
        CrawlConfig {
            search_urls: searches.iter().map(|s| format!("{}{s}", server.uri())).collect(),
            max_records,
            max_pages: 3,
            delay: Duration::ZERO,
            concurrency,
            budget: None,
        }
    }

    fn local_fetcher() -> Fetcher {
        Fetcher::http(HttpConfig {
            timeout: Duration::from_secs(5),
            retries: 2,
            backoff: Duration::from_millis(1),
        })
        .unwrap()
    }

    fn scheme_checker() -> SslChecker {
        SslChecker::new(SslMode::Scheme, Duration::from_secs(1)).unwrap()
    }

    fn names(shops: &[Shop]) -> Vec<&str> {
        shops.iter().map(|s| s.name.as_str()).collect()
    }

    #[tokio::test]
    async fn visited_links_are_shared_across_search_urls() {
        let server = MockServer::start().await;
        // 두 번째 페이지는 비어 있음
        Mock::given(method("GET"))
            .and(query_param("p", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(list_html(&[])))
            .expect(2)
            .mount(&server)
            .await;
        serve(&server, "/area/tokyo/rs/", list_html(&["/a111111/", "/a222222/"]), 1).await;
        serve(&server, "/area/osaka/rs/", list_html(&["/a222222/", "/a333333/"]), 1).await;
        serve(&server, "/a111111/", detail_html("鮨 さくら", "東京都千代田区丸の内1-1-1"), 1).await;
        serve(&server, "/a222222/", detail_html("焼肉 たけし", "東京都港区六本木1-2-3"), 1).await;
        serve(&server, "/a333333/", detail_html("串カツ だるま", "大阪府大阪市北区梅田1-2-3"), 1).await;

        let cfg = local_config(&server, &["/area/tokyo/rs/", "/area/osaka/rs/"], 10, 1);
        let shops = crawl(&cfg, &local_fetcher(), &scheme_checker()).await.unwrap();

        assert_eq!(names(&shops), vec!["鮨 さくら", "焼肉 たけし", "串カツ だるま"]);
        assert_eq!(shops[2].prefecture, "大阪府");
        assert_eq!(shops[2].city, "大阪市");
        assert_eq!(shops[0].url, "https://official.example.jp/");
        assert!(shops[0].ssl);
    }

    #[tokio::test]
    async fn stops_once_max_records_are_collected() {
        let server = MockServer::start().await;
        serve(&server, "/area/tokyo/rs/", list_html(&["/a111111/", "/a222222/", "/a333333/"]), 1).await;
        serve(&server, "/a111111/", detail_html("鮨 さくら", "東京都千代田区丸の内1-1-1"), 1).await;
        serve(&server, "/a222222/", detail_html("焼肉 たけし", "東京都港区六本木1-2-3"), 1).await;
        serve(&server, "/a333333/", detail_html("天ぷら 一", "東京都中央区銀座4-5-6"), 0).await;

        let cfg = local_config(&server, &["/area/tokyo/rs/"], 2, 2);
        let shops = crawl(&cfg, &local_fetcher(), &scheme_checker()).await.unwrap();

        let mut got = names(&shops);
        got.sort();
        assert_eq!(got, vec!["焼肉 たけし", "鮨 さくら"]);
    }

    #[tokio::test]
    async fn failed_list_page_moves_on_and_empty_page_ends_search_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/area/missing/rs/"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/area/tokyo/rs/"))
            .and(query_param("p", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(list_html(&["/area/tokyo/"])))
            .expect(1)
            .mount(&server)
            .await;
        serve(&server, "/area/tokyo/rs/", list_html(&["/a111111/", "/a999999/"]), 1).await;
        serve(&server, "/a111111/", detail_html("鮨 さくら", "東京都千代田区丸の内1-1-1"), 1).await;
        // 주소가 없는 상세는 건너뜀
        serve(&server, "/a999999/", "<html><body><h1>住所なし食堂</h1></body></html>".into(), 1).await;

        let cfg = local_config(&server, &["/area/missing/rs/", "/area/tokyo/rs/"], 10, 1);
        let shops = crawl(&cfg, &local_fetcher(), &scheme_checker()).await.unwrap();

        assert_eq!(names(&shops), vec!["鮨 さくら"]);
    }
}
