// src/listing.rs
use anyhow::Result;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

use crate::detail::is_directory_url;

pub const DEFAULT_SEARCH_URL: &str = "https://r.gnavi.co.jp/area/jp/rs/";

/// 목록 페이지 URL: 1페이지는 그대로, 이후는 p=<n>
pub fn page_url(base: &str, page: usize) -> Result<String> {
    let mut u = Url::parse(base)?;
    if page <= 1 {
        return Ok(u.to_string());
    }
    let kept: Vec<(String, String)> = u
        .query_pairs()
        .filter(|(k, _)| k != "p")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    {
        let mut q = u.query_pairs_mut();
        q.clear();
        for (k, v) in &kept {
            q.append_pair(k, v);
        }
        q.append_pair("p", &page.to_string());
    }
    Ok(u.to_string())
}

/// 가게 ID 처럼 보이는 한 단계 경로(예: /a123456/)
fn is_shop_id(seg: &str) -> bool {
    seg.len() >= 5
        && seg.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && seg.chars().any(|c| c.is_ascii_digit())
}

/// 목록 페이지와 같은 호스트(또는 디렉터리 도메인)의 가게 상세 경로
pub fn is_shop_url(u: &Url, list: &Url) -> bool {
    let same_site =
        u.host_str() == list.host_str() && u.port_or_known_default() == list.port_or_known_default();
    if !is_directory_url(u) && !same_site {
        return false;
    }
    let path = u.path();
    if path.contains("/restaurant/") {
        return true;
    }
    let segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    segs.len() == 1 && is_shop_id(segs[0])
}

/// 목록 HTML 에서 상세 페이지 링크 수집(순서 유지, 중복 제거)
pub fn collect_shop_links(html: &str, base: &str) -> Vec<String> {
    let Ok(base) = Url::parse(base) else { return Vec::new() };
    let Ok(sel) = Selector::parse("a[href]") else { return Vec::new() };
    let doc = Html::parse_document(html);

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for a in doc.select(&sel) {
        let href = a.value().attr("href").unwrap_or("").trim();
        let Ok(mut u) = base.join(href) else { continue };
        u.set_query(None);
        u.set_fragment(None);
        if !is_shop_url(&u, &base) {
            continue;
        }
        let s = u.to_string();
        if seen.insert(s.clone()) {
            out.push(s);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_is_base() {
        assert_eq!(page_url(DEFAULT_SEARCH_URL, 1).unwrap(), DEFAULT_SEARCH_URL);
    }

    #[test]
    fn later_pages_add_or_replace_p() {
        assert_eq!(
            page_url(DEFAULT_SEARCH_URL, 3).unwrap(),
            "https://r.gnavi.co.jp/area/jp/rs/?p=3"
        );
        assert_eq!(
            page_url("https://r.gnavi.co.jp/area/tokyo/rs/?fw=abc&p=2", 4).unwrap(),
            "https://r.gnavi.co.jp/area/tokyo/rs/?fw=abc&p=4"
        );
    }

    #[test]
    fn collects_only_shop_links() {
        let html = r#"
            <a href="https://r.gnavi.co.jp/a123456/">鮨 さくら</a>
            <a href="/b7654321/?sc_lid=list">焼肉 たけし</a>
            <a href="https://r.gnavi.co.jp/a123456/#map">鮨 さくら(地図)</a>
            <a href="https://r.gnavi.co.jp/tokyo/">東京</a>
            <a href="https://r.gnavi.co.jp/area/tokyo/rs/">エリア</a>
            <a href="https://r.gnavi.co.jp/">トップ</a>
            <a href="https://www.gnavi.co.jp/restaurant/xyz/">旧URL</a>
            <a href="https://example.com/c999999/">外部</a>
        "#;
        let links = collect_shop_links(html, DEFAULT_SEARCH_URL);
        assert_eq!(
            links,
            vec![
                "https://r.gnavi.co.jp/a123456/",
                "https://r.gnavi.co.jp/b7654321/",
                "https://www.gnavi.co.jp/restaurant/xyz/",
            ]
        );
    }

    #[test]
    fn links_on_the_list_host_count() {
        let base = "http://127.0.0.1:8080/area/tokyo/rs/";
        let html = r#"
            <a href="/a123456/">鮨 さくら</a>
            <a href="http://127.0.0.1:9090/b7654321/">別ポート</a>
            <a href="/area/tokyo/rs/?p=2">次へ</a>
            <a href="https://r.gnavi.co.jp/c1111111/">本家</a>
        "#;
        assert_eq!(
            collect_shop_links(html, base),
            vec!["http://127.0.0.1:8080/a123456/", "https://r.gnavi.co.jp/c1111111/"]
        );
    }

    #[test]
    fn bad_base_yields_nothing() {
        assert!(collect_shop_links("<a href='/a123456/'>x</a>", "not a url").is_empty());
    }
}
