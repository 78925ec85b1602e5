// src/detail.rs
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::address::{self, Address};

/// 디렉터리 사이트 도메인(공식 URL 에서 제외)
pub const DIRECTORY_HOST: &str = "gnavi.co.jp";

// 특집/연회 안내 같은 제목은 가게 이름이 아님
const NAME_EXCLUDE: &[&str] = &[
    "特集", "忘年会", "歓迎会", "送別会", "新年会", "宴会", "キャンペーン", "予約", "年会",
];
const NAME_SELECTORS: &[&str] = &[
    ".shop-name",
    ".restaurant-name",
    r#"[itemprop="name"]"#,
    r#"[class*="shopname"]"#,
    r#"[class*="storename"]"#,
];
const PHONE_SELECTORS: &[&str] = &["span.number", "span.tel_num", r#"a[href^="tel:"]"#];
const ADDRESS_SELECTORS: &[&str] = &[r#"[itemprop="address"]"#, "p.adr", "p.region", "span.region"];
// logo@2x.png 같은 에셋 파일명, 자리표시 주소
const ASSET_EXT: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".js", ".css"];
const EMAIL_JUNK: &[&str] = &["example.com", "test.com", "dummy"];
const OFFICIAL_KEYWORDS: &[&str] = &[
    "ホームページ", "公式", "オフィシャル", "HP", "WEB", "ウェブサイト", "Website",
];

static RE_PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{2,4}[-\s]?\d{2,4}[-\s]?\d{4}").expect("phone regex"));
static RE_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email regex")
});
static RE_NOT_PHONE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9\-]").expect("phone filter regex"));

/// 상세 페이지에서 뽑은 값(SSL 판정 전)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DetailFields {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: Address,
    pub official: Option<OfficialLink>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OfficialLink {
    /// 외부 사이트 URL 이 바로 보임
    Direct(String),
    /// 디렉터리 내부 리다이렉트(따라가 봐야 앎)
    Redirect(String),
}

pub fn parse_detail(html: &str, page_url: &str) -> DetailFields {
    let doc = Html::parse_document(html);
    let text = page_text(&doc);

    let address_raw = first_selector_text(&doc, ADDRESS_SELECTORS)
        .filter(|s| !s.is_empty())
        .or_else(|| address::find_address(&text))
        .unwrap_or_default();

    DetailFields {
        name: extract_name(&doc),
        phone: extract_phone(&doc, &text),
        email: extract_email(&doc, &text, html),
        address: address::split_address(&address_raw),
        official: extract_official(&doc, page_url),
    }
}

/// script/style 를 뺀 텍스트 노드 이어붙이기
pub fn page_text(doc: &Html) -> String {
    let mut out = String::new();
    for node in doc.root_element().descendants() {
        let Node::Text(t) = node.value() else { continue };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element())
            .map(|e| matches!(e.name(), "script" | "style" | "noscript"))
            .unwrap_or(false);
        if !hidden {
            out.push_str(t);
        }
    }
    out
}

fn el_text(el: &ElementRef) -> String {
    norm_text(&el.text().collect::<String>())
}

fn norm_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_selector_text(doc: &Html, selectors: &[&str]) -> Option<String> {
    selectors.iter().find_map(|css| {
        let sel = Selector::parse(css).ok()?;
        doc.select(&sel).map(|el| el_text(&el)).find(|t| !t.is_empty())
    })
}

fn is_name_candidate(s: &str) -> bool {
    !s.is_empty() && !NAME_EXCLUDE.iter().any(|k| s.contains(k))
}

pub fn extract_name(doc: &Html) -> String {
    // 1) 첫 h1
    if let Ok(h1) = Selector::parse("h1") {
        if let Some(t) = doc.select(&h1).next().map(|e| el_text(&e)) {
            if is_name_candidate(&t) {
                return t;
            }
        }
    }

    // 2) h2, 3) 가게 이름 셀렉터 (2글자 이하는 버림)
    let long_enough = |t: &String| is_name_candidate(t) && t.chars().count() > 2;
    if let Ok(h2) = Selector::parse("h2") {
        if let Some(t) = doc.select(&h2).map(|e| el_text(&e)).find(long_enough) {
            return t;
        }
    }
    for css in NAME_SELECTORS {
        let Ok(sel) = Selector::parse(css) else { continue };
        if let Some(t) = doc.select(&sel).map(|e| el_text(&e)).find(long_enough) {
            return t;
        }
    }
    String::new()
}

pub fn extract_phone(doc: &Html, text: &str) -> String {
    for css in PHONE_SELECTORS {
        let Ok(sel) = Selector::parse(css) else { continue };
        for el in doc.select(&sel) {
            let raw = if el.value().name() == "a" {
                el.value().attr("href").map(|h| h.trim_start_matches("tel:").to_string())
                    .unwrap_or_else(|| el_text(&el))
            } else {
                el_text(&el)
            };
            let digits = RE_NOT_PHONE.replace_all(&raw, "").into_owned();
            if digits.chars().filter(|c| c.is_ascii_digit()).count() >= 9 {
                return digits;
            }
        }
    }
    RE_PHONE
        .find(text)
        .map(|m| address::strip_ws(m.as_str()))
        .unwrap_or_default()
}

fn is_real_email(s: &str) -> bool {
    let lc = s.to_lowercase();
    !ASSET_EXT.iter().any(|e| lc.ends_with(e)) && !EMAIL_JUNK.iter().any(|j| lc.contains(j))
}

pub fn extract_email(doc: &Html, text: &str, raw_html: &str) -> String {
    if let Ok(sel) = Selector::parse(r#"a[href^="mailto:"]"#) {
        for a in doc.select(&sel) {
            let href = a.value().attr("href").unwrap_or("");
            let addr = href.trim_start_matches("mailto:");
            let addr = addr.split('?').next().unwrap_or("").trim();
            if !addr.is_empty() {
                return addr.to_string();
            }
        }
    }
    // 본문 → 원본 HTML 순
    [text, raw_html]
        .iter()
        .find_map(|hay| RE_EMAIL.find_iter(hay).map(|m| m.as_str()).find(|m| is_real_email(m)))
        .map(str::to_string)
        .unwrap_or_default()
}

pub fn is_directory_url(u: &Url) -> bool {
    u.host_str()
        .map(|h| h == DIRECTORY_HOST || h.ends_with(&format!(".{DIRECTORY_HOST}")))
        .unwrap_or(false)
}

pub fn extract_official(doc: &Html, page_url: &str) -> Option<OfficialLink> {
    let sel = Selector::parse("a[href]").ok()?;
    let base = Url::parse(page_url).ok();

    for a in doc.select(&sel) {
        let href = a.value().attr("href").unwrap_or("").trim();
        let text = el_text(&a);
        let class = a.value().attr("class").unwrap_or("");

        let hit = OFFICIAL_KEYWORDS.iter().any(|k| text.contains(k))
            || class.contains("official")
            || href.contains("url.asp");
        if !hit || href.is_empty() {
            continue;
        }

        let abs = match &base {
            Some(b) => b.join(href).ok(),
            None => Url::parse(href).ok(),
        };
        let Some(abs) = abs else { continue };
        if !matches!(abs.scheme(), "http" | "https") {
            continue;
        }

        if !is_directory_url(&abs) {
            return Some(OfficialLink::Direct(abs.to_string()));
        }
        if href.contains("url.asp") || href.contains("link") {
            if let Some((_, target)) = abs.query_pairs().find(|(k, _)| k == "url") {
                // url= 이 다시 디렉터리 안을 가리키면 공식 URL 이 아님
                match Url::parse(&target) {
                    Ok(t) if matches!(t.scheme(), "http" | "https") && !is_directory_url(&t) => {
                        return Some(OfficialLink::Direct(t.to_string()));
                    }
                    Ok(t) if is_directory_url(&t) => continue,
                    _ => {}
                }
            }
            return Some(OfficialLink::Redirect(abs.to_string()));
        }
    }
    None
}
