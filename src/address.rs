// src/address.rs
//! 일본 주소 문자열을 都道府県 / 市区町村 / 番地 / 建物名 으로 나누는 휴리스틱.

use once_cell::sync::Lazy;
use regex::Regex;

pub const PREFECTURES: [&str; 47] = [
    "北海道", "青森県", "岩手県", "宮城県", "秋田県", "山形県", "福島県",
    "茨城県", "栃木県", "群馬県", "埼玉県", "千葉県", "東京都", "神奈川県",
    "新潟県", "富山県", "石川県", "福井県", "山梨県", "長野県", "岐阜県",
    "静岡県", "愛知県", "三重県", "滋賀県", "京都府", "大阪府", "兵庫県",
    "奈良県", "和歌山県", "鳥取県", "島根県", "岡山県", "広島県", "山口県",
    "徳島県", "香川県", "愛媛県", "高知県", "福岡県", "佐賀県", "長崎県",
    "熊本県", "大分県", "宮崎県", "鹿児島県", "沖縄県",
];

static RE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!("^({})", PREFECTURES.join("|"))).expect("prefecture regex")
});

// 본문 안에서 "도도부현 … 숫자(-숫자)*" 형태
static RE_IN_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        "(?:{}).+?[0-9０-９]+(?:[-−ー][0-9０-９]+)*",
        PREFECTURES.join("|")
    ))
    .expect("address regex")
});

static RE_CITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?[市区町村]|.+?郡.+?[町村])").expect("city regex")
});

// 위에서부터 순서대로 시도
static RE_BUILDING: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(
            r"([ぁ-んァ-ヶー一-龠a-zA-Z]+(?:ビルディング|ビル|タワー|ハイツ|マンション|アパート|プラザ|センター|BLDG|Bldg|GATE|ビレッジ|コート|レジデンス|パーク|スクエア|テラス|荘|館|ハウス).*)$",
        )
        .expect("building regex"),
        Regex::new(r"([ぁ-んァ-ヶー一-龠a-zA-Z]{2,}[0-9０-９]+[階FＦ号室]+.*)$").expect("floor regex"),
        Regex::new(r"([0-9０-９]+[階FＦ号室]+.*)$").expect("room regex"),
    ]
});

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Address {
    pub prefecture: String,
    pub city: String,
    pub street: String,
    pub building: String,
}

impl Address {
    pub fn is_empty(&self) -> bool {
        self.prefecture.is_empty() && self.city.is_empty() && self.street.is_empty() && self.building.is_empty()
    }
}

/// 공백(전각 포함) 전부 제거
pub fn strip_ws(s: &str) -> String {
    RE_WS.replace_all(s, "").into_owned()
}

/// 텍스트에서 주소로 보이는 후보 중 가장 긴 것(동률이면 앞의 것)
pub fn find_address(text: &str) -> Option<String> {
    RE_IN_TEXT
        .find_iter(text)
        .map(|m| m.as_str())
        .reduce(|best, cur| if cur.chars().count() > best.chars().count() { cur } else { best })
        .map(strip_ws)
}

pub fn split_address(full: &str) -> Address {
    let full = strip_ws(full);
    if full.is_empty() {
        return Address::default();
    }

    let prefecture = RE_PREFIX
        .captures(&full)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let rest = &full[prefecture.len()..];

    let city = RE_CITY
        .captures(rest)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let rest = &rest[city.len()..];

    let (street, building) = split_building(rest);

    Address { prefecture, city, street, building }
}

fn split_building(rest: &str) -> (String, String) {
    for re in RE_BUILDING.iter() {
        if let Some(m) = re.captures(rest).and_then(|c| c.get(1)) {
            return (rest[..m.start()].to_string(), m.as_str().to_string());
        }
    }
    (rest.to_string(), String::new())
}
