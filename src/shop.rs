// src/shop.rs
use serde::{Serialize, Serializer};
use std::fmt;

use crate::address::Address;

/// CSV 헤더 순서(고정)
pub const COLUMNS: [&str; 9] = [
    "店舗名", "電話番号", "メールアドレス", "都道府県", "市区町村", "番地", "建物名", "URL", "SSL",
];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Shop {
    #[serde(rename = "店舗名")]
    pub name: String,
    #[serde(rename = "電話番号")]
    pub phone: String,
    #[serde(rename = "メールアドレス")]
    pub email: String,
    #[serde(rename = "都道府県")]
    pub prefecture: String,
    #[serde(rename = "市区町村")]
    pub city: String,
    #[serde(rename = "番地")]
    pub street: String,
    #[serde(rename = "建物名")]
    pub building: String,
    #[serde(rename = "URL")]
    pub url: String,            // 공식 사이트(디렉터리 사이트 제외)
    #[serde(rename = "SSL", serialize_with = "title_case_bool")]
    pub ssl: bool,
}

impl Shop {
    pub fn new(name: String, phone: String, email: String, address: Address, url: String, ssl: bool) -> Self {
        Shop {
            name,
            phone,
            email,
            prefecture: address.prefecture,
            city: address.city,
            street: address.street,
            building: address.building,
            url,
            ssl,
        }
    }

    /// CSV 한 줄(COLUMNS 순서)
    pub fn to_record(&self) -> [String; 9] {
        [
            self.name.clone(),
            self.phone.clone(),
            self.email.clone(),
            self.prefecture.clone(),
            self.city.clone(),
            self.street.clone(),
            self.building.clone(),
            self.url.clone(),
            bool_label(self.ssl).to_string(),
        ]
    }
}

/// pandas 출력과 같은 True/False 표기
pub fn bool_label(b: bool) -> &'static str {
    if b { "True" } else { "False" }
}

fn title_case_bool<S: Serializer>(b: &bool, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(bool_label(*b))
}

impl fmt::Display for Shop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let or_dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
        write!(
            f,
            "{} | {} | {}{}{}{} | {} | ssl={}",
            self.name,
            or_dash(&self.phone),
            self.prefecture, self.city, self.street, self.building,
            or_dash(&self.url),
            self.ssl
        )?;
        if !self.email.is_empty() {
            write!(f, " | {}", self.email)?;
        }
        Ok(())
    }
}

/// 실행 후 통계
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub with_name: usize,
    pub with_phone: usize,
    pub with_email: usize,
    pub with_prefecture: usize,
    pub with_url: usize,
    pub with_ssl: usize,
}

impl Summary {
    pub fn of(shops: &[Shop]) -> Self {
        let count = |f: fn(&Shop) -> bool| shops.iter().filter(|s| f(s)).count();
        Summary {
            total: shops.len(),
            with_name: count(|s| !s.name.is_empty()),
            with_phone: count(|s| !s.phone.is_empty()),
            with_email: count(|s| !s.email.is_empty()),
            with_prefecture: count(|s| !s.prefecture.is_empty()),
            with_url: count(|s| !s.url.is_empty()),
            with_ssl: count(|s| s.ssl),
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "records:    {}", self.total)?;
        writeln!(f, "name:       {}", self.with_name)?;
        writeln!(f, "phone:      {}", self.with_phone)?;
        writeln!(f, "email:      {}", self.with_email)?;
        writeln!(f, "prefecture: {}", self.with_prefecture)?;
        writeln!(f, "url:        {}", self.with_url)?;
        write!(f, "ssl:        {}", self.with_ssl)
    }
}
