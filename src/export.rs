// src/export.rs
use anyhow::{anyhow, Context, Result};
use chrono::Local;
use clap::ValueEnum;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::warn;

use crate::shop::{bool_label, Shop, COLUMNS};
use crate::ssl;

const BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// 고정 열 CSV(인코딩은 Encoding 으로)
    Csv,
    /// 한 줄에 JSON 하나
    Jsonl,
}

/// CSV 문자 인코딩
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Encoding {
    /// BOM 포함 UTF-8
    Utf8Bom,
    /// Windows-31J(Shift_JIS 확장), 일본어판 엑셀 기본값. BOM 없음
    Cp932,
}

/// UTF-8 CSV 텍스트를 지정 인코딩 바이트로
pub fn encode_text(text: &str, encoding: Encoding) -> Vec<u8> {
    match encoding {
        Encoding::Utf8Bom => {
            let mut out = Vec::with_capacity(BOM.len() + text.len());
            out.extend_from_slice(BOM);
            out.extend_from_slice(text.as_bytes());
            out
        }
        Encoding::Cp932 => {
            let (bytes, _, lossy) = encoding_rs::SHIFT_JIS.encode(text);
            if lossy {
                // 표현 못 하는 글자는 &#NNNN; 으로 바뀐다
                warn!("some characters have no cp932 form, written as numeric references");
            }
            bytes.into_owned()
        }
    }
}

/// BOM/UTF-8 이면 UTF-8, 아니면 cp932 로 읽는다
pub fn decode_bytes(raw: &[u8]) -> (String, Encoding) {
    if let Some(body) = raw.strip_prefix(BOM) {
        return (String::from_utf8_lossy(body).into_owned(), Encoding::Utf8Bom);
    }
    match std::str::from_utf8(raw) {
        Ok(s) => (s.to_string(), Encoding::Utf8Bom),
        Err(_) => {
            let (text, _) = encoding_rs::SHIFT_JIS.decode_without_bom_handling(raw);
            (text.into_owned(), Encoding::Cp932)
        }
    }
}

/// 출력 경로의 {date} 를 오늘 날짜(YYYYMMDD)로
pub fn render_path(template: &str) -> String {
    template.replace("{date}", &Local::now().format("%Y%m%d").to_string())
}

pub fn write(shops: &[Shop], path: &Path, format: Format, encoding: Encoding) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let written = match format {
        Format::Csv => write_csv(shops, BufWriter::new(file), encoding),
        Format::Jsonl => write_jsonl(shops, file),
    };
    written.with_context(|| format!("write {}", path.display()))
}

fn csv_text<R, I>(header: R, rows: impl IntoIterator<Item = I>) -> Result<String>
where
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    w.write_record(header)?;
    for row in rows {
        w.write_record(row)?;
    }
    let buf = w.into_inner().map_err(|e| anyhow!("csv flush: {}", e.error()))?;
    Ok(String::from_utf8(buf)?)
}

pub fn write_csv<W: Write>(shops: &[Shop], mut out: W, encoding: Encoding) -> Result<()> {
    let text = csv_text(COLUMNS, shops.iter().map(Shop::to_record))?;
    out.write_all(&encode_text(&text, encoding))?;
    out.flush()?;
    Ok(())
}

pub fn write_jsonl<W: Write>(shops: &[Shop], out: W) -> Result<()> {
    let mut out = BufWriter::new(out);
    for s in shops {
        serde_json::to_writer(&mut out, s)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/* ================= SSL 열 보정 ================= */

#[derive(Debug, PartialEq, Eq)]
pub struct RepairReport {
    pub rows: usize,
    pub before: usize,
    pub after: usize,
}

fn truthy(s: &str) -> bool {
    matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1")
}

/// 저장된 CSV 의 SSL 열을 URL 스킴 기준으로 다시 계산해서 덮어쓴다
pub fn repair_ssl_column(path: &Path) -> Result<RepairReport> {
    let raw = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let (text, encoding) = decode_bytes(&raw);

    let mut r = csv::ReaderBuilder::new().from_reader(text.as_bytes());
    let headers = r.headers()?.clone();
    let col = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| anyhow!("column {name} not found in {}", path.display()))
    };
    let url_idx = col("URL")?;
    let ssl_idx = col("SSL")?;

    let mut rows = Vec::new();
    let mut report = RepairReport { rows: 0, before: 0, after: 0 };
    for rec in r.records() {
        let rec = rec?;
        let fixed = ssl::scheme_only(rec.get(url_idx).unwrap_or(""));
        if truthy(rec.get(ssl_idx).unwrap_or("")) {
            report.before += 1;
        }
        if fixed {
            report.after += 1;
        }
        let row: Vec<String> = rec
            .iter()
            .enumerate()
            .map(|(i, v)| if i == ssl_idx { bool_label(fixed).to_string() } else { v.to_string() })
            .collect();
        rows.push(row);
    }
    report.rows = rows.len();

    // 읽은 인코딩 그대로 다시 쓴다
    let out = encode_text(&csv_text(&headers, &rows)?, encoding);
    std::fs::write(path, out).with_context(|| format!("write {}", path.display()))?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shops() -> Vec<Shop> {
        vec![
            Shop {
                name: "鮨 さくら".into(),
                phone: "03-1234-5678".into(),
                prefecture: "東京都".into(),
                city: "千代田区".into(),
                street: "丸の内1-1-1".into(),
                building: "丸の内ビル3F".into(),
                url: "https://sakura-sushi.jp/".into(),
                ssl: true,
                ..Default::default()
            },
            Shop {
                name: "焼肉, たけし".into(),
                city: "港区".into(),
                street: "六本木1".into(),
                url: "http://takeshi.example.jp/".into(),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn csv_has_bom_header_and_rows() {
        let mut buf = Vec::new();
        write_csv(&shops(), &mut buf, Encoding::Utf8Bom).unwrap();
        assert!(buf.starts_with(BOM));
        let text = String::from_utf8(buf[BOM.len()..].to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "店舗名,電話番号,メールアドレス,都道府県,市区町村,番地,建物名,URL,SSL");
        assert_eq!(
            lines[1],
            "鮨 さくら,03-1234-5678,,東京都,千代田区,丸の内1-1-1,丸の内ビル3F,https://sakura-sushi.jp/,True"
        );
        assert_eq!(lines[2], "\"焼肉, たけし\",,,,港区,六本木1,,http://takeshi.example.jp/,False");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn empty_run_still_writes_header() {
        let mut buf = Vec::new();
        write_csv(&[], &mut buf, Encoding::Utf8Bom).unwrap();
        let text = String::from_utf8(buf[BOM.len()..].to_vec()).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn jsonl_uses_column_names() {
        let mut buf = Vec::new();
        write_jsonl(&shops(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(first["店舗名"], "鮨 さくら");
        assert_eq!(first["SSL"], "True");
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn repair_recomputes_ssl_from_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let mut broken = shops();
        broken[0].ssl = false;
        broken[1].ssl = true;
        write(&broken, &path, Format::Csv, Encoding::Utf8Bom).unwrap();

        let report = repair_ssl_column(&path).unwrap();
        assert_eq!(report, RepairReport { rows: 2, before: 1, after: 1 });

        let raw = std::fs::read(&path).unwrap();
        assert!(raw.starts_with(BOM));
        let text = String::from_utf8(raw[BOM.len()..].to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[1].ends_with(",True"));
        assert!(lines[2].ends_with(",False"));
    }

    #[test]
    fn cp932_csv_has_no_bom_and_decodes_back() {
        let mut buf = Vec::new();
        write_csv(&shops(), &mut buf, Encoding::Cp932).unwrap();
        assert!(!buf.starts_with(BOM));
        assert!(std::str::from_utf8(&buf).is_err());
        // 店 = 0x93 0x58
        assert_eq!(&buf[..2], &[0x93, 0x58]);

        let (text, _, had_errors) = encoding_rs::SHIFT_JIS.decode(&buf);
        assert!(!had_errors);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], COLUMNS.join(","));
        assert!(lines[1].starts_with("鮨 さくら,03-1234-5678"));
    }

    #[test]
    fn repair_keeps_cp932_files_in_cp932() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sjis.csv");
        let mut broken = shops();
        broken[0].ssl = false;
        write(&broken, &path, Format::Csv, Encoding::Cp932).unwrap();

        let report = repair_ssl_column(&path).unwrap();
        assert_eq!(report, RepairReport { rows: 2, before: 0, after: 1 });

        let raw = std::fs::read(&path).unwrap();
        let (text, enc) = decode_bytes(&raw);
        assert_eq!(enc, Encoding::Cp932);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("店舗名"));
        assert!(lines[1].ends_with(",True"));
    }

    #[test]
    fn repair_requires_url_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "name,SSL\nfoo,True\n").unwrap();
        let err = repair_ssl_column(&path).unwrap_err();
        assert!(err.to_string().contains("column URL not found"));
    }

    #[test]
    fn date_placeholder() {
        let p = render_path("out/shops_{date}.csv");
        assert!(p.starts_with("out/shops_2"));
        assert!(!p.contains("{date}"));
        assert_eq!(render_path("plain.csv"), "plain.csv");
    }
}
