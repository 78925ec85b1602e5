// src/db.rs
use anyhow::{bail, Context, Result};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use tracing::info;

use crate::shop::Shop;

pub struct ShopStore {
    pool: MySqlPool,
    table: String,
}

/// 테이블 이름은 바인딩이 안 되므로 식별자 규칙으로만 허용
pub fn validate_table_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && name.len() <= 64;
    if !ok {
        bail!("invalid table name: {name:?}");
    }
    Ok(())
}

pub fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS `{table}` (\
         id INT AUTO_INCREMENT PRIMARY KEY, \
         shop_name VARCHAR(255), \
         phone VARCHAR(50), \
         email VARCHAR(255), \
         prefecture VARCHAR(50), \
         city VARCHAR(100), \
         street VARCHAR(255), \
         building VARCHAR(255), \
         url VARCHAR(512), \
         has_ssl BOOLEAN, \
         created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP\
         ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"
    )
}

pub fn insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO `{table}` \
         (shop_name, phone, email, prefecture, city, street, building, url, has_ssl) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
    )
}

impl ShopStore {
    pub async fn connect(database_url: &str, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .connect(database_url)
            .await
            .context("failed to connect to database")?;
        info!(table, "database connected");
        Ok(ShopStore { pool, table: table.to_string() })
    }

    pub async fn ensure_table(&self) -> Result<()> {
        sqlx::query(&create_table_sql(&self.table))
            .execute(&self.pool)
            .await
            .with_context(|| format!("create table {}", self.table))?;
        Ok(())
    }

    /// 한 트랜잭션으로 전부 넣는다
    pub async fn insert_all(&self, shops: &[Shop]) -> Result<u64> {
        let sql = insert_sql(&self.table);
        let mut tx = self.pool.begin().await?;
        let mut n = 0u64;
        for s in shops {
            n += sqlx::query(&sql)
                .bind(&s.name)
                .bind(&s.phone)
                .bind(&s.email)
                .bind(&s.prefecture)
                .bind(&s.city)
                .bind(&s.street)
                .bind(&s.building)
                .bind(&s.url)
                .bind(s.ssl)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("insert {}", s.name))?
                .rows_affected();
        }
        tx.commit().await.context("commit")?;
        info!(table = %self.table, rows = n, "saved to database");
        Ok(n)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
