//! # pl-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `pl-core` domain models, for all three storage ports.

use std::collections::BTreeSet;
use std::str::FromStr;

use anyhow::{bail, Context};
use async_trait::async_trait;
use pl_core::models::{Client, ClientDomain, Comment, CommentCount, CommentsFilter, NewComment};
use pl_core::traits::{ClientStore, CommentStore, DomainStore};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::info;

/// Idempotent schema. Deleting a client or a domain cascades to what it owns.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS clients (
        id       INTEGER PRIMARY KEY AUTOINCREMENT,
        name     TEXT NOT NULL,
        uuid     TEXT NOT NULL UNIQUE,
        key_hash TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS client_domains (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        client_id INTEGER NOT NULL REFERENCES clients (id) ON DELETE CASCADE,
        domain    TEXT NOT NULL,
        UNIQUE (client_id, domain)
    )",
    "CREATE TABLE IF NOT EXISTS comments (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        client_id INTEGER NOT NULL REFERENCES clients (id) ON DELETE CASCADE,
        domain_id INTEGER NOT NULL REFERENCES client_domains (id) ON DELETE CASCADE,
        author    TEXT NOT NULL,
        content   TEXT NOT NULL,
        page_url  TEXT NOT NULL,
        hidden    BOOLEAN NOT NULL DEFAULT 0,
        timestamp INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS comments_page_url_idx ON comments (page_url)",
    "CREATE INDEX IF NOT EXISTS comments_timestamp_idx ON comments (timestamp)",
];

const COMMENT_COLUMNS: &str = "id, client_id, domain_id, author, content, page_url, hidden, timestamp";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if missing) the database at `url`, e.g. `sqlite:parley.db`.
    pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url {url}"))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("opening {url}"))?;
        info!(url, max_connections, "opened SQLite store");
        Ok(Self { pool })
    }

    /// A private in-memory database. Pinned to one connection that never
    /// expires, since every SQLite memory connection is its own database.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Creates tables and indexes as needed. Safe to call on every start.
    pub async fn init_schema(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&self.pool)
                .await
                .context("initializing schema")?;
        }
        info!("SQLite schema is ready");
        Ok(())
    }
}

// Row mapping helpers

fn client_from_row(row: &SqliteRow) -> sqlx::Result<Client> {
    Ok(Client {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        uuid: row.try_get("uuid")?,
        key_hash: row.try_get("key_hash")?,
    })
}

fn domain_from_row(row: &SqliteRow) -> sqlx::Result<ClientDomain> {
    Ok(ClientDomain {
        id: row.try_get("id")?,
        client_id: row.try_get("client_id")?,
        domain: row.try_get("domain")?,
        client: None,
    })
}

fn comment_from_row(row: &SqliteRow) -> sqlx::Result<Comment> {
    Ok(Comment {
        id: row.try_get("id")?,
        client_id: row.try_get("client_id")?,
        domain_id: row.try_get("domain_id")?,
        author: row.try_get("author")?,
        content: row.try_get("content")?,
        page_url: row.try_get("page_url")?,
        hidden: row.try_get("hidden")?,
        timestamp: row.try_get("timestamp")?,
    })
}

#[async_trait]
impl ClientStore for SqliteStore {
    async fn create_client(&self, name: &str) -> anyhow::Result<(Client, String)> {
        let (mut client, key) = Client::generate(name)?;
        client.id = sqlx::query("INSERT INTO clients (name, uuid, key_hash) VALUES (?, ?, ?)")
            .bind(&client.name)
            .bind(&client.uuid)
            .bind(&client.key_hash)
            .execute(&self.pool)
            .await
            .context("inserting client")?
            .last_insert_rowid();
        Ok((client, key))
    }

    async fn get_client_by_uuid(&self, uuid: &str) -> anyhow::Result<Option<Client>> {
        let row = sqlx::query("SELECT id, name, uuid, key_hash FROM clients WHERE uuid = ?")
            .bind(uuid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(client_from_row).transpose()?)
    }

    async fn list_clients(&self) -> anyhow::Result<Vec<Client>> {
        let rows = sqlx::query("SELECT id, name, uuid, key_hash FROM clients ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(client_from_row).collect::<sqlx::Result<_>>()?)
    }

    async fn remove_client(&self, uuid: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM clients WHERE uuid = ?")
            .bind(uuid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn regenerate_key(&self, uuid: &str) -> anyhow::Result<Option<(Client, String)>> {
        let Some(mut client) = self.get_client_by_uuid(uuid).await? else {
            return Ok(None);
        };
        let key = client.regenerate_key()?;
        sqlx::query("UPDATE clients SET key_hash = ? WHERE id = ?")
            .bind(&client.key_hash)
            .bind(client.id)
            .execute(&self.pool)
            .await
            .context("updating client key")?;
        Ok(Some((client, key)))
    }
}

#[async_trait]
impl DomainStore for SqliteStore {
    async fn add_client_domain(&self, client: &Client, domain: &str) -> anyhow::Result<ClientDomain> {
        let mut cd = ClientDomain::new(client, domain);
        cd.id = sqlx::query("INSERT INTO client_domains (client_id, domain) VALUES (?, ?)")
            .bind(client.id)
            .bind(domain)
            .execute(&self.pool)
            .await
            .with_context(|| format!("adding domain {domain} for client {}", client.uuid))?
            .last_insert_rowid();
        Ok(cd)
    }

    async fn remove_client_domain(&self, client: &Client, domain: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM client_domains WHERE client_id = ? AND domain = ?")
            .bind(client.id)
            .bind(domain)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_client_domain(&self, client: &Client, domain: &str) -> anyhow::Result<Option<ClientDomain>> {
        let row = sqlx::query("SELECT id, client_id, domain FROM client_domains WHERE client_id = ? AND domain = ?")
            .bind(client.id)
            .bind(domain)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(domain_from_row).transpose()?)
    }

    async fn list_domains(&self) -> anyhow::Result<Vec<ClientDomain>> {
        let rows = sqlx::query(
            "SELECT cd.id, cd.client_id, cd.domain,
                    c.name, c.uuid, c.key_hash
             FROM client_domains cd
             JOIN clients c ON c.id = cd.client_id
             ORDER BY cd.id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut domains = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut cd = domain_from_row(row)?;
            cd.client = Some(Client {
                id: cd.client_id,
                name: row.try_get("name")?,
                uuid: row.try_get("uuid")?,
                key_hash: row.try_get("key_hash")?,
            });
            domains.push(cd);
        }
        Ok(domains)
    }
}

#[async_trait]
impl CommentStore for SqliteStore {
    async fn create_comment(&self, comment: NewComment) -> anyhow::Result<Comment> {
        let id = sqlx::query(
            "INSERT INTO comments (client_id, domain_id, author, content, page_url, timestamp)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(comment.client_id())
        .bind(comment.domain_id())
        .bind(comment.author())
        .bind(comment.content())
        .bind(comment.page_url())
        .bind(comment.timestamp())
        .execute(&self.pool)
        .await
        .context("inserting comment")?
        .last_insert_rowid();
        Ok(comment.into_comment(id))
    }

    async fn list_comments(&self, filter: &CommentsFilter) -> anyhow::Result<Vec<Comment>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE 1 = 1"));
        if let Some(client_id) = filter.client_id {
            qb.push(" AND client_id = ").push_bind(client_id);
        }
        if let Some(domain_id) = filter.domain_id {
            qb.push(" AND domain_id = ").push_bind(domain_id);
        }
        if let Some(page_url) = filter.page_url.as_deref() {
            qb.push(" AND page_url = ").push_bind(page_url);
        }
        if let Some(hidden) = filter.hidden {
            qb.push(" AND hidden = ").push_bind(hidden);
        }
        qb.push(" ORDER BY timestamp ASC, id ASC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(comment_from_row).collect::<sqlx::Result<_>>()?)
    }

    async fn count_comments(&self, urls: &[String]) -> anyhow::Result<Vec<CommentCount>> {
        if urls.is_empty() {
            bail!("at least one url is required");
        }

        // Each url appears once in the CTE, otherwise the join multiplies.
        let distinct: BTreeSet<&str> = urls.iter().map(String::as_str).collect();

        // Left join from the requested urls so pages without comments still
        // come back, with a zero count.
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("WITH urls (url) AS (VALUES ");
        let mut values = qb.separated(", ");
        for url in distinct {
            values.push("(").push_bind_unseparated(url).push_unseparated(")");
        }
        qb.push(
            ") SELECT u.url AS page_url, COUNT(c.id) AS total
             FROM urls u
             LEFT JOIN comments c ON c.page_url = u.url
             GROUP BY u.url
             ORDER BY u.url",
        );

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| -> anyhow::Result<CommentCount> {
                Ok(CommentCount {
                    page_url: row.try_get("page_url")?,
                    count: row.try_get("total")?,
                })
            })
            .collect()
    }

    async fn set_hidden(&self, id: i64, hidden: bool) -> anyhow::Result<bool> {
        let result = sqlx::query("UPDATE comments SET hidden = ? WHERE id = ?")
            .bind(hidden)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_comment(&self, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
