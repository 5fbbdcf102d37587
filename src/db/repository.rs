use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{
    Account, Article, ArticleSummary, AuthoredDraft, Draft, DraftState, DraftStatus, NewAccount,
    NewPost, NewPromptRule, NewSource, OAuthState, Post, PostStatus, PromptRule, RuleKind, Run,
    RunStatus, ScrapedArticle, SelectorSet, Source, Strategy,
};

use super::schema::SCHEMA;
use super::store::Store;

const SOURCE_COLUMNS: &str = "id, account_id, name, url, strategy, feed_url, selectors, \
     scrape_interval_hours, is_active, auto_publish, last_scraped_at, created_at";

const ARTICLE_COLUMNS: &str =
    "id, source_id, url, title, summary, full_content, published_at, is_processed, created_at";

const DRAFT_COLUMNS: &str = "id, article_id, account_id, text, hashtags, summary, status, post_id, \
     reviewed_at, reviewed_by, created_at";

const POST_COLUMNS: &str = "id, account_id, draft_id, content, status, platform_post_id, \
     platform_post_url, error_message, published_at, created_at";

const ACCOUNT_COLUMNS: &str = "id, user_id, platform_user_id, username, display_name, \
     access_token_enc, refresh_token_enc, token_expires_at, is_active";

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Operator helpers, not part of the pipeline's store interface

    pub async fn insert_source(&self, source: NewSource) -> Result<i64> {
        let selectors = source
            .selectors
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO sources (account_id, name, url, strategy, feed_url, selectors,
                                            scrape_interval_hours, auto_publish)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
                    params![
                        source.account_id,
                        source.name,
                        source.url,
                        source.strategy.as_str(),
                        source.feed_url,
                        selectors,
                        source.scrape_interval_hours,
                        source.auto_publish,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn set_source_active(&self, id: i64, is_active: bool) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE sources SET is_active = ?1 WHERE id = ?2",
                    params![is_active, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn insert_prompt_rule(&self, rule: NewPromptRule) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO prompt_rules (account_id, rule_type, rule_name, prompt_text, priority)
                       VALUES (?1, ?2, ?3, ?4, ?5)"#,
                    params![
                        rule.account_id,
                        rule.kind.as_str(),
                        rule.name,
                        rule.prompt_text,
                        rule.priority
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn count_articles(&self, source_id: i64) -> Result<usize> {
        let count = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM articles WHERE source_id = ?1",
                    params![source_id],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await?;
        Ok(count as usize)
    }

    pub async fn drafts_for_article(&self, article_id: i64) -> Result<Vec<Draft>> {
        let drafts = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {DRAFT_COLUMNS} FROM drafts WHERE article_id = ?1 ORDER BY id"
                ))?;
                let drafts = stmt
                    .query_map(params![article_id], draft_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(drafts)
            })
            .await?;
        Ok(drafts)
    }

    pub async fn posts_for_account(&self, account_id: i64) -> Result<Vec<Post>> {
        let posts = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {POST_COLUMNS} FROM posts WHERE account_id = ?1 ORDER BY id"
                ))?;
                let posts = stmt
                    .query_map(params![account_id], post_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(posts)
            })
            .await?;
        Ok(posts)
    }

    pub async fn runs_for_source(&self, source_id: i64) -> Result<Vec<Run>> {
        let runs = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, source_id, status, articles_found, started_at, finished_at, error_message
                       FROM runs WHERE source_id = ?1 ORDER BY id"#,
                )?;
                let runs = stmt
                    .query_map(params![source_id], run_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(runs)
            })
            .await?;
        Ok(runs)
    }
}

#[async_trait]
impl Store for Repository {
    // Source operations

    async fn active_sources(&self) -> Result<Vec<Source>> {
        let sources = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SOURCE_COLUMNS} FROM sources WHERE is_active = 1 ORDER BY id"
                ))?;
                let sources = stmt
                    .query_map([], source_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(sources)
            })
            .await?;
        Ok(sources)
    }

    async fn source(&self, id: i64) -> Result<Option<Source>> {
        let source = self
            .conn
            .call(move |conn| {
                let source = conn
                    .query_row(
                        &format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE id = ?1"),
                        params![id],
                        source_from_row,
                    )
                    .optional()?;
                Ok(source)
            })
            .await?;
        Ok(source)
    }

    async fn sources_for_account(&self, account_id: i64) -> Result<Vec<Source>> {
        let sources = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SOURCE_COLUMNS} FROM sources WHERE account_id = ?1 ORDER BY id"
                ))?;
                let sources = stmt
                    .query_map(params![account_id], source_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(sources)
            })
            .await?;
        Ok(sources)
    }

    async fn touch_source_scraped(&self, id: i64) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE sources SET last_scraped_at = ?1 WHERE id = ?2",
                    params![now, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn set_source_feed_url(&self, id: i64, feed_url: &str) -> Result<()> {
        let feed_url = feed_url.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE sources SET feed_url = ?1 WHERE id = ?2",
                    params![feed_url, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Run operations

    async fn start_run(&self, source_id: i64) -> Result<i64> {
        let now = Utc::now().to_rfc3339();
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO runs (source_id, status, articles_found, started_at) VALUES (?1, 'running', 0, ?2)",
                    params![source_id, now],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    async fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        articles_found: usize,
        error_message: Option<String>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"UPDATE runs SET status = ?1, articles_found = ?2, finished_at = ?3, error_message = ?4
                       WHERE id = ?5 AND status = 'running'"#,
                    params![status.as_str(), articles_found as i64, now, error_message, run_id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Article operations

    async fn insert_articles_ignore_duplicates(
        &self,
        source_id: i64,
        articles: Vec<ScrapedArticle>,
    ) -> Result<usize> {
        if articles.is_empty() {
            return Ok(0);
        }
        let inserted = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut inserted = 0;
                {
                    let mut stmt = tx.prepare(
                        r#"INSERT OR IGNORE INTO articles (source_id, url, title, summary, published_at)
                           VALUES (?1, ?2, ?3, ?4, ?5)"#,
                    )?;
                    for article in &articles {
                        inserted += stmt.execute(params![
                            source_id,
                            article.url,
                            article.title,
                            article.summary,
                            article.published_at.map(|dt| dt.to_rfc3339()),
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(inserted)
            })
            .await?;
        Ok(inserted)
    }

    async fn article(&self, id: i64) -> Result<Option<Article>> {
        let article = self
            .conn
            .call(move |conn| {
                let article = conn
                    .query_row(
                        &format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?1"),
                        params![id],
                        article_from_row,
                    )
                    .optional()?;
                Ok(article)
            })
            .await?;
        Ok(article)
    }

    async fn unprocessed_articles(&self, source_ids: &[i64]) -> Result<Vec<Article>> {
        if source_ids.is_empty() {
            return Ok(Vec::new());
        }
        let source_ids = source_ids.to_vec();
        let articles = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {ARTICLE_COLUMNS} FROM articles
                     WHERE is_processed = 0 AND source_id IN ({})
                     ORDER BY created_at ASC, id ASC",
                    placeholders(source_ids.len())
                );
                let mut stmt = conn.prepare(&sql)?;
                let articles = stmt
                    .query_map(params_from_iter(source_ids.iter()), article_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    async fn mark_article_processed(&self, id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE articles SET is_processed = 1 WHERE id = ?1",
                    params![id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn cache_article_content(&self, id: i64, content: &str) -> Result<()> {
        let content = content.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE articles SET full_content = ?1 WHERE id = ?2 AND full_content IS NULL",
                    params![content, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Draft operations

    async fn article_ids_with_drafts(&self, article_ids: &[i64]) -> Result<HashSet<i64>> {
        if article_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let article_ids = article_ids.to_vec();
        let ids = self
            .conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT DISTINCT article_id FROM drafts WHERE article_id IN ({})",
                    placeholders(article_ids.len())
                );
                let mut stmt = conn.prepare(&sql)?;
                let ids = stmt
                    .query_map(params_from_iter(article_ids.iter()), |row| row.get(0))?
                    .collect::<std::result::Result<HashSet<i64>, _>>()?;
                Ok(ids)
            })
            .await?;
        Ok(ids)
    }

    async fn insert_pending_draft(&self, article_id: i64, account_id: i64) -> Result<Draft> {
        let draft = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO drafts (article_id, account_id, status) VALUES (?1, ?2, 'pending')",
                    params![article_id, account_id],
                )?;
                let id = conn.last_insert_rowid();
                let draft = conn.query_row(
                    &format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE id = ?1"),
                    params![id],
                    draft_from_row,
                )?;
                Ok(draft)
            })
            .await?;
        Ok(draft)
    }

    async fn open_draft(&self, article_id: i64, account_id: i64) -> Result<Option<Draft>> {
        let draft = self
            .conn
            .call(move |conn| {
                let draft = conn
                    .query_row(
                        &format!(
                            "SELECT {DRAFT_COLUMNS} FROM drafts \
                             WHERE article_id = ?1 AND account_id = ?2 AND status IN ('pending', 'approved') \
                             ORDER BY id LIMIT 1"
                        ),
                        params![article_id, account_id],
                        draft_from_row,
                    )
                    .optional()?;
                Ok(draft)
            })
            .await?;
        Ok(draft)
    }

    async fn draft(&self, id: i64) -> Result<Option<Draft>> {
        let draft = self
            .conn
            .call(move |conn| {
                let draft = conn
                    .query_row(
                        &format!("SELECT {DRAFT_COLUMNS} FROM drafts WHERE id = ?1"),
                        params![id],
                        draft_from_row,
                    )
                    .optional()?;
                Ok(draft)
            })
            .await?;
        Ok(draft)
    }

    async fn save_draft(&self, draft: &Draft) -> Result<()> {
        let columns = DraftColumns::from_state(&draft.state)?;
        let id = draft.id;
        let reviewed_at = draft.reviewed_at.map(|dt| dt.to_rfc3339());
        let reviewed_by = draft.reviewed_by.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"UPDATE drafts SET text = ?1, hashtags = ?2, summary = ?3, status = ?4,
                                         post_id = ?5, reviewed_at = ?6, reviewed_by = ?7
                       WHERE id = ?8"#,
                    params![
                        columns.text,
                        columns.hashtags,
                        columns.summary,
                        columns.status.as_str(),
                        columns.post_id,
                        reviewed_at,
                        reviewed_by,
                        id,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Post operations

    async fn insert_post(&self, post: NewPost) -> Result<Post> {
        let post = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO posts (account_id, draft_id, content, status, platform_post_id,
                                          platform_post_url, error_message, published_at)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
                    params![
                        post.account_id,
                        post.draft_id,
                        post.content,
                        post.status.as_str(),
                        post.platform_post_id,
                        post.platform_post_url,
                        post.error_message,
                        post.published_at.map(|dt| dt.to_rfc3339()),
                    ],
                )?;
                let id = conn.last_insert_rowid();
                let post = conn.query_row(
                    &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
                    params![id],
                    post_from_row,
                )?;
                Ok(post)
            })
            .await?;
        Ok(post)
    }

    // Account operations

    async fn account(&self, id: i64) -> Result<Option<Account>> {
        let account = self
            .conn
            .call(move |conn| {
                let account = conn
                    .query_row(
                        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
                        params![id],
                        account_from_row,
                    )
                    .optional()?;
                Ok(account)
            })
            .await?;
        Ok(account)
    }

    async fn update_account_tokens(
        &self,
        id: i64,
        access_token_enc: &str,
        refresh_token_enc: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let access = access_token_enc.to_string();
        let refresh = refresh_token_enc.to_string();
        let expires_at = expires_at.map(|dt| dt.to_rfc3339());
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"UPDATE accounts SET access_token_enc = ?1, refresh_token_enc = ?2,
                                           token_expires_at = ?3, updated_at = datetime('now')
                       WHERE id = ?4"#,
                    params![access, refresh, expires_at, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn upsert_account(&self, account: NewAccount) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                let id = conn.query_row(
                    r#"INSERT INTO accounts (user_id, platform_user_id, username, display_name,
                                             access_token_enc, refresh_token_enc, token_expires_at, is_active)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)
                       ON CONFLICT(user_id, platform_user_id) DO UPDATE SET
                           username = excluded.username,
                           display_name = excluded.display_name,
                           access_token_enc = excluded.access_token_enc,
                           refresh_token_enc = excluded.refresh_token_enc,
                           token_expires_at = excluded.token_expires_at,
                           is_active = 1,
                           updated_at = datetime('now')
                       RETURNING id"#,
                    params![
                        account.user_id,
                        account.platform_user_id,
                        account.username,
                        account.display_name,
                        account.access_token_enc,
                        account.refresh_token_enc,
                        account.token_expires_at.map(|dt| dt.to_rfc3339()),
                    ],
                    |row| row.get(0),
                )?;
                Ok(id)
            })
            .await?;
        Ok(id)
    }

    async fn delete_account(&self, id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM accounts WHERE id = ?1", params![id])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Prompt rules

    async fn active_prompt_rules(&self, account_id: i64, kind: RuleKind) -> Result<Vec<PromptRule>> {
        let rules = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, account_id, rule_name, prompt_text, priority, is_active
                       FROM prompt_rules
                       WHERE account_id = ?1 AND rule_type = ?2 AND is_active = 1
                       ORDER BY priority ASC, id ASC"#,
                )?;
                let rules = stmt
                    .query_map(params![account_id, kind.as_str()], |row| {
                        Ok(PromptRule {
                            id: row.get(0)?,
                            account_id: row.get(1)?,
                            kind,
                            name: row.get(2)?,
                            prompt_text: row.get(3)?,
                            priority: row.get(4)?,
                            is_active: row.get::<_, i64>(5)? != 0,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rules)
            })
            .await?;
        Ok(rules)
    }

    // OAuth state

    async fn insert_oauth_state(&self, state: OAuthState) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO oauth_states (id, user_id, code_verifier, expires_at) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        state.id,
                        state.user_id,
                        state.code_verifier,
                        state.expires_at.to_rfc3339()
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn oauth_state(&self, id: &str) -> Result<Option<OAuthState>> {
        let id = id.to_string();
        let state = self
            .conn
            .call(move |conn| {
                let state = conn
                    .query_row(
                        "SELECT id, user_id, code_verifier, expires_at FROM oauth_states WHERE id = ?1",
                        params![id],
                        |row| {
                            Ok(OAuthState {
                                id: row.get(0)?,
                                user_id: row.get(1)?,
                                code_verifier: row.get(2)?,
                                // An unparseable expiry is treated as already expired.
                                expires_at: row
                                    .get::<_, String>(3)
                                    .ok()
                                    .and_then(|s| parse_datetime(&s))
                                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
                            })
                        },
                    )
                    .optional()?;
                Ok(state)
            })
            .await?;
        Ok(state)
    }

    async fn delete_oauth_state(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM oauth_states WHERE id = ?1", params![id])?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

/// Nullable-column form of a [`DraftState`].
struct DraftColumns {
    text: Option<String>,
    hashtags: String,
    summary: Option<String>,
    status: DraftStatus,
    post_id: Option<i64>,
}

impl DraftColumns {
    fn from_state(state: &DraftState) -> Result<Self> {
        let content = state.content();
        Ok(Self {
            text: content.map(|c| c.text.clone()),
            hashtags: serde_json::to_string(&content.map(|c| c.hashtags.as_slice()).unwrap_or_default())?,
            summary: content
                .and_then(|c| c.summary.as_ref())
                .map(serde_json::to_string)
                .transpose()?,
            status: state.status(),
            post_id: match state {
                DraftState::Posted { post_id, .. } => Some(*post_id),
                _ => None,
            },
        })
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime() and strftime() defaults
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

fn optional_datetime(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(row
        .get::<_, Option<String>>(idx)?
        .and_then(|s| parse_datetime(&s)))
}

fn required_datetime(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).ok_or_else(|| corrupt(idx, format!("invalid timestamp '{raw}'")))
}

fn corrupt(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn source_from_row(row: &Row) -> rusqlite::Result<Source> {
    let strategy: String = row.get(4)?;
    Ok(Source {
        id: row.get(0)?,
        account_id: row.get(1)?,
        name: row.get(2)?,
        url: row.get(3)?,
        strategy: Strategy::parse(&strategy)
            .ok_or_else(|| corrupt(4, format!("unknown strategy '{strategy}'")))?,
        feed_url: row.get(5)?,
        selectors: row
            .get::<_, Option<String>>(6)?
            .and_then(|s| serde_json::from_str::<SelectorSet>(&s).ok()),
        scrape_interval_hours: row.get(7)?,
        is_active: row.get::<_, i64>(8)? != 0,
        auto_publish: row.get::<_, i64>(9)? != 0,
        last_scraped_at: optional_datetime(row, 10)?,
        created_at: required_datetime(row, 11)?,
    })
}

fn article_from_row(row: &Row) -> rusqlite::Result<Article> {
    Ok(Article {
        id: row.get(0)?,
        source_id: row.get(1)?,
        url: row.get(2)?,
        title: row.get(3)?,
        summary: row.get(4)?,
        full_content: row.get(5)?,
        published_at: optional_datetime(row, 6)?,
        is_processed: row.get::<_, i64>(7)? != 0,
        created_at: required_datetime(row, 8)?,
    })
}

fn run_from_row(row: &Row) -> rusqlite::Result<Run> {
    Ok(Run {
        id: row.get(0)?,
        source_id: row.get(1)?,
        status: RunStatus::parse(&row.get::<_, String>(2)?),
        articles_found: row.get::<_, i64>(3)? as usize,
        started_at: required_datetime(row, 4)?,
        finished_at: optional_datetime(row, 5)?,
        error_message: row.get(6)?,
    })
}

fn draft_from_row(row: &Row) -> rusqlite::Result<Draft> {
    let id: i64 = row.get(0)?;
    let status_text: String = row.get(6)?;
    let status = DraftStatus::parse(&status_text)
        .ok_or_else(|| corrupt(6, format!("draft {id} has unknown status '{status_text}'")))?;

    let authored = || -> rusqlite::Result<AuthoredDraft> {
        let text: Option<String> = row.get(3)?;
        let text = text.ok_or_else(|| corrupt(3, format!("{status_text} draft {id} has no text")))?;
        let hashtags = serde_json::from_str(&row.get::<_, String>(4)?)
            .map_err(|e| corrupt(4, format!("draft {id} has unreadable hashtags: {e}")))?;
        let summary = row
            .get::<_, Option<String>>(5)?
            .and_then(|s| serde_json::from_str::<ArticleSummary>(&s).ok());
        Ok(AuthoredDraft {
            text,
            hashtags,
            summary,
        })
    };

    let state = match status {
        DraftStatus::Pending => DraftState::Pending,
        DraftStatus::Rejected => DraftState::Rejected,
        DraftStatus::Approved => DraftState::Approved(authored()?),
        DraftStatus::Posted => {
            let post_id: Option<i64> = row.get(7)?;
            DraftState::Posted {
                content: authored()?,
                post_id: post_id.ok_or_else(|| corrupt(7, format!("posted draft {id} has no post")))?,
            }
        }
    };

    Ok(Draft {
        id,
        article_id: row.get(1)?,
        account_id: row.get(2)?,
        state,
        reviewed_at: optional_datetime(row, 8)?,
        reviewed_by: row.get(9)?,
        created_at: required_datetime(row, 10)?,
    })
}

fn post_from_row(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        account_id: row.get(1)?,
        draft_id: row.get(2)?,
        content: row.get(3)?,
        status: PostStatus::parse(&row.get::<_, String>(4)?),
        platform_post_id: row.get(5)?,
        platform_post_url: row.get(6)?,
        error_message: row.get(7)?,
        published_at: optional_datetime(row, 8)?,
        created_at: required_datetime(row, 9)?,
    })
}

fn account_from_row(row: &Row) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        user_id: row.get(1)?,
        platform_user_id: row.get(2)?,
        username: row.get(3)?,
        display_name: row.get(4)?,
        access_token_enc: row.get(5)?,
        refresh_token_enc: row.get(6)?,
        token_expires_at: optional_datetime(row, 7)?,
        is_active: row.get::<_, i64>(8)? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::seeded;

    fn scraped(url: &str) -> ScrapedArticle {
        ScrapedArticle {
            url: url.to_string(),
            title: format!("Title for {url}"),
            summary: Some("summary".to_string()),
            published_at: None,
        }
    }

    #[tokio::test]
    async fn duplicate_urls_are_ignored_per_source() {
        let (repo, _, source_id) = seeded().await;

        let first = repo
            .insert_articles_ignore_duplicates(source_id, vec![scraped("https://a/1"), scraped("https://a/2")])
            .await
            .unwrap();
        let second = repo
            .insert_articles_ignore_duplicates(source_id, vec![scraped("https://a/2"), scraped("https://a/3")])
            .await
            .unwrap();

        assert_eq!(first, 2);
        assert_eq!(second, 1);
        assert_eq!(repo.count_articles(source_id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn draft_state_round_trips_through_columns() {
        let (repo, account_id, source_id) = seeded().await;
        repo.insert_articles_ignore_duplicates(source_id, vec![scraped("https://a/1")])
            .await
            .unwrap();
        let article = repo.unprocessed_articles(&[source_id]).await.unwrap().remove(0);

        let mut draft = repo.insert_pending_draft(article.id, account_id).await.unwrap();
        assert_eq!(draft.state, DraftState::Pending);

        draft
            .approve(
                AuthoredDraft {
                    text: "hello".to_string(),
                    hashtags: vec!["#a".to_string()],
                    summary: Some(ArticleSummary::single("one")),
                },
                Some("editor"),
            )
            .unwrap();
        repo.save_draft(&draft).await.unwrap();

        let loaded = repo.draft(draft.id).await.unwrap().unwrap();
        assert_eq!(loaded.state, draft.state);
        assert_eq!(loaded.reviewed_by.as_deref(), Some("editor"));
    }

    #[tokio::test]
    async fn processed_articles_are_not_listed() {
        let (repo, _, source_id) = seeded().await;
        repo.insert_articles_ignore_duplicates(source_id, vec![scraped("https://a/1"), scraped("https://a/2")])
            .await
            .unwrap();
        let articles = repo.unprocessed_articles(&[source_id]).await.unwrap();
        repo.mark_article_processed(articles[0].id).await.unwrap();

        let remaining = repo.unprocessed_articles(&[source_id]).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].url, "https://a/2");
    }

    #[tokio::test]
    async fn cached_content_is_written_once() {
        let (repo, _, source_id) = seeded().await;
        repo.insert_articles_ignore_duplicates(source_id, vec![scraped("https://a/1")])
            .await
            .unwrap();
        let id = repo.unprocessed_articles(&[source_id]).await.unwrap()[0].id;

        repo.cache_article_content(id, "first body").await.unwrap();
        repo.cache_article_content(id, "second body").await.unwrap();

        let article = repo.article(id).await.unwrap().unwrap();
        assert_eq!(article.full_content.as_deref(), Some("first body"));
    }

    #[tokio::test]
    async fn rules_are_filtered_by_kind_and_ordered_by_priority() {
        let (repo, account_id, _) = seeded().await;
        for (name, kind, priority) in [
            ("tone", RuleKind::Publication, 2),
            ("topics", RuleKind::Analysis, 1),
            ("length", RuleKind::Publication, 1),
        ] {
            repo.insert_prompt_rule(NewPromptRule {
                account_id,
                kind,
                name: name.to_string(),
                prompt_text: format!("{name} text"),
                priority,
            })
            .await
            .unwrap();
        }

        let rules = repo
            .active_prompt_rules(account_id, RuleKind::Publication)
            .await
            .unwrap();
        let names: Vec<_> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["length", "tone"]);
    }

    #[tokio::test]
    async fn open_draft_ignores_closed_drafts() {
        let (repo, account_id, source_id) = seeded().await;
        repo.insert_articles_ignore_duplicates(source_id, vec![scraped("https://a/1")])
            .await
            .unwrap();
        let article = repo.unprocessed_articles(&[source_id]).await.unwrap().remove(0);

        let mut rejected = repo.insert_pending_draft(article.id, account_id).await.unwrap();
        rejected.reject(None).unwrap();
        repo.save_draft(&rejected).await.unwrap();
        assert!(repo.open_draft(article.id, account_id).await.unwrap().is_none());

        let pending = repo.insert_pending_draft(article.id, account_id).await.unwrap();
        let open = repo.open_draft(article.id, account_id).await.unwrap().unwrap();
        assert_eq!(open.id, pending.id);
        assert!(repo.open_draft(article.id, account_id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_draft_rows_are_errors() {
        let (repo, account_id, source_id) = seeded().await;
        repo.insert_articles_ignore_duplicates(source_id, vec![scraped("https://a/1")])
            .await
            .unwrap();
        let article = repo.unprocessed_articles(&[source_id]).await.unwrap().remove(0);
        let draft = repo.insert_pending_draft(article.id, account_id).await.unwrap();
        let id = draft.id;

        repo.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE drafts SET status = 'approved', text = 'hi', hashtags = 'not json' WHERE id = ?1",
                    params![id],
                )?;
                Ok(())
            })
            .await
            .unwrap();
        assert!(repo.draft(id).await.is_err());

        repo.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE drafts SET hashtags = '[]', created_at = 'yesterday' WHERE id = ?1",
                    params![id],
                )?;
                Ok(())
            })
            .await
            .unwrap();
        assert!(repo.draft(id).await.is_err());
    }
}
