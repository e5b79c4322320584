//! Calls into the database-supplied search functions: full-text book search,
//! trigram author search, the materialized-view refresh, and the slug
//! uniqueification helper.

use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};
use uuid::Uuid;

use crate::error::HydrateResult;

#[derive(Debug, Clone, PartialEq)]
pub struct BookHit {
    pub book_id: Uuid,
    pub relevance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthorHit {
    pub author_id: String,
    pub author_name: String,
    pub score: f32,
}

/// Collapse whitespace and bound the length before handing a user query to
/// the database function.
pub fn sanitize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(200)
        .collect()
}

pub async fn search_books<C: ConnectionTrait>(
    db: &C,
    query: &str,
    limit: u32,
) -> HydrateResult<Vec<BookHit>> {
    let sanitized = sanitize_query(query);
    if sanitized.is_empty() {
        return Ok(Vec::new());
    }
    let rows = db
        .query_all(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            "SELECT book_id, relevance FROM search_books($1, $2)",
            [sanitized.into(), (limit as i32).into()],
        ))
        .await?;
    let mut hits = Vec::with_capacity(rows.len());
    for row in rows {
        hits.push(BookHit {
            book_id: row.try_get("", "book_id")?,
            relevance: row.try_get("", "relevance")?,
        });
    }
    Ok(hits)
}

pub async fn search_authors<C: ConnectionTrait>(
    db: &C,
    query: &str,
    limit: u32,
) -> HydrateResult<Vec<AuthorHit>> {
    let sanitized = sanitize_query(query);
    if sanitized.is_empty() {
        return Ok(Vec::new());
    }
    let rows = db
        .query_all(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            "SELECT author_id, author_name, score FROM search_authors($1, $2)",
            [sanitized.into(), (limit as i32).into()],
        ))
        .await?;
    let mut hits = Vec::with_capacity(rows.len());
    for row in rows {
        hits.push(AuthorHit {
            author_id: row.try_get("", "author_id")?,
            author_name: row.try_get("", "author_name")?,
            score: row.try_get("", "score")?,
        });
    }
    Ok(hits)
}

pub async fn refresh_search_view<C: ConnectionTrait>(db: &C) -> HydrateResult<()> {
    db.execute(Statement::from_string(
        DatabaseBackend::Postgres,
        "SELECT refresh_book_search_view()",
    ))
    .await?;
    Ok(())
}

pub async fn ensure_unique_slug<C: ConnectionTrait>(db: &C, base: &str) -> HydrateResult<String> {
    let row = db
        .query_one(Statement::from_sql_and_values(
            DatabaseBackend::Postgres,
            "SELECT ensure_unique_slug($1) AS slug",
            [base.into()],
        ))
        .await?;
    match row {
        Some(row) => Ok(row.try_get("", "slug")?),
        None => Ok(base.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_collapses_whitespace_and_bounds_length() {
        assert_eq!(sanitize_query("  the \n shining  "), "the shining");
        let long = "word ".repeat(100);
        assert!(sanitize_query(&long).len() <= 200);
        assert_eq!(sanitize_query("   "), "");
    }
}
