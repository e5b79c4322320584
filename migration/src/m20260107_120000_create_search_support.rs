use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Database-supplied search plumbing: a weighted tsvector view over books and
/// authors, the refresh hook the scheduler invokes, the full-text lookup
/// functions, and the slug uniqueification helper.
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared("CREATE EXTENSION IF NOT EXISTS pg_trgm")
            .await?;

        db.execute_unprepared(
            r#"
            CREATE MATERIALIZED VIEW IF NOT EXISTS book_search_view AS
            SELECT b.id AS book_id,
                   setweight(to_tsvector('simple', coalesce(b.title, '')), 'A') ||
                   setweight(to_tsvector('simple', coalesce(b.subtitle, '')), 'B') ||
                   setweight(to_tsvector('simple', coalesce(string_agg(a.name, ' '), '')), 'B') ||
                   setweight(to_tsvector('simple', coalesce(b.description, '')), 'C') AS document
            FROM books b
            LEFT JOIN book_authors_join ba ON ba.book_id = b.id
            LEFT JOIN authors a ON a.id = ba.author_id
            GROUP BY b.id
            "#,
        )
        .await?;

        db.execute_unprepared(
            "CREATE UNIQUE INDEX IF NOT EXISTS uq_book_search_view_book_id \
             ON book_search_view (book_id)",
        )
        .await?;

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_book_search_view_document \
             ON book_search_view USING gin (document)",
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION refresh_book_search_view() RETURNS void AS $$
            BEGIN
                REFRESH MATERIALIZED VIEW CONCURRENTLY book_search_view;
            END;
            $$ LANGUAGE plpgsql
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION search_books(query text, max_rows integer)
            RETURNS TABLE (book_id uuid, relevance real) AS $$
                SELECT v.book_id,
                       ts_rank(v.document, plainto_tsquery('simple', query)) AS relevance
                FROM book_search_view v
                WHERE v.document @@ plainto_tsquery('simple', query)
                ORDER BY relevance DESC
                LIMIT max_rows;
            $$ LANGUAGE sql STABLE
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION search_authors(query text, max_rows integer)
            RETURNS TABLE (author_id text, author_name text, score real) AS $$
                SELECT a.id, a.name, similarity(a.normalized_name, lower(query)) AS score
                FROM authors a
                WHERE a.normalized_name % lower(query)
                   OR a.normalized_name LIKE '%' || lower(query) || '%'
                ORDER BY score DESC
                LIMIT max_rows;
            $$ LANGUAGE sql STABLE
            "#,
        )
        .await?;

        db.execute_unprepared(
            r#"
            CREATE OR REPLACE FUNCTION ensure_unique_slug(base text) RETURNS text AS $$
            DECLARE
                candidate text := base;
                n integer := 1;
            BEGIN
                WHILE EXISTS (SELECT 1 FROM books WHERE slug = candidate) LOOP
                    n := n + 1;
                    candidate := base || '-' || n;
                END LOOP;
                RETURN candidate;
            END;
            $$ LANGUAGE plpgsql
            "#,
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared("DROP FUNCTION IF EXISTS ensure_unique_slug(text)")
            .await?;
        db.execute_unprepared("DROP FUNCTION IF EXISTS search_authors(text, integer)")
            .await?;
        db.execute_unprepared("DROP FUNCTION IF EXISTS search_books(text, integer)")
            .await?;
        db.execute_unprepared("DROP FUNCTION IF EXISTS refresh_book_search_view()")
            .await?;
        db.execute_unprepared("DROP MATERIALIZED VIEW IF EXISTS book_search_view")
            .await?;

        Ok(())
    }
}
