use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

/// Run all pending migrations.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    create_migration_table(pool).await?;
    let current_version = get_schema_version(pool).await?;

    if current_version < 1 {
        debug!("Running migration v1");
        run_migration_v1(pool).await?;
        set_schema_version(pool, 1).await?;
    }

    Ok(())
}

async fn create_migration_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS _schema_version (
            version INTEGER PRIMARY KEY
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create schema version table")?;

    Ok(())
}

async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT version FROM _schema_version LIMIT 1")
        .fetch_optional(pool)
        .await
        .context("Failed to get schema version")?;

    Ok(row.map_or(0, |(v,)| v))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("DELETE FROM _schema_version")
        .execute(pool)
        .await
        .context("Failed to clear schema version")?;

    sqlx::query("INSERT INTO _schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await
        .context("Failed to set schema version")?;

    Ok(())
}

/// Initial schema: one table per concept collection.
///
/// Every record carries a generated id plus creation/update timestamps.
/// There are deliberately no foreign keys between concept tables:
/// referential integrity across concepts is the routing layer's job.
async fn run_migration_v1(pool: &SqlitePool) -> Result<()> {
    let statements = [
        r"
        CREATE TABLE users (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        ",
        "CREATE INDEX idx_users_username ON users(username)",
        r"
        CREATE TABLE sessions (
            id TEXT PRIMARY KEY,
            token TEXT NOT NULL UNIQUE,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        ",
        "CREATE INDEX idx_sessions_user ON sessions(user_id)",
        r"
        CREATE TABLE posts (
            id TEXT PRIMARY KEY,
            author TEXT NOT NULL,
            image TEXT NOT NULL,
            caption TEXT NOT NULL,
            background_color TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        ",
        "CREATE INDEX idx_posts_author ON posts(author)",
        r"
        CREATE TABLE comments (
            id TEXT PRIMARY KEY,
            author TEXT NOT NULL,
            item TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        ",
        "CREATE INDEX idx_comments_item ON comments(item)",
        r"
        CREATE TABLE user_likes (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            item TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        ",
        "CREATE UNIQUE INDEX idx_user_likes_pair ON user_likes(user_id, item)",
        "CREATE INDEX idx_user_likes_item ON user_likes(item)",
        r"
        CREATE TABLE item_likes (
            id TEXT PRIMARY KEY,
            item TEXT NOT NULL UNIQUE,
            quantity INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        ",
        r"
        CREATE TABLE badges (
            id TEXT PRIMARY KEY,
            author TEXT NOT NULL,
            badge_type TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        ",
        "CREATE INDEX idx_badges_author ON badges(author)",
        r"
        CREATE TABLE reports (
            id TEXT PRIMARY KEY,
            item TEXT NOT NULL,
            info TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        ",
        r"
        CREATE TABLE friend_requests (
            id TEXT PRIMARY KEY,
            from_user TEXT NOT NULL,
            to_user TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        ",
        "CREATE INDEX idx_friend_requests_to ON friend_requests(to_user)",
        r"
        CREATE TABLE friendships (
            id TEXT PRIMARY KEY,
            user1 TEXT NOT NULL,
            user2 TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        ",
        "CREATE INDEX idx_friendships_user1 ON friendships(user1)",
        "CREATE INDEX idx_friendships_user2 ON friendships(user2)",
        r"
        CREATE TABLE blur_filters (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            filtered_user TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        ",
        "CREATE UNIQUE INDEX idx_blur_filters_pair ON blur_filters(user_id, filtered_user)",
    ];

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Migration v1 statement failed: {statement}"))?;
    }

    Ok(())
}
