use crate::migrations::{self, MigrationError};
use crate::model::*;
use log::{debug, info};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use thiserror::Error;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Migration(#[from] MigrationError),
}

fn migrate(pool: DbPool) -> Result<DbPool, DbError> {
    let conn = pool.get()?;
    migrations::run_migrations(&conn)?;
    drop(conn);
    Ok(pool)
}

/// Opens (creating if needed) the database at `path` and brings its schema up
/// to date. Every pooled connection enforces foreign keys.
pub fn init_pool(path: &str, size: u32) -> Result<DbPool, DbError> {
    let manager = SqliteConnectionManager::file(path)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = Pool::builder().max_size(size).build(manager)?;
    info!("opened database {} (pool size {})", path, size);
    migrate(pool)
}

/// Each in-memory connection is its own database, so this pool holds exactly one.
#[cfg(test)]
pub fn init_memory_pool() -> Result<DbPool, DbError> {
    let manager = SqliteConnectionManager::memory()
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = Pool::builder().max_size(1).build(manager)?;
    migrate(pool)
}

pub trait UserDb {
    type Error;
    fn list_users(&self) -> Result<Vec<Keyed<User>>, Self::Error>;
    fn get_user(&self, id: i64) -> Result<Option<Keyed<User>>, Self::Error>;
    /// Returns `None` when the name is already taken.
    fn add_user(&self, user: &User) -> Result<Option<i64>, Self::Error>;
    /// Deletes the user and, through the foreign key, all of their movies.
    fn delete_user(&self, id: i64) -> Result<bool, Self::Error>;
}

pub trait MovieDb {
    type Error;
    fn list_movies_for_user(&self, user_id: i64) -> Result<Vec<UserMovie>, Self::Error>;
    fn get_movie(&self, id: i64) -> Result<Option<Keyed<Movie>>, Self::Error>;
    fn add_movie(&self, movie: &Movie) -> Result<i64, Self::Error>;
    /// Overwrites owner, title, director, year and rating. `false` if no such movie.
    fn update_movie(&self, id: i64, movie: &Movie) -> Result<bool, Self::Error>;
    /// `false` if no such movie.
    fn delete_movie(&self, id: i64) -> Result<bool, Self::Error>;
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<Keyed<User>> {
    Ok(Keyed {
        id: row.get("id")?,
        value: User {
            name: row.get("name")?,
        },
    })
}

fn movie_from_row(row: &Row<'_>) -> rusqlite::Result<Keyed<Movie>> {
    Ok(Keyed {
        id: row.get("id")?,
        value: Movie {
            user_id: row.get("user_id")?,
            name: row.get("name")?,
            director: row.get("director")?,
            year: row.get("year")?,
            rating: row.get("rating")?,
            path: row.get("path")?,
        },
    })
}

const MOVIE_COLUMNS: &str = "movie.id AS id, movie.user_id AS user_id, movie.name AS name, \
     movie.director AS director, movie.year AS year, movie.rating AS rating, movie.path AS path";

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl UserDb for DbPool {
    type Error = DbError;

    fn list_users(&self) -> Result<Vec<Keyed<User>>, DbError> {
        let conn = self.get()?;
        let mut stmt = conn.prepare("SELECT id, name FROM \"user\" ORDER BY name")?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    fn get_user(&self, id: i64) -> Result<Option<Keyed<User>>, DbError> {
        let conn = self.get()?;
        Ok(conn
            .query_row(
                "SELECT id, name FROM \"user\" WHERE id = ?1",
                [id],
                user_from_row,
            )
            .optional()?)
    }

    fn add_user(&self, user: &User) -> Result<Option<i64>, DbError> {
        let mut conn = self.get()?;
        let tx = conn.transaction()?;
        match tx.execute("INSERT INTO \"user\" (name) VALUES (?1)", [&user.name]) {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                debug!("user name already taken: {}", user.name);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }
        let id = tx.last_insert_rowid();
        tx.commit()?;
        info!("added user {} ({})", id, user.name);
        Ok(Some(id))
    }

    fn delete_user(&self, id: i64) -> Result<bool, DbError> {
        let mut conn = self.get()?;
        let tx = conn.transaction()?;
        let deleted = tx.execute("DELETE FROM \"user\" WHERE id = ?1", [id])? > 0;
        tx.commit()?;
        if deleted {
            info!("deleted user {} and their movies", id);
        }
        Ok(deleted)
    }
}

impl MovieDb for DbPool {
    type Error = DbError;

    fn list_movies_for_user(&self, user_id: i64) -> Result<Vec<UserMovie>, DbError> {
        let conn = self.get()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT \"user\".name AS username, {}
             FROM movie INNER JOIN \"user\" ON movie.user_id = \"user\".id
             WHERE \"user\".id = ?1
             ORDER BY movie.name DESC",
            MOVIE_COLUMNS
        ))?;
        let movies = stmt
            .query_map([user_id], |row| {
                Ok(UserMovie {
                    username: row.get("username")?,
                    movie: movie_from_row(row)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(movies)
    }

    fn get_movie(&self, id: i64) -> Result<Option<Keyed<Movie>>, DbError> {
        let conn = self.get()?;
        Ok(conn
            .query_row(
                &format!("SELECT {} FROM movie WHERE movie.id = ?1", MOVIE_COLUMNS),
                [id],
                movie_from_row,
            )
            .optional()?)
    }

    fn add_movie(&self, movie: &Movie) -> Result<i64, DbError> {
        let mut conn = self.get()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO movie (user_id, name, director, year, rating, path)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                movie.user_id,
                movie.name,
                movie.director,
                movie.year,
                movie.rating,
                movie.path
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        info!("added movie {} ({}) for user {}", id, movie.name, movie.user_id);
        Ok(id)
    }

    fn update_movie(&self, id: i64, movie: &Movie) -> Result<bool, DbError> {
        let mut conn = self.get()?;
        let tx = conn.transaction()?;
        let updated = tx.execute(
            "UPDATE movie SET user_id = ?1, name = ?2, director = ?3, year = ?4, rating = ?5
             WHERE id = ?6",
            params![
                movie.user_id,
                movie.name,
                movie.director,
                movie.year,
                movie.rating,
                id
            ],
        )? > 0;
        tx.commit()?;
        if updated {
            info!("updated movie {} ({})", id, movie.name);
        }
        Ok(updated)
    }

    fn delete_movie(&self, id: i64) -> Result<bool, DbError> {
        let mut conn = self.get()?;
        let tx = conn.transaction()?;
        let exists = tx
            .query_row("SELECT id FROM movie WHERE id = ?1", [id], |row| {
                row.get::<_, i64>(0)
            })
            .optional()?
            .is_some();
        if !exists {
            debug!("delete of missing movie {} ignored", id);
            return Ok(false);
        }
        tx.execute("DELETE FROM movie WHERE id = ?1", [id])?;
        tx.commit()?;
        info!("deleted movie {}", id);
        Ok(true)
    }
}
