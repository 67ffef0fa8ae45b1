use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::sql_types::Text;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

diesel::define_sql_function! {
    /// Lowercases the whole of Unicode, SQLite's built-in `lower()` only folds ASCII
    fn unicode_lower(value: Text) -> Text;
}

/// Applied to every connection as it is handed out by the pool.
/// SQLite keeps foreign key enforcement off unless asked per connection.
#[derive(Debug, Clone, Copy)]
struct SqliteSetup;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqliteSetup {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute("PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;")
            .map_err(diesel::r2d2::Error::QueryError)?;
        unicode_lower_utils::register_impl(conn, |value: String| value.to_lowercase())
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Return a pool of connections to the database at `database_url`
/// and bring its schema up to date.
///
/// # Example
/// ```ignore
/// let pool = connect_to_db("blogsite.db", 10)?;
/// let conn = pool.get()?;
/// ```
pub fn connect_to_db(database_url: &str, pool_size: u32) -> Result<DbPool, String> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(pool_size)
        .connection_customizer(Box::new(SqliteSetup))
        .build(manager)
        .map_err(|err| format!("Error connecting to {}: {}", database_url, err))?;

    run_migrations(&pool)?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> Result<(), String> {
    let mut conn = pool.get().map_err(|err| err.to_string())?;
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|err| format!("Error running migrations: {}", err))?;

    for version in applied {
        log::info!("applied migration {}", version);
    }

    Ok(())
}

/// Single-connection in-memory database with migrations applied.
/// Every connection to `:memory:` is a separate database, hence the pool size of one.
#[cfg(test)]
pub fn test_pool() -> DbPool {
    let manager = ConnectionManager::<SqliteConnection>::new(":memory:");
    let pool = Pool::builder()
        .max_size(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connection_customizer(Box::new(SqliteSetup))
        .build(manager)
        .unwrap();

    run_migrations(&pool).unwrap();

    pool
}
