use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(1800))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        Ok(Database { pool })
    }

    /// Creates the schema and seeds the default catalog. Idempotent: seed
    /// rows are inserted only when absent, referenced rows are never
    /// rewritten.
    pub async fn init(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS masters (
                id SERIAL PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                is_active BOOLEAN NOT NULL DEFAULT TRUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS services (
                id SERIAL PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                duration INTEGER NOT NULL DEFAULT 60
                    CHECK (duration > 0 AND duration <= 240),
                price DOUBLE PRECISION NOT NULL CHECK (price >= 0),
                is_active BOOLEAN NOT NULL DEFAULT TRUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // RESTRICT keeps catalog rows referenced by any appointment from
        // being deleted; deactivation is the supported removal path.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS appointments (
                id BIGSERIAL PRIMARY KEY,
                client_id BIGINT NOT NULL,
                client_name TEXT NOT NULL,
                phone TEXT NOT NULL,
                master_id INTEGER NOT NULL REFERENCES masters(id) ON DELETE RESTRICT,
                service_id INTEGER NOT NULL REFERENCES services(id) ON DELETE RESTRICT,
                date DATE NOT NULL,
                time TIME NOT NULL,
                status TEXT NOT NULL DEFAULT 'active'
                    CHECK (status IN ('active', 'canceled', 'completed')),
                reminder_sent BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for index in [
            "CREATE INDEX IF NOT EXISTS idx_appointments_date ON appointments (date)",
            "CREATE INDEX IF NOT EXISTS idx_appointments_master ON appointments (master_id)",
            "CREATE INDEX IF NOT EXISTS idx_appointments_status ON appointments (status)",
            "CREATE INDEX IF NOT EXISTS idx_appointments_reminder ON appointments (reminder_sent)",
        ] {
            sqlx::query(index).execute(&self.pool).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO masters (name)
            VALUES ('Анна'), ('Мария'), ('Екатерина')
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO services (name, duration, price)
            VALUES
                ('Маникюр', 60, 1200),
                ('Покрытие гель-лаком', 60, 1800),
                ('Наращивание ногтей', 90, 2500),
                ('Дизайн ногтей', 30, 500)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
