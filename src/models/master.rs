use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Master {
    pub id: i32,
    pub name: String,
    pub is_active: bool,
}

impl Master {
    /// Active masters, in catalog order. Storage failures degrade to an
    /// empty list so the booking flow can answer "нет доступных мастеров".
    pub async fn all_active(pool: &PgPool) -> Vec<Self> {
        match sqlx::query_as::<_, Master>(
            "SELECT id, name, is_active FROM masters WHERE is_active = true ORDER BY id",
        )
        .fetch_all(pool)
        .await
        {
            Ok(masters) => masters,
            Err(e) => {
                log::error!("Error fetching masters: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn find_active(pool: &PgPool, id: i32) -> Option<Self> {
        match sqlx::query_as::<_, Master>(
            "SELECT id, name, is_active FROM masters WHERE id = $1 AND is_active = true",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        {
            Ok(master) => master,
            Err(e) => {
                log::error!("Error fetching master {}: {}", id, e);
                None
            }
        }
    }
}
