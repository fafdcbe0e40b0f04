use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Service {
    pub id: i32,
    pub name: String,
    /// Minutes, 1-240 (enforced by the schema).
    pub duration: i32,
    pub price: f64,
    pub is_active: bool,
}

impl Service {
    pub async fn all_active(pool: &PgPool) -> Vec<Self> {
        match sqlx::query_as::<_, Service>(
            "SELECT id, name, duration, price, is_active \
             FROM services WHERE is_active = true ORDER BY id",
        )
        .fetch_all(pool)
        .await
        {
            Ok(services) => services,
            Err(e) => {
                log::error!("Error fetching services: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn find_active(pool: &PgPool, id: i32) -> Option<Self> {
        match sqlx::query_as::<_, Service>(
            "SELECT id, name, duration, price, is_active \
             FROM services WHERE id = $1 AND is_active = true",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        {
            Ok(service) => service,
            Err(e) => {
                log::error!("Error fetching service {}: {}", id, e);
                None
            }
        }
    }

    /// Button label: "Маникюр (1ч 0мин) - 1200₽".
    pub fn label(&self) -> String {
        format!("{} ({}) - {}₽", self.name, format_duration(self.duration), self.price)
    }
}

pub fn format_duration(minutes: i32) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    if hours > 0 {
        format!("{}ч {}мин", hours, rest)
    } else {
        format!("{}мин", rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(30), "30мин");
        assert_eq!(format_duration(60), "1ч 0мин");
        assert_eq!(format_duration(90), "1ч 30мин");
    }
}
