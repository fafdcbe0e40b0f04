//! Google Sheets mirror of the booking store.
//!
//! Write-only, best-effort sink: rows are appended on create, rewritten in
//! place on status change, and a full resync clears and rebuilds the sheet
//! from the store snapshot. Failures here never affect a committed booking.

use anyhow::{anyhow, Result};
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde_json::json;

use crate::config::SheetConfig;
use crate::models::AppointmentView;

const RETRIES: u32 = 2;
const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

const HEADERS: [&str; 10] = [
    "ID", "Дата записи", "Время", "Клиент", "Телефон",
    "Мастер", "Услуга", "Длительность", "Цена", "Статус",
];

pub struct SheetsMirror {
    http: ClientWithMiddleware,
    sheet_id: String,
    sheet_name: String,
    token: String,
}

fn row_values(view: &AppointmentView) -> Vec<String> {
    vec![
        view.id.to_string(),
        view.formatted_date(),
        view.formatted_time(),
        view.client_name.clone(),
        view.phone.clone(),
        view.master_name.clone(),
        view.service_name.clone(),
        view.duration.to_string(),
        view.price.to_string(),
        view.status().label().to_string(),
    ]
}

impl SheetsMirror {
    pub fn new(config: &SheetConfig) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(RETRIES);
        let http = ClientBuilder::new(Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        SheetsMirror {
            http,
            sheet_id: config.sheet_id.clone(),
            sheet_name: config.sheet_name.clone(),
            token: config.access_token.clone(),
        }
    }

    /// Mirrors a created booking by appending its row.
    pub async fn append(&self, view: &AppointmentView) -> Result<()> {
        self.append_rows(vec![row_values(view)]).await
    }

    /// Mirrors an updated booking: the row is located by appointment id and
    /// overwritten. An id that is absent (e.g. after a manual sheet edit)
    /// falls back to append, so replays stay update-or-append.
    pub async fn update(&self, view: &AppointmentView) -> Result<()> {
        match self.find_row(view.id).await? {
            Some(row_number) => {
                let range = format!(
                    "{}!A{}:J{}",
                    self.sheet_name, row_number, row_number
                );
                let url = format!(
                    "{}/{}/values/{}?valueInputOption=RAW",
                    API_BASE, self.sheet_id, range
                );
                self.check(
                    self.http
                        .put(&url)
                        .bearer_auth(&self.token)
                        .json(&json!({ "values": [row_values(view)] }))
                        .send()
                        .await?,
                )
                .await
            }
            None => {
                log::warn!("Sheet row for appointment #{} not found, appending", view.id);
                self.append(view).await
            }
        }
    }

    /// Clears the sheet and rewrites headers plus every appointment from the
    /// current store snapshot.
    pub async fn resync(&self, views: &[AppointmentView]) -> Result<()> {
        let clear_url = format!(
            "{}/{}/values/{}!A:Z:clear",
            API_BASE, self.sheet_id, self.sheet_name
        );
        self.check(
            self.http
                .post(&clear_url)
                .bearer_auth(&self.token)
                .json(&json!({}))
                .send()
                .await?,
        )
        .await?;

        let mut rows: Vec<Vec<String>> =
            vec![HEADERS.iter().map(|h| h.to_string()).collect()];
        rows.extend(views.iter().map(row_values));
        self.append_rows(rows).await
    }

    async fn append_rows(&self, rows: Vec<Vec<String>>) -> Result<()> {
        let url = format!(
            "{}/{}/values/{}!A1:append?valueInputOption=RAW",
            API_BASE, self.sheet_id, self.sheet_name
        );
        self.check(
            self.http
                .post(&url)
                .bearer_auth(&self.token)
                .json(&json!({ "values": rows }))
                .send()
                .await?,
        )
        .await
    }

    /// Looks up the 1-based sheet row holding the appointment id in column A.
    async fn find_row(&self, id: i64) -> Result<Option<u32>> {
        let url = format!(
            "{}/{}/values/{}!A:A",
            API_BASE, self.sheet_id, self.sheet_name
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(anyhow!("Sheets API error: {}", response.status()));
        }

        let body: serde_json::Value = response.json().await?;
        let needle = id.to_string();
        let row = body["values"]
            .as_array()
            .and_then(|rows| {
                rows.iter().position(|row| {
                    row.as_array()
                        .and_then(|cells| cells.first())
                        .and_then(|cell| cell.as_str())
                        == Some(needle.as_str())
                })
            })
            .map(|idx| idx as u32 + 1);
        Ok(row)
    }

    async fn check(&self, response: reqwest::Response) -> Result<()> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(anyhow!("Sheets API error: {}", response.status()))
        }
    }
}
