//! Scraped ranking data source: fetches the ranking page and derives a
//! 1-based position for a project within a category.

use crate::error::GatewayError;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;

const REQ_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait RankSource: Send + Sync {
    /// 1-based rank of `project` within `category` ("all" spans categories);
    /// 0 when the project is absent. Inputs are expected lowercased.
    async fn rank(&self, category: &str, project: &str) -> Result<u32, GatewayError>;
}

pub struct RankingScraper {
    client: reqwest::Client,
    url: String,
}

impl RankingScraper {
    pub fn new(url: String) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(REQ_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Upstream(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl RankSource for RankingScraper {
    async fn rank(&self, category: &str, project: &str) -> Result<u32, GatewayError> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(format!("request failed: {e}")))?
            .text()
            .await
            .map_err(|e| GatewayError::Upstream(format!("failed to read page: {e}")))?;

        Ok(rank_in_table(&body, category, project))
    }
}

/// Walk `tbody tr` rows: name is the 3rd cell, category the 5th. Rows
/// matching the requested category are collected until the project's row;
/// a category mismatch on that row voids the result.
pub fn rank_in_table(html: &str, category: &str, project: &str) -> u32 {
    let document = Html::parse_document(html);
    let row_selector = Selector::parse("tbody tr").expect("static selector");
    let cell_selector = Selector::parse("td").expect("static selector");

    let mut names: Vec<String> = Vec::new();
    for row in document.select(&row_selector) {
        let cells: Vec<ElementRef> = row.select(&cell_selector).collect();
        if cells.len() < 5 {
            continue;
        }

        let name = cell_text(cells[2]);
        let row_category = cell_text(cells[4]);

        if row_category == category || category == "all" {
            names.push(name.clone());
        }

        if name == project {
            if row_category != category && category != "all" {
                names.clear();
            }
            break;
        }
    }

    names
        .iter()
        .position(|name| name == project)
        .map(|index| index as u32 + 1)
        .unwrap_or(0)
}

fn cell_text(cell: ElementRef) -> String {
    cell.text().collect::<String>().trim().to_lowercase()
}
