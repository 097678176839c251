use super::{AdapterError, SourceAdapter, SourceFields, SourceRecord};
use async_trait::async_trait;
use serde::Deserialize;

const BASE_URL: &str = "https://api.crossref.org/works";
const ROWS: u32 = 200;

pub struct CrossRefClient {
    client: reqwest::Client,
}

impl CrossRefClient {
    pub fn new(email: Option<String>) -> Self {
        let ua = match email {
            Some(ref e) => format!("citemetrics/0.1 (mailto:{})", e),
            None => "citemetrics/0.1".to_string(),
        };
        Self {
            client: reqwest::Client::builder()
                .user_agent(ua)
                .build()
                .unwrap(),
        }
    }
}

#[derive(Deserialize)]
struct CRResponse {
    message: CRMessage,
}

#[derive(Deserialize)]
struct CRMessage {
    items: Option<Vec<CRItem>>,
}

#[derive(Deserialize)]
struct CRItem {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    title: Option<Vec<String>>,
    author: Option<Vec<CRAuthor>>,
    #[serde(rename = "is-referenced-by-count")]
    citation_count: Option<u32>,
    published: Option<CRDate>,
}

#[derive(Deserialize)]
struct CRAuthor {
    given: Option<String>,
    family: Option<String>,
}

#[derive(Deserialize)]
struct CRDate {
    #[serde(rename = "date-parts")]
    date_parts: Option<Vec<Vec<u32>>>,
}

fn item_to_record(item: &CRItem) -> Option<SourceRecord> {
    let title = item.title.as_ref().and_then(|t| t.first()).cloned()?;
    let authors = item
        .author
        .as_ref()
        .map(|a| {
            a.iter()
                .map(|a| {
                    format!(
                        "{} {}",
                        a.given.as_deref().unwrap_or(""),
                        a.family.as_deref().unwrap_or("")
                    )
                    .trim()
                    .to_string()
                })
                .filter(|name| !name.is_empty())
                .collect()
        })
        .unwrap_or_default();
    let year = item
        .published
        .as_ref()
        .and_then(|d| d.date_parts.as_ref())
        .and_then(|p| p.first())
        .and_then(|p| p.first())
        .copied();
    Some(SourceRecord {
        source_id: "crossref".to_string(),
        title,
        authors,
        year,
        cites: item.citation_count,
        external_ref: item.doi.clone().unwrap_or_default(),
    })
}

#[async_trait]
impl SourceAdapter for CrossRefClient {
    fn name(&self) -> &str {
        "crossref"
    }

    fn profile_keys(&self) -> &[&str] {
        &["author_query"]
    }

    async fn fetch(&self, fields: &SourceFields) -> Result<Vec<SourceRecord>, AdapterError> {
        let author_query = fields
            .get("author_query")
            .ok_or(AdapterError::MissingField("author_query"))?;

        let rows = ROWS.to_string();
        let resp: CRResponse = self
            .client
            .get(BASE_URL)
            .query(&[
                ("query.author", author_query.as_str()),
                ("rows", rows.as_str()),
                (
                    "select",
                    "DOI,title,author,published,is-referenced-by-count",
                ),
            ])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| AdapterError::Api(e.to_string()))?
            .json()
            .await?;

        Ok(resp
            .message
            .items
            .unwrap_or_default()
            .iter()
            .filter_map(item_to_record)
            .collect())
    }
}
