use super::{AdapterError, SourceAdapter, SourceFields, SourceRecord};
use async_trait::async_trait;
use serde::Deserialize;

const BASE_URL: &str = "https://api.openalex.org";
const PER_PAGE: u32 = 200;

pub struct OpenAlexClient {
    client: reqwest::Client,
}

impl OpenAlexClient {
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
struct OAResponse {
    results: Option<Vec<OAWork>>,
    meta: Option<OAMeta>,
}

#[derive(Deserialize)]
struct OAMeta {
    count: Option<u64>,
}

#[derive(Deserialize)]
struct OAWork {
    id: Option<String>,
    title: Option<String>,
    authorships: Option<Vec<OAAuthorship>>,
    publication_year: Option<u32>,
    cited_by_count: Option<u32>,
}

#[derive(Deserialize)]
struct OAAuthorship {
    author: OAAuthor,
}

#[derive(Deserialize)]
struct OAAuthor {
    display_name: Option<String>,
}

fn work_to_record(w: &OAWork) -> Option<SourceRecord> {
    let title = w.title.clone()?;
    let authors = w
        .authorships
        .as_ref()
        .map(|a| {
            a.iter()
                .filter_map(|a| a.author.display_name.clone())
                .collect()
        })
        .unwrap_or_default();
    Some(SourceRecord {
        source_id: "openalex".to_string(),
        title,
        authors,
        year: w.publication_year,
        cites: w.cited_by_count,
        external_ref: w.id.clone().unwrap_or_default(),
    })
}

#[async_trait]
impl SourceAdapter for OpenAlexClient {
    fn name(&self) -> &str {
        "openalex"
    }

    fn profile_keys(&self) -> &[&str] {
        &["author_id"]
    }

    async fn fetch(&self, fields: &SourceFields) -> Result<Vec<SourceRecord>, AdapterError> {
        let author_id = fields
            .get("author_id")
            .ok_or(AdapterError::MissingField("author_id"))?;

        let mut records = Vec::new();
        let mut page = 1u32;
        loop {
            let filter = format!("author.id:{}", author_id);
            let per_page = PER_PAGE.to_string();
            let page_str = page.to_string();
            let resp: OAResponse = self
                .client
                .get(format!("{}/works", BASE_URL))
                .query(&[
                    ("filter", filter.as_str()),
                    ("per-page", per_page.as_str()),
                    ("page", page_str.as_str()),
                ])
                .send()
                .await?
                .error_for_status()
                .map_err(|e| AdapterError::Api(e.to_string()))?
                .json()
                .await?;

            let results = resp.results.unwrap_or_default();
            let got = results.len();
            records.extend(results.iter().filter_map(work_to_record));

            let total = resp.meta.and_then(|m| m.count).unwrap_or(0);
            if got < PER_PAGE as usize || (records.len() as u64) >= total {
                break;
            }
            page += 1;
        }
        Ok(records)
    }
}
