use super::{AdapterError, SourceAdapter, SourceFields, SourceRecord};
use async_trait::async_trait;
use serde::Deserialize;

const BASE_URL: &str = "https://api.semanticscholar.org/graph/v1";
const PAGE_SIZE: u32 = 500;
const FIELDS: &str = "title,authors,year,citationCount";

pub struct SemanticScholarClient {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl SemanticScholarClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent("citemetrics/0.1")
                .build()
                .unwrap(),
            api_key,
        }
    }

    fn add_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => req.header("x-api-key", key),
            None => req,
        }
    }
}

#[derive(Deserialize)]
struct S2PapersResponse {
    data: Option<Vec<S2Paper>>,
    next: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct S2Paper {
    paper_id: Option<String>,
    title: Option<String>,
    authors: Option<Vec<S2Author>>,
    year: Option<u32>,
    citation_count: Option<u32>,
}

#[derive(Deserialize)]
struct S2Author {
    name: Option<String>,
}

fn paper_to_record(p: &S2Paper) -> Option<SourceRecord> {
    let title = p.title.clone()?;
    Some(SourceRecord {
        source_id: "semantic_scholar".to_string(),
        title,
        authors: p
            .authors
            .as_ref()
            .map(|a| a.iter().filter_map(|a| a.name.clone()).collect())
            .unwrap_or_default(),
        year: p.year,
        cites: p.citation_count,
        external_ref: p.paper_id.clone().unwrap_or_default(),
    })
}

#[async_trait]
impl SourceAdapter for SemanticScholarClient {
    fn name(&self) -> &str {
        "semantic_scholar"
    }

    fn profile_keys(&self) -> &[&str] {
        &["author_id"]
    }

    async fn fetch(&self, fields: &SourceFields) -> Result<Vec<SourceRecord>, AdapterError> {
        let author_id = fields
            .get("author_id")
            .ok_or(AdapterError::MissingField("author_id"))?;

        let url = format!("{}/author/{}/papers", BASE_URL, author_id);
        let mut records = Vec::new();
        let mut offset = 0u64;
        loop {
            let limit = PAGE_SIZE.to_string();
            let offset_str = offset.to_string();
            let resp = self
                .add_auth(self.client.get(&url).query(&[
                    ("fields", FIELDS),
                    ("limit", limit.as_str()),
                    ("offset", offset_str.as_str()),
                ]))
                .send()
                .await?;
            if resp.status() == 404 {
                return Err(AdapterError::Api(format!(
                    "unknown author id: {}",
                    author_id
                )));
            }
            let page: S2PapersResponse = resp.json().await?;
            records.extend(page.data.unwrap_or_default().iter().filter_map(paper_to_record));
            match page.next {
                Some(next) => offset = next,
                None => break,
            }
        }
        Ok(records)
    }
}
