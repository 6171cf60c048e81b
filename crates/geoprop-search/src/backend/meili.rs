//! Meilisearch HTTP backend.

use std::time::Duration;

use async_trait::async_trait;
use geoprop_core::PropertyDocument;
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{IndexHits, IndexQuery, SearchBackend};
use crate::error::SearchError;
use crate::schema::{IndexSettings, PRIMARY_KEY};

const DEFAULT_TASK_POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for one Meilisearch index.
pub struct MeiliBackend {
    client: Client,
    base_url: Url,
    index_uid: String,
    api_key: Option<String>,
    task_poll_interval: Duration,
    task_timeout: Duration,
}

#[derive(Serialize)]
struct IndexedProperty<'a> {
    #[serde(flatten)]
    document: &'a PropertyDocument,
    #[serde(rename = "_geo", skip_serializing_if = "Option::is_none")]
    geo: Option<GeoPoint>,
}

#[derive(Serialize)]
struct GeoPoint {
    lat: f64,
    lng: f64,
}

impl<'a> From<&'a PropertyDocument> for IndexedProperty<'a> {
    fn from(document: &'a PropertyDocument) -> Self {
        Self {
            document,
            geo: document.coordinates().map(|(lat, lng)| GeoPoint { lat, lng }),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateIndexRequest<'a> {
    uid: &'a str,
    primary_key: &'a str,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sort: Vec<String>,
    limit: usize,
    offset: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<PropertyDocument>,
    #[serde(default)]
    estimated_total_hits: Option<usize>,
    #[serde(default)]
    total_hits: Option<usize>,
    #[serde(default)]
    processing_time_ms: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskInfo {
    task_uid: u64,
}

#[derive(Deserialize)]
struct Task {
    status: String,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: String,
}

enum TaskOutcome {
    Succeeded,
    Failed(ApiError),
}

impl MeiliBackend {
    /// # Errors
    ///
    /// Returns [`SearchError::Misconfiguration`] for an unusable URL or index
    /// name, or [`SearchError::Http`] if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        index_uid: &str,
        timeout_secs: u64,
    ) -> Result<Self, SearchError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            SearchError::Misconfiguration(format!("invalid SEARCH_INDEX_URL '{base_url}': {e}"))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SearchError::Misconfiguration(format!(
                "SEARCH_INDEX_URL '{base_url}' cannot carry a path"
            )));
        }
        if index_uid.trim().is_empty() {
            return Err(SearchError::Misconfiguration(
                "SEARCH_INDEX_NAME is empty".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            base_url,
            index_uid: index_uid.trim().to_string(),
            api_key: api_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(ToOwned::to_owned),
            task_poll_interval: DEFAULT_TASK_POLL_INTERVAL,
            task_timeout: DEFAULT_TASK_TIMEOUT,
        })
    }

    /// Overrides how often and how long asynchronous index tasks are polled.
    #[must_use]
    pub fn with_task_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.task_poll_interval = interval;
        self.task_timeout = timeout;
        self
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let builder = self.client.request(method, self.url(segments));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        context: &str,
    ) -> Result<T, SearchError> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let error: ApiError = serde_json::from_str(&body).unwrap_or_default();
            let message = if error.message.is_empty() {
                body
            } else {
                error.message
            };
            return Err(SearchError::Index {
                status: status.as_u16(),
                message,
            });
        }
        serde_json::from_str(&body).map_err(|e| SearchError::Deserialize {
            context: context.to_string(),
            source: e,
        })
    }

    async fn wait_for_task(&self, uid: u64) -> Result<TaskOutcome, SearchError> {
        let uid_segment = uid.to_string();
        let deadline = tokio::time::Instant::now() + self.task_timeout;
        loop {
            let task: Task = self
                .send(
                    self.request(Method::GET, &["tasks", &uid_segment]),
                    "meilisearch task",
                )
                .await?;
            match task.status.as_str() {
                "succeeded" => return Ok(TaskOutcome::Succeeded),
                "failed" | "canceled" => {
                    return Ok(TaskOutcome::Failed(task.error.unwrap_or_else(|| ApiError {
                        message: format!("task {}", task.status),
                        code: String::new(),
                    })))
                }
                _ => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SearchError::Task {
                    uid,
                    message: format!("still {} after {:?}", task.status, self.task_timeout),
                });
            }
            tokio::time::sleep(self.task_poll_interval).await;
        }
    }

    /// Enqueues a write and waits for it to be applied.
    async fn run_task(&self, builder: RequestBuilder, context: &str) -> Result<(), SearchError> {
        let info: TaskInfo = self.send(builder, context).await?;
        match self.wait_for_task(info.task_uid).await? {
            TaskOutcome::Succeeded => Ok(()),
            TaskOutcome::Failed(error) => Err(SearchError::Task {
                uid: info.task_uid,
                message: format!("{} ({})", error.message, error.code),
            }),
        }
    }
}

#[async_trait]
impl SearchBackend for MeiliBackend {
    fn name(&self) -> &'static str {
        "meilisearch"
    }

    async fn ensure_index(&self, settings: &IndexSettings) -> Result<(), SearchError> {
        let create = self
            .request(Method::POST, &["indexes"])
            .json(&CreateIndexRequest {
                uid: &self.index_uid,
                primary_key: PRIMARY_KEY,
            });
        let info: TaskInfo = self.send(create, "create index").await?;
        match self.wait_for_task(info.task_uid).await? {
            TaskOutcome::Succeeded => {
                tracing::info!(index = %self.index_uid, "search index created");
            }
            TaskOutcome::Failed(error) if error.code == "index_already_exists" => {
                tracing::debug!(index = %self.index_uid, "search index already exists");
            }
            TaskOutcome::Failed(error) => {
                return Err(SearchError::Task {
                    uid: info.task_uid,
                    message: format!("{} ({})", error.message, error.code),
                });
            }
        }

        let update = self
            .request(Method::PATCH, &["indexes", &self.index_uid, "settings"])
            .json(settings);
        self.run_task(update, "update settings").await?;
        tracing::info!(index = %self.index_uid, "search index settings applied");
        Ok(())
    }

    async fn upsert(&self, documents: &[PropertyDocument]) -> Result<(), SearchError> {
        if documents.is_empty() {
            return Ok(());
        }
        let payload: Vec<IndexedProperty<'_>> =
            documents.iter().map(IndexedProperty::from).collect();
        let builder = self
            .request(Method::POST, &["indexes", &self.index_uid, "documents"])
            .query(&[("primaryKey", PRIMARY_KEY)])
            .json(&payload);
        self.run_task(builder, "add documents").await
    }

    async fn delete(&self, id: &str) -> Result<(), SearchError> {
        let builder = self.request(
            Method::DELETE,
            &["indexes", &self.index_uid, "documents", id],
        );
        self.run_task(builder, "delete document").await
    }

    async fn search(&self, query: &IndexQuery) -> Result<IndexHits, SearchError> {
        let body = SearchRequest {
            q: &query.text,
            filter: query.filter.as_ref().map(ToString::to_string),
            sort: query.sort.iter().map(ToString::to_string).collect(),
            limit: query.limit,
            offset: query.offset,
        };
        let builder = self
            .request(Method::POST, &["indexes", &self.index_uid, "search"])
            .json(&body);
        let response: SearchResponse = self.send(builder, "search response").await?;
        let total = response
            .total_hits
            .or(response.estimated_total_hits)
            .unwrap_or(response.hits.len());
        Ok(IndexHits {
            hits: response.hits,
            total,
            processing_time_ms: response.processing_time_ms,
        })
    }

    async fn health(&self) -> Result<(), SearchError> {
        let _: serde_json::Value = self
            .send(self.request(Method::GET, &["health"]), "health")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_appends_segments_after_base_path() {
        let backend = MeiliBackend::new("http://meili.local:7700/", None, "properties", 5).unwrap();
        assert_eq!(
            backend.url(&["indexes", "properties", "search"]).as_str(),
            "http://meili.local:7700/indexes/properties/search"
        );

        let proxied = MeiliBackend::new("http://gw.local/meili", None, "p", 5).unwrap();
        assert_eq!(
            proxied.url(&["tasks", "7"]).as_str(),
            "http://gw.local/meili/tasks/7"
        );
    }

    #[test]
    fn document_ids_are_path_encoded() {
        let backend = MeiliBackend::new("http://meili.local", None, "p", 5).unwrap();
        assert_eq!(
            backend.url(&["indexes", "p", "documents", "a/b c"]).as_str(),
            "http://meili.local/indexes/p/documents/a%2Fb%20c"
        );
    }

    #[test]
    fn empty_index_name_is_misconfiguration() {
        assert!(matches!(
            MeiliBackend::new("http://meili.local", None, " ", 5),
            Err(SearchError::Misconfiguration(_))
        ));
    }
}
