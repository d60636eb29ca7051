//! [`BoardSource`] backed by the CRM HTTP API.
//!
//! A board over resource `deals` with stage field `stage` reads pages from
//! `GET /api/deals?stage={stage}&page=&limit=`, counts from
//! `GET /api/deals/counts?by=stage`, and persists through
//! `PUT /api/deals/{id}` and `PUT /api/deals/reorder`. Resource names and
//! ids are percent-encoded as single path segments.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::source::{BoardSource, SourceError};
use crate::types::{Counts, Page, Record};

pub struct HttpBoardSource {
    client: Client,
    base_url: String,
    resource: String,
    stage_field: String,
    search: RwLock<Option<String>>,
}

impl HttpBoardSource {
    #[must_use]
    pub fn new(base_url: &str, resource: &str, stage_field: &str) -> Self {
        Self::with_client(Client::new(), base_url, resource, stage_field)
    }

    #[must_use]
    pub fn with_client(client: Client, base_url: &str, resource: &str, stage_field: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            resource: resource.to_owned(),
            stage_field: stage_field.to_owned(),
            search: RwLock::new(None),
        }
    }

    /// Search term sent with subsequent page requests. Blank clears it.
    /// Takes effect on the next `reset_and_reload`.
    pub fn set_search(&self, search: Option<&str>) {
        let search = search.map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned);
        *self.search.write().unwrap_or_else(PoisonError::into_inner) = search;
    }

    #[must_use]
    pub fn search(&self) -> Option<String> {
        self.search.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// `{base_url}/api/{resource}/{segments..}`, each segment encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, SourceError> {
        let invalid = || SourceError::InvalidUrl(self.base_url.clone());
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .pop_if_empty()
            .extend(["api", self.resource.as_str()])
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder, url: &Url) -> Result<reqwest::Response, SourceError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status { status: status.as_u16(), path: url.path().to_owned() });
        }
        Ok(response)
    }

    async fn get_json<R: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<R, SourceError> {
        let url = self.url(segments)?;
        let response = self.send(self.client.get(url.clone()).query(query), &url).await?;
        Ok(response.json::<R>().await?)
    }

    async fn put_json(&self, segments: &[&str], body: &Value) -> Result<(), SourceError> {
        let url = self.url(segments)?;
        self.send(self.client.put(url.clone()).json(body), &url).await?;
        Ok(())
    }
}

#[async_trait]
impl BoardSource<Record> for HttpBoardSource {
    async fn fetch_page(&self, stage: &str, page: u32, limit: u32) -> Result<Page<Record>, SourceError> {
        let mut query = vec![
            (self.stage_field.as_str(), stage.to_owned()),
            ("page", page.to_string()),
            ("limit", limit.to_string()),
        ];
        if let Some(search) = self.search() {
            query.push(("search", search));
        }
        debug!(resource = %self.resource, %stage, page, "fetching board page");
        self.get_json(&[], &query).await
    }

    async fn fetch_counts(&self) -> Result<Counts, SourceError> {
        let mut query = vec![("by", self.stage_field.clone())];
        if let Some(search) = self.search() {
            query.push(("search", search));
        }
        self.get_json(&["counts"], &query).await
    }

    async fn change_stage(&self, item_id: &str, stage: &str) -> Result<(), SourceError> {
        let mut body = Map::new();
        body.insert(self.stage_field.clone(), Value::String(stage.to_owned()));
        self.put_json(&[item_id], &Value::Object(body)).await
    }

    async fn reorder(&self, _stage: &str, ordered_ids: &[String]) -> Result<(), SourceError> {
        self.put_json(&["reorder"], &json!({ "ids": ordered_ids })).await
    }
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
