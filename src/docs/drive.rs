// SPDX-License-Identifier: MIT
//! REST adapter for a Drive-style document store.
//!
//! Implements [`DocumentStore`] and [`CommentTransport`] over the store's
//! HTTP API: file listing and metadata (`appProperties`), revision downloads,
//! structured document bodies, and anchored comments with threaded replies.
//! Authenticates with a bearer access token; token acquisition happens
//! outside this crate.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;

use super::{CommentTransport, DocHandle, DocumentStore, StoreError};

pub struct DriveClient {
    http: reqwest::Client,
    files_base: String,
    docs_base: String,
    token: String,
}

impl DriveClient {
    pub fn new(
        files_base: String,
        docs_base: String,
        token: String,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            files_base: files_base.trim_end_matches('/').to_string(),
            docs_base: docs_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn check(&self, resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let code = status.as_u16();
        let message = resp.text().await.unwrap_or_default();
        Err(StoreError::Api {
            status: code,
            message: truncate(&message),
        })
    }
}

fn truncate(s: &str) -> String {
    s.chars().take(200).collect()
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<FileEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileEntry {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    modified_time: Option<DateTime<Utc>>,
    #[serde(default)]
    shared_with_me_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileMeta {
    #[serde(default)]
    app_properties: HashMap<String, String>,
    #[serde(default)]
    head_revision_id: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct DocumentBody {
    #[serde(default)]
    body: BodyContent,
}

#[derive(Debug, Deserialize, Default)]
struct BodyContent {
    #[serde(default)]
    content: Vec<StructuralElement>,
}

#[derive(Debug, Deserialize)]
struct StructuralElement {
    #[serde(default)]
    paragraph: Option<ParagraphElement>,
}

#[derive(Debug, Deserialize)]
struct ParagraphElement {
    #[serde(default)]
    elements: Vec<ParagraphChild>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParagraphChild {
    #[serde(default)]
    text_run: Option<TextRun>,
}

#[derive(Debug, Deserialize)]
struct TextRun {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct CommentCreated {
    id: String,
}

// ─── DocumentStore ───────────────────────────────────────────────────────────

#[async_trait]
impl DocumentStore for DriveClient {
    async fn list_recent(&self, since: DateTime<Utc>) -> Result<Vec<DocHandle>, StoreError> {
        let iso = since.to_rfc3339_opts(SecondsFormat::Secs, true);
        let query = format!(
            "mimeType='application/vnd.google-apps.document' and modifiedTime > '{iso}'"
        );
        let resp = self
            .http
            .get(format!("{}/files", self.files_base))
            .bearer_auth(&self.token)
            .query(&[
                ("q", query.as_str()),
                ("fields", "files(id, name, modifiedTime, sharedWithMeTime)"),
            ])
            .send()
            .await?;
        let list: FileList = self.check(resp).await?.json().await?;
        Ok(list
            .files
            .into_iter()
            .map(|f| DocHandle {
                id: f.id,
                name: f.name,
                modified_time: f.modified_time,
                shared_time: f.shared_with_me_time,
            })
            .collect())
    }

    async fn current_paragraphs(&self, doc_id: &str) -> Result<Vec<String>, StoreError> {
        let resp = self
            .http
            .get(format!("{}/documents/{doc_id}", self.docs_base))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let doc: DocumentBody = self.check(resp).await?.json().await?;

        let mut paragraphs = Vec::new();
        for element in doc.body.content {
            let Some(para) = element.paragraph else {
                continue;
            };
            let text: String = para
                .elements
                .iter()
                .filter_map(|el| el.text_run.as_ref())
                .map(|run| run.content.as_str())
                .collect();
            if text.is_empty() {
                continue;
            }
            // Text runs carry their structural trailing newline; strip it so
            // paragraphs align with revision-text lines.
            paragraphs.push(text.trim_end_matches('\n').to_string());
        }
        Ok(paragraphs)
    }

    async fn revision_text(&self, doc_id: &str, revision_id: &str) -> Result<String, StoreError> {
        let resp = self
            .http
            .get(format!(
                "{}/files/{doc_id}/revisions/{revision_id}",
                self.files_base
            ))
            .bearer_auth(&self.token)
            .query(&[("alt", "media")])
            .send()
            .await?;
        let bytes = self.check(resp).await?.bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|e| StoreError::MalformedRevision {
            revision_id: revision_id.to_string(),
            reason: e.to_string(),
        })
    }

    async fn metadata(
        &self,
        doc_id: &str,
    ) -> Result<(HashMap<String, String>, String), StoreError> {
        let resp = self
            .http
            .get(format!("{}/files/{doc_id}", self.files_base))
            .bearer_auth(&self.token)
            .query(&[("fields", "appProperties, headRevisionId")])
            .send()
            .await?;
        let meta: FileMeta = self.check(resp).await?.json().await?;
        Ok((meta.app_properties, meta.head_revision_id))
    }

    async fn set_metadata(
        &self,
        doc_id: &str,
        properties: HashMap<String, String>,
    ) -> Result<(), StoreError> {
        let resp = self
            .http
            .patch(format!("{}/files/{doc_id}", self.files_base))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "appProperties": properties }))
            .send()
            .await?;
        // Write contention surfaces as a conflict, not a generic API error.
        if matches!(resp.status().as_u16(), 409 | 412) {
            return Err(StoreError::Conflict {
                doc_id: doc_id.to_string(),
            });
        }
        self.check(resp).await?;
        Ok(())
    }

    async fn context(&self, doc_id: &str) -> Result<String, StoreError> {
        let resp = self
            .http
            .get(format!("{}/files/{doc_id}", self.files_base))
            .bearer_auth(&self.token)
            .query(&[("fields", "description")])
            .send()
            .await?;
        let meta: FileMeta = self.check(resp).await?.json().await?;
        Ok(meta.description)
    }
}

// ─── CommentTransport ────────────────────────────────────────────────────────

#[async_trait]
impl CommentTransport for DriveClient {
    async fn create_comment(
        &self,
        doc_id: &str,
        content: &str,
        start_offset: usize,
        end_offset: usize,
        quoted_text: Option<&str>,
    ) -> Result<String, StoreError> {
        let mut body = serde_json::json!({
            "content": content,
            "anchor": format!("{start_offset},{end_offset}"),
        });
        if let Some(quote) = quoted_text {
            body["quotedFileContent"] = serde_json::json!({ "value": quote });
        }
        let resp = self
            .http
            .post(format!("{}/files/{doc_id}/comments", self.files_base))
            .bearer_auth(&self.token)
            .query(&[("fields", "id")])
            .json(&body)
            .send()
            .await?;
        let created: CommentCreated = self.check(resp).await?.json().await?;
        Ok(created.id)
    }

    async fn create_reply(
        &self,
        doc_id: &str,
        comment_id: &str,
        content: &str,
    ) -> Result<(), StoreError> {
        let resp = self
            .http
            .post(format!(
                "{}/files/{doc_id}/comments/{comment_id}/replies",
                self.files_base
            ))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "content": content }))
            .send()
            .await?;
        self.check(resp).await?;
        Ok(())
    }
}
