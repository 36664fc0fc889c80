//! Minimal OAuth client for the upstream community API.

use std::time::{Duration, Instant};

use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::{Config, RedditCredentials};
use crate::constants::{MAX_MORE_CHILDREN_REQUESTS, MORE_CHILDREN_BATCH, TOKEN_REFRESH_MARGIN_SECS};
use crate::error::UpstreamError;

/// Authenticated client for listings and comment trees.
#[derive(Debug)]
pub struct RedditClient {
    http: reqwest::Client,
    credentials: RedditCredentials,
    auth_url: String,
    api_url: String,
    token: Mutex<Option<CachedToken>>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
}

impl RedditClient {
    /// Build a client using the upstream settings from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &Config, credentials: RedditCredentials) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .user_agent(config.reddit_user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            credentials,
            auth_url: config.reddit_auth_url.trim_end_matches('/').to_string(),
            api_url: config.reddit_api_url.trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        })
    }

    /// Raw post objects from the community's hot listing.
    ///
    /// # Errors
    ///
    /// Returns an error on auth, rate limit, transport or payload failures.
    pub async fn hot_posts(&self, subreddit: &str, limit: u32) -> Result<Vec<Value>, UpstreamError> {
        let url = format!("{}/r/{subreddit}/hot", self.api_url);
        let listing: Value = self
            .get_json(&url, &[("limit", limit.to_string()), ("raw_json", "1".to_string())])
            .await?;

        let children = listing_children(&listing)
            .ok_or_else(|| UpstreamError::Decode("hot listing has no children".to_string()))?;
        debug!(subreddit, count = children.len(), "Fetched hot listing");
        Ok(children.to_vec())
    }

    /// All comments of a post, flattened depth-first. Comments hidden behind
    /// `more` stubs are fetched afterwards and appended.
    ///
    /// # Errors
    ///
    /// Returns an error on auth, rate limit, transport or payload failures.
    pub async fn comments(&self, post_id: &str) -> Result<Vec<Value>, UpstreamError> {
        let url = format!("{}/comments/{post_id}", self.api_url);
        let payload: Value = self
            .get_json(&url, &[("raw_json", "1".to_string())])
            .await?;

        // [post listing, comment listing]
        let tree = payload
            .get(1)
            .ok_or_else(|| UpstreamError::Decode("comment payload has no comment listing".to_string()))?;

        let mut flat = Vec::new();
        let mut more = Vec::new();
        flatten_comment_tree(tree, &mut flat, &mut more);
        self.expand_more(post_id, more, &mut flat).await?;
        Ok(flat)
    }

    async fn expand_more(
        &self,
        post_id: &str,
        mut pending: Vec<String>,
        out: &mut Vec<Value>,
    ) -> Result<(), UpstreamError> {
        let url = format!("{}/api/morechildren", self.api_url);
        let mut requests = 0;

        while !pending.is_empty() && requests < MAX_MORE_CHILDREN_REQUESTS {
            let take = pending.len().min(MORE_CHILDREN_BATCH);
            let batch: Vec<String> = pending.drain(..take).collect();
            requests += 1;

            let payload: Value = self
                .get_json(
                    &url,
                    &[
                        ("api_type", "json".to_string()),
                        ("link_id", format!("t3_{post_id}")),
                        ("children", batch.join(",")),
                        ("raw_json", "1".to_string()),
                    ],
                )
                .await?;

            let things = payload
                .pointer("/json/data/things")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    UpstreamError::Decode("morechildren response has no things".to_string())
                })?;

            // things come back flat, in thread order
            for thing in things {
                if thing.get("kind").and_then(Value::as_str) == Some("more") {
                    more_ids(thing, &mut pending);
                } else {
                    out.push(thing.clone());
                }
            }
        }

        if !pending.is_empty() {
            warn!(post_id, remaining = pending.len(), "Left comments unexpanded");
        }
        Ok(())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, UpstreamError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            // Token revoked early; fetch a fresh one next time.
            self.token.lock().await.take();
        }

        let response = check_status(response)?;
        response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }

    async fn access_token(&self) -> Result<String, UpstreamError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let form: Vec<(&str, &str)> = match self.credentials.refresh_token.as_deref() {
            Some(refresh) => vec![("grant_type", "refresh_token"), ("refresh_token", refresh)],
            None => vec![("grant_type", "client_credentials")],
        };

        let response = self
            .http
            .post(format!("{}/api/v1/access_token", self.auth_url))
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&form)
            .send()
            .await?;

        let body: TokenResponse = check_status(response)?
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))?;

        if let Some(error) = body.error {
            return Err(UpstreamError::Auth(error));
        }
        let value = body
            .access_token
            .ok_or_else(|| UpstreamError::Auth("token response has no access_token".to_string()))?;

        let lifetime = body
            .expires_in
            .unwrap_or(3600)
            .saturating_sub(TOKEN_REFRESH_MARGIN_SECS);
        debug!(lifetime_secs = lifetime, "Obtained upstream access token");

        *cached = Some(CachedToken {
            value: value.clone(),
            refresh_at: Instant::now() + Duration::from_secs(lifetime),
        });
        Ok(value)
    }
}

fn check_status(response: Response) -> Result<Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(UpstreamError::Auth(format!("upstream returned {status}")))
        }
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(UpstreamError::RateLimited { retry_after })
        }
        _ => Err(UpstreamError::Status(status.as_u16())),
    }
}

fn listing_children(listing: &Value) -> Option<&Vec<Value>> {
    listing.get("data")?.get("children")?.as_array()
}

/// Pre-order walk of a comment listing. Ids behind `more` stubs go to `more`.
pub fn flatten_comment_tree(listing: &Value, out: &mut Vec<Value>, more: &mut Vec<String>) {
    let Some(children) = listing_children(listing) else {
        return;
    };
    for child in children {
        if child.get("kind").and_then(Value::as_str) == Some("more") {
            more_ids(child, more);
            continue;
        }
        out.push(child.clone());
        // `replies` is "" for leaf comments
        if let Some(replies) = child.get("data").and_then(|d| d.get("replies")) {
            flatten_comment_tree(replies, out, more);
        }
    }
}

/// Comment ids listed by a `more` stub. "Continue this thread" stubs list none.
fn more_ids(stub: &Value, out: &mut Vec<String>) {
    let Some(children) = stub.pointer("/data/children").and_then(Value::as_array) else {
        return;
    };
    out.extend(
        children
            .iter()
            .filter_map(Value::as_str)
            .filter(|id| !id.is_empty() && *id != "_")
            .map(str::to_string),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn comment(id: &str, replies: Value) -> Value {
        json!({"kind": "t1", "data": {"id": id, "body": id, "replies": replies}})
    }

    #[test]
    fn test_flatten_is_preorder_and_collects_more() {
        let tree = json!({
            "kind": "Listing",
            "data": {"children": [
                comment("a", json!({"kind": "Listing", "data": {"children": [
                    comment("a1", json!("")),
                    {"kind": "more", "data": {"children": ["x", "y"]}},
                    comment("a2", json!({"kind": "Listing", "data": {"children": [comment("a2i", json!(""))]}}))
                ]}})),
                comment("b", json!("")),
                {"kind": "more", "data": {"id": "_", "children": []}}
            ]}
        });
        let mut flat = Vec::new();
        let mut more = Vec::new();
        flatten_comment_tree(&tree, &mut flat, &mut more);
        let ids: Vec<_> = flat
            .iter()
            .map(|c| c["data"]["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["a", "a1", "a2", "a2i", "b"]);
        assert_eq!(more, ["x", "y"]);
    }
}
