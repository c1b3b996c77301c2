use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::http::{HttpFailure, RetryPolicy, send_with_retries};

use super::super::episode::EpisodeId;
use super::super::error::RemoteError;
use super::super::thread::CommentId;
use super::{
    CommentPatch, CommentRecord, EpisodeRecord, HistogramRecord, NewCommentRecord, RemoteService,
    VoteCommentRecord, VoteFilter, VoteKey, VotePatch,
};

/// JSON-over-HTTP binding of the comment server.
#[derive(Debug, Clone)]
pub(crate) struct HttpRemote {
    base_url: String,
    policy: RetryPolicy,
}

/// What a request is about, for NotFound reporting.
struct Target<'a> {
    resource: &'static str,
    id: &'a str,
}

impl HttpRemote {
    pub(crate) fn new(base_url: &str) -> Self {
        Self::with_policy(base_url, RetryPolicy::default())
    }

    pub(crate) fn with_policy(base_url: &str, policy: RetryPolicy) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
        }
    }

    fn request(
        &self,
        method: &str,
        path: &str,
        query: &[(String, String)],
        body: Option<String>,
        target: Target<'_>,
    ) -> Result<String, RemoteError> {
        let url = format!("{}{path}", self.base_url);
        let raw = send_with_retries(method, &url, query, body.as_deref(), &self.policy)
            .map_err(|failure| map_failure(failure, target))?;
        if let Some(message) = application_error(&raw) {
            return Err(RemoteError::Application(message));
        }
        Ok(raw)
    }

    fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
        target: Target<'_>,
    ) -> Result<T, RemoteError> {
        let raw = self.request("GET", path, query, None, target)?;
        decode(&raw)
    }

    fn send<B: Serialize>(
        &self,
        method: &str,
        path: &str,
        query: &[(String, String)],
        body: Option<&B>,
        target: Target<'_>,
    ) -> Result<String, RemoteError> {
        let body = body
            .map(serde_json::to_string)
            .transpose()
            .map_err(|err| RemoteError::Decode(format!("failed to encode request: {err}")))?;
        self.request(method, path, query, body, target)
    }
}

impl RemoteService for HttpRemote {
    fn get_episode(&self, id: EpisodeId) -> Result<EpisodeRecord, RemoteError> {
        let id_text = id.to_string();
        self.fetch(
            &format!("/episodes/{id}"),
            &[],
            Target {
                resource: "episode",
                id: &id_text,
            },
        )
    }

    fn list_comments(&self, episode_id: EpisodeId) -> Result<Vec<CommentRecord>, RemoteError> {
        let id_text = episode_id.to_string();
        self.fetch(
            "/comments",
            &[("episodeId".to_string(), id_text.clone())],
            Target {
                resource: "episode",
                id: &id_text,
            },
        )
    }

    fn get_comment(&self, id: CommentId) -> Result<CommentRecord, RemoteError> {
        let id_text = id.to_string();
        self.fetch(
            &format!("/comments/{id}"),
            &[],
            Target {
                resource: "comment",
                id: &id_text,
            },
        )
    }

    fn create_comment(&self, payload: &NewCommentRecord) -> Result<CommentRecord, RemoteError> {
        let raw = self.send(
            "POST",
            "/comments",
            &[],
            Some(payload),
            Target {
                resource: "episode",
                id: &payload.episode_id.to_string(),
            },
        )?;
        decode(&raw)
    }

    fn update_comment(&self, id: CommentId, patch: &CommentPatch) -> Result<(), RemoteError> {
        let id_text = id.to_string();
        self.send(
            "PATCH",
            &format!("/comments/{id}"),
            &[],
            Some(patch),
            Target {
                resource: "comment",
                id: &id_text,
            },
        )
        .map(drop)
    }

    fn delete_comment(&self, id: CommentId) -> Result<(), RemoteError> {
        let id_text = id.to_string();
        self.send::<Value>(
            "DELETE",
            &format!("/comments/{id}"),
            &[],
            None,
            Target {
                resource: "comment",
                id: &id_text,
            },
        )
        .map(drop)
    }

    fn list_votes(&self, filter: &VoteFilter) -> Result<Vec<VoteCommentRecord>, RemoteError> {
        let id_text = filter.episode_id.to_string();
        self.fetch(
            "/votes",
            &[
                ("userId".to_string(), filter.user_id.clone()),
                ("episodeId".to_string(), id_text.clone()),
            ],
            Target {
                resource: "episode",
                id: &id_text,
            },
        )
    }

    fn create_vote(&self, record: &VoteCommentRecord) -> Result<VoteCommentRecord, RemoteError> {
        let raw = self.send(
            "POST",
            "/votes",
            &[],
            Some(record),
            Target {
                resource: "comment",
                id: &record.comment_id.to_string(),
            },
        )?;
        decode(&raw)
    }

    fn update_vote(&self, key: &VoteKey, patch: &VotePatch) -> Result<(), RemoteError> {
        let id_text = key.comment_id.to_string();
        self.send(
            "PATCH",
            &format!("/votes/{}", key.comment_id),
            &[("userId".to_string(), key.user_id.clone())],
            Some(patch),
            Target {
                resource: "vote",
                id: &id_text,
            },
        )
        .map(drop)
    }

    fn delete_vote(&self, key: &VoteKey) -> Result<(), RemoteError> {
        let id_text = key.comment_id.to_string();
        self.send::<Value>(
            "DELETE",
            &format!("/votes/{}", key.comment_id),
            &[("userId".to_string(), key.user_id.clone())],
            None,
            Target {
                resource: "vote",
                id: &id_text,
            },
        )
        .map(drop)
    }

    fn get_histogram(
        &self,
        episode_id: EpisodeId,
        bucket_count: usize,
    ) -> Result<HistogramRecord, RemoteError> {
        let id_text = episode_id.to_string();
        self.fetch(
            &format!("/episodes/{episode_id}/histogram"),
            &[("buckets".to_string(), bucket_count.to_string())],
            Target {
                resource: "episode",
                id: &id_text,
            },
        )
    }
}

fn map_failure(failure: HttpFailure, target: Target<'_>) -> RemoteError {
    match failure {
        HttpFailure::Status { status: 404, .. } => RemoteError::not_found(target.resource, target.id),
        HttpFailure::Status { status, body, .. } => RemoteError::Status {
            status,
            message: application_error(&body).unwrap_or(body),
        },
        failure @ HttpFailure::Transport { .. } => RemoteError::Transport(failure.to_string()),
    }
}

/// Servers report rejected writes as `{"error": "..."}`, sometimes with a 200.
fn application_error(raw: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw).ok()?;
    value.get("error")?.as_str().map(str::to_string)
}

fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, RemoteError> {
    serde_json::from_str(raw).map_err(|err| RemoteError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::http::test_support::{Behavior, TestServer};

    fn remote(server: &TestServer) -> HttpRemote {
        HttpRemote::with_policy(
            &format!("{}/", server.base_url),
            RetryPolicy {
                connect_timeout: Duration::from_millis(200),
                read_timeout: Duration::from_millis(200),
                attempts: 2,
                retry_delay: Duration::from_millis(1),
            },
        )
    }

    #[test]
    fn get_episode_decodes_camel_case_record() {
        let server = TestServer::spawn(vec![Behavior::Respond(
            200,
            r#"{"id":4,"title":"Pilot","audioUrl":"https://cdn.test/4.mp3","duration":600.0}"#
                .to_string(),
        )]);

        let record = remote(&server).get_episode(4).expect("episode decodes");

        assert_eq!(record.title, "Pilot");
        assert_eq!(record.audio_url, "https://cdn.test/4.mp3");
        assert!(server.request_lines()[0].starts_with("GET /episodes/4 "));
    }

    #[test]
    fn missing_resources_map_to_not_found() {
        let server = TestServer::spawn(vec![Behavior::Respond(404, String::new())]);

        let err = remote(&server).get_comment(CommentId(12)).expect_err("404");

        assert_eq!(err, RemoteError::not_found("comment", 12));
    }

    #[test]
    fn application_error_payload_is_surfaced() {
        let server = TestServer::spawn(vec![Behavior::Respond(
            200,
            r#"{"error":"comment is locked"}"#.to_string(),
        )]);

        let err = remote(&server)
            .update_comment(
                CommentId(3),
                &CommentPatch {
                    content: "edit".to_string(),
                },
            )
            .expect_err("application error");

        assert_eq!(err, RemoteError::Application("comment is locked".to_string()));
        assert!(server.request_lines()[0].starts_with("PATCH /comments/3 "));
    }

    #[test]
    fn vote_requests_address_the_user_comment_pair() {
        let server = TestServer::spawn(vec![Behavior::Respond(204, String::new())]);
        let key = VoteKey {
            user_id: "u-7".to_string(),
            comment_id: CommentId(42),
        };

        remote(&server).delete_vote(&key).expect("delete succeeds");

        assert!(server.request_lines()[0].starts_with("DELETE /votes/42?userId=u-7 "));
    }

    #[test]
    fn server_errors_keep_status_and_message() {
        let server = TestServer::spawn(vec![Behavior::Respond(
            400,
            r#"{"error":"content too long"}"#.to_string(),
        )]);

        let err = remote(&server)
            .list_comments(1)
            .expect_err("bad request");

        assert_eq!(
            err,
            RemoteError::Status {
                status: 400,
                message: "content too long".to_string(),
            }
        );
    }

    #[test]
    fn malformed_bodies_are_decode_errors() {
        let server = TestServer::spawn(vec![Behavior::Respond(200, "[1,2".to_string())]);

        let err = remote(&server).get_histogram(1, 100).expect_err("bad json");

        assert!(matches!(err, RemoteError::Decode(_)));
        assert!(server.request_lines()[0].starts_with("GET /episodes/1/histogram?buckets=100 "));
    }
}
