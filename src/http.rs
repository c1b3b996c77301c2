use std::fmt;
use std::thread;
use std::time::Duration;

use log::debug;

const ERROR_BODY_PREVIEW_CHARS: usize = 240;

#[derive(Debug, Clone)]
pub(crate) struct RetryPolicy {
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) attempts: usize,
    pub(crate) retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            read_timeout: Duration::from_secs(6),
            attempts: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HttpFailure {
    Status {
        status: u16,
        body: String,
        attempts: usize,
    },
    Transport {
        message: String,
        attempts: usize,
    },
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status {
                status,
                body,
                attempts,
            } => {
                write!(f, "request failed")?;
                if *attempts > 1 {
                    write!(f, " after {attempts} attempt(s)")?;
                }
                if body.is_empty() {
                    write!(f, ": HTTP status {status}")
                } else {
                    write!(f, ": HTTP status {status} ({body})")
                }
            }
            Self::Transport { message, attempts } => write!(
                f,
                "request failed after {attempts} attempt(s): transport error: {message}"
            ),
        }
    }
}

fn should_retry_http_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..=599).contains(&status)
}

// Creates are never replayed; a lost response could otherwise duplicate them.
fn is_idempotent(method: &str) -> bool {
    matches!(method, "GET" | "HEAD" | "PUT" | "DELETE")
}

pub(crate) fn send_with_retries(
    method: &str,
    url: &str,
    query: &[(String, String)],
    body: Option<&str>,
    policy: &RetryPolicy,
) -> Result<String, HttpFailure> {
    let attempts = if is_idempotent(method) {
        policy.attempts.max(1)
    } else {
        1
    };

    let agent = ureq::AgentBuilder::new()
        .timeout_connect(policy.connect_timeout)
        .timeout_read(policy.read_timeout)
        .timeout_write(policy.read_timeout)
        .build();

    let mut last_failure = None;
    for attempt in 1..=attempts {
        let mut request = agent.request(method, url).set("Accept", "application/json");
        for (key, value) in query {
            request = request.query(key, value);
        }
        let outcome = match body {
            Some(body) => request
                .set("Content-Type", "application/json")
                .send_string(body),
            None => request.call(),
        };

        match outcome {
            Ok(response) => {
                return response.into_string().map_err(|err| HttpFailure::Transport {
                    message: format!("response decode failed: {err}"),
                    attempts: attempt,
                });
            }
            Err(ureq::Error::Status(status, response)) => {
                let response_body = response.into_string().ok().unwrap_or_default();
                let preview = response_body
                    .trim()
                    .chars()
                    .take(ERROR_BODY_PREVIEW_CHARS)
                    .collect::<String>();
                let failure = HttpFailure::Status {
                    status,
                    body: preview,
                    attempts: attempt,
                };
                if !should_retry_http_status(status) {
                    return Err(failure);
                }
                debug!("{method} {url} attempt {attempt}/{attempts}: HTTP status {status}");
                last_failure = Some(failure);
            }
            Err(ureq::Error::Transport(err)) => {
                debug!("{method} {url} attempt {attempt}/{attempts}: transport error: {err}");
                last_failure = Some(HttpFailure::Transport {
                    message: err.to_string(),
                    attempts: attempt,
                });
            }
        }

        if attempt < attempts {
            thread::sleep(policy.retry_delay);
        }
    }

    Err(last_failure.unwrap_or_else(|| HttpFailure::Transport {
        message: "exhausted attempts without a concrete error".to_string(),
        attempts,
    }))
}
