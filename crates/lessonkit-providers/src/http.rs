//! HTTP submission backend.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use lessonkit_core::grading::ManualGrade;
use lessonkit_core::traits::{ManualGradeSource, SubmissionRecord, SubmissionSink};

use crate::error::SinkError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Posts submission records to a lesson backend and polls it for
/// instructor grades.
///
/// Endpoints, relative to `base_url`:
/// - `POST /exercises/{id}/submissions` with the record as JSON
/// - `GET /exercises/{id}/manual-grade`, where `404` means "not graded yet"
pub struct HttpSink {
    api_token: String,
    base_url: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl HttpSink {
    pub fn new(base_url: &str, api_token: &str, timeout_secs: Option<u64>) -> Self {
        let timeout_secs = timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        Self {
            api_token: api_token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs,
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base_url}/exercises/{id}/{tail}`, with the id encoded as one segment.
    fn exercise_url(&self, exercise_id: &str, tail: &str) -> Result<reqwest::Url, SinkError> {
        let invalid = || SinkError::InvalidUrl(self.base_url.clone());
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(["exercises", exercise_id, tail]);
        Ok(url)
    }

    fn transport_error(&self, e: reqwest::Error) -> SinkError {
        if e.is_timeout() {
            SinkError::Timeout(self.timeout_secs)
        } else {
            SinkError::NetworkError(e.to_string())
        }
    }
}

#[derive(Deserialize)]
struct BackendError {
    error: String,
}

/// Map a non-success status onto a [`SinkError`].
async fn status_error(response: reqwest::Response, exercise_id: &str) -> SinkError {
    let status = response.status().as_u16();
    match status {
        429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5)
                * 1000;
            SinkError::RateLimited {
                retry_after_ms: retry_after,
            }
        }
        401 | 403 => {
            let body = response.text().await.unwrap_or_default();
            SinkError::AuthenticationFailed(body)
        }
        404 => SinkError::ExerciseNotFound(exercise_id.to_string()),
        _ => {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<BackendError>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            SinkError::ApiError { status, message }
        }
    }
}

#[async_trait]
impl SubmissionSink for HttpSink {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, record), fields(exercise = %record.exercise_id, attempt = record.attempt_number))]
    async fn record(&self, record: &SubmissionRecord) -> anyhow::Result<()> {
        let response = self
            .client
            .post(self.exercise_url(&record.exercise_id, "submissions")?)
            .bearer_auth(&self.api_token)
            .json(record)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(status_error(response, &record.exercise_id).await.into());
        }
        tracing::debug!("submission accepted by backend");
        Ok(())
    }
}

#[async_trait]
impl ManualGradeSource for HttpSink {
    #[instrument(skip(self))]
    async fn fetch_manual_grade(&self, exercise_id: &str) -> anyhow::Result<Option<ManualGrade>> {
        let response = self
            .client
            .get(self.exercise_url(exercise_id, "manual-grade")?)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status().as_u16();
        if status == 404 {
            return Ok(None);
        }
        if status >= 400 {
            return Err(status_error(response, exercise_id).await.into());
        }

        let grade: ManualGrade = response.json().await.map_err(|e| SinkError::ApiError {
            status: 0,
            message: format!("failed to parse manual grade: {e}"),
        })?;
        Ok(Some(grade))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lessonkit_core::answer::Answer;
    use lessonkit_core::attempt::SubmitTicket;
    use lessonkit_core::grading::grade;
    use lessonkit_core::model::Exercise;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record() -> SubmissionRecord {
        let exercise = Exercise::from_value(&serde_json::json!({
            "id": "q1", "type": "true_false", "prompt": "Sky is blue?", "correct_answer": true
        }))
        .unwrap();
        let ticket = SubmitTicket {
            exercise_id: "q1".into(),
            generation: 1,
            answer: Answer::Flag(Some(true)),
            attempt_number: 1,
        };
        let graded = grade(&exercise, &ticket.answer).unwrap();
        SubmissionRecord::new(&ticket, &graded)
    }

    #[tokio::test]
    async fn posts_submission_with_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/exercises/q1/submissions"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(serde_json::json!({
                "exercise_id": "q1",
                "score": 1,
                "correct": true,
                "attempt_number": 1
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let sink = HttpSink::new(&server.uri(), "test-token", None);
        sink.record(&record()).await.unwrap();
    }

    #[tokio::test]
    async fn exercise_ids_are_encoded_as_one_segment() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/exercises/unit%201%2Fq%3F2/manual-grade"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let sink = HttpSink::new(&format!("{}/", server.uri()), "t", None);
        assert!(sink.fetch_manual_grade("unit 1/q?2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unusable_base_url_is_permanent() {
        let sink = HttpSink::new("not a url", "t", None);
        let err = sink.record(&record()).await.unwrap_err();
        let sink_err = err.downcast_ref::<SinkError>().unwrap();
        assert!(matches!(sink_err, SinkError::InvalidUrl(_)));
        assert!(sink_err.is_permanent());
    }

    #[tokio::test]
    async fn authentication_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/exercises/q1/submissions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let sink = HttpSink::new(&server.uri(), "bad-token", None);
        let err = sink.record(&record()).await.unwrap_err();
        let sink_err = err.downcast_ref::<SinkError>().unwrap();
        assert!(matches!(sink_err, SinkError::AuthenticationFailed(_)));
        assert!(sink_err.is_permanent());
    }

    #[tokio::test]
    async fn rate_limit_reads_retry_after() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "2"))
            .mount(&server)
            .await;

        let sink = HttpSink::new(&server.uri(), "t", None);
        let err = sink.record(&record()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SinkError>(),
            Some(SinkError::RateLimited {
                retry_after_ms: 2000
            })
        ));
    }

    #[tokio::test]
    async fn server_error_message_is_extracted() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({"error": "database unavailable"})),
            )
            .mount(&server)
            .await;

        let sink = HttpSink::new(&server.uri(), "t", None);
        let err = sink.record(&record()).await.unwrap_err();
        match err.downcast_ref::<SinkError>() {
            Some(SinkError::ApiError { status, message }) => {
                assert_eq!(*status, 500);
                assert_eq!(message, "database unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn manual_grade_found() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/exercises/essay-1/manual-grade"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "score": 8,
                "feedback": "Good structure.",
                "graded_by": "ms-lee"
            })))
            .mount(&server)
            .await;

        let sink = HttpSink::new(&format!("{}/", server.uri()), "t", None);
        let grade = sink.fetch_manual_grade("essay-1").await.unwrap().unwrap();
        assert_eq!(grade.score, 8);
        assert_eq!(grade.feedback.as_deref(), Some("Good structure."));
    }

    #[tokio::test]
    async fn manual_grade_missing_is_none() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/exercises/essay-1/manual-grade"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let sink = HttpSink::new(&server.uri(), "t", None);
        assert!(sink.fetch_manual_grade("essay-1").await.unwrap().is_none());
    }
}
