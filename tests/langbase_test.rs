//! Integration tests for Langbase client
//!
//! Tests HTTP client behavior using wiremock for request/response mocking.

use serde_json::json;
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use analogy_engine::config::{LangbaseConfig, RequestConfig};
use analogy_engine::error::LangbaseError;
use analogy_engine::langbase::{LangbaseClient, LlmClient, Message, PipeDefinition, PipeLlm, PipeRequest};

/// Create a test client pointing to mock server
fn create_test_client(base_url: &str, max_retries: u32) -> LangbaseClient {
    let config = LangbaseConfig {
        api_key: "test-api-key".to_string(),
        base_url: base_url.to_string(),
    };

    let request_config = RequestConfig {
        timeout_ms: 5000,
        max_retries,
        retry_delay_ms: 10,
    };

    LangbaseClient::new(&config, request_config).expect("Failed to create client")
}

fn create_test_request(content: &str) -> PipeRequest {
    PipeRequest::agent_turn("analogy-scout-v1", "You are the Scout.", content)
}

#[cfg(test)]
mod pipe_call_tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_pipe_call() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .and(header("Authorization", "Bearer test-api-key"))
            .and(header("Content-Type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "completion": "{\"nodes\": [], \"edges\": []}",
                "raw": {
                    "model": "gpt-4o-mini",
                    "usage": {
                        "prompt_tokens": 100,
                        "completion_tokens": 50,
                        "total_tokens": 150
                    }
                }
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let response = client
            .call_pipe(&create_test_request("Ant colonies forage"))
            .await
            .expect("Pipe call should succeed");

        assert_eq!(response.completion, "{\"nodes\": [], \"edges\": []}");
        assert_eq!(response.total_tokens(), Some(150));
    }

    #[tokio::test]
    async fn test_request_body_carries_both_messages() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .and(body_string_contains("\"name\":\"analogy-scout-v1\""))
            .and(body_string_contains("\"role\":\"system\""))
            .and(body_string_contains("\"role\":\"user\""))
            .and(body_string_contains("\"stream\":false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "completion": "ok"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let result = client.call_pipe(&create_test_request("Test")).await;
        assert!(result.is_ok(), "{:?}", result.err());
    }

    #[tokio::test]
    async fn test_pipe_call_authentication_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Invalid API key"}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let result = client.call_pipe(&create_test_request("Test")).await;

        match result {
            Err(LangbaseError::Unavailable { message, retries }) => {
                assert!(message.contains("401"));
                assert_eq!(retries, 1);
            }
            other => panic!("Expected Unavailable error, got {:?}", other.map(|r| r.completion)),
        }
    }

    #[tokio::test]
    async fn test_handle_malformed_json() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let result = client.call_pipe(&create_test_request("Test")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_handle_missing_completion() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let response = client.call_pipe(&create_test_request("Test")).await.unwrap();
        assert_eq!(response.completion, "");
        assert_eq!(response.total_tokens(), None);
    }
}

#[cfg(test)]
mod timeout_tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_request_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "success": true,
                        "completion": "Delayed response"
                    }))
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&mock_server)
            .await;

        let config = LangbaseConfig {
            api_key: "test-api-key".to_string(),
            base_url: mock_server.uri(),
        };
        let request_config = RequestConfig {
            timeout_ms: 100,
            max_retries: 0,
            retry_delay_ms: 100,
        };
        let client = LangbaseClient::new(&config, request_config).unwrap();

        let result = client.call_pipe(&create_test_request("Test")).await;
        assert!(result.is_err(), "Should timeout");
    }
}

#[cfg(test)]
mod retry_tests {
    use super::*;

    #[tokio::test]
    async fn test_retry_then_success() {
        let mock_server = MockServer::start().await;

        // First call fails, the retry succeeds
        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "completion": "recovered"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 2);
        let response = client.call_pipe(&create_test_request("Test")).await.unwrap();
        assert_eq!(response.completion, "recovered");
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .expect(3)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 2);
        let result = client.call_pipe(&create_test_request("Test")).await;

        assert!(matches!(
            result,
            Err(LangbaseError::Unavailable { retries: 3, .. })
        ));
    }
}

#[cfg(test)]
mod ensure_pipe_tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_pipe_creates_with_prompt() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes"))
            .and(body_string_contains("\"name\":\"analogy-critic-v1\""))
            .and(body_string_contains("\"upsert\":true"))
            .and(body_string_contains("\"json\":true"))
            .and(body_string_contains("You are the Critic."))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "analogy-critic-v1",
                "description": "Critic",
                "status": "private",
                "owner_login": "tester",
                "url": "https://langbase.com/tester/analogy-critic-v1"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let result = client
            .ensure_pipe(&PipeDefinition::for_agent(
                "analogy-critic-v1",
                "Critic",
                "You are the Critic.",
                true,
            ))
            .await;
        assert!(result.is_ok(), "{:?}", result.err());
    }

    #[tokio::test]
    async fn test_ensure_pipe_conflict_is_ok() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes"))
            .respond_with(ResponseTemplate::new(409).set_body_string("exists"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let result = client
            .ensure_pipe(&PipeDefinition::for_agent(
                "analogy-visionary-v1",
                "Visionary",
                "prompt",
                false,
            ))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_pipe_other_error_propagates() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client(&mock_server.uri(), 0);
        let result = client
            .ensure_pipe(&PipeDefinition::for_agent("p", "d", "prompt", true))
            .await;
        assert!(matches!(result, Err(LangbaseError::Api { status: 403, .. })));
    }
}

#[cfg(test)]
mod pipe_llm_tests {
    use super::*;

    #[tokio::test]
    async fn test_pipe_llm_returns_completion() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .and(body_string_contains("analogy-matcher-v1"))
            .and(body_string_contains("Align these graphs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "completion": "{\"score\": 0.7}"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let llm = PipeLlm::new(create_test_client(&mock_server.uri(), 0), "analogy-matcher-v1");
        assert_eq!(llm.pipe_name(), "analogy-matcher-v1");

        let completion = llm
            .invoke("You are the Matcher.", "Align these graphs")
            .await
            .unwrap();
        assert_eq!(completion, "{\"score\": 0.7}");
    }

    #[test]
    fn test_message_roles_serialize_lowercase() {
        let value = serde_json::to_value(Message::system("s")).unwrap();
        assert_eq!(value["role"], "system");
    }
}
