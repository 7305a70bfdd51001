use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use futures_util::StreamExt;
use genbridge::config::{CustomBackendConfig, FallbackMode, FeaturesConfig, HttpConfig};
use genbridge::error::{AdapterError, FailureCause};
use genbridge::protocol::gemini::{
    Content, CountTokensRequest, EmbedContentRequest, FinishReason, FunctionCall,
    FunctionDeclaration, FunctionResponse, GenerateContentRequest, GenerateContentResponse, Part,
    Role, Tool,
};
use genbridge::{ContentGenerator, CustomApiGenerator};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

type Responder = Arc<dyn Fn(usize, &Value) -> (StatusCode, &'static str, String) + Send + Sync>;

#[derive(Clone, Default)]
struct Recorded {
    hits: Arc<AtomicUsize>,
    bodies: Arc<Mutex<Vec<Value>>>,
    headers: Arc<Mutex<Vec<HeaderMap>>>,
}

impl Recorded {
    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn body(&self, index: usize) -> Value {
        self.bodies.lock().expect("lock bodies")[index].clone()
    }

    fn header(&self, index: usize, name: &str) -> Option<String> {
        self.headers.lock().expect("lock headers")[index]
            .get(name)
            .map(|v| v.to_str().expect("ascii header").to_string())
    }
}

async fn spawn_upstream(respond: Responder) -> (String, Recorded, JoinHandle<()>) {
    let recorded = Recorded::default();
    let state = recorded.clone();
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move |headers: HeaderMap, body: bytes::Bytes| {
            let state = state.clone();
            let respond = Arc::clone(&respond);
            async move {
                let attempt = state.hits.fetch_add(1, Ordering::SeqCst);
                let payload: Value = serde_json::from_slice(&body).expect("request json");
                state.bodies.lock().expect("lock bodies").push(payload.clone());
                state.headers.lock().expect("lock headers").push(headers);
                let (status, content_type, body) = respond(attempt, &payload);
                (status, [(header::CONTENT_TYPE, content_type)], body)
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock upstream");
    let addr = listener.local_addr().expect("local addr");
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (
        format!("http://{addr}/v1/chat/completions"),
        recorded,
        server,
    )
}

fn completion(content: &str) -> String {
    json!({
        "id": "chatcmpl_mock",
        "object": "chat.completion",
        "model": "mock",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
    })
    .to_string()
}

fn sse(chunks: &[Value]) -> String {
    let mut body: String = chunks.iter().map(|c| format!("data: {c}\n\n")).collect();
    body.push_str("data: [DONE]\n\n");
    body
}

fn delta(content: &str) -> Value {
    json!({"choices": [{"index": 0, "delta": {"content": content}}]})
}

fn generator_with(backend: CustomBackendConfig, http: HttpConfig) -> CustomApiGenerator {
    CustomApiGenerator::new(backend, http, &FeaturesConfig::default()).expect("generator")
}

fn generator(endpoint: &str) -> CustomApiGenerator {
    generator_with(CustomBackendConfig::new(endpoint), HttpConfig::default())
}

fn weather_request() -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content::user_text("What's the weather in Paris?")],
        tools: Some(vec![Tool {
            function_declarations: vec![FunctionDeclaration {
                name: "get_weather".into(),
                description: Some("Get weather for a city".into()),
                parameters: Some(json!({
                    "type": "object",
                    "properties": {"city": {"type": "string"}},
                    "required": ["city"]
                })),
            }],
        }]),
        ..GenerateContentRequest::default()
    }
}

fn tool_rejection(_attempt: usize, payload: &Value) -> (StatusCode, &'static str, String) {
    if payload.get("tools").is_some() {
        (
            StatusCode::BAD_REQUEST,
            "application/json",
            r#"{"error":{"message":"function call schema invalid"}}"#.to_string(),
        )
    } else {
        (
            StatusCode::OK,
            "application/json",
            completion(r#"{"tool_name":"get_weather","parameters":{"city":"Paris"}}"#),
        )
    }
}

#[tokio::test]
async fn test_text_round_trip_without_api_key() {
    let (endpoint, recorded, server) = spawn_upstream(Arc::new(|_, payload: &Value| {
        let echoed = payload["messages"][0]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        (StatusCode::OK, "application/json", completion(&echoed))
    }))
    .await;

    let request = GenerateContentRequest::from_contents(vec![Content::user_text("ping pong")]);
    let response = generator(&endpoint)
        .generate_content(&request)
        .await
        .expect("generate");

    assert_eq!(response.text(), "ping pong");
    assert_eq!(response.finish_reason(), Some(FinishReason::Stop));
    assert_eq!(
        response.usage_metadata.and_then(|u| u.total_token_count),
        Some(7)
    );
    assert_eq!(recorded.hits(), 1);
    let body = recorded.body(0);
    assert_eq!(body["model"], "gpt-3.5-turbo");
    assert_eq!(body["stream"], false);
    assert_eq!(body["messages"][0]["role"], "user");
    assert!(body.get("tools").is_none());
    assert_eq!(recorded.header(0, "authorization"), None);
    assert_eq!(
        recorded.header(0, "content-type").as_deref(),
        Some("application/json")
    );

    server.abort();
}

#[tokio::test]
async fn test_api_key_model_and_default_headers_are_sent() {
    let (endpoint, recorded, server) = spawn_upstream(Arc::new(|_, _: &Value| {
        (StatusCode::OK, "application/json", completion("ok"))
    }))
    .await;

    let mut backend = CustomBackendConfig::new(endpoint);
    backend.api_key = Some("sk-test".into());
    backend.model = Some("local-llama".into());
    let mut http = HttpConfig::default();
    http.default_headers
        .insert("X-Client".into(), "agent-cli".into());

    let request = GenerateContentRequest::from_contents(vec![Content::user_text("hi")]);
    generator_with(backend, http)
        .generate_content(&request)
        .await
        .expect("generate");

    assert_eq!(
        recorded.header(0, "authorization").as_deref(),
        Some("Bearer sk-test")
    );
    assert_eq!(recorded.header(0, "x-client").as_deref(), Some("agent-cli"));
    assert_eq!(recorded.body(0)["model"], "local-llama");

    server.abort();
}

#[tokio::test]
async fn test_tool_failure_retries_once_without_tools() {
    let (endpoint, recorded, server) = spawn_upstream(Arc::new(tool_rejection)).await;

    let response = generator(&endpoint)
        .generate_content(&weather_request())
        .await
        .expect("generate after fallback");

    assert_eq!(recorded.hits(), 2);
    assert!(recorded.body(0).get("tools").is_some());
    let retried = recorded.body(1);
    assert!(retried.get("tools").is_none());
    assert_eq!(retried["messages"][0]["role"], "system");
    assert!(retried["messages"][0]["content"]
        .as_str()
        .expect("system text")
        .contains("get_weather"));

    let calls = response.function_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name, "get_weather");
    assert_eq!(calls[0].args, json!({"city": "Paris"}));

    server.abort();
}

#[tokio::test]
async fn test_second_tool_failure_propagates_without_third_attempt() {
    let (endpoint, recorded, server) = spawn_upstream(Arc::new(|_, _: &Value| {
        (
            StatusCode::BAD_REQUEST,
            "application/json",
            "function call schema invalid".to_string(),
        )
    }))
    .await;

    let err = generator(&endpoint)
        .generate_content(&weather_request())
        .await
        .expect_err("both attempts fail");

    assert_eq!(recorded.hits(), 2);
    match &err {
        AdapterError::Upstream { status, body, .. } => {
            assert_eq!(*status, 400);
            assert_eq!(body, "function call schema invalid");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.failure_cause(), FailureCause::ToolIncompatible);

    server.abort();
}

#[tokio::test]
async fn test_non_tool_failure_is_not_retried() {
    let (endpoint, recorded, server) = spawn_upstream(Arc::new(|_, _: &Value| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "text/plain",
            "overloaded".to_string(),
        )
    }))
    .await;

    let err = generator(&endpoint)
        .generate_content(&weather_request())
        .await
        .expect_err("upstream failure");

    assert_eq!(recorded.hits(), 1);
    assert_eq!(err.failure_cause(), FailureCause::ServerError);
    assert_eq!(
        err.to_string(),
        "Custom API request failed: 503 Service Unavailable - overloaded"
    );

    server.abort();
}

#[tokio::test]
async fn test_no_retry_when_tools_known_unsupported_or_fallback_disabled() {
    let (endpoint, recorded, server) = spawn_upstream(Arc::new(|_, _: &Value| {
        (
            StatusCode::BAD_REQUEST,
            "text/plain",
            "tool schema rejected".to_string(),
        )
    }))
    .await;

    let mut unsupported = CustomBackendConfig::new(endpoint.clone());
    unsupported.supports_tools = Some(false);
    let err = generator_with(unsupported, HttpConfig::default())
        .generate_content(&weather_request())
        .await
        .expect_err("fails");
    assert!(matches!(err, AdapterError::Upstream { status: 400, .. }));
    assert_eq!(recorded.hits(), 1);
    assert!(recorded.body(0).get("tools").is_none());

    let mut disabled = CustomBackendConfig::new(endpoint);
    disabled.fallback_mode = FallbackMode::Disabled;
    generator_with(disabled, HttpConfig::default())
        .generate_content(&weather_request())
        .await
        .expect_err("fails");
    assert_eq!(recorded.hits(), 2);
    assert!(recorded.body(1).get("tools").is_some());

    server.abort();
}

#[tokio::test]
async fn test_zero_fallback_budget_disables_retry() {
    let (endpoint, recorded, server) = spawn_upstream(Arc::new(tool_rejection)).await;

    let features = FeaturesConfig {
        max_fallback_attempts: 0,
        ..FeaturesConfig::default()
    };
    let generator =
        CustomApiGenerator::new(CustomBackendConfig::new(endpoint), HttpConfig::default(), &features)
            .expect("generator");
    generator
        .generate_content(&weather_request())
        .await
        .expect_err("no fallback allowed");
    assert_eq!(recorded.hits(), 1);

    server.abort();
}

#[tokio::test]
async fn test_tool_response_only_request_makes_no_call() {
    let (endpoint, recorded, server) = spawn_upstream(Arc::new(|_, _: &Value| {
        (StatusCode::OK, "application/json", completion("unused"))
    }))
    .await;

    let request = GenerateContentRequest::from_contents(vec![Content::new(
        Role::User,
        vec![Part::FunctionResponse(FunctionResponse {
            id: None,
            name: "search".into(),
            response: json!({"output": "3 results"}),
        })],
    )]);
    let generator = generator(&endpoint);

    let response = generator.generate_content(&request).await.expect("summary");
    assert_eq!(
        response.text(),
        "Tool search executed successfully. Result: 3 results."
    );
    assert_eq!(response.finish_reason(), Some(FinishReason::Stop));

    let streamed: Vec<GenerateContentResponse> = generator
        .generate_content_stream(&request)
        .await
        .expect("stream")
        .map(|item| item.expect("item"))
        .collect()
        .await;
    assert_eq!(streamed.len(), 1);
    assert_eq!(streamed[0].text(), response.text());

    assert_eq!(recorded.hits(), 0);
    server.abort();
}

#[tokio::test]
async fn test_tool_call_ids_correlate_across_turns() {
    let (endpoint, recorded, server) = spawn_upstream(Arc::new(|_, _: &Value| {
        (StatusCode::OK, "application/json", completion("It is sunny."))
    }))
    .await;

    let mut request = weather_request();
    request.contents.push(Content::new(
        Role::Model,
        vec![Part::FunctionCall(FunctionCall {
            id: None,
            name: "get_weather".into(),
            args: json!({"city": "Paris"}),
        })],
    ));
    request.contents.push(Content::new(
        Role::User,
        vec![Part::FunctionResponse(FunctionResponse {
            id: None,
            name: "get_weather".into(),
            response: json!({"output": "sunny"}),
        })],
    ));

    let response = generator(&endpoint)
        .generate_content(&request)
        .await
        .expect("generate");
    assert_eq!(response.text(), "It is sunny.");

    let body = recorded.body(0);
    let messages = body["messages"].as_array().expect("messages");
    assert_eq!(messages.len(), 3);
    let call_id = messages[1]["tool_calls"][0]["id"].as_str().expect("call id");
    assert_eq!(messages[2]["role"], "tool");
    assert_eq!(messages[2]["tool_call_id"], call_id);
    assert_eq!(messages[2]["content"], "sunny");

    server.abort();
}

#[tokio::test]
async fn test_stream_yields_one_response_per_chunk() {
    let tokens = ["The ", "quick ", "brown ", "fox"];
    let chunks: Vec<Value> = tokens.iter().map(|t| delta(t)).collect();
    let body = sse(&chunks);
    let (endpoint, recorded, server) = spawn_upstream(Arc::new(move |_, _: &Value| {
        (StatusCode::OK, "text/event-stream", body.clone())
    }))
    .await;

    let request = GenerateContentRequest::from_contents(vec![Content::user_text("go")]);
    let responses: Vec<GenerateContentResponse> = generator(&endpoint)
        .generate_content_stream(&request)
        .await
        .expect("stream")
        .map(|item| item.expect("item"))
        .collect()
        .await;

    assert_eq!(responses.len(), tokens.len());
    let text: String = responses.iter().map(GenerateContentResponse::text).collect();
    assert_eq!(text, tokens.concat());
    assert_eq!(recorded.body(0)["stream"], true);
    assert_eq!(
        recorded.header(0, "accept").as_deref(),
        Some("text/event-stream")
    );

    server.abort();
}

#[tokio::test]
async fn test_stream_text_invocation_appends_function_call_chunk() {
    let body = sse(&[
        delta("{\"tool_name\": \"get_weather\", "),
        delta("\"parameters\": {\"city\": \"Paris\"}}"),
        json!({"choices": [{"index": 0, "delta": {}, "finish_reason": "stop"}]}),
    ]);
    let (endpoint, _recorded, server) = spawn_upstream(Arc::new(move |_, _: &Value| {
        (StatusCode::OK, "text/event-stream", body.clone())
    }))
    .await;

    let responses: Vec<GenerateContentResponse> = generator(&endpoint)
        .generate_content_stream(&weather_request())
        .await
        .expect("stream")
        .map(|item| item.expect("item"))
        .collect()
        .await;

    assert_eq!(responses.len(), 4);
    assert!(responses[..3].iter().all(|r| r.function_calls().is_empty()));
    let last = &responses[3];
    let calls = last.function_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name, "get_weather");
    assert_eq!(calls[0].args, json!({"city": "Paris"}));
    assert_eq!(last.finish_reason(), Some(FinishReason::Stop));

    server.abort();
}

#[tokio::test]
async fn test_stream_skips_malformed_lines_and_stops_at_done() {
    let body = format!(
        "data: {}\n\ndata: {{broken\n\n: comment\n\ndata: {}\n\ndata: [DONE]\n\ndata: {}\n\n",
        delta("a"),
        delta("b"),
        delta("never")
    );
    let (endpoint, _recorded, server) = spawn_upstream(Arc::new(move |_, _: &Value| {
        (StatusCode::OK, "text/event-stream", body.clone())
    }))
    .await;

    let request = GenerateContentRequest::from_contents(vec![Content::user_text("go")]);
    let responses: Vec<GenerateContentResponse> = generator(&endpoint)
        .generate_content_stream(&request)
        .await
        .expect("stream")
        .map(|item| item.expect("item"))
        .collect()
        .await;

    let texts: Vec<String> = responses.iter().map(GenerateContentResponse::text).collect();
    assert_eq!(texts, vec!["a".to_string(), "b".to_string()]);

    server.abort();
}

#[tokio::test]
async fn test_stream_request_failure_surfaces_before_streaming() {
    let (endpoint, recorded, server) = spawn_upstream(Arc::new(|_, _: &Value| {
        (StatusCode::UNAUTHORIZED, "text/plain", "bad key".to_string())
    }))
    .await;

    let request = GenerateContentRequest::from_contents(vec![Content::user_text("go")]);
    let err = match generator(&endpoint).generate_content_stream(&request).await {
        Ok(_) => panic!("expected failure"),
        Err(err) => err,
    };
    assert_eq!(err.failure_cause(), FailureCause::Authentication);
    assert_eq!(recorded.hits(), 1);

    server.abort();
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let request = GenerateContentRequest::from_contents(vec![Content::user_text("go")]);
    let err = generator(&format!("http://{addr}/v1/chat/completions"))
        .generate_content(&request)
        .await
        .expect_err("connection refused");
    assert!(matches!(err, AdapterError::Transport(_)));
    assert_eq!(err.failure_cause(), FailureCause::Network);
}

#[tokio::test]
async fn test_count_tokens_estimates_from_serialized_length() {
    let generator = generator("http://127.0.0.1:9/v1/chat/completions");
    let with_text = |text: String| CountTokensRequest {
        model: None,
        contents: vec![Content::user_text(text)],
    };
    let overhead = serde_json::to_string(&with_text(String::new()))
        .expect("serialize")
        .len();
    let request = with_text("a".repeat(400 - overhead));
    assert_eq!(serde_json::to_string(&request).expect("serialize").len(), 400);

    let counted = generator.count_tokens(&request).await.expect("count");
    assert_eq!(counted.total_tokens, 100);
}

#[tokio::test]
async fn test_embed_content_is_always_unsupported() {
    let generator = generator("http://127.0.0.1:9/v1/chat/completions");
    for request in [
        EmbedContentRequest::default(),
        EmbedContentRequest {
            model: Some("text-embedding-3-small".into()),
            contents: vec![Content::user_text("embed me")],
        },
    ] {
        let err = generator
            .embed_content(&request)
            .await
            .expect_err("unsupported");
        assert!(err.is_unsupported());
    }
}
