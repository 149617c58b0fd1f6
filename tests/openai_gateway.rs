use std::time::Duration;

use mockito::Matcher;
use quizwright::error::GatewayError;
use quizwright::generation::{GenerationParams, OpenAiGenerator, OpenAiSettings, QuestionGenerator};
use serde_json::json;
use url::Url;

const PATH: &str = "/v1/chat/completions";

fn generator(server: &mockito::Server) -> OpenAiGenerator {
    let settings = OpenAiSettings {
        endpoint: Url::parse(&format!("{}{PATH}", server.url())).unwrap(),
        timeout: Duration::from_secs(5),
        ..OpenAiSettings::new(Some("sk-test".into()))
    };
    OpenAiGenerator::new(settings).unwrap()
}

fn params() -> GenerationParams {
    GenerationParams {
        content_text: "The Nile is the longest river in Africa.".into(),
        question_count: 3,
        ..GenerationParams::default()
    }
}

fn completion(content: &str) -> String {
    json!({
        "id": "chatcmpl-1",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    })
    .to_string()
}

#[tokio::test]
async fn returns_parsed_questions() {
    let mut server = mockito::Server::new_async().await;
    let questions = json!({
        "questions": [
            {
                "text": "Which river is the longest in Africa?",
                "options": ["Nile", "Congo"],
                "correct_answer": "Nile",
                "note": "The Nile is about 6,650 km long."
            },
            { "text": "The Nile flows into the Mediterranean.", "options": ["true", "false"], "correct_answer": "true" }
        ]
    })
    .to_string();
    let mock = server
        .mock("POST", PATH)
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4-turbo-2024-04-09",
            "max_tokens": 1150,
            "response_format": { "type": "json_object" }
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion(&format!("```json\n{questions}\n```")))
        .create_async()
        .await;

    let questions = generator(&server).generate(&params()).await.unwrap();

    mock.assert_async().await;
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0].correct_answer.as_deref(), Some("Nile"));
    assert_eq!(questions[1].note, None);
}

#[tokio::test]
async fn surfaces_the_api_error_message() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PATH)
        .with_status(429)
        .with_header("content-type", "application/json")
        .with_body(json!({ "error": { "message": "Rate limit reached" } }).to_string())
        .create_async()
        .await;

    let err = generator(&server).generate(&params()).await.unwrap_err();

    assert!(matches!(
        err,
        GatewayError::Api { status: 429, ref message } if message == "Rate limit reached"
    ));
}

#[tokio::test]
async fn falls_back_to_the_status_when_the_error_body_is_unreadable() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PATH)
        .with_status(502)
        .with_body("<html>Bad gateway</html>")
        .create_async()
        .await;

    let err = generator(&server).generate(&params()).await.unwrap_err();

    assert!(matches!(err, GatewayError::Api { status: 502, .. }));
    assert!(err.to_string().contains("502"));
}

#[tokio::test]
async fn rejects_completions_without_questions() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PATH)
        .with_status(200)
        .with_body(completion("I could not write questions for this text."))
        .create_async()
        .await;

    assert!(matches!(
        generator(&server).generate(&params()).await,
        Err(GatewayError::MalformedJson(_))
    ));
}

#[tokio::test]
async fn empty_completion_is_an_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PATH)
        .with_status(200)
        .with_body(json!({ "choices": [] }).to_string())
        .create_async()
        .await;

    assert!(matches!(
        generator(&server).generate(&params()).await,
        Err(GatewayError::EmptyCompletion)
    ));
}

#[tokio::test]
async fn missing_key_never_reaches_the_network() {
    let mut server = mockito::Server::new_async().await;
    let mock = server.mock("POST", PATH).expect(0).create_async().await;
    let settings = OpenAiSettings {
        endpoint: Url::parse(&format!("{}{PATH}", server.url())).unwrap(),
        ..OpenAiSettings::new(None)
    };

    let err = OpenAiGenerator::new(settings)
        .unwrap()
        .generate(&params())
        .await
        .unwrap_err();

    assert!(matches!(err, GatewayError::MissingCredential("OPENAI_API_KEY")));
    mock.assert_async().await;
}
