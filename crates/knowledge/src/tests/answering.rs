//! Question answering through a scripted completion provider.

use super::{Script, ScriptedCompletion, Workspace};
use crate::config::RetrievalConfig;
use crate::service::RetrievalService;
use docqa_core::AppError;
use std::sync::Arc;
use std::time::Duration;

async fn ingest_python_corpus(
    ws: &Workspace,
    completion: Arc<ScriptedCompletion>,
    config: RetrievalConfig,
) -> RetrievalService {
    let python = ws.write("python.txt", "Python is a programming language.");
    let ml = ws.write("ml.txt", "Machine learning is a branch of AI.");
    let service = ws.open_with(config, completion);
    service.ingest_paths(&[python, ml]).await.unwrap();
    service
}

#[tokio::test]
async fn test_answer_carries_ranked_fragments() {
    let ws = Workspace::new();
    let completion = ScriptedCompletion::replying("Python is a programming language.");
    let service = ingest_python_corpus(&ws, completion.clone(), ws.config()).await;

    let answer = service
        .answer_question("What is Python programming?")
        .await
        .unwrap();

    assert_eq!(answer.question, "What is Python programming?");
    assert_eq!(answer.answer, "Python is a programming language.");
    // top_k is 3 but the corpus only has two fragments.
    assert_eq!(answer.fragments.len(), 2);
    assert_eq!(
        answer.fragments[0].fragment.content,
        "Python is a programming language."
    );
    assert!(answer.fragments[0].score > answer.fragments[1].score);
    assert!(answer.elapsed_secs >= 0.0);

    let calls = completion.calls();
    assert_eq!(calls.len(), 1);
    let (context, question) = &calls[0];
    assert_eq!(question, "What is Python programming?");
    assert!(context.starts_with("[python.txt, Page 1] Python is a programming language.\n\n"));
    assert!(context.ends_with("[ml.txt, Page 1] Machine learning is a branch of AI."));
}

#[tokio::test]
async fn test_top_k_limits_context() {
    let ws = Workspace::new();
    let completion = ScriptedCompletion::replying("ok");
    let config = RetrievalConfig {
        top_k: 1,
        ..ws.config()
    };
    let service = ingest_python_corpus(&ws, completion.clone(), config).await;

    let answer = service.answer_question("machine learning").await.unwrap();
    assert_eq!(answer.fragments.len(), 1);
    assert_eq!(answer.fragments[0].fragment.source.as_deref(), Some("ml.txt"));
    assert!(!completion.calls()[0].0.contains("\n\n"));
}

#[tokio::test]
async fn test_completion_failure_is_generation_error() {
    let ws = Workspace::new();
    let completion = ScriptedCompletion::new(Script::Fail("provider unavailable".to_string()));
    let service = ingest_python_corpus(&ws, completion, ws.config()).await;

    let err = service.answer_question("What is Python?").await.unwrap_err();
    match err {
        AppError::Generation(reason) => assert!(reason.contains("provider unavailable")),
        other => panic!("unexpected error {:?}", other),
    }
    assert!(service.is_ready());
    assert_eq!(service.fragment_count(), 2);
}

#[tokio::test]
async fn test_completion_timeout_is_generation_error() {
    let ws = Workspace::new();
    let completion = ScriptedCompletion::new(Script::Stall(Duration::from_secs(10)));
    let config = RetrievalConfig {
        completion_timeout_secs: 1,
        ..ws.config()
    };
    let service = ingest_python_corpus(&ws, completion, config).await;

    let err = service.answer_question("What is Python?").await.unwrap_err();
    assert!(matches!(err, AppError::Generation(_)));
    assert!(service.is_ready());
}

#[tokio::test]
async fn test_unrelated_question_still_uses_top_fragments() {
    let ws = Workspace::new();
    let completion = ScriptedCompletion::replying("I do not have enough information.");
    let service = ingest_python_corpus(&ws, completion.clone(), ws.config()).await;

    let answer = service.answer_question("zebra migration").await.unwrap();
    assert_eq!(answer.fragments.len(), 2);
    assert!(answer.fragments.iter().all(|f| f.score == 0.0));
    assert_eq!(completion.calls().len(), 1);
}

#[tokio::test]
async fn test_relevance_floor_yields_no_relevant_content() {
    let ws = Workspace::new();
    let completion = ScriptedCompletion::replying("unused");
    let config = RetrievalConfig {
        min_score: Some(0.1),
        ..ws.config()
    };
    let service = ingest_python_corpus(&ws, completion.clone(), config).await;

    let err = service.answer_question("zebra migration").await.unwrap_err();
    assert!(matches!(err, AppError::NoRelevantContent));
    assert!(completion.calls().is_empty());

    assert!(service.answer_question("Python programming").await.is_ok());
}

#[tokio::test]
async fn test_blank_question_is_invalid() {
    let ws = Workspace::new();
    let completion = ScriptedCompletion::replying("unused");
    let service = ingest_python_corpus(&ws, completion.clone(), ws.config()).await;

    assert!(matches!(
        service.answer_question("   ").await,
        Err(AppError::InvalidArgument(_))
    ));
    assert!(completion.calls().is_empty());
}
