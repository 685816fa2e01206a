mod common;

use common::{MockUpstream, control_plane, dead_api_base, ollama_config, quick_supervisor};
use futures::StreamExt;
use local_llm_backend::config::{BackendConfiguration, MemoryConfigStore, ProviderConfig};
use local_llm_backend::control::ErrorKind;
use local_llm_backend::llm::{GenerationChunk, GenerationRequest, LLMError};
use std::sync::Arc;

#[tokio::test]
async fn test_update_then_generate_returns_upstream_reply() {
    let upstream = MockUpstream::start("Hello from the mock").await;
    let service = control_plane(Arc::new(MemoryConfigStore::new()), quick_supervisor(None)).await;

    service.update_config(upstream.config()).await.unwrap();

    let chunk = service
        .generate(GenerationRequest::new("llama2", "hi"))
        .await
        .unwrap();
    assert_eq!(chunk.delta_content, "Hello from the mock");
    assert_eq!(chunk.model, "llama2");
    assert!(chunk.is_final);
}

#[tokio::test]
async fn test_streaming_skips_noise_and_joins_split_frames() {
    let upstream = MockUpstream::start("unused").await;
    let service = control_plane(
        Arc::new(MemoryConfigStore::with_config(upstream.config())),
        quick_supervisor(None),
    )
    .await;

    let chunks: Vec<GenerationChunk> = service
        .generate_stream(GenerationRequest::new("", "hi").streaming(true))
        .await
        .unwrap()
        .map(|chunk| chunk.unwrap())
        .collect()
        .await;

    let contents: Vec<&str> = chunks.iter().map(|c| c.delta_content.as_str()).collect();
    assert_eq!(contents, vec!["Hel", "lo", "!"]);
    assert!(!chunks[0].is_final);
    assert!(chunks[2].is_final);
}

#[tokio::test]
async fn test_streaming_and_aggregated_agree_on_first_chunk() {
    let upstream = MockUpstream::start("unused").await;
    let service = control_plane(
        Arc::new(MemoryConfigStore::with_config(upstream.config())),
        quick_supervisor(None),
    )
    .await;

    // Aggregating a streamed upstream keeps only its first chunk.
    let first = service
        .generate(GenerationRequest::new("llama2", "hi").streaming(true))
        .await
        .unwrap();
    assert_eq!(first.delta_content, "Hel");
}

#[tokio::test]
async fn test_model_catalog_and_pull_pass_through() {
    let upstream = MockUpstream::start("unused").await;
    let service = control_plane(
        Arc::new(MemoryConfigStore::with_config(upstream.config())),
        quick_supervisor(None),
    )
    .await;

    let models = service.list_models().await.unwrap();
    assert_eq!(models["models"][0]["name"], "llama2:latest");

    let progress: Vec<serde_json::Value> = service
        .pull_model("llama2")
        .await
        .unwrap()
        .map(|p| p.unwrap())
        .collect()
        .await;
    let statuses: Vec<&str> = progress
        .iter()
        .map(|p| p["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["pulling manifest", "downloading", "success"]);
}

#[tokio::test]
async fn test_unreachable_upstream_is_distinct_from_empty() {
    let service = control_plane(
        Arc::new(MemoryConfigStore::with_config(ollama_config(
            &dead_api_base().await,
            "llama2",
        ))),
        quick_supervisor(None),
    )
    .await;

    let err = service
        .generate(GenerationRequest::new("llama2", "hi"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamUnreachable);
    assert!(err.is_retryable());

    let Err(err) = service
        .generate_stream(GenerationRequest::new("llama2", "hi").streaming(true))
        .await
    else {
        panic!("stream opened against a dead upstream");
    };
    assert_eq!(err.kind(), ErrorKind::UpstreamUnreachable);
}

#[tokio::test]
async fn test_non_success_status_is_unreachable() {
    let upstream = MockUpstream::start("unused").await;
    let service = control_plane(
        Arc::new(MemoryConfigStore::with_config(ollama_config(
            &upstream.broken_api_base(),
            "llama2",
        ))),
        quick_supervisor(None),
    )
    .await;

    let err = service
        .generate(GenerationRequest::new("llama2", "hi"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamUnreachable);
}

#[tokio::test]
async fn test_unknown_discriminator_keeps_previous_provider() {
    let upstream = MockUpstream::start("still here").await;
    let service = control_plane(
        Arc::new(MemoryConfigStore::with_config(upstream.config())),
        quick_supervisor(None),
    )
    .await;

    let parsed = BackendConfiguration::from_json(
        r#"{"llm": {"provider": "acme", "api_base": "http://acme", "default_model": "x"}}"#,
    );
    assert!(parsed.is_err());

    let chunk = service
        .generate(GenerationRequest::new("llama2", "hi"))
        .await
        .unwrap();
    assert_eq!(chunk.delta_content, "still here");
    assert_eq!(service.get_config().await, upstream.config());
}

#[tokio::test]
async fn test_concurrent_updates_never_expose_mismatched_pair() {
    let upstream_a = MockUpstream::start("from-a").await;
    let upstream_b = MockUpstream::start("from-b").await;
    let config_a = upstream_a.config();
    let config_b = ollama_config(&upstream_b.api_base(), "mistral");

    let service = control_plane(
        Arc::new(MemoryConfigStore::with_config(config_a.clone())),
        quick_supervisor(None),
    )
    .await;

    let mut tasks = Vec::new();
    for i in 0..4 {
        let service = service.clone();
        let (first, second) = if i % 2 == 0 {
            (config_a.clone(), config_b.clone())
        } else {
            (config_b.clone(), config_a.clone())
        };
        tasks.push(tokio::spawn(async move {
            for round in 0..10 {
                let next = if round % 2 == 0 { &first } else { &second };
                service.update_config(next.clone()).await.unwrap();
            }
        }));
    }

    for _ in 0..4 {
        let service = service.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..20 {
                let snapshot = service.snapshot().await;
                let ProviderConfig::Ollama(ref ollama) = snapshot.config.llm else {
                    panic!("unexpected provider variant");
                };
                assert_eq!(snapshot.provider.endpoint(), ollama.api_base);
                assert_eq!(snapshot.provider.default_model(), ollama.default_model);

                let chunk = service
                    .generate(GenerationRequest::new("", "hi"))
                    .await
                    .unwrap();
                assert!(
                    chunk.delta_content == "from-a" || chunk.delta_content == "from-b",
                    "unexpected reply {:?}",
                    chunk.delta_content
                );
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }
}

#[tokio::test]
async fn test_truncated_stream_ends_with_one_unreachable_error() {
    let upstream = MockUpstream::start("unused").await;
    let service = control_plane(
        Arc::new(MemoryConfigStore::with_config(ollama_config(
            &upstream.truncated_api_base(),
            "llama2",
        ))),
        quick_supervisor(None),
    )
    .await;

    let items: Vec<Result<GenerationChunk, LLMError>> = service
        .generate_stream(GenerationRequest::new("llama2", "hi").streaming(true))
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].as_ref().unwrap().delta_content, "Hel");
    assert_eq!(items[1].as_ref().unwrap().delta_content, "lo");
    assert!(matches!(items[2], Err(LLMError::UpstreamUnreachable(_))));
}
