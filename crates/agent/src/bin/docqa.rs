//! Interactive document-QA console
//!
//! Wires the real backends (Qdrant, Ollama, CLIP sidecar) into a pipeline
//! and exposes a minimal REPL:
//!
//! ```text
//! ingest <path>        index a local document
//! ingest-url <url>     fetch and index a web page
//! delete <filename>    remove a document from the index
//! ask <question>       answer over the indexed documents
//! ask-image <path> [question]
//! reset                forget the conversation
//! quit
//! ```

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use docqa_agent::{ChatSession, ConversationMemory, MemoryConfig, RagPipeline};
use docqa_config::{load_settings, Settings};
use docqa_core::{ImageEmbedder, LanguageModel, TextEmbedder, VectorIndex};
use docqa_llm::{LlmConfig, OllamaBackend};
use docqa_rag::{
    ClipEmbeddingConfig, ClipHttpEmbedder, EmbeddingAdapter, ImageClassifier, IngestPipeline,
    LoaderRegistry, OllamaTextEmbedder, QdrantIndex, QdrantIndexConfig, Retriever,
    TextEmbeddingConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var("DOCQA_CONFIG").ok();
    let settings = match load_settings(config_path.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Warning: failed to load config: {e}. Using defaults.");
            Settings::default()
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting docqa");

    let session = build_session(&settings).await?;
    repl(session).await
}

async fn build_session(settings: &Settings) -> Result<ChatSession, Box<dyn std::error::Error>> {
    let index = QdrantIndex::new(QdrantIndexConfig {
        endpoint: settings.index.endpoint.clone(),
        collection: settings.index.collection.clone(),
        vector_dim: settings.index.vector_dim,
        api_key: settings.index.api_key.clone(),
        batch_size: settings.index.upsert_batch_size,
    })
    .await?;
    index.ensure_collection().await?;
    let index: Arc<dyn VectorIndex> = Arc::new(index);

    let text_embedder: Arc<dyn TextEmbedder> = Arc::new(OllamaTextEmbedder::new(
        TextEmbeddingConfig {
            endpoint: settings.embedding.text_endpoint.clone(),
            model: settings.embedding.text_model.clone(),
            dim: settings.index.vector_dim,
            timeout_secs: settings.llm.timeout_secs,
        },
    )?);

    let image_embedder: Arc<dyn ImageEmbedder> = Arc::new(ClipHttpEmbedder::new(
        ClipEmbeddingConfig {
            endpoint: settings.embedding.image_endpoint.clone(),
            dim: settings.index.vector_dim,
            timeout_secs: settings.llm.timeout_secs,
        },
    )?);

    // Fails fast on incompatible embedding dimensions
    let embedders = EmbeddingAdapter::new(text_embedder, image_embedder)?;

    let llm: Arc<dyn LanguageModel> =
        Arc::new(OllamaBackend::new(LlmConfig::from(settings.llm.clone()))?);
    if !llm.is_available().await {
        tracing::warn!(model = llm.model_name(), "llm backend is not reachable");
    }

    let classifier = ImageClassifier::new(
        embedders.image().clone(),
        settings.embedding.candidate_labels.clone(),
    );

    let ingest = IngestPipeline::new(
        settings.chunking.clone().into(),
        LoaderRegistry::new(),
        embedders.clone(),
        classifier,
        index.clone(),
    )?;

    let retriever = Retriever::new(index, embedders, settings.retrieval.clone().into());

    let pipeline = Arc::new(RagPipeline::new(ingest, retriever, llm.clone()));
    let memory = ConversationMemory::new(llm, MemoryConfig::from(settings.memory.clone()));

    let session = ChatSession::new(pipeline, memory);
    Ok(if settings.memory.enabled {
        session
    } else {
        session.without_memory()
    })
}

async fn repl(session: ChatSession) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    stdout.write_all(b"docqa ready. Type 'help' for commands.\n> ").await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));

        match command {
            "" => {},
            "help" => {
                stdout
                    .write_all(
                        b"commands: ingest <path> | ingest-url <url> | delete <filename> | \
                          ask <question> | ask-image <path> [question] | reset | quit\n",
                    )
                    .await?;
            },
            "quit" | "exit" => break,
            "reset" => {
                session.reset().await;
                stdout.write_all(b"conversation cleared\n").await?;
            },
            "ingest" => match session_pipeline_ingest(&session, rest).await {
                Ok(msg) => stdout.write_all(msg.as_bytes()).await?,
                Err(e) => stdout.write_all(format!("error: {e}\n").as_bytes()).await?,
            },
            "ingest-url" => match session.pipeline().ingest_url(rest.trim()).await {
                Ok(report) => {
                    stdout
                        .write_all(
                            format!(
                                "indexed {} ({} chunks, {} images)\n",
                                report.filename, report.chunks_indexed, report.images_indexed
                            )
                            .as_bytes(),
                        )
                        .await?
                },
                Err(e) => stdout.write_all(format!("error: {e}\n").as_bytes()).await?,
            },
            "delete" => match session.pipeline().delete_file(rest.trim()).await {
                Ok(()) => stdout.write_all(b"deleted\n").await?,
                Err(e) => stdout.write_all(format!("error: {e}\n").as_bytes()).await?,
            },
            "ask" => {
                stream_answer(&session, Some(rest), None, &mut stdout).await?;
            },
            "ask-image" => {
                let (path, question) = rest.split_once(' ').unwrap_or((rest, ""));
                let question = if question.trim().is_empty() {
                    None
                } else {
                    Some(question)
                };
                stream_answer(&session, question, Some(Path::new(path.trim())), &mut stdout)
                    .await?;
            },
            other => {
                stdout
                    .write_all(format!("unknown command: {other}\n").as_bytes())
                    .await?;
            },
        }

        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    Ok(())
}

async fn session_pipeline_ingest(session: &ChatSession, path: &str) -> Result<String, docqa_core::Error> {
    let report = session.pipeline().ingest_file(Path::new(path.trim())).await?;
    Ok(format!(
        "indexed {} ({} pages, {} chunks, {} images)\n",
        report.filename, report.pages, report.chunks_indexed, report.images_indexed
    ))
}

async fn stream_answer(
    session: &ChatSession,
    text: Option<&str>,
    image: Option<&Path>,
    stdout: &mut tokio::io::Stdout,
) -> Result<(), Box<dyn std::error::Error>> {
    let (tx, mut rx) = mpsc::channel::<String>(64);

    let printer = tokio::spawn(async move {
        let mut out = tokio::io::stdout();
        while let Some(token) = rx.recv().await {
            let _ = out.write_all(token.as_bytes()).await;
            let _ = out.flush().await;
        }
    });

    match session.ask_stream(text, image, tx).await {
        Ok(response) => {
            printer.await.ok();
            stdout.write_all(b"\n").await?;
            if !response.sources.is_empty() {
                stdout
                    .write_all(format!("sources: {}\n", response.sources.join("; ")).as_bytes())
                    .await?;
            }
        },
        Err(e) => {
            printer.abort();
            stdout.write_all(format!("error: {e}\n").as_bytes()).await?;
        },
    }

    Ok(())
}
