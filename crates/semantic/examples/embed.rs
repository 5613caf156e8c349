use std::{env, error::Error};

use semantic::{cosine_similarity, Embedder, EmbeddingConfig, OllamaEmbedder};

/// Embeds two texts with a local Ollama model and prints their cosine similarity.
///
/// ```bash
/// ollama pull bge-m3
/// cargo run -p tmkb-semantic --example embed -- "今天天气很好" "the weather is nice today"
/// ```
///
/// `OLLAMA_URL` and `EMBEDDING_MODEL` override the defaults
/// (`http://localhost:11434`, `bge-m3`).
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let first = args.next().unwrap_or_else(|| "机器学习".into());
    let second = args.next().unwrap_or_else(|| "machine learning".into());

    let mut cfg = EmbeddingConfig::default();
    if let Ok(url) = env::var("OLLAMA_URL") {
        cfg = cfg.with_ollama_url(url);
    }
    if let Ok(model) = env::var("EMBEDDING_MODEL") {
        cfg = cfg.with_model_name(model);
    }
    let embedder = OllamaEmbedder::new(cfg)?;

    let a = embedder.generate_embedding(&first).await?;
    let b = embedder.generate_embedding(&second).await?;

    println!("model      : {}", embedder.model_name());
    println!("dimension  : {}", a.len());
    println!("similarity : {:.4}", cosine_similarity(&a, &b));
    Ok(())
}
