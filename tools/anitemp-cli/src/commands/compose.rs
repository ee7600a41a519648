//! Compose a template into an MP4.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anitemp_common::config::AppConfig;
use anitemp_compose_engine::{Composer, ProgressCallback, Studio};
use anitemp_edit_model::{TemplateRecord, TransitionSpec};

use crate::store::ContentStore;

pub async fn run(
    config: &AppConfig,
    template: String,
    output: PathBuf,
    replacements: Vec<(u32, String)>,
    transitions: Vec<(u32, String)>,
    texts: Vec<(u32, String)>,
    direct: bool,
) -> anyhow::Result<()> {
    let record = load_template(config, &template).await?;
    println!("Composing template: {} ({})", record.title, record.id);

    let composer = Composer::from_config(config)?;
    let mut studio = Studio::from_template(composer, &record)?;

    for (id, path) in replacements {
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read {path}: {e}"))?;
        let mime = mime_for(Path::new(&path));
        let handle = studio.replace_media(id, bytes, mime)?;
        println!("  Segment {id}: {path} ({})", handle.url());
    }
    for (id, tag) in transitions {
        let spec = (!tag.trim().is_empty()).then(|| TransitionSpec::new(tag));
        studio.set_transition(id, spec)?;
    }
    for (id, text) in texts {
        studio.set_text(id, text)?;
    }

    println!("  Segments: {}", studio.edits().len());
    println!("  Output dir: {}", output.display());

    let progress: ProgressCallback = Arc::new(|p| {
        print!("\r  Progress: {p:>3}%  ");
        let _ = std::io::stdout().flush();
    });

    let result = if direct {
        let snapshot = studio.edits().snapshot();
        match studio.composer().generate_direct(&snapshot, progress).await {
            Ok(handle) => handle.save_to(&output).await,
            Err(e) => Err(e),
        }
    } else {
        match studio.generate(progress).await.map(|_| ()) {
            Ok(()) => studio.download(&output).await,
            Err(e) => Err(e),
        }
    };

    match result {
        Ok(path) => {
            println!("\nCompose complete: {}", path.display());
            Ok(())
        }
        Err(e) => {
            println!("\nCompose failed: {e}");
            Err(e.into())
        }
    }
}

async fn load_template(config: &AppConfig, template: &str) -> anyhow::Result<TemplateRecord> {
    let path = Path::new(template);
    if path.is_file() {
        let json = tokio::fs::read_to_string(path).await?;
        return TemplateRecord::from_json(&json)
            .map_err(|e| anyhow::anyhow!("Failed to parse {}: {e}", path.display()));
    }
    let store = ContentStore::new(&config.content_store, config.loader.timeout_secs)?;
    store.fetch_template(template).await
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        _ => "video/mp4",
    }
}
