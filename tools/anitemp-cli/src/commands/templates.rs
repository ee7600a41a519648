//! List templates from the content store.

use anitemp_common::config::AppConfig;

use crate::store::ContentStore;

pub async fn run(
    config: &AppConfig,
    category: String,
    search: String,
    json: bool,
) -> anyhow::Result<()> {
    let store = ContentStore::new(&config.content_store, config.loader.timeout_secs)?;
    let catalog = store.fetch_templates().await?;
    let matches: Vec<_> = catalog.filter(&category, &search).collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&matches)?);
        return Ok(());
    }

    println!(
        "Templates ({} of {}, category: {category})",
        matches.len(),
        catalog.templates.len()
    );
    println!("{}", "=".repeat(50));
    for t in &matches {
        let duration = t
            .duration
            .map(|d| format!("{d:.0}s"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<24} {:<28} {:>5}  {} clips{}",
            t.id,
            t.title,
            duration,
            t.videos.len(),
            if t.is_new == Some(true) { "  [new]" } else { "" }
        );
        if let Some(category) = &t.category {
            println!("      category: {category}");
        }
        if !t.tags.is_empty() {
            println!("      tags: {}", t.tags.join(", "));
        }
    }
    if matches.is_empty() {
        println!("  No templates found.");
    }

    Ok(())
}
