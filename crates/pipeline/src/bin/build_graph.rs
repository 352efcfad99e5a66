use anyhow::{Context, Result};
use clap::Parser;
use pipeline::{generate_knowledge_graph, logging, package_archive, AppConfig};
use std::path::PathBuf;

/// Turn a folder of notes into an interlinked knowledge base
#[derive(Parser)]
#[command(name = "build_graph")]
struct Args {
    /// A .txt/.md file or a directory of them
    #[arg(long)]
    input: PathBuf,

    /// research-library, course-material, meeting-notes or project-docs
    #[arg(long, default_value = "research-library")]
    use_case: String,

    /// Directory the relinked documents and the index are written to
    #[arg(long, default_value = "knowledge-graph")]
    out: PathBuf,

    /// Also write a zip archive of the output
    #[arg(long)]
    zip: Option<PathBuf>,

    /// TOML config file (defaults to $KG_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = AppConfig::load(args.config.as_deref())?;
    logging::init_tracing(config.logging.format);

    let documents = ingest::ingest_path(&args.input).await?;
    if documents.is_empty() {
        anyhow::bail!("No .txt or .md files found in {:?}", args.input);
    }

    let output = generate_knowledge_graph(&config, &args.use_case, &documents).await?;

    tokio::fs::create_dir_all(&args.out)
        .await
        .context(format!("Failed to create output directory: {:?}", args.out))?;

    for file in &output.files {
        let path = args.out.join(&file.name);
        tokio::fs::write(&path, &file.content)
            .await
            .context(format!("Failed to write {:?}", path))?;
    }

    if let Some(zip_path) = &args.zip {
        let bytes = package_archive(&output.files, &output.metadata)?;
        tokio::fs::write(zip_path, bytes)
            .await
            .context(format!("Failed to write archive {:?}", zip_path))?;
        println!("✅ Archive saved to {}", zip_path.display());
    }

    println!(
        "✅ {} concepts, {} links in {} ms -> {}",
        output.metadata.total_concepts,
        output.metadata.total_links,
        output.metadata.processing_time_ms,
        args.out.display()
    );

    Ok(())
}
