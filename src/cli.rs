use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::{load_engine_config, EngineConfig};
use crate::editor::EditorSession;
use crate::loader::{HttpFetcher, ImageLoader};
use crate::storage::{FileProjectStore, ProjectStorage};
use crate::template::{builtin_catalog, Template};

#[derive(Parser, Debug)]
#[command(name = "memeforge", version, about = "Template-based meme compositing")]
pub struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Render a template JSON file to a PNG.
    Render {
        /// Template JSON.
        template: PathBuf,
        /// Output PNG path.
        output: PathBuf,
        /// Replacement text for each box, in order.
        texts: Vec<String>,
    },
    /// Print the built-in template catalog.
    Catalog,
    /// List saved projects.
    Projects,
    /// Render a saved project to a PNG.
    Export {
        project_id: String,
        /// Output PNG path.
        output: PathBuf,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    let config = load_engine_config();
    tracing::debug!(command = ?cli.cmd, "running command");

    match cli.cmd {
        Command::Render {
            template,
            output,
            texts,
        } => render_template(&config, &template, &output, &texts),
        Command::Catalog => {
            for template in builtin_catalog() {
                println!(
                    "{}\t{}\t{} boxes\t{}",
                    template.id,
                    template.name,
                    template.text_boxes.len(),
                    template.source_url
                );
            }
            Ok(())
        }
        Command::Projects => {
            let store = FileProjectStore::with_default_path(config.storage_quota_bytes)?;
            for project in store.list()? {
                println!("{}\t{}\t{}", project.id, project.name, project.saved_at);
            }
            Ok(())
        }
        Command::Export { project_id, output } => {
            let store = FileProjectStore::with_default_path(config.storage_quota_bytes)?;
            let mut session = new_session(&config)?;
            session
                .open_project(&store, &project_id, Instant::now())
                .with_context(|| format!("cannot open project {project_id}"))?;
            write_export(&mut session, &output)
        }
    }
}

fn new_session(config: &EngineConfig) -> Result<EditorSession<HttpFetcher>> {
    let fetcher = HttpFetcher::new(config.load_timeout()).context("cannot build http client")?;
    Ok(EditorSession::new(
        ImageLoader::new(fetcher, config.load_timeout()),
        config,
    ))
}

fn render_template(
    config: &EngineConfig,
    template_path: &Path,
    output: &Path,
    texts: &[String],
) -> Result<()> {
    let contents = std::fs::read_to_string(template_path)
        .with_context(|| format!("cannot read template '{}'", template_path.display()))?;
    let template: Template = serde_json::from_str(&contents)
        .with_context(|| format!("invalid template json in '{}'", template_path.display()))?;

    let now = Instant::now();
    let mut session = new_session(config)?;
    session.select_template(template, now);
    for (index, text) in texts.iter().enumerate() {
        if !session.set_text(index, text.as_str(), now) {
            tracing::warn!(index, "template has no box for extra text argument");
        }
    }
    session.commit_text(now);
    write_export(&mut session, output)
}

fn write_export(session: &mut EditorSession<HttpFetcher>, output: &Path) -> Result<()> {
    let png = session.export_raster().context("compositing failed")?;
    for notice in session.take_notices() {
        eprintln!("warning: {notice}");
    }
    std::fs::write(output, &png)
        .with_context(|| format!("cannot write '{}'", output.display()))?;
    tracing::info!(output = %output.display(), bytes = png.len(), "raster exported");
    Ok(())
}
