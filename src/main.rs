//! CourseBuddy - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

use coursebuddy::{
    cli::{Args, Commands, Verbosity},
    config::{Backend, Config},
    documents::{Document, DocumentIndexer, DocumentLoader, IdScheme, SourceLocator},
    llm::{AnswerGenerator, OpenAIClient},
    rag::{
        evaluation::{evaluate, load_ground_truth},
        retrieval::check_layout,
        build_strategy, ContextBuilder, KeywordRetrieval, PromptTemplate, RagPipeline,
        RetrievalEngine, RetrievalStrategy, StrategyKind,
    },
    store::{InMemoryStore, ProvisionOutcome, Provisioner, QdrantStore, SearchStore},
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let verbosity = args.verbosity();
    telemetry::init(verbosity);

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_overrides(&mut config);

    match &args.command {
        Commands::Ingest { sources, ids } => {
            if !sources.is_empty() {
                config.documents.sources = sources.clone();
            }
            if let Some(ids) = ids {
                config.documents.id_scheme = *ids;
            }
            let store = open_store(&config)?;
            ingest(&config, store, verbosity).await?;
        }
        Commands::Search {
            query,
            retrieval,
            context,
        } => {
            retrieval.apply(&mut config);
            run_search(&config, query, *context, verbosity).await?;
        }
        Commands::Ask {
            question,
            retrieval,
            dry_run,
        } => {
            retrieval.apply(&mut config);
            run_ask(&config, question, *dry_run, verbosity).await?;
        }
        Commands::Evaluate {
            ground_truth,
            retrieval,
            all,
        } => {
            retrieval.apply(&mut config);
            let truth = load_ground_truth(ground_truth)
                .with_context(|| format!("Failed to load {}", ground_truth.display()))?;
            run_evaluate(&config, &truth, *all, verbosity).await?;
        }
        Commands::Config { save } => {
            show_config(&args, &config, *save)?;
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<Arc<dyn SearchStore>> {
    match config.store.backend {
        Backend::Qdrant => {
            let store = QdrantStore::new(&config.store.url, config.store.api_key.clone())
                .with_context(|| format!("Failed to connect to Qdrant at {}", config.store.url))?;
            Ok(Arc::new(store))
        }
        Backend::Memory => Ok(Arc::new(InMemoryStore::new())),
    }
}

/// Store ready for queries; the in-memory backend is indexed first
async fn query_store(config: &Config, verbosity: Verbosity) -> Result<Arc<dyn SearchStore>> {
    let store = open_store(config)?;
    if config.store.backend == Backend::Memory {
        ingest(config, store.clone(), verbosity).await?;
    }
    Ok(store)
}

async fn load_documents(config: &Config) -> Result<Vec<Document>> {
    let sources: Vec<SourceLocator> = config.sources()?;
    let loader = DocumentLoader::new(config.request_timeout())?;
    loader
        .load(&sources)
        .await
        .context("Failed to load documents")
}

async fn ingest(config: &Config, store: Arc<dyn SearchStore>, verbosity: Verbosity) -> Result<()> {
    let documents = load_documents(config).await?;

    let spec = config.collection_spec();
    let outcome = Provisioner::new(store.clone())
        .ensure(&spec)
        .await
        .with_context(|| format!("Failed to provision collection {}", spec.name))?;

    if verbosity.show_progress() && config.store.backend == Backend::Qdrant {
        match outcome {
            ProvisionOutcome::Created => {
                println!("{} collection {}", "Created".green(), spec.name.bold())
            }
            ProvisionOutcome::AlreadyExists => {
                println!("{} collection {} already exists", "Using".yellow(), spec.name.bold())
            }
        }
    }

    let pb = if verbosity.show_progress() {
        let pb = ProgressBar::new(documents.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("=> "),
        );
        pb.set_message("indexing");
        Some(pb)
    } else {
        None
    };

    let indexer = DocumentIndexer::new(store, spec)
        .with_id_scheme(config.documents.id_scheme)
        .with_batch_size(config.documents.batch_size);

    let report = indexer
        .index_with_progress(&documents, |written| {
            if let Some(pb) = &pb {
                pb.set_position(written as u64);
            }
        })
        .await
        .context("Failed to index documents")?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if verbosity.show_progress() && config.store.backend == Backend::Qdrant {
        println!(
            "{} {} documents in {} batches ({} ids)",
            "Indexed".green(),
            report.documents,
            report.batches,
            match config.documents.id_scheme {
                IdScheme::Sequential => "sequential",
                IdScheme::Uuid => "uuid",
            }
        );
    }

    Ok(())
}

async fn keyword_strategy(config: &Config) -> Result<Arc<dyn RetrievalStrategy>> {
    let documents = load_documents(config).await?;
    Ok(Arc::new(KeywordRetrieval::fit(documents, config.retrieval.boosts)))
}

fn store_strategy(
    config: &Config,
    kind: StrategyKind,
    store: Arc<dyn SearchStore>,
) -> Result<Arc<dyn RetrievalStrategy>> {
    let mut retrieval = config.retrieval_config();
    retrieval.strategy = kind;
    Ok(build_strategy(store, retrieval)?)
}

/// Engine for the configured strategy; keyword search never opens the store
async fn engine(config: &Config, verbosity: Verbosity) -> Result<RetrievalEngine> {
    let kind = config.retrieval.strategy;
    let strategy = if kind == StrategyKind::Keyword {
        keyword_strategy(config).await?
    } else {
        check_layout(kind, &config.collection_spec().layout)?;
        let store = query_store(config, verbosity).await?;
        store_strategy(config, kind, store)?
    };
    Ok(RetrievalEngine::with_params(strategy, config.search_params()))
}

async fn run_search(config: &Config, query: &str, show_context: bool, verbosity: Verbosity) -> Result<()> {
    let engine = engine(config, verbosity).await?;
    let result = engine.retrieve(query).await.context("Search failed")?;

    if show_context {
        let context = ContextBuilder::with_config(config.context_config()).build(&result);
        print!("{}", context.text);
        return Ok(());
    }

    if result.is_empty() {
        println!("{}", "No matching documents.".yellow());
        return Ok(());
    }

    for m in result.iter() {
        let doc = &m.document;
        if verbosity.show_details() {
            println!(
                "{} {} {}",
                format!("#{}", m.rank).bold(),
                format!("[{:.4}]", m.score).dimmed(),
                doc.course.cyan()
            );
        } else {
            println!("{} {}", format!("#{}", m.rank).bold(), doc.course.cyan());
        }
        println!("  {} {}", "Section:".dimmed(), doc.section);
        if !doc.question.is_empty() {
            println!("  {} {}", "Question:".dimmed(), doc.question);
        }
        println!("  {}", preview(&doc.text, 240));
        println!();
    }

    Ok(())
}

async fn run_ask(config: &Config, question: &str, dry_run: bool, verbosity: Verbosity) -> Result<()> {
    let engine = engine(config, verbosity).await?;
    let context_builder = ContextBuilder::with_config(config.context_config());

    if dry_run {
        let result = engine.retrieve(question).await.context("Search failed")?;
        let context = context_builder.build(&result);
        println!("{}", PromptTemplate::default().render(question, &context));
        return Ok(());
    }

    let client = OpenAIClient::new(
        &config.llm.base_url,
        &config.llm.model,
        config.llm.api_key.clone(),
        config.request_timeout(),
    )?;
    let pipeline = RagPipeline::new(engine, context_builder, AnswerGenerator::new(client));

    let spinner = if verbosity.show_progress() {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
        spinner.set_message("Thinking...");
        spinner.enable_steady_tick(Duration::from_millis(100));
        Some(spinner)
    } else {
        None
    };

    let answer = pipeline.ask(question).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let answer = answer.context("Failed to answer question")?;

    if verbosity.show_details() {
        if let Some(course) = &answer.context.course {
            println!("{} {} ({} matches)", "Course:".dimmed(), course, answer.context.match_count);
        }
        if answer.context.mixed_courses {
            println!("{}", "Matches span several courses".yellow());
        }
        println!();
    }
    println!("{}", answer.answer);

    Ok(())
}

async fn run_evaluate(
    config: &Config,
    truth: &[coursebuddy::rag::GroundTruth],
    all: bool,
    verbosity: Verbosity,
) -> Result<()> {
    let layout = config.collection_spec().layout;
    let mut store: Option<Arc<dyn SearchStore>> = None;

    let kinds: Vec<StrategyKind> = if all {
        vec![
            StrategyKind::Dense,
            StrategyKind::Sparse,
            StrategyKind::PrefetchRerank,
            StrategyKind::Fused,
            StrategyKind::Keyword,
        ]
    } else {
        vec![config.retrieval.strategy]
    };

    println!("{:<18} {:>8} {:>10} {:>8}", "strategy".bold(), "queries", "hit rate", "mrr");
    for kind in kinds {
        if let Err(e) = check_layout(kind, &layout) {
            if all {
                println!("{:<18} {}", kind.to_string(), "skipped".dimmed());
                tracing::debug!(error = %e, "Skipping strategy");
                continue;
            }
            return Err(e.into());
        }

        let strategy = if kind == StrategyKind::Keyword {
            keyword_strategy(config).await?
        } else {
            let shared = match &store {
                Some(store) => store.clone(),
                None => {
                    let opened = query_store(config, verbosity).await?;
                    store = Some(opened.clone());
                    opened
                }
            };
            store_strategy(config, kind, shared)?
        };
        let report = evaluate(strategy.as_ref(), truth, config.retrieval.limit)
            .await
            .with_context(|| format!("Evaluation of {} failed", kind))?;

        println!(
            "{:<18} {:>8} {:>10.4} {:>8.4}",
            kind.to_string(),
            report.queries,
            report.hit_rate,
            report.mrr
        );
    }

    Ok(())
}

fn show_config(args: &Args, config: &Config, save: bool) -> Result<()> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };

    if save {
        config.save(&path)?;
        println!("{} {}", "Saved configuration to".green(), path.display());
        return Ok(());
    }

    let mut shown = config.clone();
    shown.store.api_key = shown.store.api_key.as_ref().map(|_| "********".to_string());
    shown.llm.api_key = shown.llm.api_key.as_ref().map(|_| "********".to_string());

    println!("{} {}", "CourseBuddy configuration".bold(), format!("({})", path.display()).dimmed());
    println!();
    print!("{}", toml::to_string_pretty(&shown).context("Failed to render configuration")?);
    println!();
    println!("Verbosity: {}", args.verbosity().as_str());

    Ok(())
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
