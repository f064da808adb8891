//! nodelab CLI - the node-classification experiment pipeline.
//!
//! # Usage
//!
//! ```bash
//! # Build the node-ID map and graph bundle from raw citation files
//! nodelab ingest cora.content cora.cites -m cora.map -o cora.data
//!
//! # Partition embedded nodes into cora.feature_{train,val,test}
//! nodelab split cora.label cora.emb cora.feature
//!
//! # Train the boosted classifier and append metrics to logging.file
//! nodelab train cora.feature
//!
//! # Multi-label F1 of an embedding against a stored dataset
//! nodelab classify cora cora.emb --data-dir data/
//!
//! # 2-D layout of an embedding
//! nodelab tsne cora.emb -o layout.csv
//!
//! # Motifs above a z-score in a .motifslog
//! nodelab motifs data/cora_3m.motifslog --z-threshold 100
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use nodelab_core::dataset::{run_ingest, IngestOptions};
use nodelab_core::split::{run_split, SplitConfig};
use nodelab_learn::boosting::BoostingParams;
use nodelab_learn::classifier::{LogisticConfig, LogisticRegression};
use nodelab_learn::evaluation::{run_embedding_classify_f1, EvaluationConfig};
use nodelab_learn::motif::significant_graph;
use nodelab_learn::trainer::{run_training, TrainerConfig};
use nodelab_learn::tsne::{tsne_visualization, TsneConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nodelab")]
#[command(about = "Node-classification experiment pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the node-ID map and the binary graph bundle
    Ingest {
        /// Node content file (first token per line = node ID)
        content: PathBuf,

        /// Edge list (`id id` per line)
        edges: PathBuf,

        /// Where to write the `id index` map
        #[arg(short, long)]
        map_out: PathBuf,

        /// Where to write the bundle
        #[arg(short, long)]
        output: PathBuf,

        /// Also store content features and classes in the bundle
        #[arg(long)]
        with_content: bool,
    },

    /// Split embedded nodes into train/val/test feature files
    Split {
        /// Label file (`node_id label`)
        labels: PathBuf,

        /// Embedding file (`count dim` header)
        embeddings: PathBuf,

        /// Output prefix; `_train`, `_val` and `_test` are appended
        prefix: PathBuf,

        /// Shuffle seed
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Training share in percent
        #[arg(long, default_value = "70")]
        train_percent: usize,

        /// Validation share in percent
        #[arg(long, default_value = "10")]
        val_percent: usize,
    },

    /// Train the boosted binary classifier on `<prefix>_train`
    Train {
        /// Feature-file prefix
        prefix: PathBuf,

        /// Decision threshold
        #[arg(long, default_value = "0.5")]
        threshold: f64,

        /// Metrics log (appended)
        #[arg(long, default_value = "logging.file")]
        log: PathBuf,

        /// Export the model as JSON
        #[arg(long)]
        model_out: Option<PathBuf>,

        /// Learning rate
        #[arg(long, default_value = "0.1")]
        learning_rate: f64,

        /// Maximum leaves per tree
        #[arg(long, default_value = "31")]
        num_leaves: usize,

        /// Maximum boosting rounds
        #[arg(long, default_value = "2000")]
        num_boost_round: usize,

        /// Early-stopping patience
        #[arg(long, default_value = "30")]
        early_stopping_rounds: usize,
    },

    /// Multi-label node classification with an embedding
    Classify {
        /// Dataset name (blogcatalog, cora, citeseer)
        dataset: String,

        /// Embedding file
        embeddings: PathBuf,

        /// Directory holding `<dataset>.data`
        #[arg(long, default_value = "./../data/")]
        data_dir: PathBuf,

        /// Test fractions
        #[arg(long, num_args = 1.., default_value = "0.5")]
        splits: Vec<f64>,

        /// Number of runs
        #[arg(long, default_value = "2")]
        num_run: usize,

        /// Inverse regularization strength
        #[arg(long, default_value = "1.0")]
        c: f64,

        /// Also write the report here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Lay an embedding out with t-SNE and write CSV coordinates
    Tsne {
        /// Embedding file
        embeddings: PathBuf,

        /// Output CSV
        #[arg(short, long)]
        output: PathBuf,

        /// One colour (label) per line, in node order
        #[arg(long)]
        colors: Option<PathBuf>,

        /// Output dimensions
        #[arg(long, default_value = "2")]
        components: usize,

        /// Perplexity
        #[arg(long, default_value = "30")]
        perplexity: f64,

        /// Iterations
        #[arg(long, default_value = "1000")]
        iterations: usize,

        /// Random seed
        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// List significant motifs from a .motifslog
    Motifs {
        /// Motif log file
        log: PathBuf,

        /// Minimum z-score (exclusive)
        #[arg(long, default_value = "100")]
        z_threshold: f64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest {
            content,
            edges,
            map_out,
            output,
            with_content,
        } => cmd_ingest(&content, &edges, &map_out, &output, with_content),
        Commands::Split {
            labels,
            embeddings,
            prefix,
            seed,
            train_percent,
            val_percent,
        } => {
            let cfg = SplitConfig::default()
                .with_seed(seed)
                .with_percentages(train_percent, val_percent);
            cmd_split(&labels, &embeddings, &prefix, &cfg)
        }
        Commands::Train {
            prefix,
            threshold,
            log,
            model_out,
            learning_rate,
            num_leaves,
            num_boost_round,
            early_stopping_rounds,
        } => {
            let params = BoostingParams::default()
                .with_learning_rate(learning_rate)
                .with_num_leaves(num_leaves)
                .with_num_boost_round(num_boost_round)
                .with_early_stopping_rounds(Some(early_stopping_rounds));
            let mut cfg = TrainerConfig::default()
                .with_params(params)
                .with_threshold(threshold)
                .with_log_path(log);
            if let Some(out) = model_out {
                cfg = cfg.with_model_out(out);
            }
            cmd_train(&prefix, &cfg)
        }
        Commands::Classify {
            dataset,
            embeddings,
            data_dir,
            splits,
            num_run,
            c,
            output,
        } => {
            let mut cfg = EvaluationConfig::default()
                .with_data_dir(data_dir)
                .with_splits_ratio(splits)
                .with_num_run(num_run);
            if let Some(out) = output {
                cfg = cfg.with_write_to_file(out);
            }
            cmd_classify(&dataset, &embeddings, c, &cfg)
        }
        Commands::Tsne {
            embeddings,
            output,
            colors,
            components,
            perplexity,
            iterations,
            seed,
        } => {
            let cfg = TsneConfig::default()
                .with_n_components(components)
                .with_perplexity(perplexity)
                .with_n_iter(iterations)
                .with_seed(seed);
            cmd_tsne(&embeddings, &output, colors.as_deref(), &cfg)
        }
        Commands::Motifs { log, z_threshold } => cmd_motifs(&log, z_threshold),
    }
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message);
    pb
}

fn cmd_ingest(
    content: &Path,
    edges: &Path,
    map_out: &Path,
    output: &Path,
    with_content: bool,
) -> Result<()> {
    let start = Instant::now();
    let pb = spinner(format!("Ingesting {}...", content.display()));

    let opts = IngestOptions::default().with_content(with_content);
    let bundle = run_ingest(content, edges, map_out, output, &opts)
        .with_context(|| format!("Failed to ingest {} / {}", content.display(), edges.display()))?;

    pb.finish_with_message(format!("Ingested in {:.2?}", start.elapsed()));
    println!("Nodes: {}", bundle.graph.node_count());
    println!("Edges: {}", bundle.graph.edge_count());
    println!("Wrote {} and {}", map_out.display(), output.display());
    Ok(())
}

fn cmd_split(labels: &Path, embeddings: &Path, prefix: &Path, cfg: &SplitConfig) -> Result<()> {
    let split = run_split(labels, embeddings, prefix, cfg).with_context(|| {
        format!(
            "Failed to split {} with labels {}",
            embeddings.display(),
            labels.display()
        )
    })?;
    println!(
        "train: {}, val: {}, test: {}",
        split.train.len(),
        split.val.len(),
        split.test.len()
    );
    Ok(())
}

fn cmd_train(prefix: &Path, cfg: &TrainerConfig) -> Result<()> {
    let report = run_training(prefix, cfg)
        .with_context(|| format!("Failed to train on {}_*", prefix.display()))?;
    tracing::info!(
        trees = report.model.num_trees(),
        accuracy = report.metrics.accuracy,
        "training finished"
    );
    Ok(())
}

fn cmd_classify(dataset: &str, embeddings: &Path, c: f64, cfg: &EvaluationConfig) -> Result<()> {
    let logistic = LogisticConfig::default().with_c(c);
    run_embedding_classify_f1(
        dataset,
        embeddings,
        || LogisticRegression::new(logistic.clone()),
        cfg,
    )
    .with_context(|| format!("Failed to evaluate {} on {}", embeddings.display(), dataset))?;
    Ok(())
}

fn cmd_tsne(embeddings: &Path, output: &Path, colors: Option<&Path>, cfg: &TsneConfig) -> Result<()> {
    let colors = colors
        .map(|path| {
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))
                .map(|text| text.lines().map(str::to_string).collect::<Vec<_>>())
        })
        .transpose()?;

    tsne_visualization(embeddings, colors.as_deref(), output, cfg)
        .with_context(|| format!("Failed to lay out {}", embeddings.display()))?;
    println!("Wrote {}", output.display());
    Ok(())
}

fn cmd_motifs(log: &Path, z_threshold: f64) -> Result<()> {
    let motifs = significant_graph(log, z_threshold)
        .with_context(|| format!("Failed to read {}", log.display()))?;

    println!("{} motifs with z-score > {}", motifs.len(), z_threshold);
    for m in &motifs {
        println!("Motif {} - z-score: {}", m.index, m.z_score);
        for row in m.motif.adjacency.rows() {
            let cells: Vec<String> = row.iter().map(u8::to_string).collect();
            println!("  {}", cells.join(" "));
        }
    }
    Ok(())
}
