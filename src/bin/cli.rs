use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use facematch::{
    build_index, compare_images, load_identity_map, Config, Gallery, QueryResponse,
    SidecarExtractor,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "facematch")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index every image in a directory.
    Build {
        images: PathBuf,
        identities: PathBuf,
        #[arg(long, default_value = "artifacts")]
        out: PathBuf,
    },
    /// Find the closest distinct identities to an image or a raw embedding.
    Query {
        #[arg(long, default_value = "artifacts")]
        artifacts: PathBuf,
        #[arg(long, conflicts_with = "embedding", required_unless_present = "embedding")]
        image: Option<PathBuf>,
        /// Comma-separated components.
        #[arg(long)]
        embedding: Option<String>,
        #[arg(short, long)]
        k: Option<usize>,
        #[arg(long)]
        overfetch: Option<usize>,
    },
    /// Similarity between the faces in two images.
    Compare { first: PathBuf, second: PathBuf },
}

fn parse_vector(s: &str) -> anyhow::Result<Vec<f32>> {
    s.split(',')
        .map(|x| x.trim().parse::<f32>().with_context(|| format!("bad component {x:?}")))
        .collect()
}

struct QueryArgs {
    artifacts: PathBuf,
    image: Option<PathBuf>,
    embedding: Option<String>,
    k: Option<usize>,
    overfetch: Option<usize>,
}

/// Every failure, including bad arguments, ends up in the response envelope.
fn run_query(
    mut config: Config,
    extractor: &SidecarExtractor,
    args: QueryArgs,
) -> anyhow::Result<QueryResponse> {
    if let Some(k) = args.k {
        config.search.top_k = k;
        config.search.overfetch = config.search.overfetch.max(k);
    }
    if let Some(n) = args.overfetch {
        config.search.overfetch = n;
    }
    config.validate()?;
    let embedding = args.embedding.as_deref().map(parse_vector).transpose()?;
    let gallery = Gallery::open(&args.artifacts, config.search)?;
    Ok(match (args.image, embedding) {
        (Some(image), _) => gallery.query_image(extractor, &image),
        (None, Some(vector)) => gallery.query_embedding(&vector),
        (None, None) => QueryResponse::failure("image or embedding required"),
    })
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    Ok(match path {
        Some(p) => Config::load(p)?,
        None => Config::default(),
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let extractor = SidecarExtractor;

    match cli.command {
        Commands::Build {
            images,
            identities,
            out,
        } => {
            let identity_map = load_identity_map(&identities)?;
            let report = build_index(&extractor, config, &images, &identity_map, &out)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Query {
            artifacts,
            image,
            embedding,
            k,
            overfetch,
        } => {
            let query = QueryArgs {
                artifacts,
                image,
                embedding,
                k,
                overfetch,
            };
            let response = run_query(config, &extractor, query)
                .unwrap_or_else(|e| QueryResponse::failure(format!("{e:#}")));
            println!("{}", serde_json::to_string(&response)?);
        }
        Commands::Compare { first, second } => {
            let response = compare_images(&extractor, &first, &second);
            println!("{}", serde_json::to_string(&response)?);
        }
    }
    Ok(())
}
