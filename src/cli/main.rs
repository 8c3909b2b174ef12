use churn_predictor::{
    config::Config,
    logging::init_tracing,
    ml::{ModelType, ScalingMethod},
    models::{FeaturesPayload, PolicyType, PredictRequest},
    pipeline::{EtlJob, EtlSource, Trainer},
    storage::{create_artifact_store, create_table_store},
};
use clap::{Parser, Subcommand};
use reqwest::Client;
use std::error::Error;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "churn-cli")]
#[command(about = "Insurance churn pipeline CLI", long_about = None)]
struct Cli {
    /// Prediction server for the client commands
    #[arg(short, long, env = "CHURN_ENDPOINT", default_value = "http://localhost:8080")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a raw CSV into the processed table
    Etl {
        /// Key of the CSV in the artifact store (defaults to storage.input_key)
        #[arg(short, long, conflicts_with = "file")]
        input: Option<String>,

        /// Read the CSV from local disk instead
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Target table (defaults to database.table)
        #[arg(short, long)]
        table: Option<String>,

        /// Override etl.scaling
        #[arg(short, long)]
        scaling: Option<ScalingMethod>,
    },

    /// Train a model from the processed table and persist the artifact
    Train {
        /// Source table (defaults to database.table)
        #[arg(short, long)]
        table: Option<String>,

        /// Artifact key (defaults to storage.model_key)
        #[arg(short = 'k', long)]
        model_key: Option<String>,

        /// Override training.n_trees
        #[arg(short, long)]
        n_trees: Option<usize>,

        /// Train a single decision tree instead of a forest
        #[arg(long)]
        single_tree: bool,
    },

    /// Ask the server to classify one policy holder
    Predict {
        #[arg(long)]
        age: f64,

        #[arg(long)]
        annual_premium: f64,

        #[arg(long)]
        claims_count: f64,

        /// auto, home, life; anything else encodes as unknown
        #[arg(long)]
        policy_type: String,
    },

    /// Ask the server to reload the model artifact
    LoadModel,

    /// Check server health
    Health,
}

async fn print_response(response: reqwest::Response) -> Result<(), Box<dyn Error>> {
    let status = response.status();
    let body: serde_json::Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    if !status.is_success() {
        return Err(format!("server returned {}", status).into());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = Config::load()?;
    init_tracing(&config.observability);

    let client = Client::new();

    match cli.command {
        Commands::Etl {
            input,
            file,
            table,
            scaling,
        } => {
            let artifacts = create_artifact_store(&config.storage)?;
            let tables = create_table_store(&config.database).await?;

            let source = match file {
                Some(path) => EtlSource::File(path),
                None => EtlSource::Object(input.unwrap_or(config.storage.input_key.clone())),
            };
            let table = table.unwrap_or(config.database.table.clone());
            let scaling = scaling.unwrap_or(config.etl.scaling);

            let report = EtlJob::new(artifacts, tables, scaling)
                .run(&source, &table)
                .await?;
            println!(
                "Wrote {} rows from {} to table '{}'",
                report.rows, report.source, report.table
            );
        }

        Commands::Train {
            table,
            model_key,
            n_trees,
            single_tree,
        } => {
            let artifacts = create_artifact_store(&config.storage)?;
            let tables = create_table_store(&config.database).await?;

            let mut training = config.training.clone();
            if let Some(n) = n_trees {
                training.n_trees = n;
            }
            if single_tree {
                training.model_type = ModelType::DecisionTree;
            }

            let table = table.unwrap_or(config.database.table.clone());
            let model_key = model_key.unwrap_or(config.storage.model_key.clone());

            let report = Trainer::new(tables, artifacts, training)
                .run(&table, &model_key)
                .await?;
            println!("{}", report.summary());
            println!(
                "Model {} saved to {}",
                report.metadata.version, report.location.uri
            );
        }

        Commands::Predict {
            age,
            annual_premium,
            claims_count,
            policy_type,
        } => {
            let [policy_auto, policy_home, policy_life] =
                PolicyType::parse(&policy_type).indicators();
            let request = PredictRequest {
                features: Some(FeaturesPayload {
                    age: Some(age),
                    annual_premium: Some(annual_premium),
                    claims_count: Some(claims_count),
                    policy_auto: Some(policy_auto),
                    policy_home: Some(policy_home),
                    policy_life: Some(policy_life),
                }),
            };

            let response = client
                .post(format!("{}/predict", cli.endpoint))
                .json(&request)
                .send()
                .await?;
            print_response(response).await?;
        }

        Commands::LoadModel => {
            let response = client
                .post(format!("{}/load-model", cli.endpoint))
                .send()
                .await?;
            print_response(response).await?;
        }

        Commands::Health => {
            let response = client
                .get(format!("{}/health", cli.endpoint))
                .send()
                .await?;
            print_response(response).await?;
        }
    }

    Ok(())
}
