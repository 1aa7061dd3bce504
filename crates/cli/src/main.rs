//! Command-line front end for the generative product-content orchestrator.
//!
//! The orchestrator runs in-process: this binary wires deterministic
//! capability fakes (no concrete generative-service integration ships in
//! `genorch-core`, see its crate docs) and drives them through `Orchestrator`
//! directly, with no RPC hop.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use genorch_core::application::{Orchestrator, OrchestratorConfig, WaitOutcome};
use genorch_core::domain::{JobState, SubmitOptions};
use genorch_core::port::capabilities::analyzer::mocks::FakeAnalyzer;
use genorch_core::port::capabilities::analyzer::{
    AnalysisRecord, ColorPalette, Dimensions, ShapeType, SurfaceTexture,
};
use genorch_core::port::capabilities::image_synthesizer::mocks::FakeImageSynthesizer;
use genorch_core::port::capabilities::text_synthesizer::mocks::FakeTextSynthesizer;
use genorch_core::port::id_provider::UuidProvider;
use genorch_core::port::time_provider::SystemTimeProvider;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "genorch")]
#[command(about = "Generative product-content orchestrator CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a product image for analysis and content generation
    Submit {
        /// Path to the product image (JPEG, PNG, or WebP)
        image: PathBuf,

        #[arg(long)]
        brand_name: Option<String>,

        #[arg(long)]
        product_name: Option<String>,

        /// Number of package-design variations to generate
        #[arg(long, default_value = "3")]
        package_variations: u32,

        /// Comma-separated ad platform names (default: the built-in four)
        #[arg(long, value_delimiter = ',')]
        ad_platforms: Option<Vec<String>>,

        #[arg(long)]
        skip_packages: bool,

        #[arg(long)]
        skip_ads: bool,

        #[arg(long)]
        skip_texts: bool,

        /// Block until the job reaches a terminal state before returning
        #[arg(long)]
        wait: bool,
    },

    /// Show a single job's current status
    Status { job_id: String },

    /// List all known jobs
    List,

    /// Cancel an in-flight job
    Cancel { job_id: String },

    /// Delete a job's record
    Delete { job_id: String },

    /// Block until a job reaches a terminal state
    Wait {
        job_id: String,

        /// Maximum time to wait, in seconds
        #[arg(long, default_value = "60")]
        timeout_seconds: u64,
    },

    /// Show scheduler capacity and job counts
    SystemStatus,
}

fn build_orchestrator() -> Arc<Orchestrator> {
    let config = OrchestratorConfig::from_env();
    let analyzer = Arc::new(FakeAnalyzer::succeeding(sample_analysis_record()));
    let image_synthesizer = Arc::new(FakeImageSynthesizer::succeeding());
    let text_synthesizer = Arc::new(FakeTextSynthesizer::succeeding());
    let time = Arc::new(SystemTimeProvider);
    let ids = Arc::new(UuidProvider);

    Orchestrator::new(config, analyzer, image_synthesizer, text_synthesizer, time, ids)
}

fn sample_analysis_record() -> AnalysisRecord {
    AnalysisRecord {
        category: "general".to_string(),
        palette: ColorPalette {
            primary_hex: "#336699".to_string(),
            secondary_hex: vec!["#FFFFFF".to_string()],
            full_palette_hex: vec!["#336699".to_string(), "#FFFFFF".to_string()],
        },
        shape: ShapeType::Rectangular,
        dimensions: Dimensions {
            width_ratio: 1.0,
            height_ratio: 1.0,
            depth_ratio: 0.3,
        },
        texture: SurfaceTexture::Matte,
        confidence: 0.75,
    }
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("genorch=info"))
        .expect("failed to build env filter");

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().pretty())
        .init();
}

fn print_job_state(job_id: &str, state: JobState) {
    let label = match state {
        JobState::Pending => state.to_string().yellow(),
        JobState::Processing => state.to_string().cyan(),
        JobState::Completed => state.to_string().green(),
        JobState::Failed => state.to_string().red(),
    };
    println!("  {} {}", "Job:".bold(), job_id);
    println!("  {} {}", "State:".bold(), label);
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let orchestrator = build_orchestrator();
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit {
            image,
            brand_name,
            product_name,
            package_variations,
            ad_platforms,
            skip_packages,
            skip_ads,
            skip_texts,
            wait,
        } => {
            let image_bytes = fs::read(&image)
                .with_context(|| format!("failed to read image at {}", image.display()))?;

            let mut options = SubmitOptions {
                brand_name,
                product_name,
                package_variations,
                skip_packages,
                skip_ads,
                skip_texts,
                ..SubmitOptions::default()
            };
            if let Some(platforms) = ad_platforms {
                options.ad_platforms = platforms;
            }

            let outcome = orchestrator.submit(image_bytes, options)?;
            info!(job_id = %outcome.job_id, "job submitted");

            println!("{}", "Job submitted".green().bold());
            print_job_state(&outcome.job_id, outcome.current_status);
            println!("  {} {}s", "Estimated:".bold(), outcome.estimated_seconds);

            if wait {
                match orchestrator
                    .wait_for_completion(&outcome.job_id, Duration::from_secs(60))
                    .await
                {
                    Ok(WaitOutcome::Completed(job)) => {
                        println!();
                        println!("{}", "Completed".green().bold());
                        print_job_state(&job.id, job.state);
                        if let Some(result) = &job.result {
                            if let Some(url) = &result.download_url {
                                println!("  {} {}", "Download:".bold(), url);
                            }
                        }
                    }
                    Ok(WaitOutcome::Failed(job)) => {
                        println!();
                        println!("{}", "Failed".red().bold());
                        print_job_state(&job.id, job.state);
                        if let Some(reason) = &job.error {
                            println!("  {} {}", "Reason:".bold(), reason);
                        }
                    }
                    Err(e) => anyhow::bail!("wait failed: {:?}", e),
                }
            }
        }

        Commands::Status { job_id } => match orchestrator.get_status(&job_id) {
            Some(job) => {
                print_job_state(&job.id, job.state);
                println!("  {} {:?}", "Progress:".bold(), job.progress);
            }
            None => println!("{}", "Job not found".yellow()),
        },

        Commands::List => {
            let jobs = orchestrator.list_jobs();
            if jobs.is_empty() {
                println!("{}", "No jobs".yellow());
            } else {
                for job in jobs {
                    print_job_state(&job.id, job.state);
                }
            }
        }

        Commands::Cancel { job_id } => {
            if orchestrator.cancel_job(&job_id) {
                println!("{}", format!("Job {} cancelled", job_id).green().bold());
            } else {
                println!("{}", "Job not found or already terminal".yellow());
            }
        }

        Commands::Delete { job_id } => {
            if orchestrator.delete_job(&job_id) {
                println!("{}", format!("Job {} deleted", job_id).green().bold());
            } else {
                println!("{}", "Job not found".yellow());
            }
        }

        Commands::Wait {
            job_id,
            timeout_seconds,
        } => {
            match orchestrator
                .wait_for_completion(&job_id, Duration::from_secs(timeout_seconds))
                .await
            {
                Ok(WaitOutcome::Completed(job)) => print_job_state(&job.id, job.state),
                Ok(WaitOutcome::Failed(job)) => print_job_state(&job.id, job.state),
                Err(e) => anyhow::bail!("wait failed: {:?}", e),
            }
        }

        Commands::SystemStatus => {
            let status = orchestrator.system_status();
            println!("{}", "System Status".cyan().bold());
            println!(
                "  {} {}/{}",
                "Active:".bold(),
                status.active_count,
                status.max_concurrent
            );
            println!("  {} {}", "Total jobs:".bold(), status.total_jobs);
        }
    }

    Ok(())
}
