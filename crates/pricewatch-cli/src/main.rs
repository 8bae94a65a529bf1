use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use pricewatch_client::{HybridEngine, SiteFetcher};
use pricewatch_core::cache::AggregateCache;
use pricewatch_core::classify::{ComplianceChecker, ViolationStatus, classify};
use pricewatch_core::dispatcher::JobDispatcher;
use pricewatch_core::job::{CreateJobRequest, JobStatus};
use pricewatch_core::matcher::find_candidates;
use pricewatch_db::{Database, DatabaseConfig};

#[derive(Parser)]
#[command(name = "pricewatch", version, about = "Price-cap compliance monitor")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scrape job against a site and wait for it to finish
    Run {
        /// Site to scrape
        #[arg(short, long)]
        site: Uuid,

        /// Job name (defaults to the site name)
        #[arg(short, long)]
        name: Option<String>,

        /// Search-term list to use instead of the active catalog names
        #[arg(short, long)]
        term_list: Option<Uuid>,

        /// Allow fetching private/loopback addresses (local testing)
        #[arg(long, default_value_t = false)]
        allow_private: bool,
    },

    /// Start every due job: auto-start pending jobs and elapsed schedules
    RunDue {
        #[arg(long, default_value_t = false)]
        allow_private: bool,
    },

    /// Re-check recent scraped listings against the regulated catalog
    CheckAll {
        /// Number of recent listings to check (all when omitted)
        #[arg(short, long)]
        limit: Option<i64>,

        /// Classify and print without writing reports or violations
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// List scrape jobs
    Jobs {
        /// Filter by status (pending, scheduled, running, completed, failed, cancelled)
        #[arg(short, long)]
        status: Option<String>,

        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },

    /// Show the latest log entries for a job
    Logs {
        /// Job id
        #[arg(short, long)]
        job: Uuid,

        #[arg(short, long, default_value_t = 50)]
        limit: i64,
    },

    /// Cancel a pending, scheduled or running job
    Cancel {
        /// Job id
        #[arg(short, long)]
        job: Uuid,
    },

    /// List violations
    Violations {
        /// Filter by status (pending, confirmed, dismissed)
        #[arg(short, long)]
        status: Option<String>,

        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },

    /// Confirm a pending violation
    Confirm {
        /// Violation id
        id: Uuid,
    },

    /// Dismiss a pending violation
    Dismiss {
        /// Violation id
        id: Uuid,
    },

    /// Violation totals and proposed penalties
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pricewatch=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            site,
            name,
            term_list,
            allow_private,
        } => {
            let db = connect_db().await?;
            cmd_run(&db, site, name, term_list, allow_private).await?;
        }
        Commands::RunDue { allow_private } => {
            let db = connect_db().await?;
            cmd_run_due(&db, allow_private).await?;
        }
        Commands::CheckAll { limit, dry_run } => {
            let db = connect_db().await?;
            cmd_check_all(&db, limit, dry_run).await?;
        }
        Commands::Jobs { status, limit } => {
            let db = connect_db().await?;
            cmd_jobs(&db, status, limit).await?;
        }
        Commands::Logs { job, limit } => {
            let db = connect_db().await?;
            cmd_logs(&db, job, limit).await?;
        }
        Commands::Cancel { job } => {
            let db = connect_db().await?;
            cmd_cancel(&db, job).await?;
        }
        Commands::Violations { status, limit } => {
            let db = connect_db().await?;
            cmd_violations(&db, status, limit).await?;
        }
        Commands::Confirm { id } => {
            let db = connect_db().await?;
            let violation = db
                .violation_repo()
                .confirm(id)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            println!("Confirmed violation {} ({})", violation.id, violation.severity);
        }
        Commands::Dismiss { id } => {
            let db = connect_db().await?;
            let violation = db
                .violation_repo()
                .dismiss(id)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            println!("Dismissed violation {}", violation.id);
        }
        Commands::Stats => {
            let db = connect_db().await?;
            cmd_stats(&db).await?;
        }
    }

    Ok(())
}

/// Connect using DATABASE_URL and apply pending migrations.
async fn connect_db() -> Result<Database> {
    let config = DatabaseConfig::from_env().map_err(|e| anyhow::anyhow!(e))?;
    let db = Database::connect(&config)
        .await
        .context("Failed to connect to database")?;
    db.migrate().await.map_err(|e| anyhow::anyhow!(e))?;
    Ok(db)
}

fn build_dispatcher(
    db: &Database,
    allow_private: bool,
) -> Result<
    JobDispatcher<
        HybridEngine<SiteFetcher>,
        pricewatch_db::SiteRepository,
        pricewatch_db::CatalogRepository,
        pricewatch_db::ScrapedProductRepository,
        pricewatch_db::ViolationRepository,
        pricewatch_db::JobRepository,
    >,
> {
    let mut fetcher = SiteFetcher::new().map_err(|e| anyhow::anyhow!(e))?;
    if allow_private {
        fetcher = fetcher.allow_private_urls();
    }
    Ok(JobDispatcher::new(
        HybridEngine::new(fetcher),
        db.site_repo(),
        db.catalog_repo(),
        db.product_repo(),
        db.violation_repo(),
        db.job_repo(),
        AggregateCache::new(),
    ))
}

async fn cmd_run(
    db: &Database,
    site_id: Uuid,
    name: Option<String>,
    term_list: Option<Uuid>,
    allow_private: bool,
) -> Result<()> {
    let site = db
        .site_repo()
        .get(site_id)
        .await
        .map_err(|e| anyhow::anyhow!(e))?
        .with_context(|| format!("No site with id {site_id}"))?;

    let mut request = CreateJobRequest::new(
        name.unwrap_or_else(|| site.name.clone()),
        site.id,
        site.marketplace,
    );
    if let Some(list_id) = term_list {
        request = request.with_term_list(list_id);
    }

    let job = db
        .job_repo()
        .create(&request)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!(job_id = %job.id, site = %site.name, "Job created");

    let dispatcher = build_dispatcher(db, allow_private)?;
    let handle = dispatcher
        .submit(job)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    let counters = handle
        .task
        .await
        .context("Job task panicked")?
        .map_err(|e| anyhow::anyhow!(e))?;

    println!("{}", counters.summary());
    Ok(())
}

async fn cmd_run_due(db: &Database, allow_private: bool) -> Result<()> {
    let dispatcher = build_dispatcher(db, allow_private)?;
    let handles = dispatcher
        .run_due()
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if handles.is_empty() {
        println!("No jobs due");
        return Ok(());
    }

    println!("Started {} job(s)", handles.len());
    for handle in handles {
        let job_id = handle.job_id;
        match handle.task.await.context("Job task panicked")? {
            Ok(counters) => println!("  {job_id}: {}", counters.summary()),
            Err(e) => println!("  {job_id}: FAILED — {e}"),
        }
    }
    Ok(())
}

async fn cmd_check_all(db: &Database, limit: Option<i64>, dry_run: bool) -> Result<()> {
    let catalog = db
        .catalog_repo()
        .list_active()
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    if catalog.is_empty() {
        bail!("No active regulated products to check against");
    }

    let listings = db
        .product_repo()
        .list_recent(limit)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    let checker = ComplianceChecker::new(db.violation_repo(), AggregateCache::new());

    let mut violations = 0usize;
    let mut compliant = 0usize;
    let mut unmatched = 0usize;

    for scraped in &listings {
        match find_candidates(&scraped.product_name, &catalog).first() {
            Some(candidate) => {
                let assessment = classify(&candidate.product, scraped.listed_price);
                if assessment.has_violation {
                    violations += 1;
                    println!(
                        "VIOLATION  {} — Rs.{:.2} vs cap Rs.{:.2} ({:+.1}%, {})",
                        scraped.product_name,
                        scraped.listed_price,
                        candidate.product.violation_threshold(),
                        assessment.percentage_difference,
                        assessment.severity.map(|s| s.as_str()).unwrap_or("-"),
                    );
                } else {
                    compliant += 1;
                }
                if !dry_run {
                    checker
                        .check_pair(&candidate.product, scraped)
                        .await
                        .map_err(|e| anyhow::anyhow!(e))?;
                }
            }
            None => {
                unmatched += 1;
                if !dry_run {
                    checker
                        .record_no_match(scraped)
                        .await
                        .map_err(|e| anyhow::anyhow!(e))?;
                }
            }
        }
    }

    println!(
        "Checked {} listing(s): {} violation(s), {} compliant, {} unmatched{}",
        listings.len(),
        violations,
        compliant,
        unmatched,
        if dry_run { " (dry run)" } else { "" },
    );
    Ok(())
}

async fn cmd_jobs(db: &Database, status: Option<String>, limit: i64) -> Result<()> {
    let status = status
        .map(|s| s.parse::<JobStatus>().map_err(|e| anyhow::anyhow!(e)))
        .transpose()?;
    let jobs = db
        .job_repo()
        .list_jobs(status, limit)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if jobs.is_empty() {
        println!("No jobs");
        return Ok(());
    }

    for job in jobs {
        println!(
            "{}  [{}] {} — scraped {}, found {}, errors {}{}",
            job.id,
            job.status,
            job.name,
            job.products_scraped,
            job.products_found,
            job.errors_count,
            job.error_message
                .map(|m| format!(" ({m})"))
                .unwrap_or_default(),
        );
    }
    Ok(())
}

async fn cmd_logs(db: &Database, job_id: Uuid, limit: i64) -> Result<()> {
    let logs = db
        .job_repo()
        .tail_logs(job_id, limit)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if logs.is_empty() {
        println!("No log entries for job {job_id}");
        return Ok(());
    }

    // tail_logs returns newest first; print oldest first
    for entry in logs.iter().rev() {
        println!(
            "{} [{}] {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            entry.level,
            entry.message,
        );
    }
    Ok(())
}

async fn cmd_cancel(db: &Database, job_id: Uuid) -> Result<()> {
    let repo = db.job_repo();
    let job = repo
        .get(job_id)
        .await
        .map_err(|e| anyhow::anyhow!(e))?
        .with_context(|| format!("No job with id {job_id}"))?;

    if !job.status.is_cancellable() {
        bail!("Job {} is already {}", job_id, job.status);
    }

    repo.cancel(job_id).await.map_err(|e| anyhow::anyhow!(e))?;
    println!("Cancelled job {job_id}");
    Ok(())
}

async fn cmd_violations(db: &Database, status: Option<String>, limit: i64) -> Result<()> {
    let status = status
        .map(|s| s.parse::<ViolationStatus>().map_err(|e| anyhow::anyhow!(e)))
        .transpose()?;
    let violations = db
        .violation_repo()
        .list_violations(status, limit)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    if violations.is_empty() {
        println!("No violations");
        return Ok(());
    }

    for violation in violations {
        println!(
            "{}  [{}] {} — Rs.{:.0} proposed ({})",
            violation.id,
            violation.status,
            violation.severity,
            violation.proposed_penalty,
            violation.created_at.format("%Y-%m-%d"),
        );
    }
    Ok(())
}

async fn cmd_stats(db: &Database) -> Result<()> {
    let stats = db
        .violation_repo()
        .stats()
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    println!("Violations: {} total", stats.total);
    println!("  pending:   {}", stats.pending);
    println!("  confirmed: {}", stats.confirmed);
    println!("  dismissed: {}", stats.dismissed);
    println!(
        "Proposed penalties (pending + confirmed): Rs.{:.0}",
        stats.total_proposed_penalty
    );
    Ok(())
}
