//! Operator CLI for the LP bot engine.
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use lpbot_data::repositories::Database;
use lpbot_domain::eligibility::ActiveBin;
use lpbot_domain::entities::TickRange;
use lpbot_domain::enums::{Chain, Network};
use lpbot_domain::exit::{ExitBand, ExitThresholds};
use lpbot_protocols::retry::RetryPolicy;
use lpbot_protocols::rpc::{
    BalancerConfig, EndpointGroups, JsonRpcClient, JsonRpcError, RpcEndpointBalancer, health_method,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lpbot")]
#[command(about = "LP bot position engine tools", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a position may be opened at the current tick
    Eligibility {
        /// Current pool tick
        #[arg(long, allow_hyphen_values = true)]
        current_tick: i32,

        /// Pool tick spacing
        #[arg(long)]
        tick_spacing: i32,

        /// Retain token B instead of token A
        #[arg(long)]
        priority_b: bool,
    },
    /// Evaluate the exit ladder for a position
    ExitCheck {
        /// Lower tick of the position
        #[arg(long, allow_hyphen_values = true)]
        tick_lower: i32,

        /// Upper tick of the position
        #[arg(long, allow_hyphen_values = true)]
        tick_upper: i32,

        /// Pool fee as a fraction (0.003 = 30 bps)
        #[arg(long)]
        fee: Decimal,

        /// Oracle price of token A in token B
        #[arg(long)]
        oracle_price: Decimal,

        #[arg(long, default_value_t = 9)]
        decimals_a: u8,

        #[arg(long, default_value_t = 9)]
        decimals_b: u8,

        /// Retain token B instead of token A
        #[arg(long)]
        priority_b: bool,
    },
    /// Ping every configured RPC endpoint of a chain/network
    RpcPing {
        #[arg(long, default_value = "solana")]
        chain: Chain,

        #[arg(long, default_value = "mainnet")]
        network: Network,

        /// Attempts per endpoint before failing over
        #[arg(long, default_value_t = 2)]
        retries: u32,
    },
    /// Create the database schema
    Migrate {
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Eligibility {
            current_tick,
            tick_spacing,
            priority_b,
        } => {
            let bin = ActiveBin::new(current_tick, tick_spacing)?;
            let bounds = bin.tick_bounds();
            let priority_a_over_b = !priority_b;

            println!("📐 Active bin: [{}, {})", bounds.lower(), bounds.upper());
            println!(
                "   Distance to far bound: {} (threshold {})",
                bin.tick_distance_to_far_bound(priority_a_over_b),
                bin.deviation_threshold()
            );
            if bin.can_open_position(priority_a_over_b) {
                println!("✅ Position can be opened");
            } else {
                println!("⛔ Too close to the far bound, not opening");
            }
        }
        Commands::ExitCheck {
            tick_lower,
            tick_upper,
            fee,
            oracle_price,
            decimals_a,
            decimals_b,
            priority_b,
        } => {
            let range = TickRange::new(tick_lower, tick_upper)?;
            let band = ExitBand::from_ticks(
                range,
                decimals_a,
                decimals_b,
                fee,
                ExitThresholds::default(),
            )?;

            println!("{:<12} | {:<14} | {:<14}", "Band", "Lower", "Upper");
            println!("{}", "-".repeat(46));
            println!("{:<12} | {:<14.6} | {:<14.6}", "raw", band.price_lower, band.price_upper);
            println!(
                "{:<12} | {:<14.6} | {:<14.6}",
                "effective", band.effective_lower, band.effective_upper
            );
            println!("{:<12} | {:<14.6} | {:<14.6}", "soft", band.soft_lower, band.soft_upper);
            println!("{:<12} | {:<14.6} | {:<14.6}", "hard", band.hard_lower, band.hard_upper);
            println!();
            let decision = band.decide(oracle_price, !priority_b);
            println!("🧭 Decision at {oracle_price}: {decision:?}");
        }
        Commands::RpcPing {
            chain,
            network,
            retries,
        } => {
            let groups = EndpointGroups::from_env();
            let group = EndpointGroups::group_name(chain, network);
            let Some(urls) = groups.get(&group) else {
                let var = group.to_uppercase().replace('-', "_");
                bail!("no endpoints configured; set RPC_ENDPOINTS_{var}");
            };
            info!(group = %group, endpoints = urls.len(), "Pinging endpoints");

            let balancer = RpcEndpointBalancer::try_new(
                &groups,
                BalancerConfig::default(),
                |url: &str| JsonRpcClient::new(url),
            )
            .context("building RPC clients")?;
            let policy = RetryPolicy::fixed(retries.saturating_sub(1), Duration::from_millis(250));
            let method = health_method(chain);

            let started = Instant::now();
            let (url, head) = balancer
                .with_client(&group, &policy, |client: Arc<JsonRpcClient>| async move {
                    let head: serde_json::Value = client.call(method, Vec::<()>::new()).await?;
                    Ok::<_, JsonRpcError>((client.url().to_string(), head))
                })
                .await?;
            println!("✅ {url} answered {method} = {head} in {:?}", started.elapsed());

            println!("{:<50} | {:>10}", "Endpoint", "Score");
            println!("{}", "-".repeat(63));
            for url in balancer.urls(&group).unwrap_or_default() {
                println!("{:<50} | {:>10.1}", url, balancer.score(url));
            }
        }
        Commands::Migrate { database_url } => {
            let db = Database::connect(&database_url).await?;
            db.migrate().await?;
            println!("✅ Schema is up to date");
        }
    }

    Ok(())
}
