//! Emporium CLI - Terminal storefront client.
//!
//! # Usage
//!
//! ```bash
//! # Browse the catalog
//! emporium products --category shoes --max-price 120 --sort priceAsc
//! emporium product 42
//!
//! # Cart and wishlist (persisted under EMPORIUM_STORAGE_DIR)
//! emporium cart add 42 --quantity 2
//! emporium cart show
//! emporium wishlist toggle 42
//!
//! # Account (password read from EMPORIUM_PASSWORD or stdin)
//! emporium login -e ada@example.com
//! emporium orders
//! emporium checkout --address-id 3
//! emporium logout
//!
//! # JSON logs for shipping to a collector
//! emporium --json-logs products
//! ```
//!
//! # Environment Variables
//!
//! - `EMPORIUM_API_BASE_URL` - Remote API base URL (required)
//! - `RUST_LOG` - Log filter (default `info`)
//! - `SENTRY_DSN` - Enables error reporting when set

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use emporium_storefront::{Storefront, StorefrontConfig};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{CartAction, CatalogArgs, CommandError, WishlistAction};

#[derive(Parser)]
#[command(name = "emporium")]
#[command(author, version, about = "Emporium storefront client")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List products matching filters
    Products(CatalogArgs),
    /// Show one product
    Product {
        /// Product ID
        id: i64,
    },
    /// List categories
    Categories,
    /// Show or change the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Show or change the wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
    /// Sign in
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Sign out
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List your orders
    Orders {
        /// Only orders with this status
        #[arg(short, long)]
        status: Option<String>,

        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// Order the cart's contents
    Checkout {
        /// Saved address to ship to
        #[arg(short, long)]
        address_id: i64,

        /// Saved payment method to charge
        #[arg(short = 'm', long)]
        payment_method_id: Option<i64>,
    },
    /// Cancel a pending order
    Cancel {
        /// Order ID
        id: i64,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Install the tracing subscriber. Logs go to stderr; stdout carries output.
fn init_tracing(json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
    });
    let text_layer =
        (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(cli.json_logs);
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing(cli.json_logs);

    if let Err(e) = run(cli.command, config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: StorefrontConfig) -> Result<(), CommandError> {
    let storefront = Storefront::from_config(config)?;
    let mut out = std::io::stdout().lock();

    match command {
        Commands::Products(args) => commands::catalog::products(&storefront, args, &mut out).await,
        Commands::Product { id } => commands::catalog::product(&storefront, id, &mut out).await,
        Commands::Categories => commands::catalog::categories(&storefront, &mut out).await,
        Commands::Cart { action } => commands::cart::run(&storefront, action, &mut out).await,
        Commands::Wishlist { action } => {
            commands::cart::wishlist(&storefront, action, &mut out).await
        }
        Commands::Login { email } => commands::account::login(&storefront, &email, &mut out).await,
        Commands::Logout => {
            storefront.logout().await;
            Ok(())
        }
        Commands::Whoami => commands::account::whoami(&storefront, &mut out).await,
        Commands::Orders { status, page } => {
            commands::orders::list(&storefront, status.as_deref(), page, &mut out).await
        }
        Commands::Checkout {
            address_id,
            payment_method_id,
        } => commands::orders::checkout(&storefront, address_id, payment_method_id, &mut out).await,
        Commands::Cancel { id } => commands::orders::cancel(&storefront, id, &mut out).await,
    }
}
