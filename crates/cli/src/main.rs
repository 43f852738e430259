//! Pocket Store CLI - Shopping flows from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Browse the catalog
//! pocket-store catalog
//!
//! # Create an account, then buy two mugs and a hat
//! pocket-store signup -n "Ada" -e ada@example.com -p hunter22
//! pocket-store checkout --item mug --item mug --item hat \
//!     --name "Ada" --phone 555-0100 --street "1 Main St" \
//!     --city Springfield --state CA --postal-code 90210
//!
//! # See what you ordered
//! pocket-store orders
//! ```
//!
//! # Commands
//!
//! - `catalog` - List products, or show one with `--details`
//! - `product add` - Upload an image and publish a product
//! - `signup`, `login`, `logout` - Account management
//! - `profile show|rename|photo` - Profile stored on this device
//! - `orders` - Order history of the signed-in user
//! - `checkout` - Build a cart from product IDs and submit it
//! - `buy-now` - Submit a single product
//!
//! The signed-in session is kept in device storage between runs.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pocket_store_core::Address;
use pocket_store_storefront::config::StorefrontConfig;
use pocket_store_storefront::error::AppError;

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(name = "pocket-store")]
#[command(author, version, about = "Pocket Store shopping CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the product catalog
    Catalog {
        /// Show a single product instead of the list
        #[arg(short, long)]
        details: Option<String>,
    },

    /// Product management
    Product {
        #[command(subcommand)]
        action: ProductAction,
    },

    /// Create an account and sign in
    Signup {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Sign in to an existing account
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Sign out and forget the profile on this device
    Logout,

    /// Profile stored on this device
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Show the signed-in user's orders, newest first
    Orders,

    /// Submit a cart built from product IDs
    Checkout {
        /// Product ID to add; repeat to raise the quantity
        #[arg(short, long = "item", required = true)]
        items: Vec<String>,

        #[command(flatten)]
        address: AddressArgs,
    },

    /// Submit one unit of a product straight away
    BuyNow {
        /// Product ID
        product_id: String,

        #[command(flatten)]
        address: AddressArgs,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// Upload an image and add a product to the catalog
    Add {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        description: String,

        /// Price as typed, e.g. "12.50"
        #[arg(short, long)]
        price: String,

        /// Local image file
        #[arg(short, long)]
        image: PathBuf,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Show the stored profile
    Show,

    /// Change the display name
    Rename { name: String },

    /// Set the profile photo URI
    Photo { uri: String },
}

/// Shipping address flags.
#[derive(Args)]
struct AddressArgs {
    /// Recipient name
    #[arg(long)]
    name: String,

    #[arg(long)]
    phone: String,

    #[arg(long)]
    street: String,

    #[arg(long)]
    city: String,

    #[arg(long)]
    state: String,

    #[arg(long)]
    postal_code: String,
}

impl From<AddressArgs> for Address {
    fn from(args: AddressArgs) -> Self {
        Self {
            recipient_name: args.name,
            phone: args.phone,
            street: args.street,
            city: args.city,
            state: args.state,
            postal_code: args.postal_code,
        }
    }
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

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load .env early so RUST_LOG from it applies to the subscriber
    dotenvy::dotenv().ok();

    // Sentry must be initialized before the tracing subscriber
    let config = StorefrontConfig::from_env();
    let sentry_guard = config.as_ref().ok().and_then(init_sentry);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pocket_store_cli=info,pocket_store_storefront=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        e.report();
        tracing::error!("Command failed: {}", e.user_message());
        drop(sentry_guard);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), AppError> {
    let ctx = Context::open(config).await?;

    let result = match cli.command {
        Commands::Catalog { details } => commands::shop::catalog(&ctx, details.as_deref()).await,
        Commands::Product { action } => match action {
            ProductAction::Add {
                name,
                description,
                price,
                image,
            } => commands::shop::add_product(&ctx, name, description, price, image).await,
        },
        Commands::Signup {
            name,
            email,
            password,
        } => commands::account::sign_up(&ctx, &name, &email, password).await,
        Commands::Login { email, password } => {
            commands::account::log_in(&ctx, &email, password).await
        }
        Commands::Logout => commands::account::log_out(&ctx).await,
        Commands::Profile { action } => match action {
            ProfileAction::Show => commands::account::show_profile(&ctx).await,
            ProfileAction::Rename { name } => commands::account::rename(&ctx, &name).await,
            ProfileAction::Photo { uri } => commands::account::set_photo(&ctx, &uri).await,
        },
        Commands::Orders => commands::shop::orders(&ctx).await,
        Commands::Checkout { items, address } => {
            commands::shop::checkout(&ctx, &items, &address.into()).await
        }
        Commands::BuyNow {
            product_id,
            address,
        } => commands::shop::buy_now(&ctx, &product_id, &address.into()).await,
    };

    // Token refreshes during the command rotate the stored session
    ctx.save_session().await?;
    result
}
