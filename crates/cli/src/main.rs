//! Bazaar CLI - browse the catalog and manage a cart from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # List products, optionally filtered
//! bazaar catalog
//! bazaar catalog --search mug --category kitchen
//!
//! # Type-ahead suggestions
//! bazaar suggest mu
//!
//! # Guest cart (stored in $BAZAAR_DATA_DIR)
//! bazaar cart add 64f1c2
//! bazaar cart set 64f1c2 3
//! bazaar cart show
//!
//! # Log in: the guest cart is merged into the account's cart
//! bazaar login --token "$TOKEN"
//!
//! # Wishlist
//! bazaar wishlist add 64f1c2
//! bazaar wishlist move-to-cart 64f1c2
//! ```
//!
//! # Commands
//!
//! - `catalog` - List and search products
//! - `suggest` - Top matches for a partial query
//! - `cart` - Show and edit the cart
//! - `wishlist` - Show and edit the wishlist
//! - `login` / `logout` - Manage the session
//!
//! Every run loads the session, executes one command, confirms any pending
//! quantity change with the server and prints the result.

#![cfg_attr(not(test), forbid(unsafe_code))]

use bazaar_storefront::{Storefront, StorefrontConfig};
use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "bazaar")]
#[command(author, version, about = "Bazaar storefront CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the product catalog
    Catalog {
        /// Only products whose name or category contains this text
        #[arg(short, long)]
        search: Option<String>,
        /// Only products in this category (id or name)
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Show the first few products matching a partial query
    Suggest { query: String },
    /// Show and edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Show and edit the wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
    /// Log in with a bearer token issued by the server
    Login {
        /// Bearer token
        #[arg(short, long)]
        token: String,
    },
    /// Log out; the cart is kept as a guest cart
    Logout,
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the cart
    Show,
    /// Add one unit of a catalog product
    Add { product_id: String },
    /// Set the quantity of a line (at least 1)
    Set { product_id: String, quantity: u32 },
    /// Add one unit to a line
    Inc { product_id: String },
    /// Take one unit off a line (stops at 1)
    Dec { product_id: String },
    /// Remove a line
    Remove { product_id: String },
    /// Remove every line
    Clear,
}

#[derive(Subcommand)]
enum WishlistAction {
    /// Print the wishlist
    Show,
    /// Save a catalog product
    Add { product_id: String },
    /// Drop a saved product
    Remove { product_id: String },
    /// Drop every saved product
    Clear,
    /// Add a saved product to the cart and drop it from the wishlist
    MoveToCart { product_id: String },
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
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load configuration from environment (needed for Sentry init)
    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Failed to load configuration: {e}");
            }
            std::process::exit(2);
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    // Logs go to stderr; stdout carries command output only
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bazaar_storefront=info,bazaar_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), commands::CommandError> {
    let storefront = Storefront::open(config)?;
    let mut events = storefront.cart().subscribe();

    // A rejected token has already been dropped; carry on as a guest
    if let Err(e) = storefront.cart().initialize().await {
        tracing::warn!(error = %e, "Could not load the account cart");
    }

    let outcome = dispatch(&storefront, cli.command).await;

    storefront.cart().flush_pending().await;
    commands::report_sync_failures(&mut events);

    outcome
}

async fn dispatch(storefront: &Storefront, command: Commands) -> Result<(), commands::CommandError> {
    match command {
        Commands::Catalog { search, category } => {
            commands::catalog::list(storefront, search.as_deref(), category.as_deref()).await
        }
        Commands::Suggest { query } => commands::catalog::suggest(storefront, &query).await,
        Commands::Cart { action } => {
            match action {
                CartAction::Show => {}
                CartAction::Add { product_id } => {
                    commands::cart::add(storefront, &product_id).await?;
                }
                CartAction::Set {
                    product_id,
                    quantity,
                } => commands::cart::set(storefront, &product_id, quantity)?,
                CartAction::Inc { product_id } => commands::cart::inc(storefront, &product_id)?,
                CartAction::Dec { product_id } => commands::cart::dec(storefront, &product_id)?,
                CartAction::Remove { product_id } => {
                    commands::cart::remove(storefront, &product_id).await?;
                }
                CartAction::Clear => storefront.cart().clear_cart().await?,
            }
            // Print after confirming so the output shows what the server kept
            storefront.cart().flush_pending().await;
            commands::cart::print(&storefront.cart().state());
            Ok(())
        }
        Commands::Wishlist { action } => {
            match action {
                WishlistAction::Show => {}
                WishlistAction::Add { product_id } => {
                    commands::wishlist::add(storefront, &product_id).await?;
                }
                WishlistAction::Remove { product_id } => {
                    commands::wishlist::remove(storefront, &product_id)?;
                }
                WishlistAction::Clear => storefront.wishlist().clear(),
                WishlistAction::MoveToCart { product_id } => {
                    commands::wishlist::move_to_cart(storefront, &product_id).await?;
                }
            }
            commands::wishlist::print(&storefront.wishlist().items());
            Ok(())
        }
        Commands::Login { token } => commands::session::login(storefront, token).await,
        Commands::Logout => {
            commands::session::logout(storefront);
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_cart_set() {
        let cli = Cli::try_parse_from(["bazaar", "cart", "set", "p1", "3"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Cart {
                action: CartAction::Set { quantity: 3, .. }
            })
        ));
    }

    #[test]
    fn test_parse_move_to_cart() {
        let cli = Cli::try_parse_from(["bazaar", "wishlist", "move-to-cart", "p1"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::Wishlist {
                action: WishlistAction::MoveToCart { .. }
            })
        ));
    }

    #[test]
    fn test_parse_catalog_filters() {
        let cli = Cli::try_parse_from(["bazaar", "catalog", "--search", "mug", "--category", "c1"])
            .unwrap();
        match cli.command {
            Commands::Catalog { search, category } => {
                assert_eq!(search.as_deref(), Some("mug"));
                assert_eq!(category.as_deref(), Some("c1"));
            }
            _ => panic!("expected catalog command"),
        }

        let cli = Cli::try_parse_from(["bazaar", "catalog"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Catalog {
                search: None,
                category: None
            }
        ));
    }

    #[test]
    fn test_login_requires_token() {
        assert!(Cli::try_parse_from(["bazaar", "login"]).is_err());
    }
}
