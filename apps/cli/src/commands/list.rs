//! # Current List Commands
//!
//! Each command opens a `ShoppingSession` on the store, so list changes go
//! through the optimistic apply/revert path exactly as an interactive UI
//! would drive it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use clap::Subcommand;
use tracing::{info, warn};

use panier_core::{DestructiveAction, ListView, ProductId, StoreId};
use panier_sync::{ChangeFeed, FeedConfig, ShoppingSession, ViewObserver};

use crate::prompt;
use crate::state::AppState;

#[derive(Subcommand, Debug)]
pub enum ListCommand {
    /// Show the current list and the available products
    Show { store: StoreId },

    /// Put a product on the list (quantity 1)
    Add { store: StoreId, product: ProductId },

    /// Take a product off the list
    Remove { store: StoreId, product: ProductId },

    /// Set a product's quantity (0 takes it off the list)
    Qty {
        store: StoreId,
        product: ProductId,
        quantity: i64,
    },

    /// Take every product off the list without saving it
    Clear { store: StoreId },

    /// Delete a product from the store
    Delete { store: StoreId, product: ProductId },

    /// Save the current list and write its PDF
    Save {
        store: StoreId,
        /// Output directory (default: [export] output_dir, then Downloads)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Follow remote changes and reprint the list on each one
    Watch { store: StoreId },
}

/// Prints the view on every change.
struct PrintObserver;

impl ViewObserver for PrintObserver {
    fn render(&self, view: &ListView) {
        print_view(view);
    }
}

fn print_view(view: &ListView) {
    println!("Liste de courses");
    if view.in_list().is_empty() {
        println!("  (vide)");
    }
    for product in view.in_list() {
        println!(
            "  {:>5}  {:<30} {:>3} x {:>10} = {:>10}",
            product.id,
            product.name,
            product.quantity,
            product.price().to_string(),
            product.line_total().to_string()
        );
    }
    println!("  Total: {}", view.total());

    println!("Produits disponibles");
    for product in view.available() {
        println!(
            "  {:>5}  {:<30} {:>10}",
            product.id,
            product.name,
            product.price().to_string()
        );
    }
}

pub async fn run(state: &AppState, command: ListCommand) -> anyhow::Result<()> {
    match command {
        ListCommand::Show { store } => {
            let session = state.session(store).await?;
            print_view(&session.view());
        }
        ListCommand::Add { store, product } => {
            let session = state.session(store).await?;
            session.add_to_list(product).await?;
            print_view(&session.view());
        }
        ListCommand::Remove { store, product } => {
            let session = state.session(store).await?;
            session.remove_from_list(product).await?;
            print_view(&session.view());
        }
        ListCommand::Qty {
            store,
            product,
            quantity,
        } => {
            let session = state.session(store).await?;
            session.change_quantity(product, quantity).await?;
            print_view(&session.view());
        }
        ListCommand::Clear { store } => {
            let session = state.session(store).await?;
            let kept = session.clear_list().await;
            print_view(&session.view());
            if !kept.is_empty() {
                bail!("{} produit(s) n'ont pas pu être retirés de la liste", kept.len());
            }
        }
        ListCommand::Delete { store, product } => {
            let session = state.session(store).await?;
            let confirmation =
                prompt::confirm(DestructiveAction::DeleteProduct { product_id: product })?;
            session.delete_product(product, &confirmation).await?;
        }
        ListCommand::Save { store, out } => {
            let session = state.session(store).await?;
            let dir = out.unwrap_or_else(|| state.config.export_dir());
            let saved = session.save_list(&dir).await?;

            println!(
                "Liste {} du {} (semaine {}) : {}",
                saved.list.id,
                saved.list.created_at.format("%d/%m/%Y"),
                saved.list.week_number,
                saved.list.total()
            );
            if let Some(path) = saved.pdf_path {
                println!("PDF : {}", path.display());
            }
        }
        ListCommand::Watch { store } => watch(state, store).await?,
    }
    Ok(())
}

/// Keeps the list on screen in step with remote changes until Ctrl-C.
async fn watch(state: &AppState, store_id: StoreId) -> anyhow::Result<()> {
    if !state.config.realtime.enabled {
        bail!("Realtime updates are disabled ([realtime] enabled = false)");
    }
    let auth = state.auth()?;

    let session: ShoppingSession = state
        .session(store_id)
        .await?
        .with_observer(Arc::new(PrintObserver));
    print_view(&session.view());

    let feed_config = FeedConfig::from_config(&state.config, store_id)?;
    let (feed, notices) = ChangeFeed::spawn(feed_config, auth.clone());
    let follower = session.follow(notices);

    tokio::signal::ctrl_c().await?;
    info!("Stopping watch");
    if let Err(e) = feed.shutdown().await {
        // The feed already stopped on its own
        warn!(error = %e, "Change feed was not running");
    }
    follower.await?;
    Ok(())
}
