//! Product commands.

use anyhow::Context;
use clap::Subcommand;

use panier_core::{DestructiveAction, Money, NewProduct, Product, ProductId, StoreId};
use panier_sync::ProductEdit;

use crate::prompt::{self, parse_price};
use crate::state::AppState;

#[derive(Subcommand, Debug)]
pub enum ProductCommand {
    /// List products, optionally of one store
    List {
        #[arg(long)]
        store: Option<StoreId>,
    },

    /// Create a product
    Add {
        #[arg(long)]
        store: StoreId,
        /// Product name (may be filled from --barcode with --lookup)
        #[arg(long, default_value = "")]
        name: String,
        /// Price, e.g. 2,49
        #[arg(long)]
        price: String,
        #[arg(long)]
        barcode: Option<String>,
        #[arg(long)]
        image_url: Option<String>,
        /// Fill name and image from the barcode database first
        #[arg(long, requires = "barcode")]
        lookup: bool,
    },

    /// Edit a product
    Edit {
        id: ProductId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        price: Option<String>,
        #[arg(long, conflicts_with = "clear_barcode")]
        barcode: Option<String>,
        #[arg(long)]
        clear_barcode: bool,
        #[arg(long)]
        image_url: Option<String>,
    },

    /// Delete a product and its price history
    Delete { id: ProductId },

    /// Show a product's price history
    Prices { id: ProductId },

    /// Look a barcode up without creating anything
    Scan { barcode: String },
}

fn print_product(product: &Product) {
    let marker = if product.in_list { "*" } else { " " };
    println!(
        "{:>5} {} {:<30} {:>12}  achats: {}",
        product.id,
        marker,
        product.name,
        product.price().to_string(),
        product.purchase_count
    );
}

async fn find_product(state: &AppState, id: ProductId) -> anyhow::Result<Product> {
    state
        .service
        .backend()
        .list_products(None)
        .await?
        .into_iter()
        .find(|p| p.id == id)
        .with_context(|| format!("Produit {} introuvable", id))
}

pub async fn run(state: &AppState, command: ProductCommand) -> anyhow::Result<()> {
    match command {
        ProductCommand::List { store } => {
            for product in state.service.products(store).await {
                print_product(&product);
            }
        }
        ProductCommand::Add {
            store,
            name,
            price,
            barcode,
            image_url,
            lookup,
        } => {
            let mut draft = NewProduct {
                store_id: store,
                name,
                price_cents: parse_price(&price)?,
                barcode: barcode.clone(),
                image_url,
            };
            if let (true, Some(barcode)) = (lookup, barcode.as_deref()) {
                let client = state.barcode_client()?;
                state
                    .service
                    .lookup_barcode(&client, &mut draft, barcode)
                    .await;
            }
            if let Some(product) = state.service.create_product(draft).await {
                print_product(&product);
            }
        }
        ProductCommand::Edit {
            id,
            name,
            price,
            barcode,
            clear_barcode,
            image_url,
        } => {
            let current = find_product(state, id).await?;
            let edit = ProductEdit {
                name,
                price_cents: price.as_deref().map(parse_price).transpose()?,
                barcode: if clear_barcode { Some(None) } else { barcode.map(Some) },
                image_url: image_url.map(Some),
            };
            let product = state.service.edit_product(&current, edit).await?;
            print_product(&product);
        }
        ProductCommand::Delete { id } => {
            let confirmation = prompt::confirm(DestructiveAction::DeleteProduct { product_id: id })?;
            state.service.delete_product(id, &confirmation).await?;
        }
        ProductCommand::Prices { id } => {
            let history = state.service.price_history(id).await;
            let mut previous: Option<Money> = None;
            for entry in history {
                let price = entry.price();
                let delta = previous
                    .map(|p| {
                        let diff = price - p;
                        if diff.is_negative() {
                            format!("  (-{})", Money::from_cents(-diff.cents()))
                        } else if diff.is_zero() {
                            String::new()
                        } else {
                            format!("  (+{})", diff)
                        }
                    })
                    .unwrap_or_default();
                println!("{}  {:>12}{}", entry.created_at.format("%d/%m/%Y"), price.to_string(), delta);
                previous = Some(price);
            }
        }
        ProductCommand::Scan { barcode } => {
            let client = state.barcode_client()?;
            match client.lookup(&barcode).await {
                Ok(found) => {
                    println!("Code-barres : {}", found.barcode);
                    println!("Nom         : {}", found.name.as_deref().unwrap_or("-"));
                    println!("Marque      : {}", found.brand.as_deref().unwrap_or("-"));
                    println!("Image       : {}", found.image_url.as_deref().unwrap_or("-"));
                }
                Err(e) if e.is_not_found() => {
                    state.notifier.error("Produit non trouvé dans la base OpenFoodFacts");
                }
                Err(e) => {
                    state.notifier.error("Erreur lors de la recherche du produit");
                    return Err(e.into());
                }
            }
        }
    }
    Ok(())
}
