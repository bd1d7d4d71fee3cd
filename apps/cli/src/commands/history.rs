//! Saved shopping list commands.

use std::path::PathBuf;

use anyhow::Context;
use clap::Subcommand;

use panier_core::{DestructiveAction, ListId, Money, ShoppingList, StoreId};

use crate::prompt;
use crate::state::AppState;

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    /// List saved lists, newest first
    List {
        #[arg(long)]
        store: Option<StoreId>,
    },

    /// Write a saved list's PDF again
    Export {
        id: ListId,
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Delete a saved list and give back its purchase counts
    Delete { id: ListId },
}

async fn find_list(state: &AppState, id: ListId) -> anyhow::Result<ShoppingList> {
    state
        .service
        .backend()
        .list_shopping_lists(None)
        .await?
        .into_iter()
        .find(|list| list.id == id)
        .with_context(|| format!("Liste {} introuvable", id))
}

pub async fn run(state: &AppState, command: HistoryCommand) -> anyhow::Result<()> {
    match command {
        HistoryCommand::List { store } => {
            for list in state.service.shopping_lists(store).await {
                println!(
                    "{:>5}  {}  semaine {:>2}  {:>12}",
                    list.id,
                    list.created_at.format("%d/%m/%Y %H:%M"),
                    list.week_number,
                    list.total().to_string()
                );
                for item in &list.items {
                    println!(
                        "         {:<30} {:>3} x {}",
                        item.product_name,
                        item.quantity,
                        Money::from_cents(item.price_cents)
                    );
                }
            }
        }
        HistoryCommand::Export { id, out } => {
            let list = find_list(state, id).await?;
            let store = state.store(list.store_id).await?;
            let dir = out.unwrap_or_else(|| state.config.export_dir());

            let path = state.service.export_saved_list(&store, &list, &dir).await?;
            println!("PDF : {}", path.display());
        }
        HistoryCommand::Delete { id } => {
            let confirmation =
                prompt::confirm(DestructiveAction::DeleteShoppingList { list_id: id })?;
            state.service.delete_shopping_list(id, &confirmation).await?;
        }
    }
    Ok(())
}
