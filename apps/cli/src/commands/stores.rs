//! Store commands.

use clap::Subcommand;

use panier_core::{DestructiveAction, StoreId};

use crate::prompt;
use crate::state::AppState;

#[derive(Subcommand, Debug)]
pub enum StoreCommand {
    /// List stores
    List,

    /// Create a store
    Add { name: String },

    /// Rename a store
    Rename { id: StoreId, name: String },

    /// Delete a store with its products and lists
    Delete { id: StoreId },
}

pub async fn run(state: &AppState, command: StoreCommand) -> anyhow::Result<()> {
    match command {
        StoreCommand::List => {
            for store in state.service.stores().await {
                println!("{:>5}  {}", store.id, store.name);
            }
        }
        StoreCommand::Add { name } => {
            if let Some(store) = state.service.create_store(&name).await {
                println!("{:>5}  {}", store.id, store.name);
            }
        }
        StoreCommand::Rename { id, name } => {
            state.service.rename_store(id, &name).await?;
        }
        StoreCommand::Delete { id } => {
            let confirmation = prompt::confirm(DestructiveAction::DeleteStore { store_id: id })?;
            state.service.delete_store(id, &confirmation).await?;
        }
    }
    Ok(())
}
