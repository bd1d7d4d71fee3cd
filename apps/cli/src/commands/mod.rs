//! # Commands
//!
//! One module per area. Every command goes through `ShoppingService` or
//! `ShoppingSession`, so notifications are printed by the console notifier
//! and command handlers only print the data they were asked for.

pub mod account;
pub mod history;
pub mod list;
pub mod products;
pub mod stores;

use clap::Subcommand;

use crate::state::AppState;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in with the configured provider
    Login,

    /// Sign out and forget the saved session
    Logout,

    /// Switch between the hosted backend and the offline store
    Mode {
        /// remote | offline
        mode: String,
    },

    /// Manage stores
    #[command(subcommand)]
    Store(stores::StoreCommand),

    /// Manage products
    #[command(subcommand)]
    Product(products::ProductCommand),

    /// Work on a store's current list
    #[command(subcommand)]
    List(list::ListCommand),

    /// Saved shopping lists
    #[command(subcommand)]
    History(history::HistoryCommand),

    /// Delete all of your data
    Reset,
}

pub async fn run(state: &AppState, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login => account::login(state).await,
        Command::Logout => account::logout(state).await,
        Command::Mode { mode } => account::set_mode(None, &mode),
        Command::Store(cmd) => stores::run(state, cmd).await,
        Command::Product(cmd) => products::run(state, cmd).await,
        Command::List(cmd) => list::run(state, cmd).await,
        Command::History(cmd) => history::run(state, cmd).await,
        Command::Reset => account::reset(state).await,
    }
}
