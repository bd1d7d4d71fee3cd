//! Sign-in, sign-out, backend mode and full reset.

use std::path::PathBuf;

use anyhow::Context;
use tracing::{error, info};

use panier_core::DestructiveAction;
use panier_sync::{BackendMode, PanierConfig};

use crate::prompt;
use crate::state::AppState;

/// Prints the authorize URL, then finishes sign-in from the pasted
/// callback URL.
pub async fn login(state: &AppState) -> anyhow::Result<()> {
    let auth = state.auth()?;
    let url = auth.authorize_url(
        &state.config.auth.provider,
        state.config.auth.redirect_url.as_deref(),
    )?;

    println!("Ouvrez cette adresse pour vous connecter :\n\n  {}\n", url);
    let callback = prompt::read_line("Collez l'adresse de retour :")?;

    match auth.complete_sign_in(&callback).await {
        Ok(session) => {
            info!(user_id = %session.user_id, "Signed in");
            state.notifier.success("Connexion réussie");
            if let Some(email) = session.email {
                println!("Connecté en tant que {}", email);
            }
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Sign-in failed");
            state.notifier.error("Erreur lors de la connexion");
            Err(e.into())
        }
    }
}

pub async fn logout(state: &AppState) -> anyhow::Result<()> {
    match state.auth()?.sign_out().await {
        Ok(()) => {
            state.notifier.success("Déconnexion réussie");
            Ok(())
        }
        Err(e) => {
            state.notifier.error("Erreur lors de la déconnexion");
            Err(e.into())
        }
    }
}

/// Persists the backend mode preference.
pub fn set_mode(config_path: Option<PathBuf>, mode: &str) -> anyhow::Result<()> {
    let mode: BackendMode = mode.parse()?;

    let mut config = PanierConfig::read(config_path.clone()).context("Failed to read config")?;
    config.backend.mode = mode;
    let path = config.save(config_path)?;

    match mode {
        BackendMode::Offline => println!("✔ Mode hors ligne activé"),
        BackendMode::Remote => println!("✔ Mode hors ligne désactivé"),
    }
    info!(path = %path.display(), mode = %mode, "Backend mode saved");
    Ok(())
}

pub async fn reset(state: &AppState) -> anyhow::Result<()> {
    let confirmation = prompt::confirm(DestructiveAction::ResetDatabase)?;
    state.service.reset(&confirmation).await?;
    Ok(())
}
