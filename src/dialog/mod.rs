//! Multi-step dialogs driven by per-user sessions
//!
//! Free-form messages from a user with an open session are routed here and
//! consumed by the flow owning that session. Users without a session fall
//! through to the stateless menu handlers.

pub mod balance_edit;
pub mod broadcast;
pub mod outbox;
pub mod referral;
pub mod session;
pub mod withdrawal;

use std::sync::Arc;

use unic_langid::LanguageIdentifier;

use crate::core::config::Settings;
use crate::core::error::AppResult;
use crate::i18n;
use crate::storage::db::DbPool;

pub use outbox::{notify, Outbox, Outgoing};
pub use session::{AdminSession, Session, SessionManager, UserSession};

/// Shared state every dialog flow needs.
#[derive(Clone)]
pub struct DialogDeps {
    pub db_pool: Arc<DbPool>,
    pub sessions: Arc<SessionManager>,
    pub settings: Arc<Settings>,
}

impl DialogDeps {
    pub fn new(db_pool: Arc<DbPool>, settings: Arc<Settings>) -> Self {
        Self {
            db_pool,
            sessions: Arc::new(SessionManager::new()),
            settings,
        }
    }

    /// Stored language of a user, or the default.
    pub fn lang(&self, user_id: i64) -> LanguageIdentifier {
        i18n::user_lang_from_pool(&self.db_pool, user_id)
    }
}

/// Transport-neutral view of an inbound chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Photo { file_id: String, caption: Option<String> },
    /// Stickers, documents and anything else.
    Other,
}

impl Inbound {
    pub fn text(&self) -> Option<&str> {
        match self {
            Inbound::Text(text) => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// A dialog consumed the message.
    Consumed,
    /// No dialog is open for this user.
    NoSession,
}

/// Hands a message to the dialog the user is in.
pub async fn route_message(deps: &DialogDeps, outbox: &dyn Outbox, user_id: i64, inbound: Inbound) -> AppResult<Routed> {
    let Some(session) = deps.sessions.get(user_id) else {
        return Ok(Routed::NoSession);
    };

    match session {
        Session::User(UserSession::AwaitingWallet { .. }) => {
            let input = inbound.text().unwrap_or_default().to_string();
            withdrawal::submit_wallet(deps, outbox, user_id, &input).await?;
        }
        Session::Admin(state) => {
            // the allow-list is fixed, but never let a stale session outlive it
            if !deps.settings.is_admin(user_id) {
                log::warn!("Dropping admin session of non-admin {}", user_id);
                deps.sessions.clear(user_id);
                return Ok(Routed::NoSession);
            }
            match state {
                AdminSession::AwaitingBroadcastMessage => {
                    broadcast::submit_payload(deps, outbox, user_id, inbound).await?;
                }
                AdminSession::AwaitingBalanceUserId => {
                    let input = inbound.text().unwrap_or_default().to_string();
                    balance_edit::submit_target(deps, outbox, user_id, &input).await?;
                }
                AdminSession::AwaitingBalanceAmount { target } => {
                    let input = inbound.text().unwrap_or_default().to_string();
                    balance_edit::submit_amount(deps, outbox, user_id, target, &input).await?;
                }
            }
        }
    }

    Ok(Routed::Consumed)
}

/// Clears whatever dialog the user is in and acknowledges.
pub async fn cancel(deps: &DialogDeps, outbox: &dyn Outbox, user_id: i64) -> Option<Session> {
    let cleared = deps.sessions.clear(user_id);
    log::info!("User {} cancelled (session: {:?})", user_id, cleared);

    let lang = deps.lang(user_id);
    notify(outbox, user_id, Outgoing::Text(i18n::t(&lang, "cancel-operation"))).await;
    cleared
}
