//! Admin broadcast: one payload fanned out to every known user

use fluent_templates::fluent_bundle::FluentArgs;

use crate::core::error::AppResult;
use crate::dialog::outbox::{notify, Outbox, Outgoing};
use crate::dialog::session::{AdminSession, Session};
use crate::dialog::{DialogDeps, Inbound};
use crate::i18n;
use crate::storage::db;

/// Per-recipient outcome counts of a fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// Neither text nor photo; the admin is asked again.
    Unsupported,
    Sent(BroadcastReport),
    NoPendingBroadcast,
}

pub async fn start_broadcast(deps: &DialogDeps, outbox: &dyn Outbox, admin_id: i64) {
    deps.sessions
        .open(admin_id, Session::Admin(AdminSession::AwaitingBroadcastMessage));
    let lang = deps.lang(admin_id);
    notify(outbox, admin_id, Outgoing::Text(i18n::t(&lang, "broadcast-prompt"))).await;
}

/// Sends `payload` to each recipient in turn; one failure never stops the rest.
#[tracing::instrument(skip_all, fields(recipients = recipients.len()))]
pub async fn fan_out(outbox: &dyn Outbox, recipients: &[i64], payload: &Outgoing) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    for &chat_id in recipients {
        match outbox.deliver(chat_id, payload.clone()).await {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                log::debug!("Broadcast skipped {}: {}", chat_id, e);
                report.failed += 1;
            }
        }
    }
    log::info!(
        "Broadcast finished: {} delivered, {} failed",
        report.delivered,
        report.failed
    );
    report
}

/// Consumes the broadcast payload. The session ends here whatever the outcome.
pub async fn submit_payload(
    deps: &DialogDeps,
    outbox: &dyn Outbox,
    admin_id: i64,
    inbound: Inbound,
) -> AppResult<BroadcastOutcome> {
    let lang = deps.lang(admin_id);

    let payload = match inbound {
        Inbound::Text(text) => Outgoing::Text(text),
        Inbound::Photo { file_id, caption } => Outgoing::Photo { file_id, caption },
        Inbound::Other => {
            notify(outbox, admin_id, Outgoing::Text(i18n::t(&lang, "broadcast-unsupported"))).await;
            return Ok(BroadcastOutcome::Unsupported);
        }
    };

    let expected = Session::Admin(AdminSession::AwaitingBroadcastMessage);
    if deps.sessions.take_if(admin_id, |s| *s == expected).is_none() {
        return Ok(BroadcastOutcome::NoPendingBroadcast);
    }

    let recipients = {
        let conn = db::get_connection(&deps.db_pool)?;
        db::list_all_user_ids(&conn)?
    };

    let mut args = FluentArgs::new();
    args.set("count", recipients.len().to_string());
    notify(outbox, admin_id, Outgoing::Text(i18n::t_args(&lang, "broadcast-sending", &args))).await;

    let report = fan_out(outbox, &recipients, &payload).await;

    let mut args = FluentArgs::new();
    args.set("success", report.delivered.to_string());
    args.set("failed", report.failed.to_string());
    notify(outbox, admin_id, Outgoing::Text(i18n::t_args(&lang, "broadcast-complete", &args))).await;

    Ok(BroadcastOutcome::Sent(report))
}
