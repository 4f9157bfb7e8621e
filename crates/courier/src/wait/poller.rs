//! Bounded polling for a newly arrived message
//!
//! Each pass asks the mailbox whether a matching message arrived within the
//! filter's recent window. A hit is fetched through [`read_last_email`]; a miss
//! sleeps [`POLL_INTERVAL`] and tries again until the timeout is used up.
//!
//! An expired access token is refreshed and the check is retried straight
//! away, so one wait can span any number of refreshes. Other upstream errors
//! are logged and absorbed: the next pass may succeed.

use log::{debug, info, warn};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

use super::fetcher::read_last_email;
use super::traits::{MailQuery, TokenRefresher};
use crate::error::{MailError, MailFailure};
use crate::models::{EmailContent, MailboxTokens, PollOutcome, SearchFilter};

/// Delay between existence checks that came back empty
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Result of [`wait_for_email`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitReport {
    pub outcome: PollOutcome,
    /// Newest access token obtained while waiting; the caller should store it
    pub refreshed_token: Option<String>,
}

/// What a single pass concluded
enum Step {
    Found(EmailContent),
    Expired,
    Idle,
}

/// Wait up to `timeout_secs` for a message matching `filter`
///
/// The elapsed time is checked before every pass, so a pass that starts
/// inside the window always runs to completion. A non-positive timeout
/// returns [`PollOutcome::NotFound`] without touching the mailbox.
///
/// An expired token is refreshed at once, except that a token rejected right
/// after its own refresh waits one [`POLL_INTERVAL`] before the next refresh.
///
/// Fails with [`MailError::RefreshFailed`] when an expired token cannot be
/// refreshed and with [`MailError::Cancelled`] when `cancel` fires. Either
/// way the failure carries the newest token refreshed before it.
pub async fn wait_for_email(
    mail: &dyn MailQuery,
    refresher: &dyn TokenRefresher,
    tokens: &MailboxTokens,
    filter: &SearchFilter,
    timeout_secs: i64,
    cancel: &CancellationToken,
) -> Result<WaitReport, MailFailure> {
    let mut refreshed_token = None;
    let polled = poll(
        mail,
        refresher,
        tokens,
        filter,
        timeout_secs,
        cancel,
        &mut refreshed_token,
    )
    .await;

    match polled {
        Ok(outcome) => Ok(WaitReport {
            outcome,
            refreshed_token,
        }),
        Err(error) => Err(MailFailure::new(error, refreshed_token)),
    }
}

async fn poll(
    mail: &dyn MailQuery,
    refresher: &dyn TokenRefresher,
    tokens: &MailboxTokens,
    filter: &SearchFilter,
    timeout_secs: i64,
    cancel: &CancellationToken,
    refreshed_token: &mut Option<String>,
) -> Result<PollOutcome, MailError> {
    let Ok(secs) = u64::try_from(timeout_secs) else {
        return Ok(PollOutcome::NotFound);
    };
    let timeout = Duration::from_secs(secs);
    let started = Instant::now();

    let mut access_token = tokens.access_token.clone();
    let mut passes = 0u32;
    let mut just_refreshed = false;

    while started.elapsed() < timeout {
        passes += 1;

        match or_cancelled(cancel, check_once(mail, &access_token, filter)).await? {
            Step::Found(email) => {
                info!(
                    "Matching email {} found after {} check(s)",
                    email.id.as_str(),
                    passes
                );
                return Ok(PollOutcome::Found(email));
            }
            // A token rejected right after its own refresh is not retried in
            // a tight loop; it waits out one interval like an empty check.
            Step::Expired if !just_refreshed => {
                info!("Access token expired while waiting, refreshing");
                let fresh = or_cancelled(
                    cancel,
                    refresher.refresh(&access_token, &tokens.refresh_token),
                )
                .await?
                .map_err(into_refresh_failure)?;

                access_token = fresh.clone();
                *refreshed_token = Some(fresh);
                just_refreshed = true;
                continue;
            }
            Step::Expired => {
                warn!("Freshly refreshed access token was rejected");
                just_refreshed = false;
            }
            Step::Idle => just_refreshed = false,
        }

        or_cancelled(cancel, sleep(POLL_INTERVAL)).await?;
    }

    debug!("No matching email after {} check(s) in {}s", passes, secs);
    Ok(PollOutcome::NotFound)
}

/// One existence check, followed by a fetch when it hits
async fn check_once(mail: &dyn MailQuery, access_token: &str, filter: &SearchFilter) -> Step {
    match mail.exists_recent(access_token, filter).await {
        Ok(true) => match read_last_email(mail, access_token, filter).await {
            Ok(email) => Step::Found(email),
            Err(MailError::AuthExpired) => Step::Expired,
            Err(e) => {
                warn!("Matching email could not be read yet: {}", e);
                Step::Idle
            }
        },
        Ok(false) => Step::Idle,
        Err(MailError::AuthExpired) => Step::Expired,
        Err(e) => {
            warn!("Email check failed, retrying after the poll interval: {}", e);
            Step::Idle
        }
    }
}

/// Run `fut` unless `cancel` fires first
async fn or_cancelled<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output, MailError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MailError::Cancelled),
        out = fut => Ok(out),
    }
}

fn into_refresh_failure(err: MailError) -> MailError {
    match err {
        MailError::RefreshFailed(_) | MailError::Cancelled => err,
        other => MailError::RefreshFailed(other.to_string()),
    }
}
