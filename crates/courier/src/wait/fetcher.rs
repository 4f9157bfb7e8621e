//! Single-shot fetch of the newest matching message

use log::info;

use super::traits::{MailQuery, TokenRefresher};
use crate::error::{MailError, MailFailure};
use crate::gmail::parse_email;
use crate::models::{EmailContent, MailboxTokens, SearchFilter};

/// Result of a standalone read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub email: EmailContent,
    /// New access token obtained during the read; the caller should store it
    pub refreshed_token: Option<String>,
}

/// Fetch and parse the newest message matching `filter`
///
/// Fails with [`MailError::NoMatchingEmail`] when nothing matches and passes
/// [`MailError::AuthExpired`] / [`MailError::Transient`] straight through.
pub async fn read_last_email(
    mail: &dyn MailQuery,
    access_token: &str,
    filter: &SearchFilter,
) -> Result<EmailContent, MailError> {
    let newest = mail.list_newest(access_token, filter, 1).await?;
    let Some(id) = newest.into_iter().next() else {
        return Err(MailError::NoMatchingEmail);
    };

    let message = mail.fetch_message(access_token, &id).await?;
    Ok(parse_email(message))
}

/// [`read_last_email`] with exactly one refresh-and-retry on an expired token
///
/// Any failure of the refresh or of the retry is returned as is; there is no
/// second retry. A retry that fails still hands back the refreshed token.
pub async fn read_last_email_with_refresh(
    mail: &dyn MailQuery,
    refresher: &dyn TokenRefresher,
    tokens: &MailboxTokens,
    filter: &SearchFilter,
) -> Result<FetchReport, MailFailure> {
    match read_last_email(mail, &tokens.access_token, filter).await {
        Ok(email) => Ok(FetchReport {
            email,
            refreshed_token: None,
        }),
        Err(e) if e.is_auth_expired() => {
            info!("Access token rejected, refreshing before a single retry");
            let fresh = refresher
                .refresh(&tokens.access_token, &tokens.refresh_token)
                .await?;
            match read_last_email(mail, &fresh, filter).await {
                Ok(email) => Ok(FetchReport {
                    email,
                    refreshed_token: Some(fresh),
                }),
                Err(error) => Err(MailFailure::new(error, Some(fresh))),
            }
        }
        Err(e) => Err(e.into()),
    }
}
