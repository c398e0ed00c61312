//! Business logic services

pub mod accounts;
pub mod catalog;
pub mod credentials;
pub mod email;
pub mod tokens;

use std::{sync::Arc, time::Duration};

use crate::{config::EmailConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub accounts: accounts::AccountService,
    pub catalog: catalog::CatalogService,
}

impl Services {
    /// Create all services, delivering mail through the configured SMTP relay
    pub fn new(repository: Repository, email_config: &EmailConfig) -> AppResult<Self> {
        let mailer = email::SmtpMailer::new(email_config)?;
        Self::with_mailer(repository, Arc::new(mailer), email_config)
    }

    /// Create all services on top of any mail transport
    pub fn with_mailer(
        repository: Repository,
        mailer: Arc<dyn email::Mailer>,
        email_config: &EmailConfig,
    ) -> AppResult<Self> {
        let mail = email::MailNotifier::new(mailer, &email_config.base_url)?
            .with_send_timeout(Duration::from_millis(email_config.send_timeout_ms));
        let accounts = accounts::AccountService::new(repository.clone(), mail);

        Ok(Self {
            catalog: catalog::CatalogService::new(repository, accounts.clone()),
            accounts,
        })
    }
}
