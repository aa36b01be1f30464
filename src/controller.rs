//! License lifecycle controller - the main public API.
//!
//! A `LicenseController` owns one license for one session and runs the
//! lifecycle pipeline against it:
//! 1. Fetch the status document (skipped for licenses without a status link)
//! 2. Check the status (returned/expired/revoked/cancelled abort)
//! 3. Refresh the license if the authority holds a newer one
//! 4. Validate the rights window
//! 5. Register this device (best effort)
//! 6. Download the publication (`evaluate` only)
//! 7. Embed the current license into it (`evaluate` only)
//!
//! Steps 1-4 are gates and abort the whole run. Registration, renewal and
//! return never abort: their failures are logged and the prior state kept.

use crate::client::http::HttpTransport;
use crate::client::service::LcpService;
use crate::clock::{Clock, SystemClock};
use crate::config::LcpConfig;
use crate::container::{PublicationContainer, ZipContainer, LICENSE_ENTRY};
use crate::crypto::context::{Decipher, DrmContext};
use crate::device::{DeviceIdentity, StoredDeviceIdentity};
use crate::policy;
use crate::protocol::license::{LicenseDocument, Rights};
use crate::protocol::status::{LicenseStatus, StatusDocument};
use crate::protocol::{REL_LICENSE, REL_PUBLICATION, REL_REGISTER, REL_RENEW, REL_RETURN, REL_STATUS};
use crate::store::TransactionStore;
use crate::LcpError;
use chrono::{DateTime, Utc};
use reqwest::Url;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Collaborators shared by every controller of a process.
#[derive(Clone)]
pub struct LicenseEnvironment {
    service: LcpService,
    store: Arc<TransactionStore>,
    device: Arc<dyn DeviceIdentity>,
    container: Arc<dyn PublicationContainer>,
    decipher: Arc<dyn Decipher>,
    clock: Arc<dyn Clock>,
}

impl LicenseEnvironment {
    /// Build the default environment for a configuration.
    ///
    /// Uses HTTP transport, a file-backed store and device identity under
    /// `dirs::data_dir()/<storage_namespace>/`, zip containers and the
    /// system clock.
    ///
    /// # Errors
    /// Returns an error if:
    /// - Configuration validation fails
    /// - HTTP client creation fails
    /// - The store cannot be opened
    pub fn new(config: &LcpConfig, decipher: Arc<dyn Decipher>) -> Result<Self, LcpError> {
        config.validate()?;
        let storage_dir = config.storage_dir()?;

        let transport = Arc::new(HttpTransport::new(config)?);
        let service = LcpService::new(transport, storage_dir.join("publications"));
        let store = Arc::new(TransactionStore::open(&storage_dir)?);
        let device = Arc::new(StoredDeviceIdentity::new(
            storage_dir.join("device.json"),
            config.device_name_fallback,
        ));

        Ok(Self::from_parts(service, store, device, decipher))
    }

    /// Assemble an environment from explicit collaborators.
    pub fn from_parts(
        service: LcpService,
        store: Arc<TransactionStore>,
        device: Arc<dyn DeviceIdentity>,
        decipher: Arc<dyn Decipher>,
    ) -> Self {
        Self {
            service,
            store,
            device,
            container: Arc::new(ZipContainer),
            decipher,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the publication container implementation.
    pub fn with_container(mut self, container: Arc<dyn PublicationContainer>) -> Self {
        self.container = container;
        self
    }

    /// Replace the clock used for rights decisions.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The shared transaction store.
    pub fn store(&self) -> &Arc<TransactionStore> {
        &self.store
    }
}

/// Progress of the current (or last) pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    /// No step has completed yet.
    Created,
    /// The status document was fetched.
    StatusFetched,
    /// The status allows use.
    StatusChecked,
    /// The local license matches the authority.
    LicenseUpToDate,
    /// The rights window includes now.
    RightsValidated,
    /// Registration was attempted.
    Registered,
    /// The publication link was resolved (downloaded or absent).
    PublicationResolved,
    /// The current license was written into the downloaded publication.
    LicenseEmbedded,
    /// A gating step failed.
    Aborted(String),
}

/// Why a step did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The license has no remote authority.
    NoStatusLink,
    /// No status document has been fetched.
    NoStatusDocument,
    /// The status document does not link to a license.
    NoLicenseLink,
    /// The local license is at least as recent as the authority's.
    LicenseUpToDate,
    /// The license was never seen locally.
    UnknownLicense,
    /// The authority offers no device registration.
    NoRegisterLink,
    /// The authority offers no renewal.
    NoRenewLink,
    /// The authority offers no return.
    NoReturnLink,
}

/// Result of a single lifecycle step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step did its work.
    Completed,
    /// There was nothing to do.
    Skipped(SkipReason),
    /// A best-effort step failed; the failure was logged and swallowed.
    Failed(String),
}

impl StepOutcome {
    /// Whether the step did its work.
    pub fn is_completed(&self) -> bool {
        matches!(self, StepOutcome::Completed)
    }
}

/// Result of a successful `evaluate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Downloaded publication, with the current license embedded.
    Ready(PathBuf),
    /// The license has no publication link; the caller already holds one.
    NoPublication,
}

impl Evaluation {
    /// Path of the ready publication, if one was downloaded.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Evaluation::Ready(path) => Some(path),
            Evaluation::NoPublication => None,
        }
    }
}

/// Lifecycle controller for one license.
pub struct LicenseController {
    env: LicenseEnvironment,
    license: LicenseDocument,
    status: Option<StatusDocument>,
    context: Option<DrmContext>,
    archive_path: Option<PathBuf>,
    state: LifecycleState,
}

impl LicenseController {
    /// Create a controller from raw license bytes.
    pub fn new(license_bytes: &[u8], env: LicenseEnvironment) -> Result<Self, LcpError> {
        let license = LicenseDocument::parse(license_bytes)?;
        Ok(Self {
            env,
            license,
            status: None,
            context: None,
            archive_path: None,
            state: LifecycleState::Created,
        })
    }

    /// Create a controller from a standalone `.lcpl` file.
    pub fn from_license_file(path: &Path, env: LicenseEnvironment) -> Result<Self, LcpError> {
        let bytes = fs::read(path).map_err(|e| {
            LcpError::LicenseFile(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::new(&bytes, env)
    }

    /// Create a controller from the license embedded in a publication.
    pub fn from_publication(path: &Path, env: LicenseEnvironment) -> Result<Self, LcpError> {
        let bytes = env.container.read_entry(path, LICENSE_ENTRY)?;
        let mut controller = Self::new(&bytes, env)?;
        controller.archive_path = Some(path.to_path_buf());
        Ok(controller)
    }

    /// Run the full pipeline and materialize a ready-to-open publication.
    ///
    /// # Errors
    /// - `StatusUnavailable` - the status document could not be fetched
    /// - `LicenseReturned`, `LicenseExpired`, `LicenseRevoked`, `LicenseCancelled`
    /// - `LicenseUpdateFailed` - a newer license could not be fetched
    /// - `InvalidRights` - the rights window excludes now
    /// - `Transport` - the publication download failed
    /// - `Archive` - the license could not be embedded
    pub fn evaluate(&mut self) -> Result<Evaluation, LcpError> {
        info!(license_id = %self.license.id(), "evaluating license");
        self.run(|this| {
            this.run_lifecycle()?;

            let downloaded = this.fetch_publication()?;
            this.advance(LifecycleState::PublicationResolved);
            let Some(path) = downloaded else {
                info!(license_id = %this.license.id(), "no publication link, nothing to download");
                return Ok(Evaluation::NoPublication);
            };

            if let Err(e) = this.embed_license(&path) {
                let _ = fs::remove_file(&path);
                return Err(e);
            }
            this.advance(LifecycleState::LicenseEmbedded);
            Ok(Evaluation::Ready(path))
        })
    }

    /// Validate and refresh local state without materializing a publication.
    pub fn resolve(&mut self) -> Result<(), LcpError> {
        info!(license_id = %self.license.id(), "resolving license");
        self.run(Self::run_lifecycle)
    }

    /// Step 1: fetch the status document named by the license.
    pub fn fetch_status_document(&mut self) -> Result<StepOutcome, LcpError> {
        let Some(link) = self.license.link(REL_STATUS) else {
            debug!(license_id = %self.license.id(), "no status link, treating license as standalone");
            return Ok(StepOutcome::Skipped(SkipReason::NoStatusLink));
        };

        info!(license_id = %self.license.id(), url = %link.href, "fetching status document");
        let status = self
            .env
            .service
            .fetch_status_document(&link.href)
            .map_err(|e| match e {
                LcpError::Transport(msg) => LcpError::StatusUnavailable(msg),
                other => other,
            })?;

        self.status = Some(status);
        Ok(StepOutcome::Completed)
    }

    /// Step 2: reject licenses the authority no longer honors.
    pub fn check_status(&self) -> Result<(), LcpError> {
        info!(
            license_id = %self.license.id(),
            status = ?self.status.as_ref().map(|s| s.status()),
            "checking license status"
        );
        policy::check_status(self.status.as_ref())
    }

    /// Step 3: replace the license if the authority holds a newer one.
    pub fn update_license_document(&mut self) -> Result<StepOutcome, LcpError> {
        let Some(status) = &self.status else {
            return Ok(StepOutcome::Skipped(SkipReason::NoStatusDocument));
        };
        let Some(link) = status.link(REL_LICENSE) else {
            debug!(license_id = %self.license.id(), "status document has no license link");
            return Ok(StepOutcome::Skipped(SkipReason::NoLicenseLink));
        };

        let latest = status.updated().license;
        let last_known = self.env.store.last_known_update(self.license.id())?;
        if last_known.is_some_and(|last| last >= latest) {
            debug!(license_id = %self.license.id(), %latest, "license is up to date");
            return Ok(StepOutcome::Skipped(SkipReason::LicenseUpToDate));
        }

        info!(license_id = %self.license.id(), url = %link.href, "fetching updated license");
        let updated = self
            .env
            .service
            .fetch_license_document(&link.href)
            .map_err(|e| match e {
                LcpError::Transport(msg) => LcpError::LicenseUpdateFailed(msg),
                other => other,
            })?;

        if updated.id() != self.license.id() {
            warn!(
                license_id = %self.license.id(),
                updated_id = %updated.id(),
                "authority returned a license with a different id"
            );
            return Err(LcpError::LicenseUpdateFailed(format!(
                "expected license {}, received {}",
                self.license.id(),
                updated.id()
            )));
        }

        self.env
            .store
            .record_state(self.license.id(), latest, status.status().as_str())?;
        self.license = updated;
        Ok(StepOutcome::Completed)
    }

    /// Step 4: reject the license outside its rights window.
    pub fn validate_rights(&self) -> Result<(), LcpError> {
        info!(license_id = %self.license.id(), "validating rights");
        policy::validate_rights(self.license.rights(), self.env.clock.now_utc())
    }

    /// Step 5: register this device with the authority (best effort).
    ///
    /// Only licenses already known to the store are registered.
    pub fn register(&self) -> StepOutcome {
        info!(license_id = %self.license.id(), "registering device");

        match self.env.store.is_known_license(self.license.id()) {
            Ok(true) => {}
            Ok(false) => {
                debug!(license_id = %self.license.id(), "license not known locally, skipping registration");
                return StepOutcome::Skipped(SkipReason::UnknownLicense);
            }
            Err(e) => {
                warn!(license_id = %self.license.id(), error = %e, "registration skipped");
                return StepOutcome::Failed(e.to_string());
            }
        }

        let Some(url) = self.device_endpoint(REL_REGISTER) else {
            return self.missing_endpoint(SkipReason::NoRegisterLink);
        };
        self.device_request("register", &url, |service, url, id, name| {
            service.register(url, id, name)
        })
    }

    /// Step 6: download the publication named by the license.
    ///
    /// `Ok(None)` means the license has no publication link.
    pub fn fetch_publication(&self) -> Result<Option<PathBuf>, LcpError> {
        let Some(link) = self.license.link(REL_PUBLICATION) else {
            return Ok(None);
        };

        info!(license_id = %self.license.id(), url = %link.href, "fetching publication");
        self.env.service.download_publication(&link.href).map(Some)
    }

    /// Step 7: write the current license into the publication at `path`.
    pub fn embed_license(&self, path: &Path) -> Result<(), LcpError> {
        info!(license_id = %self.license.id(), path = %path.display(), "embedding license");
        self.env
            .container
            .replace_entry(path, LICENSE_ENTRY, self.license.as_bytes())
    }

    /// Extend the loan, optionally up to `end` (best effort).
    pub fn renew_rights(&self, end: Option<DateTime<Utc>>) -> StepOutcome {
        info!(license_id = %self.license.id(), ?end, "renewing license");
        let Some(url) = self.device_endpoint(REL_RENEW) else {
            return self.missing_endpoint(SkipReason::NoRenewLink);
        };
        self.device_request("renew", &url, |service, url, id, name| {
            service.renew(url, id, name, end)
        })
    }

    /// Return the loan from this device (best effort).
    pub fn return_license(&self) -> StepOutcome {
        info!(license_id = %self.license.id(), "returning license");
        let Some(url) = self.device_endpoint(REL_RETURN) else {
            return self.missing_endpoint(SkipReason::NoReturnLink);
        };
        self.device_request("return", &url, |service, url, id, name| {
            service.return_license(url, id, name)
        })
    }

    /// Install the decryption context unlocked for this license.
    pub fn establish_context(&mut self, context: DrmContext) {
        self.context = Some(context);
    }

    /// Decrypt protected content with the established context.
    ///
    /// # Errors
    /// `InvalidContext` if no context (or one for another license) is installed.
    pub fn decipher(&self, data: &[u8]) -> Result<Vec<u8>, LcpError> {
        let context = self
            .context
            .as_ref()
            .filter(|c| c.license_id() == self.license.id())
            .ok_or(LcpError::InvalidContext)?;
        self.env.decipher.decrypt(context, data)
    }

    /// Remember a passphrase hash that unlocked this license.
    pub fn remember_passphrase(&self, passphrase_hash: &str) -> Result<(), LcpError> {
        self.env.store.record_passphrase(
            self.license.id(),
            self.license.provider().as_str(),
            self.license.user_id(),
            passphrase_hash,
        )
    }

    /// Passphrase hashes worth trying for this license, best first.
    pub fn possible_passphrases(&self) -> Result<Vec<String>, LcpError> {
        self.env
            .store
            .possible_passphrases(self.license.id(), self.license.user_id())
    }

    /// The license currently held.
    pub fn license(&self) -> &LicenseDocument {
        &self.license
    }

    /// The status document fetched in this session.
    pub fn status(&self) -> Option<&StatusDocument> {
        self.status.as_ref()
    }

    /// The authority's status, if fetched.
    pub fn current_status(&self) -> Option<LicenseStatus> {
        self.status.as_ref().map(|s| s.status())
    }

    /// Progress of the current or last run.
    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    /// Publication the license was read from, if any.
    pub fn archive_path(&self) -> Option<&Path> {
        self.archive_path.as_deref()
    }

    /// When the license was issued.
    pub fn issued(&self) -> DateTime<Utc> {
        self.license.issued()
    }

    /// When the license was last updated.
    pub fn last_update(&self) -> DateTime<Utc> {
        self.license.date_of_last_update()
    }

    /// Provider of the license.
    pub fn provider(&self) -> &Url {
        self.license.provider()
    }

    /// Start of the rights window.
    pub fn rights_start(&self) -> Option<DateTime<Utc>> {
        self.rights().and_then(|r| r.start)
    }

    /// End of the rights window.
    pub fn rights_end(&self) -> Option<DateTime<Utc>> {
        self.rights().and_then(|r| r.end)
    }

    /// Latest end a renewal may reach.
    pub fn potential_rights_end(&self) -> Option<DateTime<Utc>> {
        self.rights().and_then(|r| r.potential_end)
    }

    /// Printable page quota.
    pub fn rights_prints(&self) -> Option<u32> {
        self.rights().and_then(|r| r.print)
    }

    /// Copyable character quota.
    pub fn rights_copies(&self) -> Option<u32> {
        self.rights().and_then(|r| r.copy)
    }

    fn rights(&self) -> Option<&Rights> {
        self.license.rights()
    }

    /// Steps 1-5, shared by `evaluate` and `resolve`.
    fn run_lifecycle(&mut self) -> Result<(), LcpError> {
        let online = self.fetch_status_document()?.is_completed();
        if online {
            self.advance(LifecycleState::StatusFetched);
            self.check_status()?;
            self.advance(LifecycleState::StatusChecked);
            self.update_license_document()?;
            self.advance(LifecycleState::LicenseUpToDate);
        }

        self.validate_rights()?;
        self.advance(LifecycleState::RightsValidated);

        if online {
            self.register();
            self.advance(LifecycleState::Registered);
        }
        Ok(())
    }

    /// Run a pipeline from the top, recording an abort on failure.
    fn run<T>(
        &mut self,
        pipeline: impl FnOnce(&mut Self) -> Result<T, LcpError>,
    ) -> Result<T, LcpError> {
        self.state = LifecycleState::Created;
        let result = pipeline(self);
        if let Err(e) = &result {
            warn!(license_id = %self.license.id(), error = %e, "license lifecycle aborted");
            self.state = LifecycleState::Aborted(e.to_string());
        }
        result
    }

    fn advance(&mut self, state: LifecycleState) {
        debug!(license_id = %self.license.id(), ?state, "lifecycle step completed");
        self.state = state;
    }

    /// Endpoint for `rel` on the status document, template stripped.
    fn device_endpoint(&self, rel: &str) -> Option<String> {
        self.status
            .as_ref()?
            .link(rel)
            .map(|link| strip_template(&link.href).to_string())
    }

    fn missing_endpoint(&self, reason: SkipReason) -> StepOutcome {
        if self.status.is_none() {
            debug!(license_id = %self.license.id(), "no status document");
            StepOutcome::Skipped(SkipReason::NoStatusDocument)
        } else {
            debug!(license_id = %self.license.id(), ?reason, "endpoint not offered");
            StepOutcome::Skipped(reason)
        }
    }

    /// Submit a device request and persist the returned status.
    fn device_request(
        &self,
        action: &'static str,
        url: &str,
        submit: impl FnOnce(&LcpService, &str, &str, &str) -> Result<LicenseStatus, LcpError>,
    ) -> StepOutcome {
        let result = self.env.device.device_id().and_then(|device_id| {
            let device_name = self.env.device.device_name();
            let status = submit(&self.env.service, url, &device_id, &device_name)?;
            self.env.store.update_status(
                self.license.id(),
                status.as_str(),
                self.license.date_of_last_update(),
            )?;
            Ok(status)
        });

        match result {
            Ok(status) => {
                info!(license_id = %self.license.id(), action, %status, "device request accepted");
                StepOutcome::Completed
            }
            Err(e) => {
                warn!(license_id = %self.license.id(), action, error = %e, "device request failed");
                StepOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Drop a URI template suffix such as `{?id,name}` or `{?end,id,name}`.
fn strip_template(href: &str) -> &str {
    href.find("{?").map_or(href, |i| &href[..i])
}
