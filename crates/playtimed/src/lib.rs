//! playtimed service logic
//!
//! Wires the job catalog, tracking store, simulated world, play-time manager
//! and evaluator together, and answers protocol requests against them. The
//! binary in `main.rs` owns the runtime: stdin/stdout, ticks and signals.

use playtime_api::{
    API_VERSION, ClientMessage, Command, ErrorCode, ErrorInfo, LifecycleEvent, Request, Response,
    ResponsePayload,
};
use playtime_config::Catalog;
use playtime_core::{JobEligibility, LifecycleBus, PlayTimeManager, Registration, TrackingService};
use playtime_host_api::{CharacterProfile, HeldRole, HostServices, MockWorld, PlayerSession, SessionRegistry};
use playtime_store::{AuditEvent, AuditEventType, Store};
use playtime_util::{MonotonicInstant, PlaytimeError, UserId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Everything playtimed runs, minus the I/O
pub struct Service {
    catalog: Arc<Catalog>,
    store: Arc<dyn Store>,
    world: Arc<MockWorld>,
    manager: Arc<PlayTimeManager>,
    eligibility: Arc<JobEligibility>,
    bus: LifecycleBus,
    registration: Option<Registration>,
}

impl Service {
    /// Build the service and the receiver for messages addressed to clients
    pub fn new(catalog: Catalog, store: Arc<dyn Store>) -> (Self, mpsc::UnboundedReceiver<ClientMessage>) {
        let catalog = Arc::new(catalog);

        let _ = store.append_audit(AuditEvent::new(AuditEventType::CatalogLoaded {
            job_count: catalog.jobs.len(),
            department_count: catalog.departments.len(),
        }));

        let world = Arc::new(MockWorld::new());
        let (manager, outbox) = PlayTimeManager::new(store.clone(), catalog.service.flush_interval);
        let manager = Arc::new(manager);

        let eligibility = Arc::new(JobEligibility::new(
            catalog.clone(),
            manager.clone(),
            HostServices::from_host(world.clone()),
        ));

        let bus = LifecycleBus::new();
        let registration = eligibility.register(&bus);

        info!(
            job_count = catalog.jobs.len(),
            role_timers = catalog.service.role_timers,
            "Service initialized"
        );

        let service = Self {
            catalog,
            store,
            world,
            manager,
            eligibility,
            bus,
            registration: Some(registration),
        };

        (service, outbox)
    }

    /// Advance play-time accounting
    pub fn tick(&self, now: MonotonicInstant) {
        self.manager.update(now);
    }

    /// Handle one NDJSON line. Blank lines produce no response.
    pub fn handle_line(&self, line: &str) -> Option<Response> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        match serde_json::from_str::<Request>(line) {
            Ok(request) => Some(self.handle_request(request)),
            Err(e) => {
                warn!(error = %e, "Malformed request");
                Some(Response::error(
                    0,
                    ErrorInfo::new(ErrorCode::InvalidRequest, format!("Malformed request: {}", e)),
                ))
            }
        }
    }

    pub fn handle_request(&self, request: Request) -> Response {
        let request_id = request.request_id;

        if request.api_version != API_VERSION {
            return Response::error(
                request_id,
                ErrorInfo::new(
                    ErrorCode::UnsupportedVersion,
                    format!("Unsupported API version {} (expected {})", request.api_version, API_VERSION),
                ),
            );
        }

        match self.handle_command(request.command) {
            Ok(payload) => Response::success(request_id, payload),
            Err(e) => {
                debug!(request_id, error = %e, "Request failed");
                Response::error(request_id, error_info(&e))
            }
        }
    }

    fn handle_command(&self, command: Command) -> Result<ResponsePayload, PlaytimeError> {
        match command {
            Command::Connect {
                user_id,
                name,
                whitelisted,
            } => {
                let previous = self.world.session(&user_id);
                let session = self.world.connect(user_id, name, whitelisted);

                // Reconnecting leaves the old body behind.
                if let Some(entity) = previous.and_then(|p| p.attached_entity) {
                    self.bus.publish(&LifecycleEvent::PlayerDetached { user_id, entity });
                }

                if let Err(e) = self.manager.load_player(&session) {
                    self.world.disconnect(&user_id);
                    return Err(e.into());
                }
                Ok(ResponsePayload::Ack)
            }

            Command::Disconnect { user_id } => {
                self.world
                    .disconnect(&user_id)
                    .ok_or(PlaytimeError::PlayerNotFound(user_id))?;
                self.manager.unload_player(&user_id);
                Ok(ResponsePayload::Ack)
            }

            Command::Attach { user_id, entity } => {
                let previous = self
                    .world
                    .attach(&user_id, entity)
                    .ok_or(PlaytimeError::PlayerNotFound(user_id))?;

                if let Some(previous) = previous.filter(|p| *p != entity) {
                    self.bus.publish(&LifecycleEvent::PlayerDetached {
                        user_id,
                        entity: previous,
                    });
                }
                self.bus.publish(&LifecycleEvent::PlayerAttached { user_id, entity });
                Ok(ResponsePayload::Ack)
            }

            Command::Detach { user_id } => {
                self.session(&user_id)?;
                if let Some(entity) = self.world.detach(&user_id) {
                    self.bus.publish(&LifecycleEvent::PlayerDetached { user_id, entity });
                }
                Ok(ResponsePayload::Ack)
            }

            Command::SetAdmin { user_id, admin } => {
                self.session(&user_id)?;
                self.world.set_admin(user_id, admin);
                self.bus.publish(&LifecycleEvent::AdminPermissionsChanged { user_id });
                Ok(ResponsePayload::Ack)
            }

            Command::SetAfk { user_id, afk } => {
                self.session(&user_id)?;
                self.world.set_afk(user_id, afk);
                let event = if afk {
                    LifecycleEvent::PlayerAfk { user_id }
                } else {
                    LifecycleEvent::PlayerUnAfk { user_id }
                };
                self.bus.publish(&event);
                Ok(ResponsePayload::Ack)
            }

            Command::SetMobState { entity, state } => {
                let previous = self.world.set_mob_state(entity, state);
                if previous != Some(state) {
                    // A fresh mob reports its first state as unchanged.
                    self.bus.publish(&LifecycleEvent::MobStateChanged {
                        entity,
                        old_state: previous.unwrap_or(state),
                        new_state: state,
                    });
                }
                Ok(ResponsePayload::Ack)
            }

            Command::AddRole { user_id, job } => {
                self.session(&user_id)?;
                let prototype = self
                    .catalog
                    .job(&job)
                    .ok_or_else(|| PlaytimeError::JobNotFound(job.clone()))?;

                let mind = self
                    .world
                    .add_role(user_id, HeldRole::new(prototype.id.as_str(), prototype.tracker.clone()));
                self.bus.publish(&LifecycleEvent::RoleAdded { mind });
                Ok(ResponsePayload::Ack)
            }

            Command::RemoveRole { user_id, job } => {
                self.session(&user_id)?;
                let mind = self.world.remove_role(&user_id, job.as_str()).ok_or_else(|| {
                    PlaytimeError::invalid(format!("Player {} does not hold role {}", user_id, job))
                })?;
                self.bus.publish(&LifecycleEvent::RoleRemoved { mind });
                Ok(ResponsePayload::Ack)
            }

            Command::SelectCharacter {
                user_id,
                name,
                species,
            } => {
                self.session(&user_id)?;
                self.world
                    .select_character(user_id, CharacterProfile { name, species });
                Ok(ResponsePayload::Ack)
            }

            Command::JoinLobby { user_id } => {
                self.session(&user_id)?;
                self.bus.publish(&LifecycleEvent::PlayerJoinedLobby { user_id });
                Ok(ResponsePayload::Ack)
            }

            Command::RoundRestart => {
                let _ = self
                    .store
                    .append_audit(AuditEvent::new(AuditEventType::RoundRestarted));
                self.bus.publish(&LifecycleEvent::RoundRestartCleanup);
                Ok(ResponsePayload::Ack)
            }

            Command::IsAllowed { user_id, job } => {
                let session = self.session(&user_id)?;
                let allowed = self.eligibility.is_allowed(&session, &job);
                Ok(ResponsePayload::Allowed { job, allowed })
            }

            Command::AllowedJobs { user_id } => {
                let session = self.session(&user_id)?;
                let jobs = self.eligibility.get_disallowed_jobs(&session).into_iter().collect();
                Ok(ResponsePayload::Jobs { jobs })
            }

            Command::FilterJobs { user_id, mut jobs } => {
                self.session(&user_id)?;
                self.eligibility.remove_disallowed_jobs(&user_id, &mut jobs);
                Ok(ResponsePayload::Jobs { jobs })
            }

            Command::DenialReasons { user_id, job } => {
                let session = self.session(&user_id)?;
                if self.catalog.job(&job).is_none() {
                    return Err(PlaytimeError::JobNotFound(job));
                }

                let reasons = self.eligibility.job_denial_reasons(&session, &job);
                if !reasons.is_empty() {
                    let _ = self.store.append_audit(AuditEvent::new(AuditEventType::JobDenied {
                        user_id,
                        job_id: job.clone(),
                        reasons: reasons.iter().map(|r| format!("{:?}", r)).collect(),
                    }));
                }
                Ok(ResponsePayload::Reasons { job, reasons })
            }

            Command::GetTrackerTimes { user_id } => {
                let trackers = self
                    .manager
                    .try_get_tracker_times(&user_id)
                    .ok_or(PlaytimeError::PlayerNotFound(user_id))?;
                Ok(ResponsePayload::TrackerTimes { trackers })
            }

            Command::Save => {
                self.manager.save();
                Ok(ResponsePayload::Saved)
            }

            Command::Ping => Ok(ResponsePayload::Pong),
        }
    }

    fn session(&self, user_id: &UserId) -> Result<PlayerSession, PlaytimeError> {
        self.world
            .session(user_id)
            .ok_or(PlaytimeError::PlayerNotFound(*user_id))
    }

    /// Save everything and deregister the evaluator
    pub fn shutdown(&mut self) {
        self.manager.save();

        if let Some(registration) = self.registration.take() {
            registration.release();
        }

        if let Err(e) = self.store.append_audit(AuditEvent::new(AuditEventType::ServiceStopped)) {
            warn!(error = %e, "Failed to log service shutdown");
        }
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("eligibility", &self.eligibility)
            .field("manager", &self.manager)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

/// Map a service error onto the protocol's error codes
pub fn error_info(error: &PlaytimeError) -> ErrorInfo {
    let code = match error {
        PlaytimeError::JobNotFound(_) => ErrorCode::JobNotFound,
        PlaytimeError::PlayerNotFound(_) => ErrorCode::PlayerNotFound,
        PlaytimeError::StoreError(_) => ErrorCode::StoreError,
        PlaytimeError::InvalidRequest(_) => ErrorCode::InvalidRequest,
    };
    ErrorInfo::new(code, error.to_string())
}
