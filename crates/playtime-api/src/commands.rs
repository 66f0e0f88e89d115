//! Command types for the playtimed NDJSON protocol

use playtime_util::{EntityId, JobId, UserId};
use serde::{Deserialize, Serialize};

use crate::{API_VERSION, MobState, ReasonCode, TrackerTimes};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: u32,
    /// The command
    pub command: Command,
}

fn default_api_version() -> u32 {
    API_VERSION
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    UnsupportedVersion,
    PlayerNotFound,
    JobNotFound,
    StoreError,
}

/// Commands understood by playtimed
///
/// World commands mutate the simulated host and raise the matching
/// lifecycle event; query commands are answered by the evaluator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    // World commands
    Connect {
        user_id: UserId,
        name: String,
        #[serde(default)]
        whitelisted: bool,
    },
    Disconnect { user_id: UserId },
    Attach { user_id: UserId, entity: EntityId },
    Detach { user_id: UserId },
    SetAdmin { user_id: UserId, admin: bool },
    SetAfk { user_id: UserId, afk: bool },
    SetMobState { entity: EntityId, state: MobState },
    AddRole { user_id: UserId, job: JobId },
    RemoveRole { user_id: UserId, job: JobId },
    SelectCharacter {
        user_id: UserId,
        name: String,
        species: String,
    },
    JoinLobby { user_id: UserId },
    RoundRestart,

    // Queries
    IsAllowed { user_id: UserId, job: JobId },
    AllowedJobs { user_id: UserId },
    FilterJobs { user_id: UserId, jobs: Vec<JobId> },
    DenialReasons { user_id: UserId, job: JobId },
    GetTrackerTimes { user_id: UserId },

    /// Persist all tracked time now
    Save,

    /// Ping for keepalive
    Ping,
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    Ack,
    Allowed { job: JobId, allowed: bool },
    Jobs { jobs: Vec<JobId> },
    Reasons { job: JobId, reasons: Vec<ReasonCode> },
    TrackerTimes { trackers: TrackerTimes },
    Saved,
    Pong,
}
