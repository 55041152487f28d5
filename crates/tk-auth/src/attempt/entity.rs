//! Auth Attempt Entity

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::TsidGenerator;

/// One failed credential check, recorded for the sliding-window abuse
/// detector. Successful logins are never recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthAttempt {
    /// TSID as primary key
    #[serde(rename = "_id")]
    pub id: String,

    /// Attempted login identifier, stored lowercase
    pub username: String,

    /// Client IP the attempt came from
    pub ip: String,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub time: DateTime<Utc>,
}

impl AuthAttempt {
    pub fn new(ip: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: TsidGenerator::generate(),
            username: username.into().to_lowercase(),
            ip: ip.into(),
            time: Utc::now(),
        }
    }
}
