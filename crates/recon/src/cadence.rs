//! Upload cadence gate.
//!
//! Non-privileged actors may upload once every `cooldown_days`, counted from
//! the most recent upload to the start of the current UTC day.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;

use cdb_core::Actor;

const SECONDS_PER_DAY: i64 = 86_400;

/// Whole days until the next upload is allowed; zero or negative means now.
///
/// Computed as `(last_upload + cooldown_days) - today_at_midnight_utc`,
/// floored to whole days. Privileged actors and stores without any upload
/// always get `0`; a cooldown too large to represent yields `i64::MAX`.
pub fn days_to_next_upload(
    actor: &Actor,
    last_upload: Option<DateTime<Utc>>,
    cooldown_days: i64,
    now: DateTime<Utc>,
) -> i64 {
    if actor.is_privileged() {
        return 0;
    }
    let Some(last_upload) = last_upload else {
        return 0;
    };

    let today = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    // A cooldown past chrono's range never expires
    let Some(next_allowed) = Duration::try_days(cooldown_days)
        .and_then(|cooldown| last_upload.checked_add_signed(cooldown))
    else {
        return i64::MAX;
    };
    (next_allowed - today).num_seconds().div_euclid(SECONDS_PER_DAY)
}

/// True when the cadence lets `actor` upload right now.
pub fn allowed(
    actor: &Actor,
    last_upload: Option<DateTime<Utc>>,
    cooldown_days: i64,
    now: DateTime<Utc>,
) -> bool {
    days_to_next_upload(actor, last_upload, cooldown_days, now) <= 0
}

/// What one request may do, derived fresh from actor, history and settings.
/// Never shared between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UploadPolicy {
    /// Actor may see upload content (superuser or member of an allowed group).
    pub may_view: bool,
    /// Upload inputs are enabled: permitted and outside the cooldown.
    pub upload_enabled: bool,
    pub days_to_next_upload: i64,
}

impl UploadPolicy {
    pub fn evaluate(
        actor: &Actor,
        last_upload: Option<DateTime<Utc>>,
        cooldown_days: i64,
        allowed_groups: &[String],
        now: DateTime<Utc>,
    ) -> Self {
        let may_view = actor.may_upload(allowed_groups);
        let days = days_to_next_upload(actor, last_upload, cooldown_days, now);

        Self {
            may_view,
            upload_enabled: may_view && (actor.superuser || days <= 0),
            days_to_next_upload: days.max(0),
        }
    }

    pub fn in_cooldown(&self) -> bool {
        self.days_to_next_upload > 0
    }
}
