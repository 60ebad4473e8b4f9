use std::time::SystemTime;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// REST payloads for game setup and listing.
pub mod game;
/// Health probe payload.
pub mod health;
/// Field checks shared by REST and WebSocket inputs.
pub mod validation;
/// WebSocket protocol frames.
pub mod ws;

/// Timestamps cross the wire as RFC 3339 strings.
fn format_system_time(time: SystemTime) -> String {
    let datetime = OffsetDateTime::from(time);
    datetime
        .format(&Rfc3339)
        .unwrap_or_else(|_| datetime.unix_timestamp().to_string())
}
