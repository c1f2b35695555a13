use async_trait::async_trait;
use chrono::{Local, Utc};
use chrono_tz::Tz;
use serde_json::Value;

use crate::error::Result;
use crate::parser::Arguments;
use crate::tool::Tool;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";

/// `get_time(zone?)`
pub struct Clock;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimeArgs {
    pub zone: Option<String>,
}

impl Clock {
    /// Current time in `zone`, or local time when the zone is absent or unknown.
    pub fn now_in(zone: Option<&str>) -> String {
        match zone.and_then(resolve_zone) {
            Some(tz) => Utc::now().with_timezone(&tz).format(TIME_FORMAT).to_string(),
            None => local_now(),
        }
    }
}

fn resolve_zone(name: &str) -> Option<Tz> {
    name.trim().parse::<Tz>().ok()
}

fn local_now() -> String {
    let tz_env = std::env::var("TZ").ok();
    let system = iana_time_zone::get_timezone().ok();
    match local_zone(tz_env.as_deref(), system.as_deref()) {
        Some(tz) => Utc::now().with_timezone(&tz).format(TIME_FORMAT).to_string(),
        // Offset only; reached when no zone name can be found.
        None => Local::now().format(TIME_FORMAT).to_string(),
    }
}

/// Named host zone: `TZ` first, then the system zone (`/etc/localtime` and friends).
fn local_zone(tz_env: Option<&str>, system: Option<&str>) -> Option<Tz> {
    // POSIX allows a leading ':' in `TZ`.
    tz_env
        .map(|name| name.trim_start_matches(':'))
        .and_then(resolve_zone)
        .or_else(|| system.and_then(resolve_zone))
}

#[async_trait]
impl Tool for Clock {
    type Args = TimeArgs;
    type Output = String;

    fn name(&self) -> &'static str {
        "get_time"
    }

    fn signature(&self) -> &'static str {
        "get_time(zone?)"
    }

    fn description(&self) -> &'static str {
        "returns current time, zone optional (e.g., 'UTC', 'America/Los_Angeles')"
    }

    fn parse_args(&self, arguments: &Arguments) -> Result<TimeArgs> {
        // Anything but a non-empty string means "local time".
        let zone = arguments
            .get("zone")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|zone| !zone.is_empty())
            .map(String::from);
        Ok(TimeArgs { zone })
    }

    async fn call(&self, args: TimeArgs) -> Result<String> {
        Ok(Clock::now_in(args.zone.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use serde_json::json;

    fn assert_timestamp(text: &str) {
        let (stamp, zone) = text.split_at(19);
        NaiveDateTime::parse_from_str(stamp, "%Y-%m-%d %H:%M:%S")
            .unwrap_or_else(|err| panic!("bad timestamp {text:?}: {err}"));
        assert!(zone.starts_with(' ') && zone.len() > 1, "missing zone in {text:?}");
    }

    #[test]
    fn formats_named_zone() {
        let text = Clock::now_in(Some("UTC"));
        assert_timestamp(&text);
        assert!(text.ends_with(" UTC"));
    }

    #[test]
    fn unknown_zone_falls_back_to_local() {
        assert_timestamp(&Clock::now_in(Some("Mars/Olympus_Mons")));
        assert_timestamp(&Clock::now_in(None));
    }

    #[test]
    fn local_zone_prefers_tz_then_system() {
        assert_eq!(
            local_zone(Some("Europe/Paris"), Some("Asia/Tokyo")),
            Some(chrono_tz::Europe::Paris)
        );
        assert_eq!(
            local_zone(Some(":America/New_York"), None),
            Some(chrono_tz::America::New_York)
        );
        assert_eq!(
            local_zone(Some("EST5EDT,M3.2.0,M11.1.0"), Some("Etc/UTC")),
            Some(chrono_tz::Etc::UTC)
        );
        assert_eq!(local_zone(None, Some("not a zone")), None);
    }

    #[test]
    fn local_time_uses_zone_abbreviation() {
        let tz_env = std::env::var("TZ").ok();
        let system = iana_time_zone::get_timezone().ok();
        let Some(tz) = local_zone(tz_env.as_deref(), system.as_deref()) else {
            return;
        };

        let text = Clock::now_in(None);
        assert_timestamp(&text);
        let suffix = &text[20..];
        // chrono's `Local` renders `+00:00`; named zones never carry a colon.
        assert!(!suffix.contains(':'), "numeric offset in {text:?}");
        let expected = Utc::now().with_timezone(&tz).format("%Z").to_string();
        assert_eq!(suffix, expected);
    }

    #[test]
    fn non_string_zone_means_local() {
        let args = Clock.parse_args(json!({"zone": 42}).as_object().unwrap()).unwrap();
        assert_eq!(args.zone, None);

        let args = Clock.parse_args(json!({"zone": "  "}).as_object().unwrap()).unwrap();
        assert_eq!(args.zone, None);

        let args = Clock
            .parse_args(json!({"zone": "America/Los_Angeles"}).as_object().unwrap())
            .unwrap();
        assert_eq!(args.zone.as_deref(), Some("America/Los_Angeles"));
    }

    #[tokio::test]
    async fn call_never_fails() {
        let text = Clock
            .call(TimeArgs {
                zone: Some("not/a zone".into()),
            })
            .await
            .unwrap();
        assert_timestamp(&text);
    }
}
