/// Watch records as returned by the changedetection.io API
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// A point in time as the server reports it: Unix seconds or a date string
#[derive(Debug, Clone, PartialEq)]
pub enum Timestamp {
    Seconds(f64),
    Text(String),
}

impl Timestamp {
    /// `null`, `0`, `false` and `""` all mean "never"
    pub fn from_value(value: &Value) -> Option<Timestamp> {
        match value {
            Value::Number(n) => n.as_f64().filter(|s| *s != 0.0).map(Timestamp::Seconds),
            Value::String(s) if !s.is_empty() => Some(Timestamp::Text(s.clone())),
            _ => None,
        }
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Timestamp {
        Timestamp::Seconds(at.timestamp() as f64)
    }

    /// `None` when the text cannot be read as a date
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Timestamp::Seconds(secs) => from_seconds(*secs),
            Timestamp::Text(text) => parse_text(text),
        }
    }
}

fn from_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis((secs * 1000.0).round() as i64)
}

fn parse_text(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .map(|at| at.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
        .or_else(|| text.parse::<f64>().ok().and_then(from_seconds))
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Timestamp::Seconds(secs) if secs.fract() == 0.0 => serializer.serialize_i64(*secs as i64),
            Timestamp::Seconds(secs) => serializer.serialize_f64(*secs),
            Timestamp::Text(text) => serializer.serialize_str(text),
        }
    }
}

/// One monitored resource. Fields the extension does not interpret are kept
/// in `extra` and passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Watch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_changed: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_viewed: Option<Timestamp>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Watch {
    /// Build a watch from a partial JSON record. `key` is the id the record
    /// was filed under, used when the record carries no `uuid` of its own.
    pub fn from_value(value: Value, key: Option<&str>) -> Watch {
        let mut fields = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let uuid = match fields.remove("uuid") {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
        .or_else(|| key.map(str::to_string));

        let viewed = match fields.get("viewed") {
            Some(Value::Bool(flag)) => {
                let flag = *flag;
                fields.remove("viewed");
                Some(flag)
            }
            _ => None,
        };

        let url = take_string(&mut fields, "url");
        let title = take_string(&mut fields, "title");
        let last_changed = take_timestamp(&mut fields, "last_changed");
        let last_viewed = take_timestamp(&mut fields, "last_viewed");

        Watch {
            uuid,
            url,
            title,
            viewed,
            last_changed,
            last_viewed,
            extra: fields,
        }
    }

    /// Title, then url, then a placeholder
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| self.url.as_deref().filter(|u| !u.is_empty()))
            .unwrap_or("Untitled Watch")
    }

    /// Optimistic flip after a successful "mark viewed" call
    pub fn mark_viewed_locally(&mut self, now: DateTime<Utc>) {
        self.viewed = Some(true);
        self.last_viewed = Some(Timestamp::from_datetime(now));
    }
}

fn take_string(fields: &mut Map<String, Value>, name: &str) -> Option<String> {
    match fields.get(name) {
        Some(Value::String(_)) => match fields.remove(name) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

fn take_timestamp(fields: &mut Map<String, Value>, name: &str) -> Option<Timestamp> {
    fields.remove(name).and_then(|v| Timestamp::from_value(&v))
}

impl<'de> Deserialize<'de> for Watch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Watch::from_value(value, None))
    }
}

/// Human readable age, e.g. "5m ago"
pub fn format_age(at: Option<&Timestamp>, now: DateTime<Utc>) -> String {
    let Some(at) = at else {
        return "Never".to_string();
    };
    let Some(date) = at.to_datetime() else {
        return "Invalid date".to_string();
    };

    let elapsed = now.signed_duration_since(date);
    let hours = elapsed.num_hours();
    let days = hours / 24;

    if days > 7 {
        date.format("%Y-%m-%d").to_string()
    } else if days > 0 {
        format!("{}d ago", days)
    } else if hours > 0 {
        format!("{}h ago", hours)
    } else if elapsed.num_minutes() > 0 {
        format!("{}m ago", elapsed.num_minutes())
    } else {
        "Just now".to_string()
    }
}
