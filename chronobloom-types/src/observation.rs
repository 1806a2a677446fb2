//! Observation records: one phenological sighting each.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A single recorded phenological sighting.
///
/// Immutable once created by a source; terminal once emitted.
///
/// Field names are the wire names. Deserialization also accepts the legacy
/// names older events were written with (`observation_id`, `state`,
/// `phenophase_status`, ...), and numbers encoded as strings, which is how
/// search exports hand back extracted fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Unique within one emission batch.
    #[serde(alias = "observation_id", deserialize_with = "lenient::string")]
    pub id: String,
    /// Numeric species identifier.
    #[serde(deserialize_with = "lenient::number")]
    pub species_id: u32,
    /// Common name of the species.
    pub species_name: String,
    /// Numeric phenophase identifier.
    #[serde(deserialize_with = "lenient::number")]
    pub phenophase_id: u32,
    /// Human-readable phenophase, e.g. "First leaf".
    pub phenophase_name: String,
    /// Calendar date of the sighting.
    pub observation_date: NaiveDate,
    /// Instant of the sighting, epoch seconds on the wire.
    #[serde(
        alias = "observation_date_time",
        serialize_with = "chrono::serde::ts_seconds::serialize",
        deserialize_with = "lenient::timestamp"
    )]
    pub observed_at: DateTime<Utc>,
    /// Degrees, within [-90, 90].
    #[serde(deserialize_with = "lenient::number")]
    pub latitude: f64,
    /// Degrees, within [-180, 180].
    #[serde(deserialize_with = "lenient::number")]
    pub longitude: f64,
    /// Two-letter region code, uppercase.
    #[serde(alias = "state")]
    pub region_code: String,
    /// Name of the observation site.
    #[serde(default)]
    pub site_name: String,
    /// Whether the phenophase was present.
    #[serde(alias = "phenophase_status")]
    pub status: PhenophaseStatus,
    /// Reported intensity. Consistency with `status` is by convention only.
    #[serde(alias = "intensity_value", default)]
    pub intensity: Intensity,
    /// Where the record came from, e.g. `NPN` or `SYNTHETIC`.
    #[serde(alias = "data_source")]
    pub source_tag: String,
    /// When this system collected the record.
    #[serde(alias = "collection_timestamp", deserialize_with = "lenient::datetime")]
    pub collected_at: DateTime<Utc>,
}

impl Observation {
    /// Whether latitude and longitude fall inside their geographic ranges.
    pub fn has_valid_coordinates(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Phenophase status: 0 (absent) or 1 (present).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "u8")]
pub enum PhenophaseStatus {
    /// The phenophase was looked for and not seen.
    Absent,
    /// The phenophase was seen.
    Present,
}

impl From<PhenophaseStatus> for u8 {
    fn from(status: PhenophaseStatus) -> Self {
        match status {
            PhenophaseStatus::Absent => 0,
            PhenophaseStatus::Present => 1,
        }
    }
}

impl TryFrom<u8> for PhenophaseStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PhenophaseStatus::Absent),
            1 => Ok(PhenophaseStatus::Present),
            other => Err(format!("phenophase status must be 0 or 1, got {other}")),
        }
    }
}

impl<'de> Deserialize<'de> for PhenophaseStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: u8 = lenient::number(deserializer)?;
        PhenophaseStatus::try_from(raw).map_err(serde::de::Error::custom)
    }
}

/// Reported intensity of a phenophase.
///
/// Serialized as `""`, `"Low"`, `"Medium"` or `"High"`. Any other incoming
/// value reads as [`Intensity::Unspecified`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Intensity {
    /// No intensity reported.
    #[default]
    Unspecified,
    /// Low intensity.
    Low,
    /// Medium intensity.
    Medium,
    /// High intensity.
    High,
}

impl Intensity {
    /// Every value, in wire order.
    pub const ALL: [Intensity; 4] = [
        Intensity::Unspecified,
        Intensity::Low,
        Intensity::Medium,
        Intensity::High,
    ];

    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Intensity::Unspecified => "",
            Intensity::Low => "Low",
            Intensity::Medium => "Medium",
            Intensity::High => "High",
        }
    }
}

impl From<String> for Intensity {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Intensity::Low,
            "medium" => Intensity::Medium,
            "high" => Intensity::High,
            _ => Intensity::Unspecified,
        }
    }
}

impl From<Intensity> for String {
    fn from(value: Intensity) -> Self {
        value.as_str().to_string()
    }
}

/// Deserializers that accept both native JSON values and their string forms.
mod lenient {
    use std::fmt::Display;
    use std::str::FromStr;

    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr<T> {
        Num(T),
        Str(String),
    }

    pub(super) fn number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: FromStr + Deserialize<'de>,
        T::Err: Display,
    {
        match NumOrStr::<T>::deserialize(deserializer)? {
            NumOrStr::Num(n) => Ok(n),
            NumOrStr::Str(s) => s.trim().parse().map_err(D::Error::custom),
        }
    }

    pub(super) fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match NumOrStr::<i64>::deserialize(deserializer)? {
            NumOrStr::Num(n) => Ok(n.to_string()),
            NumOrStr::Str(s) => Ok(s),
        }
    }

    pub(super) fn timestamp<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let secs: f64 = number(deserializer)?;
        Utc.timestamp_opt(secs as i64, 0)
            .single()
            .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {secs}")))
    }

    pub(super) fn datetime<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        // Older events carry a naive local ISO timestamp.
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| D::Error::custom(format!("invalid timestamp {raw:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Observation {
        Observation {
            id: "obs-1".into(),
            species_id: 52,
            species_name: "Lilac".into(),
            phenophase_id: 501,
            phenophase_name: "First flower".into(),
            observation_date: NaiveDate::from_ymd_opt(2024, 4, 20).unwrap(),
            observed_at: DateTime::from_timestamp(1_713_600_000, 0).unwrap(),
            latitude: 40.7128,
            longitude: -74.006,
            region_code: "NY".into(),
            site_name: "Backyard".into(),
            status: PhenophaseStatus::Present,
            intensity: Intensity::Medium,
            source_tag: "NPN".into(),
            collected_at: DateTime::from_timestamp(1_713_600_100, 0).unwrap(),
        }
    }

    #[test]
    fn serializes_with_wire_names() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["id"], "obs-1");
        assert_eq!(value["observed_at"], 1_713_600_000);
        assert_eq!(value["status"], 1);
        assert_eq!(value["intensity"], "Medium");
        assert_eq!(value["region_code"], "NY");
        assert_eq!(value["observation_date"], "2024-04-20");
    }

    #[test]
    fn reads_legacy_field_names() {
        let legacy = json!({
            "observation_id": "test_1713600000_0",
            "species_id": 3,
            "species_name": "Red maple",
            "phenophase_id": 373,
            "phenophase_name": "First leaf",
            "observation_date": "2024-04-20",
            "observation_date_time": 1713600000,
            "latitude": 37.5,
            "longitude": -110.25,
            "state": "CA",
            "site_name": "Test Site 1",
            "phenophase_status": 0,
            "intensity_value": "",
            "data_source": "TEST",
            "collection_timestamp": "2024-04-20T08:00:00.123456"
        });
        let obs: Observation = serde_json::from_value(legacy).unwrap();
        assert_eq!(obs.id, "test_1713600000_0");
        assert_eq!(obs.region_code, "CA");
        assert_eq!(obs.status, PhenophaseStatus::Absent);
        assert_eq!(obs.intensity, Intensity::Unspecified);
        assert_eq!(obs.source_tag, "TEST");
        assert_eq!(obs.observed_at.timestamp(), 1_713_600_000);
    }

    #[test]
    fn reads_numbers_encoded_as_strings() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["species_id"] = json!("52");
        value["latitude"] = json!("40.7128");
        value["status"] = json!("1");
        value["observed_at"] = json!("1713600000");
        let obs: Observation = serde_json::from_value(value).unwrap();
        assert_eq!(obs, sample());
    }

    #[test]
    fn rejects_out_of_range_status() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["status"] = json!(2);
        assert!(serde_json::from_value::<Observation>(value).is_err());
    }

    #[test]
    fn unknown_intensity_reads_as_unspecified() {
        assert_eq!(Intensity::from("Less than 25%".to_string()), Intensity::Unspecified);
        assert_eq!(Intensity::from("high".to_string()), Intensity::High);
    }

    #[test]
    fn coordinate_bounds() {
        let mut obs = sample();
        assert!(obs.has_valid_coordinates());
        obs.latitude = 91.0;
        assert!(!obs.has_valid_coordinates());
        obs.latitude = 0.0;
        obs.longitude = -180.5;
        assert!(!obs.has_valid_coordinates());
    }
}
