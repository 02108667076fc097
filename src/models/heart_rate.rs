// Fitbit heart-rate API wire format (activities/heart/date/{start}/{end}[/{detail}].json)

use serde::{Deserialize, Serialize};

/// Response body of the heart-rate time series endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeartRateResponse {
    #[serde(rename = "activities-heart", default)]
    pub overview: Vec<HeartRateOverview>,
    #[serde(rename = "activities-heart-intraday", default)]
    pub intraday: Option<HeartRateIntraday>,
}

/// One day of the `activities-heart` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRateOverview {
    /// `YYYY-MM-DD`
    pub date_time: String,
    pub value: OverviewValue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewValue {
    #[serde(default)]
    pub heart_rate_zones: Vec<WireZone>,
    /// Absent until the vendor has computed it for the day.
    #[serde(default)]
    pub resting_heart_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireZone {
    pub name: String,
    #[serde(default)]
    pub minutes: u32,
    #[serde(default)]
    pub calories_out: f64,
    #[serde(default)]
    pub min: u32,
    #[serde(default)]
    pub max: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartRateIntraday {
    #[serde(default)]
    pub dataset: Vec<WireSample>,
    #[serde(default)]
    pub dataset_interval: u32,
    #[serde(default)]
    pub dataset_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireSample {
    /// `HH:MM:SS`
    pub time: String,
    pub value: u32,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorErrorBody {
    #[serde(default)]
    pub errors: Vec<VendorError>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorError {
    #[serde(default)]
    pub error_type: String,
    #[serde(default)]
    pub message: String,
}

impl VendorErrorBody {
    /// Messages joined with a space, the way the vendor's own clients print them.
    pub fn message(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.message.trim())
            .filter(|m| !m.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
