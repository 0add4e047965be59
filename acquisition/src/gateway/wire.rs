//! JSON bodies exchanged with the detection backend.

use serde::{Deserialize, Serialize};

use super::{AttackKind, SpoofingVerdict};
use crate::detection::{Detection, FeatureAttribution, LSTM_PLACEHOLDER_CONFIDENCE};
use crate::reading::RawSample;

#[derive(Debug, Deserialize)]
pub struct SampleResponse {
    pub count: usize,
    pub samples: Vec<RawSample>,
}

#[derive(Debug, Serialize)]
pub struct AttackRequest {
    pub attack_type: AttackKind,
    pub num_samples: usize,
}

#[derive(Debug, Deserialize)]
pub struct AttackResponse {
    pub count: usize,
    pub attack_type: String,
    pub samples: Vec<RawSample>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FeatureImportance {
    #[serde(default)]
    pub features: Vec<FeatureAttribution>,
}

#[derive(Debug, Deserialize)]
pub struct SvmResponse {
    pub anomaly_score: f64,
    pub is_anomaly: bool,
    pub confidence: f64,
    #[serde(default)]
    pub feature_importance: Option<FeatureImportance>,
}

impl SvmResponse {
    pub fn into_detection(self) -> Detection {
        let detection = Detection::native(self.anomaly_score, self.is_anomaly, self.confidence);
        match self.feature_importance {
            Some(importance) => detection.with_attribution(importance.features),
            None => detection,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LstmResponse {
    pub reconstruction_error: f64,
    pub is_anomaly: bool,
}

impl LstmResponse {
    pub fn into_detection(self) -> Detection {
        Detection::placeholder(
            self.reconstruction_error,
            self.is_anomaly,
            LSTM_PLACEHOLDER_CONFIDENCE,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct BatteryResponse {
    pub anomaly_score: f64,
    pub is_spoofed: bool,
}

impl From<BatteryResponse> for SpoofingVerdict {
    fn from(resp: BatteryResponse) -> Self {
        Self {
            is_spoofed: resp.is_spoofed,
            anomaly_score: resp.anomaly_score,
        }
    }
}
