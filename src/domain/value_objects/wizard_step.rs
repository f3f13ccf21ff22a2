use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Known wizard sections. The engine itself only ever sees the string key; this enum is
/// the typed boundary offered to UI code. Unknown keys survive as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WizardStep {
    General,
    Building,
    Envelope,
    Heating,
    HotWater,
    Ventilation,
    Photos,
    Summary,
    Custom(String),
}

impl WizardStep {
    pub const KNOWN: [WizardStep; 8] = [
        WizardStep::General,
        WizardStep::Building,
        WizardStep::Envelope,
        WizardStep::Heating,
        WizardStep::HotWater,
        WizardStep::Ventilation,
        WizardStep::Photos,
        WizardStep::Summary,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            WizardStep::General => "general",
            WizardStep::Building => "building",
            WizardStep::Envelope => "envelope",
            WizardStep::Heating => "heating",
            WizardStep::HotWater => "hot_water",
            WizardStep::Ventilation => "ventilation",
            WizardStep::Photos => "photos",
            WizardStep::Summary => "summary",
            WizardStep::Custom(key) => key.as_str(),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, WizardStep::Custom(_))
    }
}

impl From<&str> for WizardStep {
    fn from(value: &str) -> Self {
        match value {
            "general" => WizardStep::General,
            "building" => WizardStep::Building,
            "envelope" => WizardStep::Envelope,
            "heating" => WizardStep::Heating,
            "hot_water" => WizardStep::HotWater,
            "ventilation" => WizardStep::Ventilation,
            "photos" => WizardStep::Photos,
            "summary" => WizardStep::Summary,
            other => WizardStep::Custom(other.to_string()),
        }
    }
}

impl AsRef<str> for WizardStep {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for WizardStep {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for WizardStep {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        Ok(WizardStep::from(key.as_str()))
    }
}
