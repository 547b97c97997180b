use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    Pause,
    Run,
    End,
}

/// Number of parts a stream pays before it finishes
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TotalParts {
    Finite(u64),
    Infinite,
}

impl TotalParts {
    pub fn is_complete(&self, current_part: u64) -> bool {
        match self {
            TotalParts::Finite(total) => current_part >= *total,
            TotalParts::Infinite => false,
        }
    }
}

/// Everything needed to drive a stream
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StreamParams {
    /// satoshi per part
    pub price: u64,
    pub total_parts: TotalParts,
    /// parts already paid
    #[serde(default)]
    pub current_part: u64,
    /// pause between a settled part and the next invoice request
    pub delay_ms: u64,
    /// identity of the receiving node
    pub destination: String,
    #[serde(default)]
    pub memo: Option<String>,
}

impl StreamParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.price == 0 {
            return Err("price must be positive".to_string());
        }
        if self.destination.is_empty() {
            return Err("destination is required".to_string());
        }
        if let TotalParts::Finite(total) = self.total_parts {
            if self.current_part > total {
                return Err(format!("current part {} exceeds total {}", self.current_part, total));
            }
        }
        Ok(())
    }
}

/// Fields known from a persisted record, used to start a stream that is not registered yet
/// or to fill in what a registered stream lacks
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct StartDefaults {
    pub price: Option<u64>,
    pub total_parts: Option<TotalParts>,
    pub current_part: Option<u64>,
    pub delay_ms: Option<u64>,
    pub destination: Option<String>,
    pub memo: Option<String>,
}

impl StartDefaults {
    /// Complete parameters, if every required field is present
    pub fn to_params(&self) -> Option<StreamParams> {
        Some(StreamParams {
            price: self.price?,
            total_parts: self.total_parts?,
            current_part: self.current_part.unwrap_or(0),
            delay_ms: self.delay_ms?,
            destination: self.destination.clone()?,
            memo: self.memo.clone(),
        })
    }

    pub fn fill(&self, params: &mut StreamParams) {
        if params.memo.is_none() {
            params.memo = self.memo.clone();
        }
    }
}

impl From<StreamParams> for StartDefaults {
    fn from(p: StreamParams) -> Self {
        StartDefaults {
            price: Some(p.price),
            total_parts: Some(p.total_parts),
            current_part: Some(p.current_part),
            delay_ms: Some(p.delay_ms),
            destination: Some(p.destination),
            memo: p.memo,
        }
    }
}

/// Latest observable state of a stream
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSnapshot {
    pub status: StreamStatus,
    pub current_part: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params() -> StreamParams {
        StreamParams {
            price: 10,
            total_parts: TotalParts::Finite(5),
            current_part: 0,
            delay_ms: 1000,
            destination: "abc".to_string(),
            memo: None,
        }
    }

    #[test]
    fn total_parts_test() {
        assert!(!TotalParts::Finite(5).is_complete(4));
        assert!(TotalParts::Finite(5).is_complete(5));
        assert!(!TotalParts::Infinite.is_complete(u64::MAX));
        assert_eq!(serde_json::to_value(TotalParts::Finite(5)).unwrap(), json!({"finite": 5}));
        assert_eq!(serde_json::to_value(TotalParts::Infinite).unwrap(), json!("infinite"));
    }

    #[test]
    fn validate_test() {
        assert!(params().validate().is_ok());
        assert!(StreamParams { price: 0, ..params() }.validate().is_err());
        assert!(StreamParams { destination: String::new(), ..params() }.validate().is_err());
        assert!(StreamParams { current_part: 6, ..params() }.validate().is_err());
        let infinite =
            StreamParams { total_parts: TotalParts::Infinite, current_part: 600, ..params() };
        assert!(infinite.validate().is_ok());
    }

    #[test]
    fn defaults_test() {
        let defaults = StartDefaults::from(params());
        assert_eq!(defaults.to_params(), Some(params()));
        assert_eq!(StartDefaults { price: None, ..defaults.clone() }.to_params(), None);

        let mut p = params();
        StartDefaults { memo: Some("episode 3".to_string()), ..Default::default() }.fill(&mut p);
        assert_eq!(p.memo.as_deref(), Some("episode 3"));
    }
}
