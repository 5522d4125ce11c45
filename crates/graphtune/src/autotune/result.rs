//! Benchmark results handed to the selector, and what the selector hands back.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

/// Identity of one kernel implementation variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlgorithmDesc {
    pub algo_id: i64,
    /// Whether the variant runs on the specialised tensor-core path.
    #[serde(default)]
    pub tensor_ops_enabled: bool,
}

impl AlgorithmDesc {
    pub const fn new(algo_id: i64, tensor_ops_enabled: bool) -> Self {
        Self { algo_id, tensor_ops_enabled }
    }
}

impl fmt::Display for AlgorithmDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "algo {}", self.algo_id)?;
        if self.tensor_ops_enabled {
            f.write_str(" (tensor ops)")?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    #[default]
    Unknown,
    /// A guard region around an output or scratch buffer was written.
    RedzoneModified,
    /// Output did not match the reference implementation.
    WrongResult,
    /// Excluded up front, e.g. known-bad on this device.
    Disqualified,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unknown => "unknown",
            Self::RedzoneModified => "redzone modified",
            Self::WrongResult => "wrong result",
            Self::Disqualified => "disqualified",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutotuneFailure {
    #[serde(default)]
    pub kind: FailureKind,
    #[serde(default)]
    pub msg: String,
    /// Address of the user buffer the failure was detected in, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_address: Option<u64>,
}

/// Outcome of benchmarking one candidate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub algorithm: AlgorithmDesc,
    /// Measured run time. Absent when the candidate did not run to completion.
    #[serde(default, rename = "run_time_us", with = "run_time_micros", skip_serializing_if = "Option::is_none")]
    pub run_time: Option<Duration>,
    #[serde(default)]
    pub scratch_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<AutotuneFailure>,
}

impl CandidateResult {
    pub fn succeeded(algorithm: AlgorithmDesc, run_time: Duration, scratch_bytes: u64) -> Self {
        Self {
            algorithm,
            run_time: Some(run_time),
            scratch_bytes,
            failure: None,
        }
    }

    pub fn failed(algorithm: AlgorithmDesc, kind: FailureKind, msg: impl Into<String>) -> Self {
        Self {
            algorithm,
            run_time: None,
            scratch_bytes: 0,
            failure: Some(AutotuneFailure {
                kind,
                msg: msg.into(),
                buffer_address: None,
            }),
        }
    }

    #[inline]
    pub fn is_usable(&self) -> bool {
        self.failure.is_none()
    }

    #[inline]
    pub fn needs_scratch(&self) -> bool {
        self.scratch_bytes != 0
    }
}

/// Selected algorithms for a kernel launch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlgorithmChoice {
    pub algorithm: AlgorithmDesc,
    /// Fallback that needs no scratch memory, used when scratch allocation fails at launch.
    pub algorithm_no_scratch: Option<AlgorithmDesc>,
}

/// Positions of the selected candidates within the input slice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanIndices {
    pub index: Option<usize>,
    pub index_no_scratch: Option<usize>,
}

impl PlanIndices {
    /// Both indices in the `-1`-for-none convention used by plan-based kernel APIs.
    pub fn as_raw(&self) -> (i64, i64) {
        let raw = |idx: Option<usize>| idx.and_then(|i| i64::try_from(i).ok()).unwrap_or(-1);
        (raw(self.index), raw(self.index_no_scratch))
    }
}

mod run_time_micros {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_f64(duration.as_secs_f64() * 1e6),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|micros| Duration::try_from_secs_f64(micros / 1e6).map_err(D::Error::custom))
            .transpose()
    }
}
