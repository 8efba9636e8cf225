//! Probing a resource with a batch of `(bytes, alignment)` requests.
//!
//! Used by the `memres` binary and the end-to-end examples: every request is
//! served, all successful blocks are held at once so overlaps would show, and
//! the outcome is collected into a serialisable [`ProbeReport`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::TrackingStats;
use crate::error::ProbeParseError;
use crate::resource::{resolve_alignment, MemoryResource};

/// One allocation request, written `BYTES:ALIGN` on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRequest {
    pub bytes: usize,
    pub alignment: usize,
}

impl ProbeRequest {
    pub fn new(bytes: usize, alignment: usize) -> Self {
        Self { bytes, alignment }
    }
}

impl FromStr for ProbeRequest {
    type Err = ProbeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (bytes, alignment) = s
            .split_once(':')
            .ok_or_else(|| ProbeParseError::MissingSeparator(s.to_string()))?;

        let parse = |value: &str| {
            value
                .trim()
                .parse::<usize>()
                .map_err(|_| ProbeParseError::InvalidNumber {
                    value: value.to_string(),
                })
        };

        Ok(Self {
            bytes: parse(bytes)?,
            alignment: parse(alignment)?,
        })
    }
}

impl fmt::Display for ProbeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.bytes, self.alignment)
    }
}

/// What happened to a single [`ProbeRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub bytes: usize,
    pub requested_alignment: usize,
    /// Alignment after the natural-alignment rule, if it was valid.
    pub resolved_alignment: Option<usize>,
    /// Number of chunks of `resolved_alignment` bytes the request occupies.
    pub chunks: Option<usize>,
    pub address: Option<usize>,
    /// Whether `address` is a multiple of `resolved_alignment`.
    pub aligned: bool,
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of [`run_probe`] over a whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub resource: String,
    pub max_alignment: usize,
    pub outcomes: Vec<ProbeOutcome>,
    /// Pairs of live, non-empty blocks whose byte ranges intersect.
    pub overlaps: usize,
    /// Ledger of a tracking backend, if the probed resource has one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tracking: Option<TrackingStats>,
}

impl ProbeReport {
    pub fn with_tracking(mut self, stats: TrackingStats) -> Self {
        self.tracking = Some(stats);
        self
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_ok()).count()
    }
}

/// Serves every request from `resource`, holding all successful blocks until
/// the last request has run, then frees them in reverse order.
///
/// `max_alignment` is the resource's configured maximum; it is only used to
/// report the resolved alignment and chunk count.
pub fn run_probe(
    resource: &dyn MemoryResource,
    max_alignment: usize,
    requests: &[ProbeRequest],
) -> ProbeReport {
    let mut outcomes = Vec::with_capacity(requests.len());
    let mut live = Vec::new();

    for request in requests {
        let resolved = resolve_alignment(request.bytes, request.alignment, max_alignment).ok();
        let chunks = resolved.map(|alignment| request.bytes.div_ceil(alignment));

        let outcome = match resource.allocate(request.bytes, request.alignment) {
            Ok(ptr) => {
                let address = ptr.as_ptr() as usize;
                live.push((ptr, *request));
                ProbeOutcome {
                    bytes: request.bytes,
                    requested_alignment: request.alignment,
                    resolved_alignment: resolved,
                    chunks,
                    address: Some(address),
                    aligned: resolved.is_some_and(|alignment| address % alignment == 0),
                    error: None,
                }
            }
            Err(err) => {
                debug!(%request, %err, "probe request failed");
                ProbeOutcome {
                    bytes: request.bytes,
                    requested_alignment: request.alignment,
                    resolved_alignment: resolved,
                    chunks,
                    address: None,
                    aligned: false,
                    error: Some(err.to_string()),
                }
            }
        };
        outcomes.push(outcome);
    }

    let overlaps = count_overlaps(&outcomes);

    for (ptr, request) in live.into_iter().rev() {
        unsafe { resource.deallocate(ptr, request.bytes, request.alignment) };
    }

    ProbeReport {
        resource: resource.type_label().to_string(),
        max_alignment,
        outcomes,
        overlaps,
        tracking: None,
    }
}

fn count_overlaps(outcomes: &[ProbeOutcome]) -> usize {
    let mut ranges: Vec<(usize, usize)> = outcomes
        .iter()
        .filter(|o| o.bytes > 0)
        .filter_map(|o| o.address.map(|start| (start, start.saturating_add(o.bytes))))
        .collect();
    ranges.sort_unstable();

    let mut overlaps = 0;
    for (i, &(_, end)) in ranges.iter().enumerate() {
        overlaps += ranges[i + 1..]
            .iter()
            .take_while(|(start, _)| *start < end)
            .count();
    }
    overlaps
}
