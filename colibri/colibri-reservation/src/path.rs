// Copyright 2026 Anapaya Systems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Control-plane view of a reservation path.

use std::fmt;

use thiserror::Error;

use crate::address::IsdAsn;

/// One AS on a reservation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathStep {
    /// The AS of this step.
    pub isd_asn: IsdAsn,
    /// Interface where traffic enters the AS. Zero at the first step.
    pub ingress: u16,
    /// Interface where traffic leaves the AS. Zero at the last step.
    pub egress: u16,
}

/// A path as seen by every AS processing a reservation request: the full list of
/// steps and the position of the AS currently processing it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransparentPath {
    /// Position of the processing AS in `steps`.
    pub current_step: usize,
    /// All ASes on the path, source first.
    pub steps: Vec<PathStep>,
}

impl TransparentPath {
    /// Creates a path positioned at its first step.
    pub fn new(steps: Vec<PathStep>) -> Self {
        Self {
            current_step: 0,
            steps,
        }
    }

    /// Source AS, the wildcard AS for an empty path.
    pub fn src_isd_asn(&self) -> IsdAsn {
        self.steps
            .first()
            .map(|s| s.isd_asn)
            .unwrap_or(IsdAsn::WILDCARD)
    }

    /// Destination AS, the wildcard AS for an empty path.
    pub fn dst_isd_asn(&self) -> IsdAsn {
        self.steps
            .last()
            .map(|s| s.isd_asn)
            .unwrap_or(IsdAsn::WILDCARD)
    }

    /// Returns true if the processing AS is the source of the path.
    pub fn is_at_source(&self) -> bool {
        self.current_step == 0
    }

    /// Checks that the path is not empty and the current step lies on it.
    pub fn validate(&self) -> Result<(), PathError> {
        if self.steps.is_empty() {
            return Err(PathError::Empty);
        }
        if self.current_step >= self.steps.len() {
            return Err(PathError::StepOutOfRange {
                current: self.current_step,
                len: self.steps.len(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for TransparentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.current_step)?;
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                write!(f, ">")?;
            }
            write!(f, "{}#{},{}", step.isd_asn, step.ingress, step.egress)?;
        }
        Ok(())
    }
}

/// Malformed reservation path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path has no steps.
    #[error("path has no steps")]
    Empty,
    /// The current step is outside the path.
    #[error("current step {current} outside of path with {len} steps")]
    StepOutOfRange {
        /// Current step.
        current: usize,
        /// Number of steps.
        len: usize,
    },
}
