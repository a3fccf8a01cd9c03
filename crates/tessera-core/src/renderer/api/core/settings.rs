// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Settings for a draw list.

use serde::{Deserialize, Serialize};

/// Tunables for a draw list.
///
/// Settings can be built in code or loaded from RON:
///
/// ```ignore
/// let settings = DrawListSettings::from_ron("(verify_on_mutation: true)")?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawListSettings {
    /// If `true`, the ordering tree is fully verified after every add and remove.
    ///
    /// Verification walks the whole tree, so this is off by default.
    pub verify_on_mutation: bool,
    /// Capacity hint for the number of entries the list will hold.
    pub expected_entries: usize,
    /// If `true`, every compiled transition is logged at trace level.
    pub log_transitions: bool,
}

impl DrawListSettings {
    /// Parses settings from RON. Missing fields keep their default value.
    pub fn from_ron(source: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(source)
    }
}

impl Default for DrawListSettings {
    fn default() -> Self {
        Self {
            verify_on_mutation: false,
            expected_entries: 64,
            log_transitions: false,
        }
    }
}
