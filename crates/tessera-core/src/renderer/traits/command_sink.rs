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

use crate::renderer::api::command::{CommandList, GpuCommand};

/// An object that records GPU operations for later replay.
///
/// The sink is opaque to the draw list: it either appends a single command
/// verbatim, or is handed a previously compiled [`CommandList`] to splice in.
/// Backends that support native command lists can override
/// [`call_list`](CommandSink::call_list) to record a reference instead of a copy.
pub trait CommandSink {
    /// Appends a single command.
    fn record(&mut self, command: GpuCommand);

    /// Appends every command of a previously compiled list.
    fn call_list(&mut self, list: &CommandList) {
        for command in list {
            self.record(command.clone());
        }
    }
}
