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

use tessera_core::renderer::{CommandList, CommandSink, GpuCommand};

/// A [`CommandSink`] that keeps every command it is given, in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    commands: Vec<GpuCommand>,
    list_calls: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The commands recorded so far.
    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    /// Takes the recorded commands, leaving the sink empty.
    pub fn take(&mut self) -> Vec<GpuCommand> {
        self.list_calls = 0;
        std::mem::take(&mut self.commands)
    }

    /// The number of compiled lists spliced in.
    pub fn list_calls(&self) -> usize {
        self.list_calls
    }

    /// The number of recorded draw calls.
    pub fn draw_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_draw()).count()
    }
}

impl CommandSink for RecordingSink {
    fn record(&mut self, command: GpuCommand) {
        self.commands.push(command);
    }

    fn call_list(&mut self, list: &CommandList) {
        self.list_calls += 1;
        self.commands.extend(list.iter().cloned());
    }
}
