// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2024-2026 The typebus Authors. All rights reserved.
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Bus configuration.

use crate::matcher::MatchPolicy;

/// Configuration consulted by the manager and by the (out-of-scope) async
/// dispatcher collaborator.
///
/// The core owns no threads itself; `number_of_threads` is only ever read
/// by the external dispatcher pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    pub publish_mode: MatchPolicy,
    number_of_threads: usize,
}

impl BusConfig {
    /// Builds a config, normalizing `number_of_threads` to the next
    /// power-of-two with a floor of 2.
    #[must_use]
    pub fn new(publish_mode: MatchPolicy, number_of_threads: usize) -> Self {
        Self {
            publish_mode,
            number_of_threads: Self::normalize_thread_count(number_of_threads),
        }
    }

    #[must_use]
    pub fn number_of_threads(&self) -> usize {
        self.number_of_threads
    }

    fn normalize_thread_count(requested: usize) -> usize {
        requested.max(2).next_power_of_two()
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::new(MatchPolicy::ExactWithSuperTypesAndVarArgs, 2)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, 2)]
    #[case(1, 2)]
    #[case(2, 2)]
    #[case(3, 4)]
    #[case(5, 8)]
    #[case(8, 8)]
    #[case(9, 16)]
    fn normalizes_thread_count_to_power_of_two_floor_two(
        #[case] requested: usize,
        #[case] expected: usize,
    ) {
        let config = BusConfig::new(MatchPolicy::Exact, requested);
        assert_eq!(config.number_of_threads(), expected);
    }
}
