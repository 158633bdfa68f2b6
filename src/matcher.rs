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

//! `MatchPolicy`: the three composable publish strategies layered over
//! `SubscriberIndex`/`SuperTypeResolver`/`VarArgResolver`. The policy itself
//! only records which tiers are active; [`SubscriptionManager`](crate::SubscriptionManager)
//! owns the actual tier composition, since that is where the index and both
//! resolvers already live.

/// Which tiers a publish consults, beyond the always-active exact tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchPolicy {
    /// Exact-type match only.
    Exact,
    /// Exact match, unioned with `SuperTypeResolver`'s result.
    ExactWithSuperTypes,
    /// Exact and super-type match, unioned with `VarArgResolver`'s result.
    ExactWithSuperTypesAndVarArgs,
}

impl MatchPolicy {
    #[must_use]
    pub fn includes_super_types(self) -> bool {
        !matches!(self, Self::Exact)
    }

    #[must_use]
    pub fn includes_var_args(self) -> bool {
        matches!(self, Self::ExactWithSuperTypesAndVarArgs)
    }
}
