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

use super::hiz::word_count;

/// One visibility bit per renderable, indexed by stable renderable id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VisibilitySet {
    words: Vec<u32>,
    len: usize,
}

impl VisibilitySet {
    /// Every one of `len` renderables visible.
    pub fn all_visible(len: usize) -> Self {
        let mut words = vec![u32::MAX; word_count(len)];
        if len % 32 != 0 {
            if let Some(last) = words.last_mut() {
                *last = (1u32 << (len % 32)) - 1;
            }
        }
        Self { words, len }
    }

    /// Wraps packed words. Words beyond `word_count(len)` are dropped and missing
    /// words read as hidden.
    pub fn from_words(mut words: Vec<u32>, len: usize) -> Self {
        words.resize(word_count(len), 0);
        Self { words, len }
    }

    /// Number of renderables covered.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when no renderable is covered.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether renderable `index` passed culling. Out-of-range ids are not visible.
    pub fn is_visible(&self, index: usize) -> bool {
        index < self.len && self.words[index >> 5] & (1 << (index & 31)) != 0
    }

    /// Number of visible renderables.
    pub fn visible_count(&self) -> usize {
        (0..self.len).filter(|&i| self.is_visible(i)).count()
    }

    /// Ids of the visible renderables, ascending.
    pub fn iter_visible(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |&i| self.is_visible(i))
    }

    /// The packed words.
    pub fn words(&self) -> &[u32] {
        &self.words
    }
}
