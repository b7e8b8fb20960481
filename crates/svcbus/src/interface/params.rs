// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::DataState;

/// Data states of every response parameter, in one allocation.
///
/// `offsets[r]..offsets[r + 1]` is the slice of response `r`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterArray {
    states: Vec<DataState>,
    offsets: Vec<usize>,
}

impl ParameterArray {
    /// Array sized for `counts[r]` parameters per response `r`.
    pub fn new(counts: &[usize]) -> Self {
        let mut offsets = Vec::with_capacity(counts.len() + 1);
        let mut total = 0;
        offsets.push(0);
        for count in counts {
            total += count;
            offsets.push(total);
        }
        Self {
            states: vec![DataState::Unavailable; total],
            offsets,
        }
    }

    pub fn response_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Total number of parameters over all responses.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn param_count(&self, response: usize) -> usize {
        self.params(response).len()
    }

    /// Parameter states of `response` (empty if out of range).
    pub fn params(&self, response: usize) -> &[DataState] {
        match self.range(response) {
            Some((start, end)) => &self.states[start..end],
            None => &[],
        }
    }

    pub fn state(&self, response: usize, param: usize) -> Option<DataState> {
        self.params(response).get(param).copied()
    }

    pub fn set_state(&mut self, response: usize, param: usize, state: DataState) -> bool {
        match self.range(response) {
            Some((start, end)) if start + param < end => {
                self.states[start + param] = state;
                true
            }
            _ => false,
        }
    }

    /// Set every parameter of `response`.
    pub fn set_all(&mut self, response: usize, state: DataState) -> bool {
        match self.range(response) {
            Some((start, end)) => {
                self.states[start..end].fill(state);
                true
            }
            None => false,
        }
    }

    /// Every parameter back to `Unavailable`.
    pub fn reset(&mut self) {
        self.states.fill(DataState::Unavailable);
    }

    fn range(&self, response: usize) -> Option<(usize, usize)> {
        let start = *self.offsets.get(response)?;
        let end = *self.offsets.get(response + 1)?;
        Some((start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let params = ParameterArray::new(&[2, 0, 3]);
        assert_eq!(params.response_count(), 3);
        assert_eq!(params.len(), 5);
        assert_eq!(params.param_count(0), 2);
        assert_eq!(params.param_count(1), 0);
        assert_eq!(params.param_count(2), 3);
        assert_eq!(params.param_count(3), 0);
    }

    #[test]
    fn test_set_and_reset() {
        let mut params = ParameterArray::new(&[2, 3]);
        assert!(params.set_state(1, 2, DataState::Valid));
        assert!(!params.set_state(1, 3, DataState::Valid));
        assert!(!params.set_state(2, 0, DataState::Valid));
        assert_eq!(params.state(1, 2), Some(DataState::Valid));
        assert_eq!(params.state(0, 1), Some(DataState::Unavailable));

        assert!(params.set_all(0, DataState::Invalid));
        assert_eq!(params.params(0), &[DataState::Invalid, DataState::Invalid]);
        assert_eq!(params.state(1, 0), Some(DataState::Unavailable));

        params.reset();
        assert!(params.params(1).iter().all(|s| *s == DataState::Unavailable));
    }

    #[test]
    fn test_empty() {
        let params = ParameterArray::new(&[]);
        assert!(params.is_empty());
        assert_eq!(params.response_count(), 0);
        assert!(params.params(0).is_empty());
    }
}
