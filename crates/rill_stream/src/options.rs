// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// Buffer sizing for [`BufferedReader`][crate::BufferedReader] and
/// [`BufferedWriter`][crate::BufferedWriter].
#[derive(Clone, Copy, Debug)]
pub struct BufferOptions {
    min_buffer_size: usize,
    max_buffer_size: usize,
}

impl BufferOptions {
    /// The smallest buffer used. Default 4 KiB.
    #[must_use]
    pub fn with_min_buffer_size(mut self, min_buffer_size: usize) -> Self {
        self.min_buffer_size = min_buffer_size.max(1);
        self.max_buffer_size = self.max_buffer_size.max(self.min_buffer_size);
        self
    }

    /// The largest buffer the tuner will grow to. Default 64 KiB.
    #[must_use]
    pub fn with_max_buffer_size(mut self, max_buffer_size: usize) -> Self {
        self.max_buffer_size = max_buffer_size.max(self.min_buffer_size);
        self
    }

    #[must_use]
    pub(crate) fn min_buffer_size(&self) -> usize {
        self.min_buffer_size
    }

    #[must_use]
    pub(crate) fn max_buffer_size(&self) -> usize {
        self.max_buffer_size
    }
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            min_buffer_size: 4 * 1024,
            max_buffer_size: 64 * 1024,
        }
    }
}
