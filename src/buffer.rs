//! A fixed-capacity circular store for recent points. The backing storage is one contiguous
//! `Vec<f64>` of `capacity * components` values that is allocated once and never resized, which
//! puts a hard ceiling on memory regardless of how long the simulation runs and keeps insertion
//! O(1) amortized. Once full, every insertion overwrites the oldest surviving points; that is
//! the buffer's defined behavior, not an error.

use crate::Result;
use crate::errors::InvalidConfig;

/// Ring buffer of points stored as flat component runs (x, y, z, intensity, ...).
#[derive(Debug, Clone)]
pub struct CircularPointBuffer {
    data: Vec<f64>,
    components: usize,
    capacity: usize,
    head: usize,
    size: usize,
}

impl CircularPointBuffer {
    /// Allocate a buffer holding `capacity` points of `components` values each.
    ///
    /// # Arguments
    ///
    /// * `capacity`: maximum number of points retained, must be at least 1
    /// * `components`: values per point, must be at least 4 (x, y, z, intensity)
    ///
    /// returns: Result<CircularPointBuffer, Box<dyn Error, Global>>
    ///
    /// # Examples
    ///
    /// ```
    /// use lidarsim::buffer::CircularPointBuffer;
    /// let buffer = CircularPointBuffer::try_new(1000, 4).unwrap();
    /// assert_eq!(buffer.capacity(), 1000);
    /// assert_eq!(buffer.len(), 0);
    /// ```
    pub fn try_new(capacity: usize, components: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(InvalidConfig::ZeroCapacity.into());
        }
        if components < 4 {
            return Err(InvalidConfig::TooFewComponents(components).into());
        }
        Ok(Self {
            data: vec![0.0; capacity * components],
            components,
            capacity,
            head: 0,
            size: 0,
        })
    }

    /// Append a batch of points, given as a flat slice whose length must be a multiple of the
    /// component count. A batch that crosses the physical end of the backing array is split into
    /// two copies; a batch larger than the whole buffer keeps only its trailing window, since
    /// everything earlier would be overwritten within the same call anyway.
    pub fn insert(&mut self, batch: &[f64]) -> Result<()> {
        if batch.len() % self.components != 0 {
            return Err(InvalidConfig::MisalignedBatch {
                len: batch.len(),
                components: self.components,
            }
            .into());
        }
        if batch.is_empty() {
            return Ok(());
        }

        let physical = self.data.len();
        let inserted_points = batch.len() / self.components;
        let batch = if batch.len() > physical {
            &batch[batch.len() - physical..]
        } else {
            batch
        };

        let first = (physical - self.head).min(batch.len());
        self.data[self.head..self.head + first].copy_from_slice(&batch[..first]);

        let remainder = batch.len() - first;
        if remainder > 0 {
            self.data[..remainder].copy_from_slice(&batch[first..]);
        }

        self.head = (self.head + batch.len()) % physical;
        self.size = (self.size + inserted_points).min(self.capacity);
        Ok(())
    }

    /// Copy the stored points out in chronological order, oldest first. When the buffer has
    /// wrapped, the two physical segments are rotated so consumers always see one linear run.
    /// Reading an empty buffer returns an empty vec.
    pub fn read_all_linearized(&self) -> Vec<f64> {
        if self.size == 0 {
            log::warn!("reading from an empty point buffer");
            return Vec::new();
        }

        if self.size < self.capacity {
            // Never wrapped, the head marks the end of the only segment
            self.data[..self.head].to_vec()
        } else {
            let mut out = Vec::with_capacity(self.data.len());
            out.extend_from_slice(&self.data[self.head..]);
            out.extend_from_slice(&self.data[..self.head]);
            out
        }
    }

    /// Reset to empty without touching the allocation.
    pub fn clear(&mut self) {
        self.head = 0;
        self.size = 0;
    }

    /// Number of points currently stored.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Maximum number of points the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Values stored per point.
    pub fn components(&self) -> usize {
        self.components
    }
}
