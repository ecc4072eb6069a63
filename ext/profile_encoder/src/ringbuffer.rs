use crate::error::MeasurementError;

/// Fixed-capacity store for one measurement channel of a session.
///
/// Writes fill the buffer once from the front; there is no wraparound.
/// Timestamps are nanoseconds since the session started.
#[derive(Debug)]
pub struct Ringbuffer<T> {
    capacity: usize,
    timestamps: Vec<u64>,
    values: Vec<T>,
    write_index: usize,
}

/// A point read back from a `Ringbuffer`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeasurementPoint<T> {
    pub elapsed_ns: u64,
    pub value: T,
}

impl<T: Copy + Default> Ringbuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            timestamps: vec![0; capacity],
            values: vec![T::default(); capacity],
            write_index: 0,
        }
    }

    /// Stores one point. Returns `true` ("done") without writing once the
    /// buffer is full; the caller is expected to stop feeding it.
    pub fn record(&mut self, elapsed_ns: u64, value: T) -> bool {
        if self.write_index >= self.capacity {
            return true;
        }
        self.timestamps[self.write_index] = elapsed_ns;
        self.values[self.write_index] = value;
        self.write_index += 1;
        false
    }

    pub fn len(&self) -> usize {
        self.write_index
    }

    pub fn is_empty(&self) -> bool {
        self.write_index == 0
    }

    pub fn is_full(&self) -> bool {
        self.write_index >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Reads back the points written so far.
    pub fn points(&self) -> Result<Vec<MeasurementPoint<T>>, MeasurementError> {
        read_points(&self.timestamps, &self.values, self.write_index)
    }
}

fn read_points<T: Copy>(
    timestamps: &[u64],
    values: &[T],
    count: usize,
) -> Result<Vec<MeasurementPoint<T>>, MeasurementError> {
    if values.len() != timestamps.len() {
        return Err(MeasurementError::LengthMismatch {
            values: values.len(),
            timestamps: timestamps.len(),
        });
    }
    if count > values.len() {
        return Err(MeasurementError::CountExceedsStored {
            requested: count,
            stored: values.len(),
        });
    }
    Ok(timestamps
        .iter()
        .zip(values)
        .take(count)
        .map(|(elapsed_ns, value)| MeasurementPoint {
            elapsed_ns: *elapsed_ns,
            value: *value,
        })
        .collect())
}
