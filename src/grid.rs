/// Sampling mesh for the grid flow sweep.
///
/// A `GridSpec` describes a regular lattice of (lat, lon) points covering
/// a rectangular region. Both axes use half-open `[min, max)` semantics:
/// the point count per axis is `ceil((max - min) / step)` and points are
/// generated as `min + i * step`, by index multiplication rather than
/// repeated addition, so float error cannot change the count mid-sweep.
/// When a span divides almost exactly, the quotient can round just past
/// the whole number and the final point then lands on the max bound
/// itself.
///
/// Step sizes must be positive and finite (a zero step would make the
/// mesh infinite), so `validate` is called at configuration load, before
/// the scheduler ever runs. An inverted axis (`max <= min`) is merely
/// degenerate and yields an empty mesh.

// ---------------------------------------------------------------------------
// Mesh types
// ---------------------------------------------------------------------------

/// One sample point of the mesh, in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Bounds and step sizes of the sampling mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_step: f64,
    pub lon_step: f64,
}

impl GridSpec {
    /// Rejects step sizes and bounds that would make the mesh infinite
    /// or meaningless. Call once at startup; the iteration methods assume
    /// a validated spec.
    pub fn validate(&self) -> Result<(), GridError> {
        for (field, value) in [
            ("lat_min", self.lat_min),
            ("lat_max", self.lat_max),
            ("lon_min", self.lon_min),
            ("lon_max", self.lon_max),
            ("lat_step", self.lat_step),
            ("lon_step", self.lon_step),
        ] {
            if !value.is_finite() {
                return Err(GridError::NonFiniteValue { field });
            }
        }
        if self.lat_step <= 0.0 {
            return Err(GridError::NonPositiveStep { axis: "lat", step: self.lat_step });
        }
        if self.lon_step <= 0.0 {
            return Err(GridError::NonPositiveStep { axis: "lon", step: self.lon_step });
        }
        Ok(())
    }

    fn axis_len(min: f64, max: f64, step: f64) -> usize {
        if max <= min {
            return 0;
        }
        ((max - min) / step).ceil() as usize
    }

    /// Number of distinct latitude values in the mesh.
    pub fn rows(&self) -> usize {
        Self::axis_len(self.lat_min, self.lat_max, self.lat_step)
    }

    /// Number of distinct longitude values in the mesh.
    pub fn cols(&self) -> usize {
        Self::axis_len(self.lon_min, self.lon_max, self.lon_step)
    }

    /// Total number of mesh points (`rows × cols`).
    pub fn len(&self) -> usize {
        self.rows() * self.cols()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The mesh points in row-major order: every longitude for a given
    /// latitude before the next latitude.
    pub fn points(&self) -> impl Iterator<Item = GridPoint> + '_ {
        let cols = self.cols();
        (0..self.rows()).flat_map(move |i| {
            (0..cols).map(move |j| GridPoint {
                latitude: self.lat_min + i as f64 * self.lat_step,
                longitude: self.lon_min + j as f64 * self.lon_step,
            })
        })
    }

    /// Geometric center of the region, used as the verification probe
    /// point. Falls back to the min corner on a degenerate axis.
    pub fn center(&self) -> GridPoint {
        let latitude = if self.lat_max > self.lat_min {
            (self.lat_min + self.lat_max) / 2.0
        } else {
            self.lat_min
        };
        let longitude = if self.lon_max > self.lon_min {
            (self.lon_min + self.lon_max) / 2.0
        } else {
            self.lon_min
        };
        GridPoint { latitude, longitude }
    }
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GridError {
    NonPositiveStep { axis: &'static str, step: f64 },
    NonFiniteValue { field: &'static str },
}

impl std::fmt::Display for GridError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GridError::NonPositiveStep { axis, step } => {
                write!(f, "grid {} step must be positive, got {}", axis, step)
            }
            GridError::NonFiniteValue { field } => {
                write!(f, "grid {} must be a finite number", field)
            }
        }
    }
}

impl std::error::Error for GridError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
