use quick_error::quick_error;
use std::io::Error as IOError;

quick_error! {
    /// Error type for all error variants originated by this crate.
    #[derive(Debug)]
    pub enum RoiMetricsError {
        /// The affine of a volume does not match the affine of the label volume.
        Alignment(volume: String) {
            display("Affine mismatch for volume '{}': all images must be in the same space", volume)
        }

        /// The array shape of a volume does not match the shape of the label volume.
        Shape(volume: String, expected: Vec<usize>, found: Vec<usize>) {
            display("Shape mismatch for volume '{}': expected {:?}, found {:?}", volume, expected, found)
        }

        /// A label voxel value that is not an exact integer.
        InvalidLabelValue(value: f64) {
            display("Invalid label value {}: region identifiers must be integers", value)
        }

        DuplicateMetricName(name: String) {
            display("Duplicate metric name '{}'", name)
        }

        /// The intensity scale factor of a ratio map could not be computed.
        DegenerateScale(reason: String) {
            display("Cannot compute intensity scale factor: {}", reason)
        }

        InvalidColorLut(line: usize, reason: String) {
            display("Invalid color lookup table at line {}: {}", line, reason)
        }

        InvalidConfig(reason: String) {
            display("Invalid configuration: {}", reason)
        }

        UnsupportedDimensionality(ndim: usize) {
            display("Unsupported volume dimensionality {}", ndim)
        }

        /// I/O Error
        Io(err: IOError) {
            from()
            source(err)
            display("I/O error: {}", err)
        }

        Nifti(err: nifti::NiftiError) {
            from()
            source(err)
            display("NIfTI error: {}", err)
        }

        Csv(err: csv::Error) {
            from()
            source(err)
            display("CSV error: {}", err)
        }

        Toml(err: toml::de::Error) {
            from()
            source(err)
            display("TOML error: {}", err)
        }

        Json(err: serde_json::Error) {
            from()
            source(err)
            display("JSON error: {}", err)
        }
    }
}

/// Alias type for results originated from this crate.
pub type Result<T> = ::std::result::Result<T, RoiMetricsError>;
