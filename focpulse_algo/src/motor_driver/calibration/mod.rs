mod offset_calibrator;

pub use offset_calibrator::{CalibrationAction, CalibrationState, OffsetCalibrator};
