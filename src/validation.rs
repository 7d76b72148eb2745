//! Request validation for preventing invalid or unsafe operations.
//!
//! Coordinate and package-name checks with descriptive errors suitable for
//! exposing to upstream callers. Malformed payloads fail fast as
//! [`ActionError::InvalidArgs`] before any native surface is touched.

use crate::error::ActionError;

/// Validates screen-space coordinates used for pointer events.
#[derive(Debug)]
pub struct CoordinateValidator {
    screen_width: i32,
    screen_height: i32,
}

impl CoordinateValidator {
    /// Creates a new validator with the given screen resolution in pixels.
    pub fn new(screen_width: u32, screen_height: u32) -> Self {
        Self {
            screen_width: screen_width as i32,
            screen_height: screen_height as i32,
        }
    }

    /// Ensures the provided coordinates are within screen bounds (inclusive
    /// lower, exclusive upper).
    pub fn validate(&self, x: i32, y: i32) -> Result<(), ActionError> {
        if x < 0 || y < 0 {
            return Err(ActionError::InvalidArgs(format!(
                "coordinates ({x}, {y}) are negative"
            )));
        }
        if x >= self.screen_width || y >= self.screen_height {
            return Err(ActionError::InvalidArgs(format!(
                "coordinates ({x}, {y}) exceed screen {}x{}",
                self.screen_width, self.screen_height
            )));
        }
        Ok(())
    }
}

/// Validates a suggested package file name before it is written to disk.
pub fn validate_package_name(name: &str) -> Result<(), ActionError> {
    if name.trim().is_empty() {
        return Err(ActionError::InvalidArgs(
            "package name cannot be empty".to_string(),
        ));
    }
    if name.len() > 256 {
        return Err(ActionError::InvalidArgs(format!(
            "package name is too long: {} characters (max: 256)",
            name.len()
        )));
    }
    if name.contains(['/', '\\']) || name.contains("..") {
        return Err(ActionError::InvalidArgs(
            "package name contains path characters".to_string(),
        ));
    }
    Ok(())
}
