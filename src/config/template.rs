//! Placeholder substitution for configured strings

/// Camera name placeholder
pub const CAM_NAME: &str = "[cam_name]";
/// Total number of active cameras placeholder
pub const CAMS_NUMBER: &str = "[cams_number]";

/// Substitution context for one camera
#[derive(Debug, Clone, Copy)]
pub struct Template<'a> {
    pub cam_name: &'a str,
    pub cams_number: usize,
}

impl<'a> Template<'a> {
    pub fn new(cam_name: &'a str, cams_number: usize) -> Self {
        Self {
            cam_name,
            cams_number,
        }
    }

    /// Replace every placeholder occurrence in `s`.
    pub fn apply(&self, s: &str) -> String {
        s.replace(CAM_NAME, self.cam_name)
            .replace(CAMS_NUMBER, &self.cams_number.to_string())
    }
}
