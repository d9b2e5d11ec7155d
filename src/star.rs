//! A detected source and helpers for lists of them.
//!
//! Stars are value objects. Geometric operations (`rotated`, `zoomed`,
//! `shifted`) return new stars with the same name and attributes, and the
//! list helpers return new vectors instead of touching their input.

use std::collections::BTreeMap;
use std::fmt;

use crate::Vector2;

/// Caller-defined attribute attached to a star.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        PropValue::Int(v)
    }
}

impl From<f64> for PropValue {
    fn from(v: f64) -> Self {
        PropValue::Float(v)
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::Text(v.to_string())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        PropValue::Text(v)
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        PropValue::Bool(v)
    }
}

/// A single source (usually a star) detected in an image or listed in a catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Star {
    /// Position along the image x-axis, in pixels.
    pub x: f64,
    /// Position along the image y-axis, in pixels.
    pub y: f64,
    /// Identifier, unique within a list.
    pub name: String,
    /// Brightness used for sorting (higher = brighter). The exact meaning is catalog-dependent.
    pub flux: f64,
    /// Full width at half maximum, in pixels.
    pub fwhm: Option<f64>,
    /// Elongation (major / minor axis ratio).
    pub elongation: Option<f64>,
    /// Free-form extra attributes, not used by any of the algorithms.
    pub props: BTreeMap<String, PropValue>,
}

/// Star attributes usable as a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Flux,
    Fwhm,
    Elongation,
}

impl Star {
    pub fn new(name: impl Into<String>, x: f64, y: f64, flux: f64) -> Self {
        Self {
            x,
            y,
            name: name.into(),
            flux,
            fwhm: None,
            elongation: None,
            props: BTreeMap::new(),
        }
    }

    /// Nameless, fluxless star used as a geometric probe (e.g. a grid center).
    pub fn at(x: f64, y: f64) -> Self {
        Self::new("untitled", x, y, -1.0)
    }

    pub fn with_fwhm(mut self, fwhm: f64) -> Self {
        self.fwhm = Some(fwhm);
        self
    }

    pub fn with_elongation(mut self, elongation: f64) -> Self {
        self.elongation = Some(elongation);
        self
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn coords(&self) -> Vector2 {
        Vector2::new(self.x, self.y)
    }

    /// Euclidean distance to another star.
    pub fn distance(&self, other: &Star) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Direction of the vector from `self` to `other`, in degrees within [0, 360).
    pub fn trig_angle(&self, other: &Star) -> f64 {
        wrap_degrees((other.y - self.y).atan2(other.x - self.x).to_degrees())
    }

    /// `(index, distance)` for every star of `others`, closest first.
    ///
    /// Ties keep the order of `others`.
    pub fn distance_and_sort(&self, others: &[Star]) -> Vec<(usize, f64)> {
        let mut out: Vec<(usize, f64)> = others
            .iter()
            .enumerate()
            .map(|(i, s)| (i, self.distance(s)))
            .collect();
        out.sort_by(|a, b| a.1.total_cmp(&b.1));
        out
    }

    /// Copy of this star rotated counter-clockwise by `angle_deg` around `center`.
    pub fn rotated(&self, angle_deg: f64, center: (f64, f64)) -> Star {
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        let dx = self.x - center.0;
        let dy = self.y - center.1;
        Star {
            x: center.0 + cos * dx - sin * dy,
            y: center.1 + sin * dx + cos * dy,
            ..self.clone()
        }
    }

    /// Copy scaled by `factor` about the origin.
    pub fn zoomed(&self, factor: f64) -> Star {
        Star {
            x: self.x * factor,
            y: self.y * factor,
            ..self.clone()
        }
    }

    pub fn shifted(&self, shift: (f64, f64)) -> Star {
        Star {
            x: self.x + shift.0,
            y: self.y + shift.1,
            ..self.clone()
        }
    }

    /// The shift that moves `self` onto `other`.
    pub fn shift_to(&self, other: &Star) -> (f64, f64) {
        (other.x - self.x, other.y - self.y)
    }

    fn measure(&self, measure: Measure) -> f64 {
        match measure {
            Measure::Flux => self.flux,
            Measure::Fwhm => self.fwhm.unwrap_or(-1.0),
            Measure::Elongation => self.elongation.unwrap_or(-1.0),
        }
    }
}

impl fmt::Display for Star {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>10} : ({:8.2},{:8.2}) | {:12.2} | {:5.2} {:5.2}",
            self.name,
            self.x,
            self.y,
            self.flux,
            self.fwhm.unwrap_or(-1.0),
            self.elongation.unwrap_or(-1.0)
        )
    }
}

/// `angle` folded into [0, 360).
///
/// `rem_euclid` alone rounds tiny negative angles up to exactly 360.
pub(crate) fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

// ── List helpers ────────────────────────────────────────────────────────────

/// Stars sorted by flux, brightest first. Equal fluxes keep their input order.
pub fn sort_by_flux(stars: &[Star]) -> Vec<Star> {
    let mut sorted = stars.to_vec();
    sorted.sort_by(|a, b| b.flux.total_cmp(&a.flux));
    sorted
}

/// Stars sorted ascending by the given measure. Missing shape measures sort first.
pub fn sort_by(stars: &[Star], measure: Measure) -> Vec<Star> {
    let mut sorted = stars.to_vec();
    sorted.sort_by(|a, b| a.measure(measure).total_cmp(&b.measure(measure)));
    sorted
}

/// All stars carrying the given name.
pub fn find_by_name<'a>(stars: &'a [Star], name: &str) -> Vec<&'a Star> {
    stars.iter().filter(|s| s.name == name).collect()
}

/// Axis-aligned region covered by the stars, as `(xmin, xmax, ymin, ymax)`.
///
/// Each side is widened by `border` times the extent along that axis.
/// Returns `None` for an empty list.
pub fn area(stars: &[Star], border: f64) -> Option<(f64, f64, f64, f64)> {
    let first = stars.first()?;
    let (mut xmin, mut xmax, mut ymin, mut ymax) = (first.x, first.x, first.y, first.y);
    for s in &stars[1..] {
        xmin = xmin.min(s.x);
        xmax = xmax.max(s.x);
        ymin = ymin.min(s.y);
        ymax = ymax.max(s.y);
    }
    let xw = xmax - xmin;
    let yw = ymax - ymin;
    Some((
        xmin - border * xw,
        xmax + border * xw,
        ymin - border * yw,
        ymax + border * yw,
    ))
}

pub fn rotate_stars(stars: &[Star], angle_deg: f64, center: (f64, f64)) -> Vec<Star> {
    stars.iter().map(|s| s.rotated(angle_deg, center)).collect()
}

pub fn zoom_stars(stars: &[Star], factor: f64) -> Vec<Star> {
    stars.iter().map(|s| s.zoomed(factor)).collect()
}

pub fn shift_stars(stars: &[Star], shift: (f64, f64)) -> Vec<Star> {
    stars.iter().map(|s| s.shifted(shift)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trig_angle_quadrants() {
        let o = Star::at(0.0, 0.0);
        assert!((o.trig_angle(&Star::at(1.0, 0.0)) - 0.0).abs() < 1e-12);
        assert!((o.trig_angle(&Star::at(0.0, 1.0)) - 90.0).abs() < 1e-12);
        assert!((o.trig_angle(&Star::at(-1.0, 0.0)) - 180.0).abs() < 1e-12);
        assert!((o.trig_angle(&Star::at(0.0, -1.0)) - 270.0).abs() < 1e-12);
    }

    #[test]
    fn test_wrap_degrees_half_open() {
        assert_eq!(wrap_degrees(-1e-15), 0.0);
        assert_eq!(wrap_degrees(-1e-300), 0.0);
        assert_eq!(wrap_degrees(360.0), 0.0);
        assert!((wrap_degrees(-90.0) - 270.0).abs() < 1e-12);
        assert!((wrap_degrees(725.0) - 5.0).abs() < 1e-12);
        // Just below the positive x-axis.
        let o = Star::at(0.0, 0.0);
        let a = o.trig_angle(&Star::at(1.0, -1e-17));
        assert!((0.0..360.0).contains(&a), "angle {a}");
    }

    #[test]
    fn test_rotated_preserves_identity() {
        let s = Star::new("s1", 10.0, 0.0, 5.0).with_prop("flag", 2i64);
        let r = s.rotated(90.0, (0.0, 0.0));
        assert!(r.x.abs() < 1e-9);
        assert!((r.y - 10.0).abs() < 1e-9);
        assert_eq!(r.name, "s1");
        assert_eq!(r.props.get("flag"), Some(&PropValue::Int(2)));
        // The source star is untouched.
        assert_eq!(s.x, 10.0);
    }

    #[test]
    fn test_sort_by_flux_descending() {
        let stars = vec![
            Star::new("a", 0.0, 0.0, 1.0),
            Star::new("b", 0.0, 0.0, 3.0),
            Star::new("c", 0.0, 0.0, 2.0),
        ];
        let names: Vec<String> = sort_by_flux(&stars).into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_sort_by_fwhm_ascending() {
        let stars = vec![
            Star::new("a", 0.0, 0.0, 1.0).with_fwhm(3.0),
            Star::new("b", 0.0, 0.0, 1.0).with_fwhm(1.5),
        ];
        let sorted = sort_by(&stars, Measure::Fwhm);
        assert_eq!(sorted[0].name, "b");
    }

    #[test]
    fn test_area_with_border() {
        let stars = vec![Star::at(0.0, 0.0), Star::at(100.0, 50.0)];
        let (xmin, xmax, ymin, ymax) = area(&stars, 0.01).unwrap();
        assert!((xmin + 1.0).abs() < 1e-12);
        assert!((xmax - 101.0).abs() < 1e-12);
        assert!((ymin + 0.5).abs() < 1e-12);
        assert!((ymax - 50.5).abs() < 1e-12);
        assert!(area(&[], 0.01).is_none());
    }

    #[test]
    fn test_distance_and_sort() {
        let probe = Star::at(0.0, 0.0);
        let others = vec![Star::at(3.0, 4.0), Star::at(1.0, 0.0), Star::at(0.0, 2.0)];
        let das = probe.distance_and_sort(&others);
        let order: Vec<usize> = das.iter().map(|&(i, _)| i).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert!((das[2].1 - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_find_by_name() {
        let stars = vec![Star::new("x", 0.0, 0.0, 1.0), Star::new("y", 1.0, 1.0, 1.0)];
        assert_eq!(find_by_name(&stars, "y").len(), 1);
        assert!(find_by_name(&stars, "z").is_empty());
    }
}
