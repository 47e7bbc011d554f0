use crate::{Error, Result};

/// A two-dimensional bounding box.
///
/// Min and max are kept in the order they were given. A box with `min_x >
/// max_x` is not corrected; it simply intersects nothing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bbox {
    /// Minimum x.
    pub min_x: f64,

    /// Minimum y.
    pub min_y: f64,

    /// Maximum x.
    pub max_x: f64,

    /// Maximum y.
    pub max_y: f64,
}

impl Bbox {
    /// Normalizes a four or six element bounding box.
    ///
    /// Six element boxes are `[min_x, min_y, min_z, max_x, max_y, max_z]`; the
    /// z values are dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use stac_postgis::Bbox;
    ///
    /// let bbox = Bbox::new(&[97.5, -75.3, 0., 179.3, -65.4, 0.]).unwrap();
    /// assert_eq!(bbox, Bbox::new(&[97.5, -75.3, 179.3, -65.4]).unwrap());
    /// assert!(Bbox::new(&[1., 2., 3.]).is_err());
    /// ```
    pub fn new(values: &[f64]) -> Result<Bbox> {
        match *values {
            [min_x, min_y, max_x, max_y] | [min_x, min_y, _, max_x, max_y, _] => Ok(Bbox {
                min_x,
                min_y,
                max_x,
                max_y,
            }),
            _ => Err(Error::Validation(
                "bbox must have 4 or 6 elements".to_string(),
            )),
        }
    }

    /// Returns this box as `[min_x, min_y, max_x, max_y]`.
    pub fn to_array(self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    /// Returns true if this box intersects the envelope spanned by `min` and
    /// `max`.
    pub fn intersects_envelope(&self, min: (f64, f64), max: (f64, f64)) -> bool {
        min.0 <= self.max_x && max.0 >= self.min_x && min.1 <= self.max_y && max.1 >= self.min_y
    }
}

#[cfg(test)]
mod tests {
    use super::Bbox;
    use crate::Error;

    #[test]
    fn four() {
        let bbox = Bbox::new(&[170., -74., 178., -70.]).unwrap();
        assert_eq!(bbox.to_array(), [170., -74., 178., -70.]);
    }

    #[test]
    fn six_drops_z() {
        let bbox = Bbox::new(&[170., -74., 10., 178., -70., 20.]).unwrap();
        assert_eq!(bbox.to_array(), [170., -74., 178., -70.]);
    }

    #[test]
    fn bad_lengths() {
        for values in [vec![], vec![1.], vec![1., 2., 3.], vec![1., 2., 3., 4., 5.], vec![0.; 8]] {
            match Bbox::new(&values).unwrap_err() {
                Error::Validation(message) => assert_eq!(message, "bbox must have 4 or 6 elements"),
                err => panic!("unexpected error: {:?}", err),
            }
        }
    }

    #[test]
    fn reversed_is_not_corrected() {
        let bbox = Bbox::new(&[10., 0., 5., 1.]).unwrap();
        assert_eq!(bbox.min_x, 10.);
        assert_eq!(bbox.max_x, 5.);
        assert!(!bbox.intersects_envelope((6., 0.5), (7., 0.5)));
    }

    #[test]
    fn intersects_envelope() {
        let bbox = Bbox::new(&[0., 0., 1., 1.]).unwrap();
        assert!(bbox.intersects_envelope((0.5, 0.5), (0.5, 0.5)));
        assert!(bbox.intersects_envelope((1., 1.), (2., 2.)));
        assert!(!bbox.intersects_envelope((1.5, 0.), (2., 1.)));
    }
}
