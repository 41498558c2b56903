//! Piecewise-linear curves and level-scalable values.

/// A sorted sequence of `(time, value)` keys evaluated by linear
/// interpolation. Out-of-range inputs return the endpoint values; an
/// empty curve is the identity scaler and returns 1.0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Curve {
    keys: Vec<(f32, f32)>,
}

impl Curve {
    /// Builds a curve, sorting the keys by time.
    pub fn new(mut keys: Vec<(f32, f32)>) -> Self {
        keys.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { keys }
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Samples the curve at `time`.
    pub fn evaluate(&self, time: f32) -> f32 {
        let Some(first) = self.keys.first() else {
            return 1.0;
        };
        if time <= first.0 {
            return first.1;
        }
        let last = self.keys[self.keys.len() - 1];
        if time >= last.0 {
            return last.1;
        }
        for window in self.keys.windows(2) {
            let (t0, v0) = window[0];
            let (t1, v1) = window[1];
            if time <= t1 {
                if (t1 - t0).abs() <= f32::EPSILON {
                    return v1;
                }
                let alpha = (time - t0) / (t1 - t0);
                return v0 + (v1 - v0) * alpha;
            }
        }
        last.1
    }
}

/// A float base value optionally scaled by a curve indexed on effect
/// level.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalableFloat {
    pub base: f32,
    pub curve: Option<Curve>,
}

impl ScalableFloat {
    /// A constant value with no level scaling.
    pub fn new(base: f32) -> Self {
        Self { base, curve: None }
    }

    /// A value scaled by the given level curve.
    pub fn with_curve(base: f32, curve: Curve) -> Self {
        Self {
            base,
            curve: Some(curve),
        }
    }

    /// `base * curve(level)`, or `base` without a curve.
    pub fn evaluate(&self, level: i32) -> f32 {
        match &self.curve {
            Some(curve) => self.base * curve.evaluate(level as f32),
            None => self.base,
        }
    }
}

impl From<f32> for ScalableFloat {
    fn from(base: f32) -> Self {
        Self::new(base)
    }
}

/// Integer counterpart of [`ScalableFloat`]; the scaled result is
/// truncated toward zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScalableInt {
    pub base: i32,
    pub curve: Option<Curve>,
}

impl ScalableInt {
    pub fn new(base: i32) -> Self {
        Self { base, curve: None }
    }

    pub fn with_curve(base: i32, curve: Curve) -> Self {
        Self {
            base,
            curve: Some(curve),
        }
    }

    pub fn evaluate(&self, level: i32) -> i32 {
        match &self.curve {
            Some(curve) => (self.base as f32 * curve.evaluate(level as f32)) as i32,
            None => self.base,
        }
    }
}

impl From<i32> for ScalableInt {
    fn from(base: i32) -> Self {
        Self::new(base)
    }
}
