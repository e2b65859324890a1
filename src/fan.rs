use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};

/// One step of a duty-cycle curve: `duty` applies from `min_temp` (inclusive)
/// up to the next step's `min_temp`. The first step has no lower bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveStep {
    pub min_temp: Option<f64>,
    pub duty: u8,
}

impl CurveStep {
    pub const fn new(min_temp: f64, duty: u8) -> Self {
        Self {
            min_temp: Some(min_temp),
            duty,
        }
    }

    pub const fn floor(duty: u8) -> Self {
        Self {
            min_temp: None,
            duty,
        }
    }
}

/// Curve provided by the fan vendor
pub const VENDOR_STEPS: [CurveStep; 6] = [
    CurveStep::floor(0),
    CurveStep::new(30.0, 40),
    CurveStep::new(50.0, 50),
    CurveStep::new(55.0, 75),
    CurveStep::new(60.0, 90),
    CurveStep::new(65.0, 100),
];

/// Fan duty for `temp` on the vendor curve.
pub fn duty_cycle_for(temp: f64) -> u8 {
    lookup(&VENDOR_STEPS, temp)
}

fn lookup(steps: &[CurveStep], temp: f64) -> u8 {
    // NaN compares false against every threshold; run the fan flat out.
    if temp.is_nan() {
        return steps.last().map_or(100, |step| step.duty);
    }

    let mut duty = steps.first().map_or(0, |step| step.duty);
    for step in steps.iter().skip(1) {
        match step.min_temp {
            Some(min_temp) if temp >= min_temp => duty = step.duty,
            _ => break,
        }
    }
    duty
}

/// Piecewise-constant, non-decreasing map from temperature to duty cycle.
///
/// No hysteresis: every call is computed from the given sample alone.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DutyCycleCurve {
    steps: Vec<CurveStep>,
}

impl DutyCycleCurve {
    /// Build a curve, rejecting steps that would make it partial or
    /// non-monotone.
    pub fn new(steps: Vec<CurveStep>) -> Result<Self, ConfigError> {
        let Some(first) = steps.first() else {
            return Err(ConfigError::Curve("no steps".to_string()));
        };
        if first.min_temp.is_some() {
            return Err(ConfigError::Curve(
                "first step must have no min_temp".to_string(),
            ));
        }

        let mut previous = first;
        for step in &steps {
            if step.duty > 100 {
                return Err(ConfigError::Curve(format!("duty {}% above 100%", step.duty)));
            }
            if step.duty < previous.duty {
                return Err(ConfigError::Curve(format!(
                    "duty drops from {}% to {}%",
                    previous.duty, step.duty
                )));
            }
            previous = step;
        }

        for pair in steps[1..].windows(2) {
            match (pair[0].min_temp, pair[1].min_temp) {
                (Some(a), Some(b)) if a < b => {}
                (a, b) => {
                    return Err(ConfigError::Curve(format!(
                        "thresholds must increase, got {:?} then {:?}",
                        a, b
                    )))
                }
            }
        }
        if let Some(step) = steps[1..].iter().find(|s| !s.min_temp.is_some_and(f64::is_finite)) {
            return Err(ConfigError::Curve(format!(
                "threshold {:?} is not a finite temperature",
                step.min_temp
            )));
        }

        Ok(Self { steps })
    }

    pub fn vendor() -> Self {
        Self {
            steps: VENDOR_STEPS.to_vec(),
        }
    }

    pub fn steps(&self) -> &[CurveStep] {
        &self.steps
    }

    /// Duty cycle percentage for `temp`, always in `0..=100`.
    pub fn duty_cycle_for(&self, temp: f64) -> u8 {
        lookup(&self.steps, temp)
    }
}

impl Default for DutyCycleCurve {
    fn default() -> Self {
        Self::vendor()
    }
}

impl<'de> Deserialize<'de> for DutyCycleCurve {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let steps = Vec::<CurveStep>::deserialize(deserializer)?;
        DutyCycleCurve::new(steps).map_err(serde::de::Error::custom)
    }
}
