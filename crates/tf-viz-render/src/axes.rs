//! Linear axis with "nice number" tick generation.

#[derive(Debug, Clone)]
pub struct Axis {
    pub min: f64,
    pub max: f64,
    pub label: String,
    pub tick_positions: Vec<f64>,
    pub tick_labels: Vec<String>,
    pub minor_ticks: Vec<f64>,
}

impl Axis {
    /// Auto-scale linear axis with nice-number ticks.
    pub fn auto_linear(data_min: f64, data_max: f64, target_ticks: usize) -> Self {
        let (nice_min, nice_max, step) = nice_range(data_min, data_max, target_ticks);
        let mut ticks = Vec::new();
        let mut labels = Vec::new();
        let mut v = nice_min;
        while v <= nice_max + step * 0.01 {
            ticks.push(v);
            labels.push(format_tick(v, step));
            v += step;
        }

        let minor_step = step / 5.0;
        let mut minor = Vec::new();
        let mut mv = nice_min;
        while mv <= nice_max + minor_step * 0.01 {
            if !ticks.iter().any(|t| (t - mv).abs() < minor_step * 0.01) {
                minor.push(mv);
            }
            mv += minor_step;
        }

        Self {
            min: nice_min,
            max: nice_max,
            label: String::new(),
            tick_positions: ticks,
            tick_labels: labels,
            minor_ticks: minor,
        }
    }

    /// Axis with fixed limits and ticks at the given step.
    pub fn fixed(min: f64, max: f64, step: f64) -> Self {
        let mut ticks = Vec::new();
        let mut labels = Vec::new();
        let mut v = min;
        while v <= max + step * 0.01 {
            ticks.push(v);
            labels.push(format_tick(v, step));
            v += step;
        }
        Self {
            min,
            max,
            label: String::new(),
            tick_positions: ticks,
            tick_labels: labels,
            minor_ticks: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Map a data value to a pixel coordinate.
    pub fn data_to_pixel(&self, value: f64, px_min: f64, px_max: f64) -> f64 {
        let frac = (value - self.min) / (self.max - self.min);
        px_min + frac * (px_max - px_min)
    }
}

fn nice_range(data_min: f64, data_max: f64, target_ticks: usize) -> (f64, f64, f64) {
    if (data_max - data_min).abs() < 1e-15 {
        return (data_min - 1.0, data_max + 1.0, 1.0);
    }
    let range = data_max - data_min;
    let rough_step = range / (target_ticks.max(2) - 1) as f64;
    let step = nice_step(rough_step);
    let nice_min = (data_min / step).floor() * step;
    let nice_max = (data_max / step).ceil() * step;
    (nice_min, nice_max, step)
}

fn nice_step(rough: f64) -> f64 {
    let exp = rough.abs().log10().floor();
    let frac = rough / 10.0_f64.powf(exp);
    let nice_frac = if frac <= 1.5 {
        1.0
    } else if frac <= 3.5 {
        2.0
    } else if frac <= 7.5 {
        5.0
    } else {
        10.0
    };
    nice_frac * 10.0_f64.powf(exp)
}

fn format_tick(value: f64, step: f64) -> String {
    let decimals = if step >= 1.0 { 0 } else { (-step.log10().floor()) as usize };
    if decimals == 0 {
        let v = if value.abs() < step * 0.01 { 0.0 } else { value };
        format!("{}", v as i64)
    } else {
        format!("{:.prec$}", value, prec = decimals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_linear_covers_data() {
        let ax = Axis::auto_linear(0.0, 10.0, 6);
        assert!(!ax.tick_positions.is_empty());
        assert!(ax.min <= 0.0);
        assert!(ax.max >= 10.0);
    }

    #[test]
    fn fixed_axis_ticks() {
        let ax = Axis::fixed(40.0, 200.0, 20.0);
        assert_eq!(ax.tick_positions.first(), Some(&40.0));
        assert_eq!(ax.tick_positions.last(), Some(&200.0));
        assert_eq!(ax.tick_labels[1], "60");
    }

    #[test]
    fn data_to_pixel_is_linear() {
        let ax = Axis::fixed(0.0, 100.0, 20.0);
        let px = ax.data_to_pixel(50.0, 0.0, 500.0);
        assert!((px - 250.0).abs() < 1e-9);
    }

    #[test]
    fn nice_step_values() {
        assert!((nice_step(3.2) - 2.0).abs() < 1e-9);
        assert!((nice_step(0.7) - 0.5).abs() < 1e-9);
        assert!((nice_step(15.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn negative_zero_is_avoided() {
        let ax = Axis::auto_linear(-3.0, 3.0, 7);
        assert!(ax.tick_labels.iter().all(|l| l != "-0"));
    }
}
