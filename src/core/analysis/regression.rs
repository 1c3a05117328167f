/// 最小二乘拟合结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// Closed-form ordinary least squares over (x, y) pairs.
///
/// Two accumulation passes, no iteration. Returns `None` for fewer than
/// two points or a degenerate (constant-x) system.
pub fn least_squares(xs: &[f64], ys: &[f64]) -> Option<LinearFit> {
    let n = xs.len();
    if n < 2 || n != ys.len() {
        return None;
    }

    let nf = n as f64;
    let mut sx = 0.0;
    let mut sy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for (&x, &y) in xs.iter().zip(ys) {
        sx += x;
        sy += y;
        sxx += x * x;
        syy += y * y;
        sxy += x * y;
    }

    let denom = nf * sxx - sx * sx;
    if denom == 0.0 {
        return None;
    }

    let slope = (nf * sxy - sx * sy) / denom;
    let intercept = (sy - slope * sx) / nf;

    let var_y = nf * syy - sy * sy;
    let r_squared = if var_y <= 0.0 {
        // constant y: correlation undefined, report no explained variance
        0.0
    } else {
        let r = (nf * sxy - sx * sy) / (denom * var_y).sqrt();
        r * r
    };

    Some(LinearFit {
        slope,
        intercept,
        r_squared,
    })
}
