//! Locale-independent numeric formatting shared by all writers.
//!
//! Reals are written in scientific notation as `d.dddE+XX`: one leading
//! digit, `precision` digits after the point and a signed exponent of at
//! least two digits. With `precision >= 16` the text round-trips to the same
//! `f64`. Column-bound formats use [`fit_real`], which also tries plain
//! notation and keeps whichever form carries more digits.

/// Largest useful precision for an `f64`.
pub const MAX_PRECISION: usize = 16;

pub fn format_real(value: f64, precision: usize) -> String {
    // Avoid emitting "-0.0".
    let value = if value == 0.0 { 0.0 } else { value };
    let raw = format!("{value:.precision$e}");
    let Some((mantissa, exponent)) = raw.split_once('e') else {
        return raw;
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(digits) => ('-', digits),
        None => ('+', exponent),
    };
    format!("{mantissa}E{sign}{digits:0>2}")
}

/// Text for `value` in at most `width` columns, keeping as many of `digits`
/// significant digits as fit. Returns the text and the significant digits it
/// carries, or `None` when not even one digit fits.
pub fn fit_real(value: f64, width: usize, digits: usize) -> Option<(String, usize)> {
    let digits = digits.max(1);
    if value == 0.0 {
        return (width >= 3).then(|| ("0.0".to_string(), digits));
    }
    let sign = usize::from(value < 0.0);
    let exponent = decimal_exponent(value);
    let scientific = fit_scientific(value, width, digits, sign, exponent);
    let plain = fit_plain(value, width, digits, sign, exponent);
    match (scientific, plain) {
        (Some(s), Some(p)) => Some(if p.1 >= s.1 { p } else { s }),
        (s, p) => s.or(p),
    }
}

/// Power of ten of the leading significant digit.
fn decimal_exponent(value: f64) -> i32 {
    let text = format!("{value:e}");
    text.split_once('e')
        .and_then(|(_, exp)| exp.parse().ok())
        .unwrap_or(0)
}

fn fit_scientific(value: f64, width: usize, digits: usize, sign: usize, exponent: i32) -> Option<(String, usize)> {
    let exponent_len = exponent.unsigned_abs().to_string().len().max(2);
    // sign, leading digit, point, 'E', exponent sign, exponent digits
    let overhead = sign + 4 + exponent_len;
    let mut decimals = (digits - 1).min(width.checked_sub(overhead)?);
    loop {
        let text = format_real(value, decimals);
        if text.len() <= width {
            return Some((text, decimals + 1));
        }
        // rounding carried into a longer exponent
        decimals = decimals.checked_sub(1)?;
    }
}

fn fit_plain(value: f64, width: usize, digits: usize, sign: usize, exponent: i32) -> Option<(String, usize)> {
    let exponent = i64::from(exponent);
    let integer_len = usize::try_from(exponent + 1).unwrap_or(0).max(1);
    let room = width.checked_sub(sign + integer_len + 1)?;
    let wanted = usize::try_from(digits as i64 - exponent - 1).ok()?;
    let mut decimals = wanted.min(room);
    while decimals > 0 {
        let text = format!("{value:.decimals$}");
        if text.len() <= width {
            let kept = usize::try_from(exponent + 1 + decimals as i64).ok()?;
            return (kept > 0).then_some((text, kept));
        }
        // rounding carried into the integer part
        decimals -= 1;
    }
    None
}
