//! Probability colors. The heat scale interpolates between red (impossible)
//! and green (confirmed) in CIELAB so the perceived brightness ramps evenly,
//! instead of the washed-out midpoints a plain RGB lerp gives.

/// Fill for cells with no probability value.
pub const NEUTRAL_HEX: &str = "#cccccc";

const HEAT_LOW: (u8, u8, u8) = (0xff, 0x00, 0x00);
const HEAT_HIGH: (u8, u8, u8) = (0x00, 0x80, 0x00);

// D65 reference white.
const XN: f64 = 0.95047;
const YN: f64 = 1.0;
const ZN: f64 = 1.08883;

fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(c: f64) -> f64 {
    if c <= 0.0031308 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn lab_f(t: f64) -> f64 {
    const DELTA: f64 = 6.0 / 29.0;
    if t > DELTA * DELTA * DELTA {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

fn lab_f_inv(t: f64) -> f64 {
    const DELTA: f64 = 6.0 / 29.0;
    if t > DELTA {
        t * t * t
    } else {
        3.0 * DELTA * DELTA * (t - 4.0 / 29.0)
    }
}

fn rgb_to_lab((r, g, b): (u8, u8, u8)) -> (f64, f64, f64) {
    let r = srgb_to_linear(r as f64 / 255.0);
    let g = srgb_to_linear(g as f64 / 255.0);
    let b = srgb_to_linear(b as f64 / 255.0);
    let x = 0.4124564 * r + 0.3575761 * g + 0.1804375 * b;
    let y = 0.2126729 * r + 0.7151522 * g + 0.0721750 * b;
    let z = 0.0193339 * r + 0.1191920 * g + 0.9503041 * b;
    let fx = lab_f(x / XN);
    let fy = lab_f(y / YN);
    let fz = lab_f(z / ZN);
    (116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz))
}

fn lab_to_rgb((l, a, b): (f64, f64, f64)) -> (u8, u8, u8) {
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;
    let x = XN * lab_f_inv(fx);
    let y = YN * lab_f_inv(fy);
    let z = ZN * lab_f_inv(fz);
    let r = 3.2404542 * x - 1.5371385 * y - 0.4985314 * z;
    let g = -0.9692660 * x + 1.8760108 * y + 0.0415560 * z;
    let bl = 0.0556434 * x - 0.2040259 * y + 1.0572252 * z;
    let quant = |c: f64| (linear_to_srgb(c.clamp(0.0, 1.0)).clamp(0.0, 1.0) * 255.0).round() as u8;
    (quant(r), quant(g), quant(bl))
}

/// Hex fill for probability `p`. Values outside `[0, 1]` clamp to the scale
/// ends and non-finite values read as 0.
pub fn heat_hex(p: f64) -> String {
    let t = if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 };
    let lo = rgb_to_lab(HEAT_LOW);
    let hi = rgb_to_lab(HEAT_HIGH);
    let lab = (
        lo.0 + (hi.0 - lo.0) * t,
        lo.1 + (hi.1 - lo.1) * t,
        lo.2 + (hi.2 - lo.2) * t,
    );
    let (r, g, b) = lab_to_rgb(lab);
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

/// Fill for an optional probability: the heat scale when present, the
/// neutral gray when absent.
pub fn fill_hex(p: Option<f64>) -> String {
    match p {
        Some(v) => heat_hex(v),
        None => NEUTRAL_HEX.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_endpoints_are_exact() {
        assert_eq!(heat_hex(0.0), "#ff0000");
        assert_eq!(heat_hex(1.0), "#008000");
    }

    #[test]
    fn test_out_of_range_clamps() {
        assert_eq!(heat_hex(-3.5), "#ff0000");
        assert_eq!(heat_hex(42.0), "#008000");
        assert_eq!(heat_hex(f64::NAN), "#ff0000");
    }

    #[test]
    fn test_midpoints_move_away_from_red() {
        let parse = |s: &str| u8::from_str_radix(&s[1..3], 16).unwrap();
        let quarter = heat_hex(0.25);
        let three_quarters = heat_hex(0.75);
        assert_eq!(quarter.len(), 7);
        assert!(quarter.starts_with('#'));
        assert_ne!(quarter, heat_hex(0.0));
        assert_ne!(three_quarters, heat_hex(1.0));
        assert!(parse(&quarter) > parse(&three_quarters));
    }

    #[test]
    fn test_fill_hex_neutral_for_absent_values() {
        assert_eq!(fill_hex(None), NEUTRAL_HEX);
        assert_eq!(fill_hex(Some(0.0)), "#ff0000");
    }
}
