//! Fits of a peak on a flat background, end to end through the registry.

use approx::assert_relative_eq;
use rt_fit::{ChiSquareFitter, CurveFitter, FitRegistry, HistogramFitSpec, fit_signal_yield};
use rt_hist::{CurveRole, Histogram};

const MEAN: f64 = 0.3;
const SIGMA: f64 = 0.6;
const AMP: f64 = 200.0;
const LEVEL: f64 = 10.0;

// Gaussian on a constant, with a deterministic +-0.5 sigma zig-zag on top.
fn peak_histogram(name: &str) -> Histogram {
    let mut h = Histogram::new_1d(name, "", 40, -5.0, 5.0).unwrap();
    for b in 1..=40 {
        let x = h.axis(0).bin_center(b);
        let mu = LEVEL + AMP * (-0.5 * ((x - MEAN) / SIGMA).powi(2)).exp();
        let sign = if b % 2 == 0 { 1.0 } else { -1.0 };
        h.set_bin_content(b, mu + sign * 0.5 * mu.sqrt());
        h.set_bin_error(b, mu.sqrt());
    }
    h
}

#[test]
fn gaussian_on_flat_background() {
    let mut h = peak_histogram("h_peak");
    let spec = HistogramFitSpec::new("h_peak", "gaus", "pol0", (-5.0, 5.0)).unwrap();

    let ok = ChiSquareFitter::default().fit(&mut h, &spec).unwrap();
    assert!(ok);

    let curves = h.functions();
    assert_eq!(curves.len(), 3);
    assert_eq!(curves[0].role, CurveRole::Total);
    assert_eq!(curves[1].role, CurveRole::Signal);
    assert_eq!(curves[2].role, CurveRole::Background);
    assert_eq!(curves[0].name, "f_h_peak");
    assert_eq!(curves[1].formula, "gaus");
    assert_eq!(curves[0].ndf, 36);

    let sig = &curves[1].parameters;
    assert_relative_eq!(sig[1], MEAN, epsilon = 0.05);
    assert_relative_eq!(sig[2].abs(), SIGMA, epsilon = 0.05);
    assert!(curves[1].errors[1] > 0.0);
    assert_relative_eq!(curves[2].parameters[0], LEVEL, epsilon = 1.5);

    // expected signal counts: AMP * SIGMA * sqrt(2 pi) / bin width
    let expected = AMP * SIGMA * (2.0 * std::f64::consts::PI).sqrt() / 0.25;
    let y = fit_signal_yield(&h).unwrap().unwrap();
    assert!((y.value - expected).abs() / expected < 0.05, "yield {} vs {expected}", y.value);
}

#[test]
fn registry_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fits.json");

    let reg: FitRegistry = [
        HistogramFitSpec::new("h_a_X00", "gaus", "pol1", (-2.0, 2.0)).unwrap().with_rebin(2),
        HistogramFitSpec::new("h_a_X01", "gaus", "expo", (-3.0, 3.0)).unwrap().disabled(),
    ]
    .into_iter()
    .collect();
    reg.write_json(&path).unwrap();

    let loaded = FitRegistry::from_json_file(&path).unwrap();
    assert_eq!(loaded, reg);
    assert!(loaded.find("h_a_X01").unwrap().fit_disabled);
    assert_eq!(loaded.find("h_a_X00").unwrap().rebin, 2);
}
