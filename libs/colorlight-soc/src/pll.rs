//! ECP5 EHXPLLL divider search.
//!
//! Only feasibility is computed here: given an input clock and a list of requested
//! outputs, find the first divider set that hits every output within its margin.
//! The search order matches the LiteX `ECP5PLL` model so that a plan accepted here
//! is accepted by the gateware build as well.

use serde::Serialize;

use crate::Error;

pub const CLKI_MIN_HZ: f64 = 8e6;
pub const CLKI_MAX_HZ: f64 = 400e6;
pub const VCO_MIN_HZ: f64 = 400e6;
pub const VCO_MAX_HZ: f64 = 800e6;
pub const CLKO_MIN_HZ: f64 = 3.125e6;
pub const CLKO_MAX_HZ: f64 = 400e6;

/// CLKI, CLKFB and CLKO dividers all accept 1..=128
const DIV_MAX: u32 = 128;

/// CLKOP, CLKOS, CLKOS2, CLKOS3
/// CLKOS3 is taken by the feedback path
pub const MAX_OUTPUTS: usize = 3;

/// Relative frequency error tolerated when the caller doesn't ask for an exact match.
pub const DEFAULT_MARGIN: f64 = 1e-2;

/// Identifies one physical PLL. Each independently clocked domain group gets its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PllId {
    Primary,
    Usb,
    Video,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputRequest {
    pub domain: &'static str,
    pub frequency_hz: f64,
    pub phase_degrees: f64,
    /// Relative error allowed, `0.0` demands an exact match
    pub margin: f64,
}

impl OutputRequest {
    pub fn new(domain: &'static str, frequency_hz: f64) -> OutputRequest {
        OutputRequest { domain, frequency_hz, phase_degrees: 0.0, margin: DEFAULT_MARGIN }
    }

    pub fn phase(mut self, phase_degrees: f64) -> OutputRequest {
        self.phase_degrees = phase_degrees;
        self
    }

    pub fn exact(mut self) -> OutputRequest {
        self.margin = 0.0;
        self
    }

    fn accepts(&self, frequency_hz: f64) -> bool {
        (frequency_hz - self.frequency_hz).abs() <= self.frequency_hz * self.margin
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PllOutput {
    pub domain: String,
    pub div: u32,
    pub frequency_hz: f64,
    pub phase_degrees: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PllConfig {
    pub id: PllId,
    pub clkin_hz: f64,
    pub clki_div: u32,
    pub clkfb_div: u32,
    pub vco_hz: f64,
    pub outputs: Vec<PllOutput>,
}

impl PllConfig {
    pub fn output(&self, domain: &str) -> Option<&PllOutput> { self.outputs.iter().find(|o| o.domain == domain) }
}

/// Find the first ECP5 divider configuration that satisfies every request.
///
/// CLKI is tried in ascending order, then CLKFB, then each output's CLKO divider.
/// The VCO runs at `clkin / clki_div * clkfb_div`.
pub fn find_pll_config(id: PllId, clkin_hz: f64, requests: &[OutputRequest]) -> Result<PllConfig, Error> {
    if !(CLKI_MIN_HZ..=CLKI_MAX_HZ).contains(&clkin_hz) {
        return Err(Error::UnsatisfiableFrequencyPlan(format!(
            "{:?} PLL input {} Hz outside {}..{} Hz",
            id, clkin_hz, CLKI_MIN_HZ, CLKI_MAX_HZ
        )));
    }
    if requests.is_empty() || requests.len() > MAX_OUTPUTS {
        return Err(Error::UnsatisfiableFrequencyPlan(format!(
            "{:?} PLL asked for {} outputs, supports 1..={}",
            id,
            requests.len(),
            MAX_OUTPUTS
        )));
    }
    for request in requests {
        if !(CLKO_MIN_HZ..=CLKO_MAX_HZ).contains(&request.frequency_hz) {
            return Err(Error::UnsatisfiableFrequencyPlan(format!(
                "{} at {} Hz outside PLL output range {}..{} Hz",
                request.domain, request.frequency_hz, CLKO_MIN_HZ, CLKO_MAX_HZ
            )));
        }
    }

    for clki_div in 1..=DIV_MAX {
        for clkfb_div in 1..=DIV_MAX {
            let vco_hz = clkin_hz / clki_div as f64 * clkfb_div as f64;
            if !(VCO_MIN_HZ..=VCO_MAX_HZ).contains(&vco_hz) {
                continue;
            }
            let outputs: Option<Vec<PllOutput>> = requests
                .iter()
                .map(|request| {
                    (1..=DIV_MAX).find(|&div| request.accepts(vco_hz / div as f64)).map(|div| PllOutput {
                        domain: request.domain.to_string(),
                        div,
                        frequency_hz: vco_hz / div as f64,
                        phase_degrees: request.phase_degrees,
                    })
                })
                .collect();
            if let Some(outputs) = outputs {
                log::debug!(
                    "{:?} PLL: clkin {} Hz, clki_div {}, clkfb_div {}, vco {} Hz",
                    id,
                    clkin_hz,
                    clki_div,
                    clkfb_div,
                    vco_hz
                );
                return Ok(PllConfig { id, clkin_hz, clki_div, clkfb_div, vco_hz, outputs });
            }
        }
    }

    let wanted: Vec<String> =
        requests.iter().map(|r| format!("{}={}Hz (margin {})", r.domain, r.frequency_hz, r.margin)).collect();
    Err(Error::UnsatisfiableFrequencyPlan(format!(
        "no {:?} PLL configuration from {} Hz for {}",
        id,
        clkin_hz,
        wanted.join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixty_mhz_from_25() {
        let config = find_pll_config(PllId::Primary, 25e6, &[
            OutputRequest::new("sys", 60e6),
            OutputRequest::new("sys_ps", 60e6).phase(180.0),
        ])
        .unwrap();
        assert_eq!(config.clki_div, 1);
        assert_eq!(config.clkfb_div, 24);
        assert_eq!(config.vco_hz, 600e6);
        assert_eq!(config.output("sys").unwrap().frequency_hz, 60e6);
        assert_eq!(config.output("sys").unwrap().div, 10);
        assert_eq!(config.output("sys_ps").unwrap().phase_degrees, 180.0);
    }

    #[test]
    fn exact_usb_pair() {
        let config = find_pll_config(PllId::Usb, 25e6, &[
            OutputRequest::new("usb_12", 12e6).exact(),
            OutputRequest::new("usb_48", 48e6).exact(),
        ])
        .unwrap();
        assert_eq!(config.vco_hz, 480e6);
        assert_eq!(config.output("usb_12").unwrap().frequency_hz, 12e6);
        assert_eq!(config.output("usb_48").unwrap().frequency_hz, 48e6);
    }

    #[test]
    fn exact_match_unsatisfiable_from_internal_oscillator() {
        let result = find_pll_config(PllId::Usb, 62e6, &[
            OutputRequest::new("usb_12", 12e6).exact(),
            OutputRequest::new("usb_48", 48e6).exact(),
        ]);
        assert!(matches!(result, Err(Error::UnsatisfiableFrequencyPlan(_))));
    }

    #[test]
    fn limits() {
        let one = [OutputRequest::new("sys", 60e6)];
        assert!(find_pll_config(PllId::Primary, 4e6, &one).is_err());
        assert!(find_pll_config(PllId::Primary, 25e6, &[]).is_err());
        let three = vec![OutputRequest::new("sys", 50e6); 3];
        assert!(find_pll_config(PllId::Primary, 25e6, &three).is_ok());
        let four = vec![OutputRequest::new("sys", 50e6); 4];
        assert!(find_pll_config(PllId::Primary, 25e6, &four).is_err());
        assert!(find_pll_config(PllId::Primary, 25e6, &[OutputRequest::new("fast", 500e6)]).is_err());
    }
}
